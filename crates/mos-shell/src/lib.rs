//! MOS command line.
//!
//! Commands implement the `Command` trait and sit in an ordered table. The
//! first entry whose name starts with the typed word, ignoring case,
//! handles it. Words the table does not handle are searched for as program
//! images on the volume, loaded into RAM and handed to the executor.

pub mod api;
pub mod batch;
mod commands;
mod file_commands;
pub mod interpreter;
pub mod listing;
pub mod loader;
pub mod pattern;
pub mod services;
mod system_commands;
mod text_commands;
mod var_commands;
pub mod variables;

#[cfg(test)]
mod testing;

/// Programmatic entry points for loaded programs.
pub use api::MosApi;
/// Fill a table with every built-in command.
pub use commands::register_builtins;
/// A single executable command, its argument cursor, and the table.
pub use interpreter::{Args, Command, CommandRecord, CommandRegistry, Environment};
/// Run every line of a batch file.
pub use system_commands::exec_file;
/// Collaborators the shell drives.
pub use services::{Clock, Console, Executor, LineInput, Memory};
/// Named variables.
pub use variables::{VarValue, VariableStore};
