//! Foundation types for the MOS shell.
//!
//! Shared by every crate in the workspace: the status/error taxonomy, shell
//! configuration, RTC and packed FAT timestamps, and the accounted heap.

pub mod config;
pub mod error;
pub mod heap;
pub mod time;

pub use error::{MosError, Result};
