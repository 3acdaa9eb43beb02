//! The built-in command table and `HELP`.
//!
//! Table order matters twice over: it breaks ties when a typed word
//! abbreviates several names, and it is the order `HELP` lists commands in.

use mos_types::error::Result;

use crate::file_commands::{CdCmd, CopyCmd, DelCmd, DirCmd, MkdirCmd, RenCmd, TypeCmd};
use crate::interpreter::{Args, Command, CommandRecord, CommandRegistry, Environment, abbreviates};
use crate::system_commands::{
    CreditsCmd, DiscCmd, ExecCmd, JmpCmd, LoadCmd, MemCmd, MountCmd, RunCmd, SaveCmd, TimeCmd,
};
use crate::text_commands::{ClsCmd, EchoCmd, HotkeyCmd, PrintfCmd, VduCmd};
use crate::var_commands::{SetCmd, SetEvalCmd, SetMacroCmd, ShowCmd, UnsetCmd};

const CAT_ARGS: &str = "[-l] <path>";
const CAT_HELP: &str = "Directory listing of the current directory, or of <path>, which may \
                        end in a wildcard pattern. -l gives a long listing";
const CD_ARGS: &str = "<path>";
const CD_HELP: &str = "Change current directory";
const COPY_ARGS: &str = "<filename1> <destination>";
const COPY_HELP: &str = "Create a copy of a file. A wildcard source copies every match into \
                         the destination directory";
const DELETE_ARGS: &str = "[-f] <filename>";
const DELETE_HELP: &str = "Delete a file or folder (must be empty). A wildcard pattern asks \
                           before each file unless -f is given";
const RENAME_ARGS: &str = "<filename1> <destination>";
const RENAME_HELP: &str = "Rename or move a file. A wildcard source moves every match into \
                           the destination directory";

/// Add `name` to the table.
fn add(
    reg: &mut CommandRegistry,
    name: &'static str,
    handler: Box<dyn Command>,
    args: Option<&'static str>,
    help: Option<&'static str>,
) {
    reg.register(CommandRecord {
        name,
        handler: Some(handler),
        args,
        help,
    });
}

/// Register every built-in command, in table order.
pub fn register_builtins(reg: &mut CommandRegistry) {
    add(reg, ".", Box::new(DirCmd), Some(CAT_ARGS), Some(CAT_HELP));
    add(reg, "CAT", Box::new(DirCmd), Some(CAT_ARGS), Some(CAT_HELP));
    add(reg, "CD", Box::new(CdCmd), Some(CD_ARGS), Some(CD_HELP));
    add(reg, "CDIR", Box::new(CdCmd), Some(CD_ARGS), Some(CD_HELP));
    add(reg, "CLS", Box::new(ClsCmd), None, Some("Clear the screen"));
    add(reg, "COPY", Box::new(CopyCmd), Some(COPY_ARGS), Some(COPY_HELP));
    add(reg, "CP", Box::new(CopyCmd), Some(COPY_ARGS), Some(COPY_HELP));
    add(reg, "CREDITS", Box::new(CreditsCmd), None, Some("Output credits and version numbers for third-party libraries"));
    add(reg, "DELETE", Box::new(DelCmd), Some(DELETE_ARGS), Some(DELETE_HELP));
    add(reg, "DIR", Box::new(DirCmd), Some(CAT_ARGS), Some(CAT_HELP));
    add(reg, "DISC", Box::new(DiscCmd), None, None);
    add(reg, "ECHO", Box::new(EchoCmd), Some("<string>"), Some("Echo a string to the screen, translating |-escapes and <variables>"));
    add(reg, "ERASE", Box::new(DelCmd), Some(DELETE_ARGS), Some(DELETE_HELP));
    add(reg, "EXEC", Box::new(ExecCmd), Some("<filename>"), Some("Run a batch file containing MOS commands"));
    add(reg, "HELP", Box::new(HelpCmd), Some("[ <command> | all ]"), Some("Display help on a single or all commands"));
    add(reg, "JMP", Box::new(JmpCmd), Some("<addr>"), Some("Jump to the specified address in memory"));
    add(reg, "LOAD", Box::new(LoadCmd), Some("<filename> <addr>"), Some("Load a file from the SD card to the specified address. If no address is given, the default load address is used"));
    add(reg, "LS", Box::new(DirCmd), Some(CAT_ARGS), Some(CAT_HELP));
    add(reg, "HOTKEY", Box::new(HotkeyCmd), Some("<function key> <command string>"), Some("Store a command in one of 12 hotkey slots assigned to F1-F12. With no arguments, list the current assignments"));
    add(reg, "MEM", Box::new(MemCmd), None, Some("Output memory statistics"));
    add(reg, "MKDIR", Box::new(MkdirCmd), Some("<filename>"), Some("Make a folder on the SD card"));
    add(reg, "MOUNT", Box::new(MountCmd), None, Some("(Re-)mount the MicroSD card"));
    add(reg, "MOVE", Box::new(RenCmd), Some(RENAME_ARGS), Some(RENAME_HELP));
    add(reg, "MV", Box::new(RenCmd), Some(RENAME_ARGS), Some(RENAME_HELP));
    add(reg, "PRINTF", Box::new(PrintfCmd), Some("<string>"), Some("Print a string to the VDU, with common backslash escape sequences"));
    add(reg, "RENAME", Box::new(RenCmd), Some(RENAME_ARGS), Some(RENAME_HELP));
    add(reg, "RM", Box::new(DelCmd), Some(DELETE_ARGS), Some(DELETE_HELP));
    add(reg, "RUN", Box::new(RunCmd), Some("[<addr>]"), Some("Call an executable binary loaded in memory. If no address is given, the default load address is used"));
    add(reg, "SAVE", Box::new(SaveCmd), Some("<filename> <addr> <size>"), Some("Save a block of memory to the SD card"));
    add(reg, "Set", Box::new(SetCmd), Some("<varname> <value>"), Some("Set a system variable, translating |-escapes and <variables> in the value"));
    add(reg, "SetEval", Box::new(SetEvalCmd), Some("<varname> <expression>"), Some("Evaluate an expression and store the result in a system variable"));
    add(reg, "SetMacro", Box::new(SetMacroCmd), Some("<varname> <value>"), Some("Set a macro variable, expanded each time it is read"));
    add(reg, "Show", Box::new(ShowCmd), Some("[<varname pattern>]"), Some("List system variables, optionally only those matching a pattern"));
    add(reg, "TIME", Box::new(TimeCmd), Some("[ <yyyy> <mm> <dd> <hh> <mm> <ss> ]"), Some("Set and read the ESP32 real-time clock"));
    add(reg, "TYPE", Box::new(TypeCmd), Some("<filename>"), Some("Display the contents of a file on the screen"));
    add(reg, "UNSET", Box::new(UnsetCmd), Some("<varname pattern>"), Some("Remove system variables matching a pattern; code variables are kept"));
    add(reg, "VDU", Box::new(VduCmd), Some("<char1> <char2> ... <charN>"), Some("Write a stream of characters to the VDP. Append ; for 16-bit values"));
}

// ---------------------------------------------------------------------------
// help
// ---------------------------------------------------------------------------

/// Usage line with aliases, then the help text when `full`. Hidden
/// records print nothing.
fn print_info(shell: &CommandRegistry, record: &CommandRecord, full: bool, env: &mut Environment<'_>) {
    let Some(help) = record.help else {
        return;
    };
    let mut line = record.name.to_string();
    if let Some(args) = record.args {
        line.push(' ');
        line.push_str(args);
    }
    let aliases = shell.aliases_of(record);
    if let Some((last, rest)) = aliases.split_last() {
        line.push_str(" (Aliases: ");
        if !rest.is_empty() {
            line.push_str(&rest.join(", "));
            line.push_str(" and ");
        }
        line.push_str(last);
        line.push(')');
    }
    line.push_str("\r\n");
    if full {
        line.push_str(help);
        line.push_str("\r\n");
    }
    env.print(&line);
}

/// Names of every visible command after the first, wrapped to `columns`.
fn command_list(records: &[CommandRecord], columns: usize) -> String {
    let mut out = String::from("List of commands:\r\n");
    let mut col = 0;
    let last = records.len().saturating_sub(1);
    for (i, record) in records.iter().enumerate().skip(1) {
        if record.is_hidden() {
            continue;
        }
        let len = record.name.len();
        if col + len + 2 >= columns {
            out.push_str("\r\n");
            col = 0;
        }
        out.push_str(record.name);
        if i < last {
            out.push_str(", ");
        }
        col += len + 2;
    }
    out.push_str("\r\n");
    out
}

pub(crate) struct HelpCmd;
impl Command for HelpCmd {
    fn name(&self) -> &str {
        "HELP"
    }
    fn execute(&self, args: &mut Args<'_>, shell: &CommandRegistry, env: &mut Environment<'_>) -> Result<()> {
        let first = args.next_token();
        if first.is_some_and(|w| w.eq_ignore_ascii_case("all")) {
            for record in shell.records() {
                print_info(shell, record, false, env);
            }
            return Ok(());
        }
        let mut word = first.unwrap_or("help");
        loop {
            let mut found = false;
            for record in shell.records().iter().filter(|r| abbreviates(word, r.name)) {
                found = true;
                print_info(shell, record, true, env);
                if first.is_none() {
                    let list = command_list(shell.records(), env.console.columns());
                    env.print(&list);
                }
            }
            if !found {
                env.print(&format!("Command not found: {word}\r\n"));
            }
            match args.next_token() {
                Some(next) => word = next,
                None => return Ok(()),
            }
        }
    }
}
