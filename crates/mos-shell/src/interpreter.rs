//! Command trait, ordered command table, and dispatch.
//!
//! A line is trimmed, its first word resolved against the table by
//! case-insensitive prefix in table order, and the matching handler run
//! with an argument cursor over the rest of the line. Words that resolve to
//! nothing are searched for as external programs.

use std::cell::{Cell, Ref, RefCell, RefMut};

use mos_types::config::ShellConfig;
use mos_types::error::{MosError, Result};
use mos_types::heap::Heap;
use mos_types::time::RtcTime;
use mos_vfs::{FileTable, Vfs};

use crate::loader;
use crate::services::{Clock, Console, Executor, Memory};
use crate::variables::{VariableStore, value_text};

/// Display-controller escape that sets the clock.
const VDP_RTC: u8 = 0x87;

/// Number of programmable function keys.
pub const HOTKEY_COUNT: usize = 12;

/// Shared mutable environment passed to every command.
pub struct Environment<'a> {
    /// Absolute path of the current directory, refreshed after anything
    /// that can change it.
    pub cwd: String,
    pub vfs: &'a mut dyn Vfs,
    pub console: &'a mut dyn Console,
    pub clock: &'a mut dyn Clock,
    /// Runs loaded program images.
    pub executor: &'a mut dyn Executor,
    pub memory: &'a mut Memory,
    /// Handles given out through the API.
    pub files: &'a mut FileTable,
    pub heap: &'a Heap,
    pub config: &'a ShellConfig,
}

impl Environment<'_> {
    pub fn print(&mut self, text: &str) {
        self.console.write_str(text);
    }

    /// Print the fixed message for a failed status.
    pub fn report(&mut self, err: &MosError) {
        self.print(&format!("\r\n{err}\r\n"));
    }

    /// Re-read the current directory from the volume.
    pub fn refresh_cwd(&mut self) {
        match self.vfs.current_dir() {
            Ok(cwd) => self.cwd = cwd,
            Err(e) => log::warn!("could not read current directory: {e}"),
        }
    }

    /// Set the clock, telling the display controller first.
    pub fn set_rtc(&mut self, time: RtcTime) -> Result<()> {
        if !time.is_valid() || time.year < 1980 || time.year > 1980 + 255 {
            return Err(MosError::InvalidParameter);
        }
        self.console.write_bytes(&[
            23,
            0,
            VDP_RTC,
            1,
            (time.year - 1980) as u8,
            time.month,
            time.day,
            time.hour,
            time.minute,
            time.second,
        ]);
        self.clock.set(time)
    }
}

// ---------------------------------------------------------------------------
// Argument cursor
// ---------------------------------------------------------------------------

/// Cursor over the arguments of one command line. Tokens are separated by
/// spaces; after a token the cursor sits just past the single space that
/// ended it.
#[derive(Debug, Clone)]
pub struct Args<'l> {
    rest: &'l str,
}

impl<'l> Args<'l> {
    pub fn new(line: &'l str) -> Self {
        Self { rest: line }
    }

    /// Next space-delimited token.
    pub fn next_token(&mut self) -> Option<&'l str> {
        let s = self.rest.trim_start_matches(' ');
        if s.is_empty() {
            self.rest = s;
            return None;
        }
        match s.find(' ') {
            Some(i) => {
                self.rest = &s[i + 1..];
                Some(&s[..i])
            },
            None => {
                self.rest = "";
                Some(s)
            },
        }
    }

    /// Next token parsed as a number. The token is consumed even when it
    /// does not parse.
    pub fn next_number(&mut self) -> Option<u32> {
        self.next_token().and_then(parse_number)
    }

    /// Everything not yet consumed, untouched.
    pub fn remainder(&self) -> &'l str {
        self.rest
    }

    /// The unconsumed text with leading whitespace removed.
    pub fn rest_trimmed(&self) -> &'l str {
        self.rest.trim_start()
    }
}

/// Parse a decimal number, or hex with a leading `&`. The whole token must
/// be consumed. Negative values wrap to 24 bits.
pub fn parse_number(token: &str) -> Option<u32> {
    let (digits, radix) = match token.strip_prefix('&') {
        Some(hex) => (hex, 16),
        None => (token, 10),
    };
    let (negative, digits) = match digits.strip_prefix('-') {
        Some(d) => (true, d),
        None => (false, digits.strip_prefix('+').unwrap_or(digits)),
    };
    let value = if digits.is_empty() && radix == 16 {
        0
    } else {
        i64::from_str_radix(digits, radix).ok()?
    };
    let value = if negative { -value } else { value };
    Some((value as u32) & 0xFF_FFFF)
}

/// Strip leading whitespace and `*`, and trailing whitespace.
pub fn trim_line(line: &str) -> &str {
    line.trim_start_matches(|c: char| c.is_ascii_whitespace() || c == '*')
        .trim_end()
}

/// Lines that succeed without doing anything: empty, comments, and
/// `| ` annotations.
pub fn is_silent(trimmed: &str) -> bool {
    trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with("| ")
}

// ---------------------------------------------------------------------------
// Commands and the table
// ---------------------------------------------------------------------------

/// A built-in command. Aliases share a handler; [`Command::name`] identifies
/// the handler, not the table entry.
pub trait Command {
    fn name(&self) -> &str;

    fn execute(&self, args: &mut Args<'_>, shell: &CommandRegistry, env: &mut Environment<'_>) -> Result<()>;
}

/// One row of the command table.
pub struct CommandRecord {
    pub name: &'static str,
    /// `None` sends the word to the external program search.
    pub handler: Option<Box<dyn Command>>,
    pub args: Option<&'static str>,
    /// `None` hides the entry from help listings.
    pub help: Option<&'static str>,
}

impl CommandRecord {
    pub fn handler_name(&self) -> Option<&str> {
        self.handler.as_deref().map(|h| h.name())
    }

    pub fn is_hidden(&self) -> bool {
        self.help.is_none()
    }
}

impl std::fmt::Debug for CommandRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandRecord")
            .field("name", &self.name)
            .field("handler", &self.handler_name())
            .finish()
    }
}

/// Whether `word` abbreviates `name`, ignoring ASCII case.
pub fn abbreviates(word: &str, name: &str) -> bool {
    name.len() >= word.len()
        && name.as_bytes()[..word.len()].eq_ignore_ascii_case(word.as_bytes())
}

/// Ordered command table with dispatch.
///
/// Also holds the shell's persistent state: variables, function-key
/// strings, and the card-delay flag.
pub struct CommandRegistry {
    records: Vec<CommandRecord>,
    variables: RefCell<VariableStore>,
    hotkeys: RefCell<[Option<String>; HOTKEY_COUNT]>,
    card_delay: Cell<bool>,
}

impl CommandRegistry {
    /// An empty table with the system variables in place.
    pub fn new() -> Self {
        Self {
            records: Vec::new(),
            variables: RefCell::new(VariableStore::with_system_variables()),
            hotkeys: RefCell::new(Default::default()),
            card_delay: Cell::new(false),
        }
    }

    /// A table holding every built-in command.
    pub fn with_builtins() -> Self {
        let mut reg = Self::new();
        crate::commands::register_builtins(&mut reg);
        reg
    }

    /// Append a record. Records are matched in the order they are added.
    pub fn register(&mut self, record: CommandRecord) {
        self.records.push(record);
    }

    pub fn records(&self) -> &[CommandRecord] {
        &self.records
    }

    /// First record, in table order, that `word` abbreviates.
    pub fn resolve(&self, word: &str) -> Option<&CommandRecord> {
        self.records.iter().find(|r| abbreviates(word, r.name))
    }

    /// Other records sharing `record`'s handler, in table order.
    pub fn aliases_of(&self, record: &CommandRecord) -> Vec<&'static str> {
        let Some(id) = record.handler_name() else {
            return Vec::new();
        };
        self.records
            .iter()
            .filter(|r| r.name != record.name && r.handler_name() == Some(id))
            .map(|r| r.name)
            .collect()
    }

    pub fn variables(&self) -> Ref<'_, VariableStore> {
        self.variables.borrow()
    }

    pub fn variables_mut(&self) -> RefMut<'_, VariableStore> {
        self.variables.borrow_mut()
    }

    /// Function key `n` (1-based).
    pub fn hotkey(&self, n: usize) -> Option<String> {
        self.hotkeys
            .borrow()
            .get(n.wrapping_sub(1))
            .cloned()
            .flatten()
    }

    /// Set or clear function key `n` (1-based), returning the old value.
    pub fn set_hotkey(&self, n: usize, text: Option<String>) -> Result<Option<String>> {
        let mut keys = self.hotkeys.borrow_mut();
        let slot = keys
            .get_mut(n.wrapping_sub(1))
            .ok_or(MosError::InvalidParameter)?;
        Ok(std::mem::replace(slot, text))
    }

    pub fn card_delay(&self) -> bool {
        self.card_delay.get()
    }

    pub fn set_card_delay(&self, on: bool) {
        self.card_delay.set(on);
    }

    /// Dispatch one command line. `in_mos` is set for lines typed at the
    /// prompt or read from a batch file; it widens the program search.
    pub fn execute(&self, line: &str, in_mos: bool, env: &mut Environment<'_>) -> Result<()> {
        let trimmed = trim_line(line);
        if is_silent(trimmed) {
            return Ok(());
        }
        let mut args = Args::new(trimmed);
        let Some(word) = args.next_token() else {
            return Ok(());
        };
        match self.resolve(word) {
            Some(CommandRecord {
                name,
                handler: Some(handler),
                ..
            }) => {
                log::debug!("dispatch {word:?} -> {name}");
                handler.execute(&mut args, self, env)
            },
            _ => {
                log::debug!("dispatch {word:?} -> external search");
                loader::run_external(env, word, args.remainder(), in_mos)
            },
        }
    }

    /// The prompt text: `CLI$Prompt` expanded, or `*` when that fails.
    pub fn prompt(&self, env: &mut Environment<'_>) -> String {
        let store = self.variables();
        store
            .get("CLI$Prompt")
            .and_then(|v| value_text(&store, env, &v.value).ok())
            .unwrap_or_else(|| "*".to_string())
    }
}

impl Default for CommandRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CommandRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandRegistry")
            .field("commands", &self.records.len())
            .field("card_delay", &self.card_delay.get())
            .finish_non_exhaustive()
    }
}
