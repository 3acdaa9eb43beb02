//! Named system variables.
//!
//! A variable holds a string, a number, an unexpanded macro, or is backed
//! by host code through independent read and write capabilities. Labels
//! compare case-insensitively and the store keeps them in that order, so
//! pattern lookups walk variables alphabetically.

use mos_types::error::{MosError, Result};
use mos_types::time::RtcTime;
use mos_vfs::glob;

use crate::interpreter::Environment;
use crate::pattern::compare_names;

/// Display-controller setting numbers written by code variables.
const VDP_KEYCODE: u8 = 0x81;
const VDP_CONSOLE_MODE: u8 = 0xFE;

/// How deep macros may expand other macros.
const MAX_MACRO_DEPTH: usize = 16;

pub type CodeRead = fn(&mut Environment<'_>) -> Result<String>;
pub type CodeWrite = fn(&mut Environment<'_>, &str) -> Result<()>;

/// A host-backed variable. Either capability may be absent.
#[derive(Debug, Clone, Copy)]
pub struct CodeVariable {
    pub read: Option<CodeRead>,
    pub write: Option<CodeWrite>,
}

#[derive(Debug, Clone)]
pub enum VarValue {
    String(String),
    Number(i32),
    /// Template expanded each time the variable is read.
    Macro(String),
    Code(CodeVariable),
}

#[derive(Debug, Clone)]
pub struct Variable {
    pub label: String,
    pub value: VarValue,
}

/// The variable table.
#[derive(Debug, Default)]
pub struct VariableStore {
    vars: Vec<Variable>,
}

impl VariableStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store holding the standard clock, directory and display variables
    /// plus the default prompt.
    pub fn with_system_variables() -> Self {
        let mut store = Self::new();
        store.insert("Sys$Time", VarValue::Code(CodeVariable {
            read: Some(read_time),
            write: Some(write_time),
        }));
        store.insert("Sys$Date", VarValue::Code(CodeVariable {
            read: Some(read_date),
            write: None,
        }));
        store.insert("Sys$Year", VarValue::Code(CodeVariable {
            read: Some(read_year),
            write: Some(write_year),
        }));
        store.insert("Current$Dir", VarValue::Code(CodeVariable {
            read: Some(read_cwd),
            write: None,
        }));
        store.insert("CLI$Prompt", VarValue::Macro("<Current$Dir> *".into()));
        store.insert("Keyboard", VarValue::Code(CodeVariable {
            read: None,
            write: Some(write_keyboard),
        }));
        store.insert("Console", VarValue::Code(CodeVariable {
            read: None,
            write: Some(write_console),
        }));
        store
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Variable> {
        self.vars.iter()
    }

    /// Exact (case-insensitive) lookup.
    pub fn get(&self, label: &str) -> Option<&Variable> {
        self.position(label).ok().map(|i| &self.vars[i])
    }

    /// First variable after `after` (or from the start) whose label matches
    /// `pattern`.
    pub fn find(&self, pattern: &str, after: Option<&str>) -> Option<&Variable> {
        let start = match after {
            None => 0,
            Some(label) => match self.position(label) {
                Ok(i) => i + 1,
                Err(i) => i,
            },
        };
        self.vars[start..]
            .iter()
            .find(|v| glob::matches(pattern, &v.label))
    }

    /// Insert a variable, replacing any with the same label.
    pub fn insert(&mut self, label: &str, value: VarValue) {
        match self.position(label) {
            Ok(i) => self.vars[i].value = value,
            Err(i) => self.vars.insert(i, Variable {
                label: label.to_string(),
                value,
            }),
        }
    }

    pub fn remove(&mut self, label: &str) -> Option<Variable> {
        self.position(label).ok().map(|i| self.vars.remove(i))
    }

    fn position(&self, label: &str) -> std::result::Result<usize, usize> {
        self.vars
            .binary_search_by(|v| compare_names(&v.label, label))
    }
}

/// Store `value` under `label`. An existing code variable is not replaced;
/// it receives the value's text through its write capability.
pub fn assign(store: &mut VariableStore, env: &mut Environment<'_>, label: &str, value: VarValue) -> Result<()> {
    let code = match store.get(label) {
        Some(Variable {
            value: VarValue::Code(code),
            ..
        }) => *code,
        _ => {
            store.insert(label, value);
            return Ok(());
        },
    };
    let write = code.write.ok_or(MosError::InvalidParameter)?;
    let text = match value {
        VarValue::String(s) | VarValue::Macro(s) => s,
        VarValue::Number(n) => n.to_string(),
        VarValue::Code(_) => return Err(MosError::InvalidParameter),
    };
    write(env, &text)
}

// ---------------------------------------------------------------------------
// Reading values
// ---------------------------------------------------------------------------

/// Text form of a variable's value. Macros are expanded; a code variable
/// without a read capability is an error.
pub fn value_text(store: &VariableStore, env: &mut Environment<'_>, value: &VarValue) -> Result<String> {
    expand_value(store, env, value, 0)
}

fn expand_value(
    store: &VariableStore,
    env: &mut Environment<'_>,
    value: &VarValue,
    depth: usize,
) -> Result<String> {
    match value {
        VarValue::String(s) => Ok(s.clone()),
        VarValue::Number(n) => Ok(n.to_string()),
        VarValue::Macro(template) => {
            if depth >= MAX_MACRO_DEPTH {
                return Err(MosError::BadString);
            }
            translate(store, env, template, depth + 1)
        },
        VarValue::Code(code) => match code.read {
            Some(read) => read(env),
            None => Err(MosError::InvalidParameter),
        },
    }
}

/// Render control characters as `|` escapes, as `Show` prints them.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if (c as u32) < 0x20 {
            out.push('|');
            out.push(char::from(c as u8 + 0x40));
        } else {
            out.push(c);
        }
    }
    out
}

// ---------------------------------------------------------------------------
// GSTrans
// ---------------------------------------------------------------------------

/// Expand `text`: `<name>` inserts a variable's value, `<n>` or `<&hh>` the
/// character with that code, and `|x` a control character.
pub fn gs_trans(store: &VariableStore, env: &mut Environment<'_>, text: &str) -> Result<String> {
    translate(store, env, text, 0)
}

fn translate(
    store: &VariableStore,
    env: &mut Environment<'_>,
    text: &str,
    depth: usize,
) -> Result<String> {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        match c {
            '|' => {
                let next = chars.next().ok_or(MosError::BadString)?;
                out.push(control_char(next));
            },
            '<' => {
                let rest = chars.as_str();
                let end = rest.find('>').ok_or(MosError::BadString)?;
                let inner = &rest[..end];
                chars = rest[end + 1..].chars();
                if let Some(code) = parse_int(inner) {
                    out.push(char::from((code & 0xFF) as u8));
                } else if let Some(var) = store.get(inner) {
                    let value = var.value.clone();
                    out.push_str(&expand_value(store, env, &value, depth)?);
                }
            },
            c => out.push(c),
        }
    }
    Ok(out)
}

fn control_char(c: char) -> char {
    match c {
        '|' => '|',
        '"' => '"',
        '?' => '\x7F',
        '@'..='_' | '`'..='~' => char::from(c as u8 & 0x1F),
        other => other,
    }
}

/// Decimal, or hex with a leading `&`.
fn parse_int(text: &str) -> Option<i64> {
    let text = text.trim();
    let (digits, radix) = match text.strip_prefix('&') {
        Some(hex) => (hex, 16),
        None => (text, 10),
    };
    if digits.is_empty() {
        return None;
    }
    i64::from_str_radix(digits, radix).ok()
}

// ---------------------------------------------------------------------------
// SetEval expressions
// ---------------------------------------------------------------------------

/// Evaluate a `SetEval` expression. A quoted string yields a string value
/// (GS-translated); anything else is integer arithmetic over numbers,
/// numeric variables, `+ - * /`, `MOD` and parentheses.
pub fn evaluate(store: &VariableStore, env: &mut Environment<'_>, expr: &str) -> Result<VarValue> {
    let expr = expr.trim();
    if let Some(inner) = expr.strip_prefix('"') {
        let inner = inner.strip_suffix('"').ok_or(MosError::BadString)?;
        return Ok(VarValue::String(gs_trans(store, env, inner)?));
    }
    let mut parser = ExprParser {
        store,
        env,
        src: expr,
        pos: 0,
    };
    let value = parser.expr()?;
    parser.skip_spaces();
    if parser.pos != parser.src.len() {
        return Err(MosError::InvalidParameter);
    }
    Ok(VarValue::Number(value))
}

struct ExprParser<'s, 'e, 'a> {
    store: &'s VariableStore,
    env: &'e mut Environment<'a>,
    src: &'s str,
    pos: usize,
}

impl<'s> ExprParser<'s, '_, '_> {
    fn rest(&self) -> &'s str {
        &self.src[self.pos..]
    }

    fn skip_spaces(&mut self) {
        let trimmed = self.rest().trim_start();
        self.pos = self.src.len() - trimmed.len();
    }

    fn eat(&mut self, token: &str) -> bool {
        self.skip_spaces();
        let rest = self.rest();
        if rest.len() >= token.len() && rest[..token.len()].eq_ignore_ascii_case(token) {
            self.pos += token.len();
            true
        } else {
            false
        }
    }

    fn expr(&mut self) -> Result<i32> {
        let mut acc = self.term()?;
        loop {
            if self.eat("+") {
                acc = acc.wrapping_add(self.term()?);
            } else if self.eat("-") {
                acc = acc.wrapping_sub(self.term()?);
            } else {
                return Ok(acc);
            }
        }
    }

    fn term(&mut self) -> Result<i32> {
        let mut acc = self.unary()?;
        loop {
            if self.eat("*") {
                acc = acc.wrapping_mul(self.unary()?);
            } else if self.eat("/") {
                let rhs = self.unary()?;
                acc = acc.checked_div(rhs).ok_or(MosError::InvalidParameter)?;
            } else if self.eat("MOD") {
                let rhs = self.unary()?;
                acc = acc.checked_rem(rhs).ok_or(MosError::InvalidParameter)?;
            } else {
                return Ok(acc);
            }
        }
    }

    fn unary(&mut self) -> Result<i32> {
        if self.eat("-") {
            return Ok(self.unary()?.wrapping_neg());
        }
        if self.eat("+") {
            return self.unary();
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<i32> {
        if self.eat("(") {
            let value = self.expr()?;
            if !self.eat(")") {
                return Err(MosError::InvalidParameter);
            }
            return Ok(value);
        }
        self.skip_spaces();
        let rest = self.rest();
        let len = rest
            .find(|c: char| c.is_whitespace() || "+-*/()".contains(c))
            .unwrap_or(rest.len());
        if len == 0 {
            return Err(MosError::InvalidParameter);
        }
        let word = &rest[..len];
        self.pos += len;
        if let Some(n) = parse_int(word) {
            return Ok(n as i32);
        }
        let var = self.store.get(word).ok_or(MosError::InvalidParameter)?;
        match &var.value {
            VarValue::Number(n) => Ok(*n),
            other => {
                let other = other.clone();
                let text = value_text(self.store, self.env, &other)?;
                parse_int(&text)
                    .map(|n| n as i32)
                    .ok_or(MosError::InvalidParameter)
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Code variables
// ---------------------------------------------------------------------------

fn read_time(env: &mut Environment<'_>) -> Result<String> {
    Ok(env.clock.now().format_time())
}

/// Accepts `hh:mm:ss`; the date is kept.
fn write_time(env: &mut Environment<'_>, text: &str) -> Result<()> {
    let field = |i: usize| -> Result<u8> {
        text.get(i..i + 2)
            .filter(|s| s.bytes().all(|b| b.is_ascii_digit()))
            .and_then(|s| s.parse().ok())
            .ok_or(MosError::InvalidParameter)
    };
    let mut t = env.clock.now();
    t.hour = field(0)?;
    t.minute = field(3)?;
    t.second = field(6)?;
    env.set_rtc(t)
}

fn read_date(env: &mut Environment<'_>) -> Result<String> {
    Ok(env.clock.now().format_date())
}

fn read_year(env: &mut Environment<'_>) -> Result<String> {
    Ok(format!("{:04}", env.clock.now().year))
}

fn write_year(env: &mut Environment<'_>, text: &str) -> Result<()> {
    let year = parse_int(text)
        .and_then(|y| u16::try_from(y).ok())
        .ok_or(MosError::InvalidParameter)?;
    let t = RtcTime {
        year,
        ..env.clock.now()
    };
    env.set_rtc(t)
}

fn read_cwd(env: &mut Environment<'_>) -> Result<String> {
    Ok(env.cwd.clone())
}

fn write_keyboard(env: &mut Environment<'_>, text: &str) -> Result<()> {
    write_vdp_setting(env, text, VDP_KEYCODE)
}

fn write_console(env: &mut Environment<'_>, text: &str) -> Result<()> {
    write_vdp_setting(env, text, VDP_CONSOLE_MODE)
}

fn write_vdp_setting(env: &mut Environment<'_>, text: &str, setting: u8) -> Result<()> {
    let value = parse_int(text).ok_or(MosError::InvalidParameter)?;
    env.console
        .write_bytes(&[23, 0, setting, (value & 0xFF) as u8]);
    Ok(())
}
