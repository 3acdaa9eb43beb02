//! Console output commands: ECHO, PRINTF, CLS, VDU, HOTKEY.

use mos_types::error::{MosError, Result};

use crate::interpreter::{Args, Command, CommandRegistry, Environment, HOTKEY_COUNT, parse_number};
use crate::variables::gs_trans;

/// Form feed: clears the text viewport.
const CLEAR_SCREEN: u8 = 12;

/// Bytes for display, one per character.
fn display_bytes(text: &str) -> Vec<u8> {
    text.chars().map(|c| c as u8).collect()
}

// ---------------------------------------------------------------------------
// echo
// ---------------------------------------------------------------------------

pub(crate) struct EchoCmd;
impl Command for EchoCmd {
    fn name(&self) -> &str {
        "ECHO"
    }
    fn execute(&self, args: &mut Args<'_>, shell: &CommandRegistry, env: &mut Environment<'_>) -> Result<()> {
        let text = gs_trans(&shell.variables(), env, args.remainder())?;
        env.console.write_bytes(&display_bytes(&text));
        env.print("\r\n");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// printf
// ---------------------------------------------------------------------------

/// Expand backslash escapes: `\\ \r \n \f \t` and `\x` with one or two hex
/// digits. An unknown escape drops the character after the backslash.
pub fn unescape(text: &str) -> Vec<u8> {
    let bytes = text.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        i += 1;
        if b != b'\\' {
            out.push(b);
            continue;
        }
        let Some(&code) = bytes.get(i) else {
            break;
        };
        i += 1;
        match code {
            b'\\' => out.push(b'\\'),
            b'r' => out.push(b'\r'),
            b'n' => out.push(b'\n'),
            b'f' => out.push(12),
            b't' => out.push(b'\t'),
            b'x' => {
                let digits = bytes[i..]
                    .iter()
                    .take(2)
                    .take_while(|d| d.is_ascii_hexdigit())
                    .count();
                if digits > 0 {
                    let hex = &text[i..i + digits];
                    if let Ok(v) = u8::from_str_radix(hex, 16) {
                        out.push(v);
                    }
                    i += digits;
                }
            },
            _ => {},
        }
    }
    out
}

pub(crate) struct PrintfCmd;
impl Command for PrintfCmd {
    fn name(&self) -> &str {
        "PRINTF"
    }
    fn execute(&self, args: &mut Args<'_>, _shell: &CommandRegistry, env: &mut Environment<'_>) -> Result<()> {
        env.console.write_bytes(&unescape(args.remainder()));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// cls
// ---------------------------------------------------------------------------

pub(crate) struct ClsCmd;
impl Command for ClsCmd {
    fn name(&self) -> &str {
        "CLS"
    }
    fn execute(&self, _args: &mut Args<'_>, _shell: &CommandRegistry, env: &mut Environment<'_>) -> Result<()> {
        env.console.write_bytes(&[CLEAR_SCREEN]);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// vdu
// ---------------------------------------------------------------------------

/// Parse one VDU value: decimal, `&hex`, or hex with an `h` suffix.
fn vdu_value(token: &str) -> Option<u32> {
    match token.strip_suffix(['h', 'H']) {
        Some(hex) if !hex.is_empty() && !token.starts_with('&') => {
            u32::from_str_radix(hex, 16).ok()
        },
        _ => parse_number(token),
    }
}

/// Encode a VDU argument list. A trailing `;` sends the value as a 16-bit
/// word, low byte first; values above 255 are always sent as words.
pub fn vdu_bytes(list: &str) -> Result<Vec<u8>> {
    let mut args = Args::new(list);
    let mut out = Vec::new();
    while let Some(token) = args.next_token() {
        let token = token.strip_suffix(',').unwrap_or(token);
        let (token, word) = match token.strip_suffix(';') {
            Some(t) => (t, true),
            None => (token, false),
        };
        let value = vdu_value(token).ok_or(MosError::InvalidParameter)?;
        if value > 0xFFFF {
            return Err(MosError::InvalidParameter);
        }
        if word || value > 0xFF {
            out.extend_from_slice(&(value as u16).to_le_bytes());
        } else {
            out.push(value as u8);
        }
    }
    Ok(out)
}

pub(crate) struct VduCmd;
impl Command for VduCmd {
    fn name(&self) -> &str {
        "VDU"
    }
    fn execute(&self, args: &mut Args<'_>, _shell: &CommandRegistry, env: &mut Environment<'_>) -> Result<()> {
        let bytes = vdu_bytes(args.remainder())?;
        env.console.write_bytes(&bytes);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// hotkey
// ---------------------------------------------------------------------------

pub(crate) struct HotkeyCmd;
impl Command for HotkeyCmd {
    fn name(&self) -> &str {
        "HOTKEY"
    }
    fn execute(&self, args: &mut Args<'_>, shell: &CommandRegistry, env: &mut Environment<'_>) -> Result<()> {
        let Some(n) = args.next_number() else {
            let mut out = String::from("Hotkey assignments:\r\n\r\n");
            for key in 1..=HOTKEY_COUNT {
                let text = shell.hotkey(key);
                out.push_str(&format!("F{key}: {}\r\n", text.as_deref().unwrap_or("N/A")));
            }
            out.push_str("\r\n");
            env.print(&out);
            return Ok(());
        };
        let n = n as usize;
        if !(1..=HOTKEY_COUNT).contains(&n) {
            env.print("Invalid FN-key number.\r\n");
            return Ok(());
        }
        let text = args.rest_trimmed();
        if text.is_empty() {
            if shell.set_hotkey(n, None)?.is_some() {
                env.print(&format!("F{n} cleared.\r\n"));
            } else {
                env.print(&format!("F{n} already clear, no hotkey command provided.\r\n"));
            }
            return Ok(());
        }
        let text = text
            .strip_prefix('"')
            .and_then(|t| t.strip_suffix('"'))
            .unwrap_or(text);
        log::debug!("F{n} = {text:?}");
        shell.set_hotkey(n, Some(text.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::Rig;

    fn setup() -> (CommandRegistry, Rig) {
        (CommandRegistry::with_builtins(), Rig::new())
    }

    #[test]
    fn echo_translates() {
        let (reg, mut rig) = setup();
        rig.run(&reg, "ECHO Now <Sys$Year>|G <65>").unwrap();
        assert_eq!(rig.console.output, b"Now 2024\x07 A\r\n");
    }

    #[test]
    fn echo_bad_string() {
        let (reg, mut rig) = setup();
        assert!(matches!(rig.run(&reg, "ECHO <open"), Err(MosError::BadString)));
        assert!(rig.console.output.is_empty());
    }

    #[test]
    fn printf_escapes() {
        assert_eq!(unescape(r"a\tb\r\n"), b"a\tb\r\n");
        assert_eq!(unescape(r"\x41\x4a\x7"), b"AJ\x07");
        assert_eq!(unescape(r"\x4142"), b"A42");
        assert_eq!(unescape(r"\f\\"), b"\x0c\\");
        assert_eq!(unescape(r"a\qb"), b"ab");
        assert_eq!(unescape(r"\xzz"), b"zz");
        assert_eq!(unescape("end\\"), b"end");
    }

    #[test]
    fn printf_has_no_newline() {
        let (reg, mut rig) = setup();
        rig.run(&reg, r"PRINTF hi\n").unwrap();
        assert_eq!(rig.console.output, b"hi\n");
    }

    #[test]
    fn cls_sends_form_feed() {
        let (reg, mut rig) = setup();
        rig.run(&reg, "CLS").unwrap();
        assert_eq!(rig.console.output, [12]);
    }

    #[test]
    fn vdu_encoding() {
        assert_eq!(vdu_bytes("22 3").unwrap(), [22, 3]);
        assert_eq!(vdu_bytes("19, 1, 4;").unwrap(), [19, 1, 4, 0]);
        assert_eq!(vdu_bytes("&100 1000").unwrap(), [0, 1, 0xE8, 0x03]);
        assert_eq!(vdu_bytes("FFh 10h; &1F").unwrap(), [0xFF, 0x10, 0, 0x1F]);
        assert!(vdu_bytes("").unwrap().is_empty());
        assert!(matches!(vdu_bytes("65536"), Err(MosError::InvalidParameter)));
        assert!(matches!(vdu_bytes("12 x"), Err(MosError::InvalidParameter)));
    }

    #[test]
    fn vdu_bad_list_writes_nothing() {
        let (reg, mut rig) = setup();
        assert!(rig.run(&reg, "VDU 1 2 zz").is_err());
        assert!(rig.console.output.is_empty());
    }

    #[test]
    fn hotkey_set_list_clear() {
        let (reg, mut rig) = setup();
        rig.run(&reg, "HOTKEY 2 \"CAT -l\"").unwrap();
        assert_eq!(reg.hotkey(2).as_deref(), Some("CAT -l"));
        rig.run(&reg, "HOTKEY 3 TYPE %s").unwrap();
        assert_eq!(reg.hotkey(3).as_deref(), Some("TYPE %s"));

        rig.run(&reg, "HOTKEY").unwrap();
        let out = rig.output();
        assert!(out.starts_with("Hotkey assignments:\r\n\r\nF1: N/A\r\nF2: CAT -l\r\n"));
        assert!(out.ends_with("F12: N/A\r\n\r\n"));
        rig.console.clear();

        rig.run(&reg, "HOTKEY 2").unwrap();
        rig.run(&reg, "HOTKEY 2").unwrap();
        assert_eq!(
            rig.output(),
            "F2 cleared.\r\nF2 already clear, no hotkey command provided.\r\n"
        );
        assert_eq!(reg.hotkey(2), None);
    }

    #[test]
    fn hotkey_range() {
        let (reg, mut rig) = setup();
        rig.run(&reg, "HOTKEY 13 CAT").unwrap();
        rig.run(&reg, "HOTKEY 0 CAT").unwrap();
        assert_eq!(rig.output(), "Invalid FN-key number.\r\nInvalid FN-key number.\r\n");
    }

    mod prop {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn bytes_fit_values(values in proptest::collection::vec(0u32..=0xFFFF, 0..16)) {
                let list: Vec<String> = values.iter().map(u32::to_string).collect();
                let bytes = vdu_bytes(&list.join(" ")).unwrap();
                let expected: usize = values.iter().map(|&v| if v > 0xFF { 2 } else { 1 }).sum();
                prop_assert_eq!(bytes.len(), expected);
            }

            #[test]
            fn plain_text_passes_through(text in "[a-zA-Z0-9 .,]{0,40}") {
                prop_assert_eq!(unescape(&text), text.as_bytes());
            }
        }
    }
}
