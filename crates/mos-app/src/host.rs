//! Host-side collaborators: a line console over any reader/writer pair, the
//! system clock, and an executor that cannot run native images.

use std::io::{BufRead, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use mos_shell::{Clock, Console, Executor, LineInput, Memory};
use mos_types::config::DisplayConfig;
use mos_types::error::{MosError, Result};
use mos_types::time::RtcTime;

const ESCAPE: char = '\x1b';

/// Line-oriented console. A line starting with ESC counts as an escaped
/// edit; end of input is remembered so the read loop can stop.
pub struct StdConsole<R, W> {
    input: R,
    output: W,
    display: DisplayConfig,
    eof: bool,
}

impl<R: BufRead, W: Write> StdConsole<R, W> {
    pub fn new(input: R, output: W, display: DisplayConfig) -> Self {
        Self {
            input,
            output,
            display,
            eof: false,
        }
    }

    pub fn at_eof(&self) -> bool {
        self.eof
    }

    #[cfg(test)]
    pub fn output(&self) -> &W {
        &self.output
    }
}

impl<R: BufRead, W: Write> Console for StdConsole<R, W> {
    fn write_bytes(&mut self, bytes: &[u8]) {
        if let Err(e) = self.output.write_all(bytes).and_then(|()| self.output.flush()) {
            log::warn!("console write failed: {e}");
        }
    }

    fn edit_line(&mut self, max_len: usize) -> LineInput {
        let mut line = String::new();
        match self.input.read_line(&mut line) {
            Ok(0) => {
                self.eof = true;
                return LineInput::Cancelled;
            },
            Ok(_) => {},
            Err(e) => {
                log::warn!("console read failed: {e}");
                self.eof = true;
                return LineInput::Cancelled;
            },
        }
        let line = line.trim_end_matches(['\r', '\n']);
        if line.starts_with(ESCAPE) {
            return LineInput::Cancelled;
        }
        LineInput::Confirmed(line.chars().take(max_len).collect())
    }

    fn columns(&self) -> usize {
        self.display.columns
    }

    fn colours(&self) -> u8 {
        self.display.colours
    }

    fn supports_text_palette(&self) -> bool {
        false
    }

    fn read_palette(&mut self, _entry: u8) -> u8 {
        0
    }
}

/// The host's clock, shifted by whatever offset the shell last set.
#[derive(Debug, Default)]
pub struct HostClock {
    offset: i64,
}

fn system_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_secs() as i64)
}

impl Clock for HostClock {
    fn now(&self) -> RtcTime {
        RtcTime::from_unix_secs((system_secs() + self.offset).max(0) as u64)
    }

    fn set(&mut self, time: RtcTime) -> Result<()> {
        self.offset = time.to_unix_secs() as i64 - system_secs();
        log::info!("clock set to {time}");
        Ok(())
    }
}

/// Native program images cannot run on the host.
#[derive(Debug, Default)]
pub struct HostExecutor;

impl Executor for HostExecutor {
    fn exec16(&mut self, _memory: &mut Memory, address: u32, _params: &str) -> Result<u8> {
        log::warn!("cannot run 16-bit image at &{address:06X} on the host");
        Err(MosError::NotImplemented)
    }

    fn exec24(&mut self, _memory: &mut Memory, address: u32, _params: &str) -> Result<u8> {
        log::warn!("cannot run 24-bit image at &{address:06X} on the host");
        Err(MosError::NotImplemented)
    }

    fn jump(&mut self, _memory: &mut Memory, address: u32) -> Result<()> {
        log::warn!("cannot jump to &{address:06X} on the host");
        Err(MosError::NotImplemented)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn console(input: &str) -> StdConsole<&[u8], Vec<u8>> {
        StdConsole::new(input.as_bytes(), Vec::new(), DisplayConfig::default())
    }

    #[test]
    fn lines_then_eof() {
        let mut c = console("CAT\r\nHELP all\n");
        assert_eq!(c.edit_line(255), LineInput::Confirmed("CAT".into()));
        assert_eq!(c.edit_line(4), LineInput::Confirmed("HELP".into()));
        assert!(!c.at_eof());
        assert_eq!(c.edit_line(255), LineInput::Cancelled);
        assert!(c.at_eof());
    }

    #[test]
    fn escape_cancels_without_eof() {
        let mut c = console("\x1bfoo\nyes\n");
        assert_eq!(c.edit_line(255), LineInput::Cancelled);
        assert!(!c.at_eof());
        assert_eq!(c.edit_line(255), LineInput::Confirmed("yes".into()));
    }

    #[test]
    fn writes_pass_through() {
        let mut c = console("");
        c.write_str("hi\r\n");
        c.write_bytes(&[12]);
        assert_eq!(c.output, b"hi\r\n\x0c");
    }

    #[test]
    fn clock_keeps_offset() {
        let mut clock = HostClock::default();
        let target = RtcTime {
            year: 2001,
            month: 2,
            day: 3,
            hour: 4,
            minute: 5,
            second: 6,
        };
        clock.set(target).unwrap();
        let now = clock.now();
        assert_eq!((now.year, now.month, now.day, now.hour), (2001, 2, 3, 4));
    }

    #[test]
    fn executor_refuses() {
        let map = mos_types::config::MemoryMap::default();
        let mut memory = Memory::new(&map);
        let mut exec = HostExecutor;
        assert!(matches!(
            exec.exec24(&mut memory, 0x40000, ""),
            Err(MosError::NotImplemented)
        ));
        assert!(exec.jump(&mut memory, 0).is_err());
    }
}
