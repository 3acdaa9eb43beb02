//! Recording doubles for the shell's collaborators, and a rig that wires
//! them into an [`Environment`].

use std::collections::VecDeque;

use mos_types::config::ShellConfig;
use mos_types::error::Result;
use mos_types::heap::Heap;
use mos_types::time::RtcTime;
use mos_vfs::{FileTable, MemoryVfs};

use crate::interpreter::{CommandRegistry, Environment};
use crate::services::{Clock, Console, Executor, LineInput, Memory};

/// Console that records everything written and replays scripted answers
/// to line-editor prompts. Once the script runs out every prompt is
/// cancelled.
#[derive(Debug)]
pub struct ScriptedConsole {
    pub output: Vec<u8>,
    answers: VecDeque<LineInput>,
    pub prompts: usize,
    pub columns: usize,
    pub colours: u8,
    pub palette: bool,
    pub fg: u8,
    pub bg: u8,
}

impl ScriptedConsole {
    pub fn new() -> Self {
        Self {
            output: Vec::new(),
            answers: VecDeque::new(),
            prompts: 0,
            columns: 80,
            colours: 16,
            palette: false,
            fg: 15,
            bg: 0,
        }
    }

    pub fn answer(&mut self, text: &str) {
        self.answers.push_back(LineInput::Confirmed(text.to_string()));
    }

    pub fn escape(&mut self) {
        self.answers.push_back(LineInput::Cancelled);
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.output).into_owned()
    }

    pub fn clear(&mut self) {
        self.output.clear();
    }
}

impl Console for ScriptedConsole {
    fn write_bytes(&mut self, bytes: &[u8]) {
        self.output.extend_from_slice(bytes);
    }

    fn edit_line(&mut self, max_len: usize) -> LineInput {
        self.prompts += 1;
        match self.answers.pop_front() {
            Some(LineInput::Confirmed(mut text)) => {
                text.truncate(max_len);
                LineInput::Confirmed(text)
            },
            _ => LineInput::Cancelled,
        }
    }

    fn columns(&self) -> usize {
        self.columns
    }

    fn colours(&self) -> u8 {
        self.colours
    }

    fn supports_text_palette(&self) -> bool {
        self.palette
    }

    fn read_palette(&mut self, entry: u8) -> u8 {
        if entry == 129 { self.bg } else { self.fg }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Exec16 { address: u32, params: String },
    Exec24 { address: u32, params: String },
    Jump(u32),
}

/// Executor that records each call and returns a fixed status.
#[derive(Debug, Default)]
pub struct RecordingExecutor {
    pub calls: Vec<Call>,
    pub status: u8,
}

impl Executor for RecordingExecutor {
    fn exec16(&mut self, _memory: &mut Memory, address: u32, params: &str) -> Result<u8> {
        self.calls.push(Call::Exec16 {
            address,
            params: params.to_string(),
        });
        Ok(self.status)
    }

    fn exec24(&mut self, _memory: &mut Memory, address: u32, params: &str) -> Result<u8> {
        self.calls.push(Call::Exec24 {
            address,
            params: params.to_string(),
        });
        Ok(self.status)
    }

    fn jump(&mut self, _memory: &mut Memory, address: u32) -> Result<()> {
        self.calls.push(Call::Jump(address));
        Ok(())
    }
}

/// Clock that only moves when set.
#[derive(Debug)]
pub struct FixedClock {
    pub time: RtcTime,
}

impl Clock for FixedClock {
    fn now(&self) -> RtcTime {
        self.time
    }

    fn set(&mut self, time: RtcTime) -> Result<()> {
        self.time = time;
        Ok(())
    }
}

/// Everything a command needs, owned in one place.
pub struct Rig {
    pub vfs: MemoryVfs,
    pub console: ScriptedConsole,
    pub clock: FixedClock,
    pub executor: RecordingExecutor,
    pub memory: Memory,
    pub files: FileTable,
    pub heap: Heap,
    pub config: ShellConfig,
    pub cwd: String,
}

impl Rig {
    pub fn new() -> Self {
        let config = ShellConfig::default();
        Self {
            vfs: MemoryVfs::new(),
            console: ScriptedConsole::new(),
            clock: FixedClock {
                time: RtcTime {
                    year: 2024,
                    month: 3,
                    day: 15,
                    hour: 9,
                    minute: 30,
                    second: 5,
                },
            },
            executor: RecordingExecutor::default(),
            memory: Memory::new(&config.memory),
            files: FileTable::new(config.storage.max_open_files),
            heap: Heap::new(config.heap_size),
            cwd: "/".to_string(),
            config,
        }
    }

    pub fn env(&mut self) -> Environment<'_> {
        Environment {
            cwd: self.cwd.clone(),
            vfs: &mut self.vfs,
            console: &mut self.console,
            clock: &mut self.clock,
            executor: &mut self.executor,
            memory: &mut self.memory,
            files: &mut self.files,
            heap: &self.heap,
            config: &self.config,
        }
    }

    /// Dispatch `line` as if typed at the prompt.
    pub fn run(&mut self, reg: &CommandRegistry, line: &str) -> Result<()> {
        self.run_as(reg, line, true)
    }

    pub fn run_as(&mut self, reg: &CommandRegistry, line: &str, in_mos: bool) -> Result<()> {
        let (result, cwd) = {
            let mut env = self.env();
            let result = reg.execute(line, in_mos, &mut env);
            (result, env.cwd)
        };
        self.cwd = cwd;
        result
    }

    pub fn output(&self) -> String {
        self.console.text()
    }

    /// Write a loadable image: `MOS` tag at 0x40 followed by the mode byte.
    pub fn write_image(&mut self, path: &str, mode: u8, len: usize) {
        let mut image = vec![0u8; len.max(0x45)];
        image[0x40..0x43].copy_from_slice(b"MOS");
        image[0x44] = mode;
        self.vfs.write_file(path, &image).unwrap();
    }
}
