//! MOS shell desktop entry point.
//!
//! Runs the command line against an in-memory volume. Set `MOS_ROOT` to
//! import a host directory as the volume's contents, and pass a TOML file
//! (or set `MOS_CONFIG`) to override the memory map and search paths.
//! End of input quits.

mod host;
mod vfs_setup;

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use host::{HostClock, HostExecutor, StdConsole};
use mos_shell::{CommandRegistry, Console, Environment, LineInput, Memory, exec_file};
use mos_types::config::ShellConfig;
use mos_types::heap::Heap;
use mos_vfs::{FileTable, MemoryVfs, Vfs};

/// Longest line the prompt accepts.
const LINE_LEN: usize = 255;

const AUTOEXEC: &str = "autoexec.txt";

/// Everything the shell runs against, owned in one place.
struct Machine<R, W> {
    vfs: MemoryVfs,
    console: StdConsole<R, W>,
    clock: HostClock,
    executor: HostExecutor,
    memory: Memory,
    files: FileTable,
    heap: Heap,
    config: ShellConfig,
    cwd: String,
}

impl<R: BufRead, W: Write> Machine<R, W> {
    fn new(config: ShellConfig, vfs: MemoryVfs, input: R, output: W) -> Self {
        Self {
            console: StdConsole::new(input, output, config.display),
            clock: HostClock::default(),
            executor: HostExecutor,
            memory: Memory::new(&config.memory),
            files: FileTable::new(config.storage.max_open_files),
            heap: Heap::new(config.heap_size),
            cwd: vfs.current_dir().unwrap_or_else(|_| "/".to_string()),
            vfs,
            config,
        }
    }

    fn env(&mut self) -> Environment<'_> {
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

    /// Dispatch one line, reporting any failure on the console.
    fn run_line(&mut self, shell: &CommandRegistry, line: &str) {
        let mut env = self.env();
        if let Err(e) = shell.execute(line, true, &mut env) {
            log::debug!("{line:?} failed: {e}");
            env.report(&e);
        }
        self.cwd = env.cwd;
    }

    fn autoexec(&mut self, shell: &CommandRegistry) {
        if !self.vfs.exists(AUTOEXEC) {
            return;
        }
        log::info!("Running {AUTOEXEC}");
        let mut env = self.env();
        if let Err(e) = exec_file(shell, &mut env, AUTOEXEC) {
            env.report(&e);
        }
        self.cwd = env.cwd;
    }

    /// Prompt, read, dispatch until input runs out.
    fn repl(&mut self, shell: &CommandRegistry) {
        loop {
            let prompt = shell.prompt(&mut self.env());
            self.console.write_str(&prompt);
            match self.console.edit_line(LINE_LEN) {
                LineInput::Confirmed(line) => self.run_line(shell, &line),
                LineInput::Cancelled if self.console.at_eof() => break,
                LineInput::Cancelled => self.console.write_str("\r\nEscape\r\n"),
            }
        }
        self.console.write_str("\r\n");
    }
}

fn config_path() -> Option<PathBuf> {
    std::env::args()
        .nth(1)
        .or_else(|| std::env::var("MOS_CONFIG").ok())
        .map(PathBuf::from)
}

fn load_config() -> Result<ShellConfig> {
    match config_path() {
        Some(path) => ShellConfig::load(&path)
            .with_context(|| format!("loading config {}", path.display())),
        None => Ok(ShellConfig::default()),
    }
}

fn build_volume(config: &ShellConfig) -> Result<MemoryVfs> {
    let mut vfs = MemoryVfs::with_label(&config.storage.volume_label);
    match std::env::var_os("MOS_ROOT") {
        Some(root) => {
            let root = Path::new(&root);
            let count = vfs_setup::import_dir(&mut vfs, root, "/")?;
            log::info!("Imported {count} files from {}", root.display());
        },
        None => vfs_setup::populate_default(&mut vfs)?,
    }
    vfs.mount()?;
    Ok(vfs)
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = load_config()?;
    log::info!(
        "Starting MOS shell (RAM &{:06X}-&{:06X}, heap {} bytes)",
        config.memory.ram_start,
        config.memory.last_ram,
        config.heap_size,
    );
    let vfs = build_volume(&config)?;

    let shell = CommandRegistry::with_builtins();
    let mut machine = Machine::new(config, vfs, io::stdin().lock(), io::stdout());
    machine.autoexec(&shell);
    machine.repl(&shell);
    log::info!("End of input, exiting");
    Ok(())
}
