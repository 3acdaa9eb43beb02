//! System commands: LOAD, SAVE, RUN, JMP, EXEC, MEM, MOUNT, DISC, TIME,
//! CREDITS.

use mos_types::error::{MosError, Result};
use mos_types::time::RtcTime;
use mos_vfs::read_to_end;

use crate::interpreter::{Args, Command, CommandRegistry, Environment};
use crate::loader;

fn required<'l>(args: &mut Args<'l>) -> Result<&'l str> {
    args.next_token().ok_or(MosError::InvalidParameter)
}

fn required_number(args: &mut Args<'_>) -> Result<u32> {
    args.next_number().ok_or(MosError::InvalidParameter)
}

// ---------------------------------------------------------------------------
// load / save / run / jmp
// ---------------------------------------------------------------------------

pub(crate) struct LoadCmd;
impl Command for LoadCmd {
    fn name(&self) -> &str {
        "LOAD"
    }
    fn execute(&self, args: &mut Args<'_>, _shell: &CommandRegistry, env: &mut Environment<'_>) -> Result<()> {
        let path = required(args)?;
        let address = args
            .next_number()
            .unwrap_or(env.config.memory.default_load_address);
        loader::load(env, path, address, 0).map(|_| ())
    }
}

pub(crate) struct SaveCmd;
impl Command for SaveCmd {
    fn name(&self) -> &str {
        "SAVE"
    }
    fn execute(&self, args: &mut Args<'_>, _shell: &CommandRegistry, env: &mut Environment<'_>) -> Result<()> {
        let path = required(args)?;
        let address = required_number(args)?;
        let size = required_number(args)?;
        loader::save(env, path, address, size)
    }
}

pub(crate) struct RunCmd;
impl Command for RunCmd {
    fn name(&self) -> &str {
        "RUN"
    }
    fn execute(&self, args: &mut Args<'_>, _shell: &CommandRegistry, env: &mut Environment<'_>) -> Result<()> {
        let address = args
            .next_number()
            .unwrap_or(env.config.memory.default_load_address);
        loader::run_bin(env, address, args.remainder())
    }
}

pub(crate) struct JmpCmd;
impl Command for JmpCmd {
    fn name(&self) -> &str {
        "JMP"
    }
    fn execute(&self, args: &mut Args<'_>, _shell: &CommandRegistry, env: &mut Environment<'_>) -> Result<()> {
        let address = required_number(args)?;
        log::info!("jumping to &{address:06X}");
        env.executor.jump(env.memory, address)
    }
}

// ---------------------------------------------------------------------------
// exec
// ---------------------------------------------------------------------------

/// Run each line of a batch file, stopping at the first failure.
pub fn exec_file(shell: &CommandRegistry, env: &mut Environment<'_>, path: &str) -> Result<()> {
    let bytes = read_to_end(&mut *env.vfs, path)?;
    let text = String::from_utf8_lossy(&bytes);
    for (i, line) in text.lines().enumerate() {
        if let Err(e) = shell.execute(line, true, env) {
            env.print(&format!("\r\nError executing {path} at line {}\r\n", i + 1));
            return Err(e);
        }
    }
    Ok(())
}

pub(crate) struct ExecCmd;
impl Command for ExecCmd {
    fn name(&self) -> &str {
        "EXEC"
    }
    fn execute(&self, args: &mut Args<'_>, shell: &CommandRegistry, env: &mut Environment<'_>) -> Result<()> {
        let path = required(args)?;
        exec_file(shell, env, path)
    }
}

// ---------------------------------------------------------------------------
// mem
// ---------------------------------------------------------------------------

pub(crate) struct MemCmd;
impl Command for MemCmd {
    fn name(&self) -> &str {
        "MEM"
    }
    fn execute(&self, _args: &mut Args<'_>, _shell: &CommandRegistry, env: &mut Environment<'_>) -> Result<()> {
        let m = env.config.memory;
        let heap = env.heap;
        let mut out = String::new();
        out.push_str(&format!(
            "USER:LO  &{:06x}-&{:06x} {:6} bytes\r\n",
            m.ram_start,
            m.system_address - 1,
            m.system_address - m.ram_start
        ));
        out.push_str(&format!(
            "MOS:SYS  &{:06x}-&{:06x} {:6} bytes\r\n",
            m.system_address,
            m.last_ram,
            m.last_ram - m.system_address + 1
        ));
        out.push_str(&format!(
            "MOS:HEAP {:6} of {:6} bytes in use\r\n",
            heap.in_use(),
            heap.capacity()
        ));
        out.push_str("\r\n");
        // Probed in 8-byte steps, as the allocator hands out blocks.
        out.push_str(&format!(
            "Largest free MOS:HEAP fragment: {} bytes\r\n",
            heap.largest_free() & !7
        ));
        out.push_str("\r\n");
        env.print(&out);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// mount / disc
// ---------------------------------------------------------------------------

pub(crate) struct MountCmd;
impl Command for MountCmd {
    fn name(&self) -> &str {
        "MOUNT"
    }
    fn execute(&self, _args: &mut Args<'_>, _shell: &CommandRegistry, env: &mut Environment<'_>) -> Result<()> {
        if let Err(e) = env.vfs.mount() {
            log::warn!("mount failed: {e}");
            env.report(&e);
        }
        env.refresh_cwd();
        Ok(())
    }
}

pub(crate) struct DiscCmd;
impl Command for DiscCmd {
    fn name(&self) -> &str {
        "DISC"
    }
    fn execute(&self, _args: &mut Args<'_>, shell: &CommandRegistry, _env: &mut Environment<'_>) -> Result<()> {
        shell.set_card_delay(true);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// time
// ---------------------------------------------------------------------------

fn field<T: TryFrom<u32>>(args: &mut Args<'_>) -> Result<T> {
    let n = required_number(args)?;
    T::try_from(n).map_err(|_| MosError::InvalidParameter)
}

pub(crate) struct TimeCmd;
impl Command for TimeCmd {
    fn name(&self) -> &str {
        "TIME"
    }
    fn execute(&self, args: &mut Args<'_>, _shell: &CommandRegistry, env: &mut Environment<'_>) -> Result<()> {
        if let Some(year) = args.next_number() {
            let time = RtcTime {
                year: u16::try_from(year).map_err(|_| MosError::InvalidParameter)?,
                month: field(args)?,
                day: field(args)?,
                hour: field(args)?,
                minute: field(args)?,
                second: field(args)?,
            };
            env.set_rtc(time)?;
        }
        let now = env.clock.now();
        env.print(&format!("{}\n\r", now.format_date_time()));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// credits
// ---------------------------------------------------------------------------

pub(crate) struct CreditsCmd;
impl Command for CreditsCmd {
    fn name(&self) -> &str {
        "CREDITS"
    }
    fn execute(&self, _args: &mut Args<'_>, _shell: &CommandRegistry, env: &mut Environment<'_>) -> Result<()> {
        env.print(&format!("MOS shell {}\n\r", env!("CARGO_PKG_VERSION")));
        env.print("Volume layer: mos-vfs, FAT-style case-insensitive names\n\r");
        env.print("Configuration: serde and toml\n\r");
        env.print("\n\r");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mos_vfs::Vfs;

    use crate::testing::{Call, Rig};

    fn setup() -> (CommandRegistry, Rig) {
        (CommandRegistry::with_builtins(), Rig::new())
    }

    #[test]
    fn load_default_and_explicit_address() {
        let (reg, mut rig) = setup();
        rig.vfs.write_file("/data.bin", b"xyz").unwrap();
        rig.run(&reg, "LOAD data.bin").unwrap();
        rig.run(&reg, "LOAD data.bin &50000").unwrap();
        assert_eq!(rig.memory.slice(0x40000, 3).unwrap(), b"xyz");
        assert_eq!(rig.memory.slice(0x50000, 3).unwrap(), b"xyz");
        assert!(matches!(rig.run(&reg, "LOAD"), Err(MosError::InvalidParameter)));
        assert!(matches!(
            rig.run(&reg, "LOAD data.bin &BBFFF"),
            Err(MosError::OverlappingSystem)
        ));
    }

    #[test]
    fn save_needs_every_argument() {
        let (reg, mut rig) = setup();
        rig.memory.slice_mut(0x40000, 4).unwrap().copy_from_slice(b"abcd");
        for line in ["SAVE", "SAVE out.bin", "SAVE out.bin &40000", "SAVE out.bin &40000 x"] {
            assert!(matches!(rig.run(&reg, line), Err(MosError::InvalidParameter)), "{line}");
        }
        assert!(!rig.vfs.exists("/out.bin"));
        rig.run(&reg, "SAVE out.bin &40000 4").unwrap();
        assert_eq!(rig.vfs.read_file("/out.bin").unwrap(), b"abcd");
    }

    #[test]
    fn run_passes_remaining_arguments() {
        let (reg, mut rig) = setup();
        rig.write_image("/prog.bin", 0, 0x80);
        rig.run(&reg, "LOAD prog.bin &60000").unwrap();
        rig.run(&reg, "RUN &60000 -v file.txt").unwrap();
        assert_eq!(rig.executor.calls, [Call::Exec16 {
            address: 0x60000,
            params: "-v file.txt".into()
        }]);
        assert!(matches!(rig.run(&reg, "RUN"), Err(MosError::InvalidExecutable)));
    }

    #[test]
    fn jmp_requires_address() {
        let (reg, mut rig) = setup();
        assert!(matches!(rig.run(&reg, "JMP"), Err(MosError::InvalidParameter)));
        rig.run(&reg, "JMP &0").unwrap();
        assert_eq!(rig.executor.calls, [Call::Jump(0)]);
    }

    #[test]
    fn exec_runs_lines_until_failure() {
        let (reg, mut rig) = setup();
        rig.vfs
            .write_file("/boot.txt", b"# setup\r\nMKDIR a\r\nMKDIR a\r\nMKDIR b\r\n")
            .unwrap();
        let err = rig.run(&reg, "EXEC boot.txt").unwrap_err();
        assert!(matches!(err, MosError::Exists));
        assert!(rig.vfs.exists("/a"));
        assert!(!rig.vfs.exists("/b"));
        assert_eq!(rig.output(), "\r\nError executing boot.txt at line 3\r\n");
    }

    #[test]
    fn exec_lines_search_like_the_prompt() {
        let (reg, mut rig) = setup();
        rig.write_image("/tool.bin", 1, 0x80);
        rig.vfs.write_file("/go.txt", b"tool arg\n").unwrap();
        // Lines run as if typed, even when EXEC itself came through the API.
        rig.run_as(&reg, "EXEC go.txt", false).unwrap();
        assert_eq!(rig.executor.calls, [Call::Exec24 {
            address: 0x40000,
            params: "arg".into()
        }]);
    }

    #[test]
    fn mem_reports_largest_fragment() {
        let (reg, mut rig) = setup();
        let _held = rig.heap.reserve(100).unwrap();
        rig.run(&reg, "MEM").unwrap();
        let out = rig.output();
        assert!(out.starts_with("USER:LO  &040000-&0bbfff "));
        let expected = (rig.config.heap_size - 100) & !7;
        assert!(out.contains(&format!("Largest free MOS:HEAP fragment: {expected} bytes\r\n")));
    }

    #[test]
    fn mount_refreshes_cwd() {
        let (reg, mut rig) = setup();
        rig.vfs.mkdir_all("/games").unwrap();
        rig.run(&reg, "CD games").unwrap();
        rig.run(&reg, "MOUNT").unwrap();
        assert_eq!(rig.cwd, "/");
    }

    #[test]
    fn disc_sets_card_delay() {
        let (reg, mut rig) = setup();
        assert!(!reg.card_delay());
        rig.run(&reg, "DISC").unwrap();
        assert!(reg.card_delay());
    }

    #[test]
    fn time_prints_and_sets() {
        let (reg, mut rig) = setup();
        rig.run(&reg, "TIME").unwrap();
        assert_eq!(rig.output(), "Fri,15 Mar 2024.09:30:05\n\r");
        rig.console.clear();

        rig.run(&reg, "TIME 2023 10 24 14 5 9").unwrap();
        assert_eq!(&rig.console.output[..10], [23, 0, 0x87, 1, 43, 10, 24, 14, 5, 9]);
        assert!(rig.output().ends_with("Tue,24 Oct 2023.14:05:09\n\r"));

        assert!(matches!(rig.run(&reg, "TIME 2023 10"), Err(MosError::InvalidParameter)));
        assert!(matches!(
            rig.run(&reg, "TIME 2023 13 1 0 0 0"),
            Err(MosError::InvalidParameter)
        ));
    }

    #[test]
    fn credits_end_with_blank_line() {
        let (reg, mut rig) = setup();
        rig.run(&reg, "CREDITS").unwrap();
        assert!(rig.output().starts_with("MOS shell "));
        assert!(rig.output().ends_with("\n\r\n\r"));
    }
}
