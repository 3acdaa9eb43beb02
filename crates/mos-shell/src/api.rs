//! Entry points for loaded programs.
//!
//! Programs see status bytes rather than `Result`s: every call here reports
//! `0` for success or the error's code, except where a count or a file
//! number is the natural return value. Nothing in this module prompts.

use mos_types::error::{MosError, Result, message_for, status_of};
use mos_vfs::OpenMode;

use crate::batch;
use crate::interpreter::{CommandRegistry, Environment};
use crate::listing;
use crate::loader;

/// Bit set in [`MosApi::fgetc`]'s return value once the file is exhausted.
pub const FGETC_EOF: u16 = 0x100;

fn status(what: &str, result: Result<()>) -> u8 {
    if let Err(e) = &result {
        log::debug!("api {what}: {e}");
    }
    status_of(&result)
}

/// The API bound to one shell.
#[derive(Debug, Clone, Copy)]
pub struct MosApi<'s> {
    shell: &'s CommandRegistry,
}

impl<'s> MosApi<'s> {
    pub fn new(shell: &'s CommandRegistry) -> Self {
        Self { shell }
    }

    /// Run a command line. Unknown words are only looked up in the command
    /// directory.
    pub fn oscli(&self, env: &mut Environment<'_>, line: &str) -> u8 {
        let result = self.shell.execute(line, false, env);
        status("oscli", result)
    }

    // -----------------------------------------------------------------------
    // Path operations
    // -----------------------------------------------------------------------

    pub fn dir(&self, env: &mut Environment<'_>, path: &str) -> u8 {
        let result = listing::list(env, path, false);
        status("dir", result)
    }

    /// Delete without confirmation.
    pub fn del(&self, env: &mut Environment<'_>, path: &str) -> u8 {
        let result = batch::delete(env, path, true, false);
        status("del", result)
    }

    pub fn ren(&self, env: &mut Environment<'_>, src: &str, dst: &str) -> u8 {
        let result = batch::rename(env, src, dst, false);
        status("ren", result)
    }

    pub fn copy(&self, env: &mut Environment<'_>, src: &str, dst: &str) -> u8 {
        let result = batch::copy(env, src, dst, false);
        status("copy", result)
    }

    pub fn mkdir(&self, env: &mut Environment<'_>, path: &str) -> u8 {
        let result = env.vfs.mkdir(path);
        status("mkdir", result)
    }

    pub fn cd(&self, env: &mut Environment<'_>, path: &str) -> u8 {
        let result = env.vfs.change_dir(path);
        env.refresh_cwd();
        status("cd", result)
    }

    /// Load a file at `address`; a `size` of 0 loads all of it.
    pub fn load(&self, env: &mut Environment<'_>, path: &str, address: u32, size: u32) -> u8 {
        let result = loader::load(env, path, address, size).map(|_| ());
        status("load", result)
    }

    pub fn save(&self, env: &mut Environment<'_>, path: &str, address: u32, size: u32) -> u8 {
        let result = loader::save(env, path, address, size);
        status("save", result)
    }

    // -----------------------------------------------------------------------
    // Handle I/O
    // -----------------------------------------------------------------------

    /// Open a file with driver mode bits. Returns the file number, or 0.
    pub fn fopen(&self, env: &mut Environment<'_>, path: &str, mode: u8) -> u8 {
        match env.files.open(&mut *env.vfs, path, OpenMode::from_bits(mode)) {
            Ok(n) => n,
            Err(e) => {
                log::debug!("api fopen {path}: {e}");
                0
            },
        }
    }

    /// Close file `handle`, or every open file when `handle` is 0. Returns
    /// the handle it was given.
    pub fn fclose(&self, env: &mut Environment<'_>, handle: u8) -> u8 {
        if let Err(e) = env.files.close(&mut *env.vfs, handle) {
            log::warn!("api fclose #{handle}: {e}");
        }
        handle
    }

    /// Next byte in the low bits, with [`FGETC_EOF`] set once the read
    /// leaves the file at its end. 0 for a bad handle.
    pub fn fgetc(&self, env: &mut Environment<'_>, handle: u8) -> u16 {
        let result = env.files.get(handle).and_then(|fh| {
            let mut byte = [0u8; 1];
            env.vfs.read(fh, &mut byte)?;
            let eof = if env.vfs.eof(fh)? { FGETC_EOF } else { 0 };
            Ok(u16::from(byte[0]) | eof)
        });
        result.unwrap_or(0)
    }

    pub fn fputc(&self, env: &mut Environment<'_>, handle: u8, byte: u8) -> u8 {
        let result = env.files.get(handle).and_then(|fh| {
            if env.vfs.write(fh, &[byte])? == 1 {
                Ok(())
            } else {
                Err(MosError::Denied)
            }
        });
        status("fputc", result)
    }

    /// Read up to `count` bytes into RAM at `address`. Returns the number
    /// read; 0 on any error.
    pub fn fread(&self, env: &mut Environment<'_>, handle: u8, address: u32, count: u32) -> u32 {
        let result = env.files.get(handle).and_then(|fh| {
            let target = env.memory.slice_mut(address, count as usize)?;
            env.vfs.read(fh, target)
        });
        result.map_or(0, |n| n as u32)
    }

    /// Write `count` bytes of RAM from `address`. Returns the number
    /// written; 0 on any error.
    pub fn fwrite(&self, env: &mut Environment<'_>, handle: u8, address: u32, count: u32) -> u32 {
        let result = env.files.get(handle).and_then(|fh| {
            let data = env.memory.slice(address, count as usize)?;
            env.vfs.write(fh, data)
        });
        result.map_or(0, |n| n as u32)
    }

    pub fn flseek(&self, env: &mut Environment<'_>, handle: u8, offset: u32) -> u8 {
        let result = env
            .files
            .get(handle)
            .and_then(|fh| env.vfs.seek(fh, u64::from(offset)));
        status("flseek", result)
    }

    /// 1 at end of file, 0 otherwise (including for a bad handle).
    pub fn feof(&self, env: &mut Environment<'_>, handle: u8) -> u8 {
        let at_end = env
            .files
            .get(handle)
            .and_then(|fh| env.vfs.eof(fh))
            .unwrap_or(false);
        u8::from(at_end)
    }

    /// Fixed message for a status code.
    pub fn get_error(&self, code: u8) -> String {
        message_for(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mos_vfs::Vfs;

    use crate::testing::{Call, Rig};

    const READ: u8 = 0x01;
    const WRITE_NEW: u8 = 0x02 | 0x04;

    fn setup() -> (CommandRegistry, Rig) {
        let reg = CommandRegistry::with_builtins();
        let mut rig = Rig::new();
        rig.vfs.write_file("/a.txt", b"ab").unwrap();
        rig.vfs.write_file("/b.txt", b"b").unwrap();
        (reg, rig)
    }

    #[test]
    fn api_is_debug() {
        let reg = CommandRegistry::with_builtins();
        let text = format!("{:?}", MosApi::new(&reg));
        assert!(text.contains("CommandRegistry"));
        assert!(text.contains("commands: 37"));
    }

    #[test]
    fn oscli_searches_only_command_dir() {
        let (reg, mut rig) = setup();
        rig.write_image("/tool.bin", 1, 0x80);
        let api = MosApi::new(&reg);
        assert_eq!(api.oscli(&mut rig.env(), "tool"), MosError::InvalidCommand.code());
        rig.vfs.mkdir_all("/mos").unwrap();
        rig.write_image("/mos/tool.bin", 1, 0x80);
        assert_eq!(api.oscli(&mut rig.env(), "tool x"), 0);
        assert_eq!(rig.executor.calls, [Call::Exec24 {
            address: 0xB0000,
            params: "x".into()
        }]);
    }

    #[test]
    fn pattern_operations_are_quiet() {
        let (reg, mut rig) = setup();
        let api = MosApi::new(&reg);
        let mut env = rig.env();
        assert_eq!(api.mkdir(&mut env, "out"), 0);
        assert_eq!(api.copy(&mut env, "*.txt", "out"), 0);
        assert_eq!(api.ren(&mut env, "out/b.txt", "out/c.txt"), 0);
        assert_eq!(api.del(&mut env, "*.txt"), 0);
        drop(env);
        assert!(rig.console.output.is_empty());
        assert_eq!(rig.console.prompts, 0);
        assert_eq!(rig.vfs.list("/out").unwrap(), ["a.txt", "c.txt"]);
        assert!(!rig.vfs.exists("/a.txt"));
    }

    #[test]
    fn cd_and_errors() {
        let (reg, mut rig) = setup();
        let api = MosApi::new(&reg);
        let mut env = rig.env();
        assert_eq!(api.cd(&mut env, "nowhere"), MosError::NoPath.code());
        assert_eq!(api.mkdir(&mut env, "d"), 0);
        assert_eq!(api.cd(&mut env, "d"), 0);
        assert_eq!(env.cwd, "/d");
        assert_eq!(api.get_error(0), "OK");
        assert_eq!(api.get_error(4), "Could not find file");
    }

    #[test]
    fn load_and_save_through_memory() {
        let (reg, mut rig) = setup();
        let api = MosApi::new(&reg);
        let mut env = rig.env();
        assert_eq!(api.load(&mut env, "a.txt", 0x50000, 1), 0);
        assert_eq!(api.save(&mut env, "one.bin", 0x50000, 1), 0);
        assert_eq!(api.save(&mut env, "one.bin", 0x50000, 1), MosError::Exists.code());
        drop(env);
        assert_eq!(rig.vfs.read_file("/one.bin").unwrap(), b"a");
    }

    #[test]
    fn fgetc_flags_end_of_file() {
        let (reg, mut rig) = setup();
        let api = MosApi::new(&reg);
        let mut env = rig.env();
        let h = api.fopen(&mut env, "a.txt", READ);
        assert_eq!(h, 1);
        assert_eq!(api.fgetc(&mut env, h), u16::from(b'a'));
        assert_eq!(api.feof(&mut env, h), 0);
        assert_eq!(api.fgetc(&mut env, h), u16::from(b'b') | FGETC_EOF);
        assert_eq!(api.feof(&mut env, h), 1);
        assert_eq!(api.fgetc(&mut env, 7), 0);
        assert_eq!(api.fclose(&mut env, h), h);
        assert_eq!(api.fgetc(&mut env, h), 0);
    }

    #[test]
    fn fopen_failures_return_zero() {
        let (reg, mut rig) = setup();
        let api = MosApi::new(&reg);
        let mut env = rig.env();
        assert_eq!(api.fopen(&mut env, "missing", READ), 0);
        for _ in 0..8 {
            assert_ne!(api.fopen(&mut env, "a.txt", READ), 0);
        }
        assert_eq!(api.fopen(&mut env, "a.txt", READ), 0);
        assert_eq!(api.fclose(&mut env, 0), 0);
        assert_eq!(env.files.open_count(), 0);
    }

    #[test]
    fn block_transfer_and_seek() {
        let (reg, mut rig) = setup();
        rig.memory.slice_mut(0x60000, 5).unwrap().copy_from_slice(b"hello");
        let api = MosApi::new(&reg);
        let mut env = rig.env();
        let h = api.fopen(&mut env, "new.txt", WRITE_NEW);
        assert_eq!(api.fwrite(&mut env, h, 0x60000, 5), 5);
        assert_eq!(api.fputc(&mut env, h, b'!'), 0);
        api.fclose(&mut env, h);

        let h = api.fopen(&mut env, "new.txt", READ);
        assert_eq!(api.flseek(&mut env, h, 2), 0);
        assert_eq!(api.fread(&mut env, h, 0x61000, 16), 4);
        assert_eq!(env.memory.slice(0x61000, 4).unwrap(), b"llo!");
        assert_eq!(api.fread(&mut env, h, 0xBFFFF, 16), 0);
        assert_eq!(api.flseek(&mut env, 9, 0), MosError::InvalidObject.code());
        assert_eq!(api.fputc(&mut env, 9, 0), MosError::InvalidObject.code());
        api.fclose(&mut env, 0);
    }
}
