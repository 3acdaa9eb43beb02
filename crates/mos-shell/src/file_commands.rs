//! File commands: DIR, CD, COPY, DEL, REN, MKDIR, TYPE.

use mos_types::error::{MosError, Result};
use mos_vfs::{OpenMode, with_file};

use crate::batch;
use crate::interpreter::{Args, Command, CommandRegistry, Environment};
use crate::listing;

/// Chunk size TYPE streams a file in.
const TYPE_CHUNK: usize = 512;

fn required<'l>(args: &mut Args<'l>) -> Result<&'l str> {
    args.next_token().ok_or(MosError::InvalidParameter)
}

// ---------------------------------------------------------------------------
// dir
// ---------------------------------------------------------------------------

pub(crate) struct DirCmd;
impl Command for DirCmd {
    fn name(&self) -> &str {
        "DIR"
    }
    fn execute(&self, args: &mut Args<'_>, _shell: &CommandRegistry, env: &mut Environment<'_>) -> Result<()> {
        let mut long = false;
        let mut path = ".";
        while let Some(token) = args.next_token() {
            if token.eq_ignore_ascii_case("-l") {
                long = true;
            } else {
                path = token;
                break;
            }
        }
        listing::list(env, path, long)
    }
}

// ---------------------------------------------------------------------------
// cd
// ---------------------------------------------------------------------------

pub(crate) struct CdCmd;
impl Command for CdCmd {
    fn name(&self) -> &str {
        "CD"
    }
    fn execute(&self, args: &mut Args<'_>, _shell: &CommandRegistry, env: &mut Environment<'_>) -> Result<()> {
        let path = required(args)?;
        let result = env.vfs.change_dir(path);
        env.refresh_cwd();
        result
    }
}

// ---------------------------------------------------------------------------
// copy / rename / delete
// ---------------------------------------------------------------------------

pub(crate) struct CopyCmd;
impl Command for CopyCmd {
    fn name(&self) -> &str {
        "COPY"
    }
    fn execute(&self, args: &mut Args<'_>, _shell: &CommandRegistry, env: &mut Environment<'_>) -> Result<()> {
        let src = required(args)?;
        let dst = required(args)?;
        batch::copy(env, src, dst, true)
    }
}

pub(crate) struct RenCmd;
impl Command for RenCmd {
    fn name(&self) -> &str {
        "RENAME"
    }
    fn execute(&self, args: &mut Args<'_>, _shell: &CommandRegistry, env: &mut Environment<'_>) -> Result<()> {
        let src = required(args)?;
        let dst = required(args)?;
        batch::rename(env, src, dst, true)
    }
}

pub(crate) struct DelCmd;
impl Command for DelCmd {
    fn name(&self) -> &str {
        "DELETE"
    }
    fn execute(&self, args: &mut Args<'_>, _shell: &CommandRegistry, env: &mut Environment<'_>) -> Result<()> {
        let mut target = required(args)?;
        let force = target.eq_ignore_ascii_case("-f");
        if force {
            target = required(args)?;
        }
        batch::delete(env, target, force, true)
    }
}

// ---------------------------------------------------------------------------
// mkdir
// ---------------------------------------------------------------------------

pub(crate) struct MkdirCmd;
impl Command for MkdirCmd {
    fn name(&self) -> &str {
        "MKDIR"
    }
    fn execute(&self, args: &mut Args<'_>, _shell: &CommandRegistry, env: &mut Environment<'_>) -> Result<()> {
        let path = required(args)?;
        env.vfs.mkdir(path)
    }
}

// ---------------------------------------------------------------------------
// type
// ---------------------------------------------------------------------------

/// Stream a file to the console.
pub fn type_file(env: &mut Environment<'_>, path: &str) -> Result<()> {
    let console = &mut *env.console;
    with_file(&mut *env.vfs, path, OpenMode::READ, |vfs, fh| {
        let mut buf = [0u8; TYPE_CHUNK];
        loop {
            let n = vfs.read(fh, &mut buf)?;
            if n == 0 {
                return Ok(());
            }
            console.write_bytes(&buf[..n]);
        }
    })
}

pub(crate) struct TypeCmd;
impl Command for TypeCmd {
    fn name(&self) -> &str {
        "TYPE"
    }
    fn execute(&self, args: &mut Args<'_>, _shell: &CommandRegistry, env: &mut Environment<'_>) -> Result<()> {
        let path = required(args)?;
        type_file(env, path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mos_vfs::Vfs;

    use crate::testing::Rig;

    fn setup() -> (CommandRegistry, Rig) {
        let reg = CommandRegistry::with_builtins();
        let mut rig = Rig::new();
        rig.vfs.mkdir_all("/games").unwrap();
        rig.vfs.write_file("/games/elite.bin", b"elite").unwrap();
        rig.vfs.write_file("/readme.txt", b"hello\r\nworld").unwrap();
        (reg, rig)
    }

    #[test]
    fn dir_flags_and_path() {
        let (reg, mut rig) = setup();
        rig.run(&reg, "DIR -l games").unwrap();
        let out = rig.output();
        assert!(out.contains("Directory: games\r\n"));
        assert!(out.contains("        5 elite.bin\r\n"));
        rig.console.clear();
        rig.run(&reg, "CAT").unwrap();
        assert!(rig.output().contains("games"));
        assert!(rig.output().contains("readme.txt"));
    }

    #[test]
    fn cd_updates_cwd() {
        let (reg, mut rig) = setup();
        rig.run(&reg, "CD games").unwrap();
        assert_eq!(rig.cwd, "/games");
        rig.run(&reg, "cdir ..").unwrap();
        assert_eq!(rig.cwd, "/");
        assert!(matches!(rig.run(&reg, "CD nowhere"), Err(MosError::NoPath)));
        assert_eq!(rig.cwd, "/");
        assert!(matches!(rig.run(&reg, "CD"), Err(MosError::InvalidParameter)));
    }

    #[test]
    fn mkdir_then_copy_into_it() {
        let (reg, mut rig) = setup();
        rig.run(&reg, "MKDIR backup").unwrap();
        rig.run(&reg, "CP readme.txt backup").unwrap();
        assert_eq!(rig.vfs.read_file("/backup/readme.txt").unwrap(), b"hello\r\nworld");
        assert!(rig.output().contains("Copying readme.txt to backup/readme.txt\r\n"));
        assert!(matches!(rig.run(&reg, "MKDIR backup"), Err(MosError::Exists)));
        assert!(matches!(rig.run(&reg, "COPY readme.txt"), Err(MosError::InvalidParameter)));
    }

    #[test]
    fn move_pattern() {
        let (reg, mut rig) = setup();
        rig.run(&reg, "MV games/*.bin /").unwrap();
        assert!(rig.vfs.exists("/elite.bin"));
        assert!(rig.output().contains("Moving games/elite.bin to /elite.bin\r\n"));
    }

    #[test]
    fn delete_flag_forms() {
        let (reg, mut rig) = setup();
        rig.run(&reg, "RM -F games/*").unwrap();
        assert!(rig.vfs.list("/games").unwrap().is_empty());
        assert!(matches!(rig.run(&reg, "ERASE -f"), Err(MosError::InvalidParameter)));
        assert!(matches!(rig.run(&reg, "DELETE"), Err(MosError::InvalidParameter)));
        rig.console.answer("Y");
        rig.run(&reg, "DEL games").unwrap();
        assert!(!rig.vfs.exists("/games"));
    }

    #[test]
    fn type_streams_whole_file() {
        let (reg, mut rig) = setup();
        let long: Vec<u8> = (0..1300).map(|i| b'a' + (i % 26) as u8).collect();
        rig.vfs.write_file("/long.txt", &long).unwrap();
        rig.run(&reg, "TYPE long.txt").unwrap();
        assert_eq!(rig.console.output, long);
        assert!(matches!(rig.run(&reg, "TYPE missing"), Err(MosError::NoFile)));
        assert_eq!(rig.vfs.open_files(), 0);
    }
}
