use std::path::Path;

use anyhow::{Context, Result};
use mos_vfs::MemoryVfs;

/// Directories the command search expects to find.
pub fn populate_default(vfs: &mut MemoryVfs) -> Result<()> {
    vfs.mkdir_all("/mos")?;
    vfs.mkdir_all("/bin")?;
    vfs.write_file(
        "/readme.txt",
        b"MOS shell desktop host.\r\nType HELP for a list of commands.\r\n",
    )?;
    Ok(())
}

/// Copy a host directory tree into `target` on the volume. Returns the
/// number of files imported.
pub fn import_dir(vfs: &mut MemoryVfs, host: &Path, target: &str) -> Result<usize> {
    vfs.mkdir_all(target)?;
    let entries =
        std::fs::read_dir(host).with_context(|| format!("reading {}", host.display()))?;
    let mut count = 0;
    for entry in entries.flatten() {
        let path = entry.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            log::warn!("skipping non-UTF-8 name {}", path.display());
            continue;
        };
        let vfs_path = if target.ends_with('/') {
            format!("{target}{name}")
        } else {
            format!("{target}/{name}")
        };
        if path.is_dir() {
            count += import_dir(vfs, &path, &vfs_path)?;
        } else if path.is_file() {
            let data = std::fs::read(&path).with_context(|| format!("reading {}", path.display()))?;
            log::debug!("Imported {vfs_path} ({} bytes)", data.len());
            vfs.write_file(&vfs_path, &data)?;
            count += 1;
        }
    }
    Ok(count)
}
