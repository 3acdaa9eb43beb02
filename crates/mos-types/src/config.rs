//! Shell configuration loaded from TOML.
//!
//! Every field has a default matching the stock firmware layout, so an empty
//! file (or no file at all) yields a working configuration.

use std::path::Path;

use serde::Deserialize;

use crate::error::{MosError, Result};

/// Top-level shell configuration (`mos.toml`).
#[derive(Debug, Clone, Deserialize)]
pub struct ShellConfig {
    #[serde(default)]
    pub memory: MemoryMap,
    #[serde(default)]
    pub display: DisplayConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    /// Bytes available to the firmware heap.
    #[serde(default = "default_heap_size")]
    pub heap_size: usize,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            memory: MemoryMap::default(),
            display: DisplayConfig::default(),
            search: SearchConfig::default(),
            storage: StorageConfig::default(),
            heap_size: default_heap_size(),
        }
    }
}

impl ShellConfig {
    /// Parse a configuration from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        log::debug!("Loaded config from {}", path.display());
        Self::from_toml_str(&text)
    }

    fn validate(&self) -> Result<()> {
        let m = &self.memory;
        if m.ram_start > m.last_ram {
            return Err(MosError::Config(format!(
                "ram_start &{:06X} is above last_ram &{:06X}",
                m.ram_start, m.last_ram
            )));
        }
        if m.system_address < m.ram_start || m.system_address > m.last_ram {
            return Err(MosError::Config(format!(
                "system_address &{:06X} is outside RAM",
                m.system_address
            )));
        }
        if self.display.columns == 0 {
            return Err(MosError::Config("display.columns must be non-zero".into()));
        }
        if self.storage.copy_chunk == 0 {
            return Err(MosError::Config("storage.copy_chunk must be non-zero".into()));
        }
        Ok(())
    }
}

/// Address layout of the machine's external RAM.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct MemoryMap {
    #[serde(default = "default_ram_start")]
    pub ram_start: u32,
    /// Last addressable byte of external RAM.
    #[serde(default = "default_last_ram")]
    pub last_ram: u32,
    /// First byte reserved for the firmware itself.
    #[serde(default = "default_system_address")]
    pub system_address: u32,
    #[serde(default = "default_load_address")]
    pub default_load_address: u32,
    /// Load address for command extensions found in the command directory.
    #[serde(default = "default_star_load_address")]
    pub star_load_address: u32,
}

impl Default for MemoryMap {
    fn default() -> Self {
        Self {
            ram_start: default_ram_start(),
            last_ram: default_last_ram(),
            system_address: default_system_address(),
            default_load_address: default_load_address(),
            star_load_address: default_star_load_address(),
        }
    }
}

/// Display capabilities used by the listing formatter.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct DisplayConfig {
    #[serde(default = "default_columns")]
    pub columns: usize,
    #[serde(default = "default_colours")]
    pub colours: u8,
    /// Whether the display controller can report palette entries.
    #[serde(default = "yes")]
    pub text_palette: bool,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            columns: default_columns(),
            colours: default_colours(),
            text_palette: true,
        }
    }
}

/// Where external commands are looked up.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchConfig {
    #[serde(default = "default_command_dir")]
    pub command_dir: String,
    #[serde(default = "default_binary_dir")]
    pub binary_dir: String,
    #[serde(default = "default_extension")]
    pub extension: String,
    /// Longest command word accepted before any search is attempted.
    #[serde(default = "default_max_command_len")]
    pub max_command_len: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            command_dir: default_command_dir(),
            binary_dir: default_binary_dir(),
            extension: default_extension(),
            max_command_len: default_max_command_len(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub volume_label: String,
    #[serde(default = "default_max_open_files")]
    pub max_open_files: usize,
    #[serde(default = "default_copy_chunk")]
    pub copy_chunk: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            volume_label: String::new(),
            max_open_files: default_max_open_files(),
            copy_chunk: default_copy_chunk(),
        }
    }
}

fn yes() -> bool {
    true
}
fn default_heap_size() -> usize {
    32 * 1024
}
fn default_ram_start() -> u32 {
    0x04_0000
}
fn default_last_ram() -> u32 {
    0x0B_FFFF
}
fn default_system_address() -> u32 {
    0x0B_C000
}
fn default_load_address() -> u32 {
    0x04_0000
}
fn default_star_load_address() -> u32 {
    0x0B_0000
}
fn default_columns() -> usize {
    80
}
fn default_colours() -> u8 {
    16
}
fn default_command_dir() -> String {
    "/mos/".to_string()
}
fn default_binary_dir() -> String {
    "/bin/".to_string()
}
fn default_extension() -> String {
    ".bin".to_string()
}
fn default_max_command_len() -> usize {
    246
}
fn default_max_open_files() -> usize {
    8
}
fn default_copy_chunk() -> usize {
    1024
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_gives_defaults() {
        let config = ShellConfig::from_toml_str("").unwrap();
        assert_eq!(config.memory.default_load_address, 0x04_0000);
        assert_eq!(config.memory.system_address, 0x0B_C000);
        assert_eq!(config.search.command_dir, "/mos/");
        assert_eq!(config.storage.max_open_files, 8);
        assert_eq!(config.display.columns, 80);
    }

    #[test]
    fn partial_section_keeps_other_defaults() {
        let config = ShellConfig::from_toml_str(
            "[display]\ncolumns = 40\n[storage]\nvolume_label = \"AGON\"\n",
        )
        .unwrap();
        assert_eq!(config.display.columns, 40);
        assert_eq!(config.display.colours, 16);
        assert_eq!(config.storage.volume_label, "AGON");
        assert_eq!(config.storage.copy_chunk, 1024);
    }

    #[test]
    fn hex_addresses_accepted() {
        let config =
            ShellConfig::from_toml_str("[memory]\nsystem_address = 0x0A0000\n").unwrap();
        assert_eq!(config.memory.system_address, 0x0A_0000);
    }

    #[test]
    fn system_address_outside_ram_rejected() {
        let err = ShellConfig::from_toml_str("[memory]\nsystem_address = 0x100\n").unwrap_err();
        assert!(matches!(err, MosError::Config(_)));
    }

    #[test]
    fn zero_columns_rejected() {
        assert!(ShellConfig::from_toml_str("[display]\ncolumns = 0\n").is_err());
    }

    #[test]
    fn malformed_toml_is_parse_error() {
        let err = ShellConfig::from_toml_str("[memory\n").unwrap_err();
        assert!(matches!(err, MosError::TomlParse(_)));
    }
}
