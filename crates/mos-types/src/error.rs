//! Status codes and the error type shared by every MOS crate.
//!
//! The firmware reports one status byte per operation. Codes `1..=19` come
//! from the storage driver; codes `20..` are layered on top by the shell.
//! `MosError` carries one variant per non-zero status, and its `Display`
//! output is the fixed message the command line prints for that code.

use std::io;

/// Errors produced by the MOS shell and its storage layer.
#[derive(Debug, thiserror::Error)]
pub enum MosError {
    #[error("Error accessing SD card")]
    DiskError,

    #[error("Internal error")]
    Internal,

    #[error("SD card failure")]
    NotReady,

    #[error("Could not find file")]
    NoFile,

    #[error("Could not find path")]
    NoPath,

    #[error("Invalid path name")]
    InvalidName,

    #[error("Access denied or directory full")]
    Denied,

    #[error("Access denied")]
    Exists,

    #[error("Invalid file/directory object")]
    InvalidObject,

    #[error("SD card is write protected")]
    WriteProtected,

    #[error("Logical drive number is invalid")]
    InvalidDrive,

    #[error("Volume has no work area")]
    NotEnabled,

    #[error("No valid FAT volume")]
    NoFilesystem,

    #[error("Error occurred during mkfs")]
    MkfsAborted,

    #[error("Volume timeout")]
    Timeout,

    #[error("Volume locked")]
    Locked,

    #[error("LFN working buffer could not be allocated")]
    NotEnoughCore,

    #[error("Too many open files")]
    TooManyOpenFiles,

    #[error("Invalid parameter")]
    InvalidParameter,

    #[error("Invalid command")]
    InvalidCommand,

    #[error("Invalid executable")]
    InvalidExecutable,

    #[error("Out of memory")]
    OutOfMemory,

    #[error("Not implemented")]
    NotImplemented,

    #[error("Load overlaps system area")]
    OverlappingSystem,

    #[error("Bad string")]
    BadString,

    /// A status returned by a loaded program that has no fixed message.
    #[error("Unknown error ({0})")]
    Unknown(u8),

    #[error("config error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, MosError>;

impl MosError {
    /// The numeric status this error reports on the command line and API.
    pub fn code(&self) -> u8 {
        match self {
            Self::DiskError | Self::Io(_) => 1,
            Self::Internal => 2,
            Self::NotReady => 3,
            Self::NoFile => 4,
            Self::NoPath => 5,
            Self::InvalidName => 6,
            Self::Denied => 7,
            Self::Exists => 8,
            Self::InvalidObject => 9,
            Self::WriteProtected => 10,
            Self::InvalidDrive => 11,
            Self::NotEnabled => 12,
            Self::NoFilesystem => 13,
            Self::MkfsAborted => 14,
            Self::Timeout => 15,
            Self::Locked => 16,
            Self::NotEnoughCore => 17,
            Self::TooManyOpenFiles => 18,
            Self::InvalidParameter | Self::Config(_) | Self::TomlParse(_) => 19,
            Self::InvalidCommand => 20,
            Self::InvalidExecutable => 21,
            Self::OutOfMemory => 22,
            Self::NotImplemented => 23,
            Self::OverlappingSystem => 24,
            Self::BadString => 25,
            Self::Unknown(code) => *code,
        }
    }

    /// Map a raw status back to an error. `0` is success and yields `None`.
    pub fn from_code(code: u8) -> Option<Self> {
        let err = match code {
            0 => return None,
            1 => Self::DiskError,
            2 => Self::Internal,
            3 => Self::NotReady,
            4 => Self::NoFile,
            5 => Self::NoPath,
            6 => Self::InvalidName,
            7 => Self::Denied,
            8 => Self::Exists,
            9 => Self::InvalidObject,
            10 => Self::WriteProtected,
            11 => Self::InvalidDrive,
            12 => Self::NotEnabled,
            13 => Self::NoFilesystem,
            14 => Self::MkfsAborted,
            15 => Self::Timeout,
            16 => Self::Locked,
            17 => Self::NotEnoughCore,
            18 => Self::TooManyOpenFiles,
            19 => Self::InvalidParameter,
            20 => Self::InvalidCommand,
            21 => Self::InvalidExecutable,
            22 => Self::OutOfMemory,
            23 => Self::NotImplemented,
            24 => Self::OverlappingSystem,
            25 => Self::BadString,
            other => Self::Unknown(other),
        };
        Some(err)
    }

    /// True for the two "nothing there" storage outcomes.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NoFile | Self::NoPath)
    }
}

/// Status code for a result: `0` on success, the error's code otherwise.
pub fn status_of<T>(result: &Result<T>) -> u8 {
    match result {
        Ok(_) => 0,
        Err(e) => e.code(),
    }
}

/// Fixed message for a raw status code, as returned by the error-string API.
pub fn message_for(code: u8) -> String {
    match MosError::from_code(code) {
        None => "OK".to_string(),
        Some(MosError::Unknown(_)) => String::new(),
        Some(e) => e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_messages() {
        assert_eq!(MosError::NoFile.to_string(), "Could not find file");
        assert_eq!(MosError::NoPath.to_string(), "Could not find path");
        assert_eq!(MosError::Exists.to_string(), "Access denied");
        assert_eq!(MosError::TooManyOpenFiles.to_string(), "Too many open files");
    }

    #[test]
    fn engine_messages() {
        assert_eq!(MosError::InvalidCommand.to_string(), "Invalid command");
        assert_eq!(
            MosError::OverlappingSystem.to_string(),
            "Load overlaps system area"
        );
        assert_eq!(MosError::BadString.to_string(), "Bad string");
    }

    #[test]
    fn code_round_trips_for_table() {
        for code in 1..=25u8 {
            let err = MosError::from_code(code).unwrap();
            assert_eq!(err.code(), code);
        }
    }

    #[test]
    fn zero_is_success() {
        assert!(MosError::from_code(0).is_none());
        assert_eq!(message_for(0), "OK");
    }

    #[test]
    fn unknown_code_preserved() {
        let err = MosError::from_code(200).unwrap();
        assert!(matches!(err, MosError::Unknown(200)));
        assert_eq!(err.code(), 200);
        assert_eq!(message_for(200), "");
    }

    #[test]
    fn io_error_maps_to_disk_error() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "gone");
        let e: MosError = io_err.into();
        assert_eq!(e.code(), 1);
        assert!(e.to_string().contains("gone"));
    }

    #[test]
    fn toml_error_maps_to_invalid_parameter() {
        let toml_err = toml::from_str::<toml::Value>("this is [[[not valid").unwrap_err();
        let e: MosError = toml_err.into();
        assert_eq!(e.code(), 19);
        assert!(e.to_string().contains("TOML parse error"));
    }

    #[test]
    fn not_found_classification() {
        assert!(MosError::NoFile.is_not_found());
        assert!(MosError::NoPath.is_not_found());
        assert!(!MosError::Denied.is_not_found());
    }

    #[test]
    fn status_of_result() {
        let ok: Result<()> = Ok(());
        let err: Result<()> = Err(MosError::InvalidParameter);
        assert_eq!(status_of(&ok), 0);
        assert_eq!(status_of(&err), 19);
    }
}
