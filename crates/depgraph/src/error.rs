//! Crate-local error type, following the `thiserror`-derived enum pattern
//! used throughout this codebase.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed SFDG block in {path}: {reason}")]
    MalformedBlock { path: PathBuf, reason: String },

    #[error("unknown mandatory record code {code} in {path}")]
    UnknownMandatoryRecord { path: PathBuf, code: u8 },

    #[error("SFDG version mismatch in {path}: expected major version 1, found {found}")]
    VersionMismatch { path: PathBuf, found: u32 },

    #[error("string-pool index {index} out of range (pool has {len} entries) in {path}")]
    StringPoolOutOfRange {
        path: PathBuf,
        index: u32,
        len: usize,
    },

    #[error("dependency reference out of range: sequence {seq} in {path}")]
    SequenceOutOfRange { path: PathBuf, seq: u32 },

    #[error("MDG invariant violated: {0}")]
    InvariantViolation(String),

    #[error("MDG priors version mismatch: expected {expected}, found {found}")]
    PriorsVersionMismatch { expected: u32, found: u32 },

    #[error("MDG priors compiler version mismatch: expected {expected}, found {found}")]
    PriorsCompilerVersionMismatch { expected: String, found: String },
}

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
