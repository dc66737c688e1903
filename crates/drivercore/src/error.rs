//! Crate-local error type, following the same `thiserror`-derived pattern
//! as `depgraph::Error`.

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

    #[error("malformed build record at {path}: {reason}")]
    MalformedBuildRecord { path: PathBuf, reason: String },

    #[error("input {0} could not be stat'd")]
    MissingInput(PathBuf),

    #[error("scanner error: {0}")]
    Scanner(String),

    #[error("a `Placeholder` module ({0:?}) is reachable from main_module_id")]
    UnexpectedPlaceholder(crate::imdg::ModuleId),

    #[error("module {0:?} depends on itself")]
    SelfDependency(crate::imdg::ModuleId),

    #[error("CAS error: {0}")]
    Cas(String),

    #[error("re-entered the driver with a different CAS path while priors exist")]
    CasPathChanged,

    #[error("deterministic-check mismatch for {0}: output hash differs before and after replay")]
    DeterministicCheckMismatch(PathBuf),

    #[error(transparent)]
    Depgraph(#[from] depgraph::Error),
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
