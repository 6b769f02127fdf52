//! Error type shared by construction and persistence paths.
//!
//! Scoring itself never fails: numeric anomalies are recovered inside the
//! smoothing engine. Only building a model (configuration, index loading,
//! snapshot I/O) can surface an `LmError`.
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LmError {
    /// Invalid model configuration (order, discount, unknown probability, ...).
    #[error("configuration error: {0}")]
    Config(String),

    #[error("i/o error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A binary snapshot (fst or bincode part) could not be decoded or encoded.
    #[error("snapshot error: {0}")]
    Snapshot(String),

    #[error("toml error: {0}")]
    Toml(String),
}

impl LmError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        LmError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn config(msg: impl Into<String>) -> Self {
        LmError::Config(msg.into())
    }
}

impl From<fst::Error> for LmError {
    fn from(e: fst::Error) -> Self {
        LmError::Snapshot(e.to_string())
    }
}

impl From<bincode::Error> for LmError {
    fn from(e: bincode::Error) -> Self {
        LmError::Snapshot(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, LmError>;
