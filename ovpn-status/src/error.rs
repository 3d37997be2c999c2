//! Error types for ovpn-status.

use std::path::PathBuf;

use thiserror::Error;

/// The only way a parse fails: the file could not be read.
#[derive(Debug, Error)]
pub enum StatusError {
    #[error("cannot read status log {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> StatusError {
    StatusError::Io {
        path: path.into(),
        source,
    }
}
