//! Error taxonomy for the store (config / state / internal / backing-store).

use std::path::PathBuf;

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the store.
///
/// `Config` and `State` errors are raised synchronously and leave the store
/// (or the not-yet-opened handle) in a well-defined, usable state. `Internal`
/// errors indicate a corrupted database or a bug in this crate and should
/// not be retried.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed URI, unsupported schema, or an unusable configuration.
    #[error("config error: {0}")]
    Config(String),

    /// The requested operation is not valid for the store's current state.
    #[error("state error: {0}")]
    State(String),

    /// An on-disk invariant was violated; the database is likely corrupt.
    #[error("internal consistency error: {0}")]
    Internal(String),

    /// The backing key/value store reported a failure.
    #[error("storage backend error: {0}")]
    Store(#[from] lsm_tree::Error),

    /// A filesystem operation on the store path failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    pub(crate) fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    pub(crate) fn state(msg: impl Into<String>) -> Self {
        Error::State(msg.into())
    }

    pub(crate) fn internal(msg: impl Into<String>) -> Self {
        Error::Internal(msg.into())
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}
