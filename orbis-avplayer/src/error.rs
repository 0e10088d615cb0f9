//! Error types for orbis-avplayer
//!
//! Internal operations return [`Result`]; the façade converts errors into
//! guest status codes with [`Error::status`].

use crate::status;
use thiserror::Error;

/// Main error type for orbis-avplayer
#[derive(Error, Debug)]
pub enum Error {
    /// Null handle, absent argument or out-of-range identifier
    #[error("Invalid parameters: {0}")]
    InvalidParams(String),

    /// Operation not valid in the current player state
    #[error("Operation failed: {0}")]
    OperationFailed(String),

    /// Guest allocator returned no memory
    #[error("Out of memory: {0}")]
    NoMemory(String),

    /// Requested media type or feature not supported
    #[error("Not supported: {0}")]
    NotSupported(String),

    /// Media backend (demux/decode) errors
    #[error("Media backend error: {0}")]
    Backend(String),

    /// File I/O and thread spawn errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Shared library errors (config, symbol registration)
    #[error(transparent)]
    Common(#[from] orbis_common::Error),
}

impl Error {
    /// Guest status code reported for this error
    pub fn status(&self) -> i32 {
        match self {
            Error::InvalidParams(_) => status::INVALID_PARAMS,
            Error::NoMemory(_) => status::NO_MEMORY,
            Error::NotSupported(_) => status::NOT_SUPPORTED,
            Error::OperationFailed(_)
            | Error::Backend(_)
            | Error::Io(_)
            | Error::Common(_) => status::OPERATION_FAILED,
        }
    }
}

/// Convenience Result type using orbis-avplayer Error
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(Error::InvalidParams("x".into()).status(), status::INVALID_PARAMS);
        assert_eq!(Error::NoMemory("x".into()).status(), status::NO_MEMORY);
        assert_eq!(Error::NotSupported("x".into()).status(), status::NOT_SUPPORTED);
        assert_eq!(Error::Backend("x".into()).status(), status::OPERATION_FAILED);

        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        assert_eq!(Error::from(io).status(), status::OPERATION_FAILED);
    }
}
