//! Error types for docmark library.

use serde::{Deserialize, Serialize};
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for docmark operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur during document conversion.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error when reading or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A path was rejected by the sandbox policy.
    #[error("Security violation for {path}: {reason}")]
    Security {
        /// The offending path, as given by the caller
        path: PathBuf,
        /// Why it was rejected
        reason: String,
    },

    /// Content could not be structurally interpreted.
    #[error("Parse error: {0}")]
    Parse(String),

    /// No adapter accepts the input, or the output format is not supported.
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Invalid profile, override path or option value.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Input bytes could not be decoded.
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// A task exceeded its time budget.
    #[error("Task timed out after {0} ms")]
    Timeout(u64),

    /// A worker task failed unexpectedly.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Build a security error for `path`.
    pub fn security(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Error::Security {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// The coarse kind reported in processing results.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Io(_) => ErrorKind::Io,
            Error::Security { .. } => ErrorKind::Security,
            Error::Parse(_) => ErrorKind::Parse,
            Error::UnsupportedFormat(_) => ErrorKind::UnsupportedFormat,
            Error::Config(_) => ErrorKind::Config,
            Error::Encoding(_) => ErrorKind::Encoding,
            Error::Timeout(_) => ErrorKind::Timeout,
            Error::Internal(_) => ErrorKind::Internal,
        }
    }
}

impl From<quick_xml::Error> for Error {
    fn from(err: quick_xml::Error) -> Self {
        match err {
            quick_xml::Error::Io(e) => Error::Io(io::Error::new(e.kind(), e.to_string())),
            _ => Error::Parse(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Config(err.to_string())
    }
}

impl From<walkdir::Error> for Error {
    fn from(err: walkdir::Error) -> Self {
        match err.into_io_error() {
            Some(e) => Error::Io(e),
            None => Error::Io(io::Error::other("filesystem loop detected")),
        }
    }
}

/// Error classification carried by [`crate::ProcessingResult`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Sandbox violation
    Security,
    /// Unrecoverable malformed content
    Parse,
    /// No adapter matches
    UnsupportedFormat,
    /// Read/write/permission failure
    Io,
    /// Invalid configuration
    Config,
    /// Undecodable input
    Encoding,
    /// Per-task time budget exceeded
    Timeout,
    /// Unexpected failure inside a worker task
    Internal,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorKind::Security => "SecurityError",
            ErrorKind::Parse => "ParseError",
            ErrorKind::UnsupportedFormat => "UnsupportedFormatError",
            ErrorKind::Io => "IOError",
            ErrorKind::Config => "ConfigError",
            ErrorKind::Encoding => "EncodingError",
            ErrorKind::Timeout => "TimeoutError",
            ErrorKind::Internal => "InternalError",
        };
        f.write_str(name)
    }
}
