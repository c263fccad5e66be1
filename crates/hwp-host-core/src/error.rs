use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by a document host.
#[derive(Debug, Error)]
pub enum HostError {
    #[error("no document is open")]
    NotOpen,

    #[error("a document is already open: {0}")]
    AlreadyOpen(PathBuf),

    #[error("field not found: {0}")]
    FieldNotFound(String),

    #[error("command {command} is not valid here: {reason}")]
    InvalidCommand { command: String, reason: String },

    #[error("invalid position: paragraph {paragraph}, offset {offset}")]
    InvalidPosition { paragraph: usize, offset: usize },

    #[error("scan is not active")]
    ScanInactive,

    #[error("document format error: {0}")]
    Format(String),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("host failure: {0}")]
    Failure(String),
}

/// Errors raised by style and template stores.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid name: {0}")]
    InvalidName(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid document {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Errors raised when a generation service could not be invoked at all.
///
/// A service that ran and exited unsuccessfully is not an error at this level;
/// it is reported through `GenerationOutput::success`.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("failed to start generator {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("generator I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("generator output was not valid UTF-8")]
    Encoding,
}
