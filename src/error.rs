//! Error types for the document automation engine.

use std::path::PathBuf;

use hwp_host_core::{GenerationError, HostError, StoreError};

/// Engine-level errors.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Search text, field, template, style or selection absent.
    #[error("{0} not found")]
    NotFound(String),

    /// The extractor found no JSON value or table in the response.
    #[error("could not locate structured data in the response")]
    NoStructuredData,

    /// The generation service succeeded but returned nothing.
    #[error("the generation service returned an empty response")]
    EmptyResponse,

    #[error("malformed input: {0}")]
    MalformedInput(String),

    /// A batch operation where every item failed.
    #[error("nothing was applied: {0}")]
    NothingApplied(String),

    #[error("document host failed while {context}: {source}")]
    Host {
        context: String,
        #[source]
        source: HostError,
    },

    /// The generation service failed, fallback included.
    #[error("generation failed: {0}")]
    Service(String),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("a document is already open: {}", .0.display())]
    SessionOpen(PathBuf),

    #[error("no document is open")]
    NoSession,

    #[error("a field named {0} already exists")]
    DuplicateField(String),

    /// The document thread is gone or dropped a reply.
    #[error("document thread unavailable: {0}")]
    Worker(String),
}

impl EngineError {
    pub fn host(context: impl Into<String>, source: HostError) -> Self {
        EngineError::Host {
            context: context.into(),
            source,
        }
    }
}

impl From<GenerationError> for EngineError {
    fn from(err: GenerationError) -> Self {
        EngineError::Service(err.to_string())
    }
}

/// Extension for attaching an operation name to host results.
pub trait HostContext<T> {
    fn context(self, context: &str) -> Result<T>;
}

impl<T> HostContext<T> for std::result::Result<T, HostError> {
    fn context(self, context: &str) -> Result<T> {
        self.map_err(|source| EngineError::host(context, source))
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
