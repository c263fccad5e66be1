use crate::error::GenerationError;

/// Result of one generation call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationOutput {
    /// Generated text, trimmed
    pub text: String,
    /// Whether the service reported success
    pub success: bool,
    /// Exit status of the service process, if it had one
    pub status: Option<i32>,
    /// Diagnostics (stderr) reported by the service
    pub diagnostics: String,
}

impl GenerationOutput {
    pub fn succeeded(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            success: true,
            status: Some(0),
            diagnostics: String::new(),
        }
    }

    pub fn failed(status: Option<i32>, diagnostics: impl Into<String>) -> Self {
        Self {
            text: String::new(),
            success: false,
            status,
            diagnostics: diagnostics.into(),
        }
    }
}

/// A blocking prompt → text service.
///
/// There is no cancellation: a call blocks until the service returns or fails.
pub trait GenerationService: Send + Sync {
    /// Backing model or service name, for logs.
    fn name(&self) -> &str;

    fn generate(&self, prompt: &str) -> Result<GenerationOutput, GenerationError>;
}
