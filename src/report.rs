//! Human-readable messages for engine errors.

use hwp_host_core::HostError;

use crate::error::EngineError;

/// One line telling the user what went wrong and, where possible, what to do.
pub fn user_message(err: &EngineError) -> String {
    match err {
        EngineError::NotFound(what) if what == "selection" => {
            "Nothing is selected. Select some text first (select <text>).".to_string()
        }
        EngineError::NotFound(what) => format!("Could not find {}.", what),
        EngineError::NoStructuredData => {
            "Could not locate structured data in the generated response. Try again.".to_string()
        }
        EngineError::EmptyResponse => "The generator returned an empty response.".to_string(),
        EngineError::MalformedInput(detail) => format!("The input could not be used: {}.", detail),
        EngineError::NothingApplied(detail) => format!("No changes were made: {}.", detail),
        EngineError::Host { context, source } => match source {
            HostError::NotOpen => "The document is not open in the host.".to_string(),
            HostError::FieldNotFound(name) => format!("The document has no field named {}.", name),
            other => format!("The document host failed while {}: {}.", context, other),
        },
        EngineError::Service(detail) => format!("The text generator failed: {}.", detail),
        EngineError::Store(e) => format!("Storage problem: {}.", e),
        EngineError::SessionOpen(path) => format!(
            "{} is already open. Close it before opening another document.",
            path.display()
        ),
        EngineError::NoSession => "No document is open. Use open <path> first.".to_string(),
        EngineError::DuplicateField(name) => {
            format!("A field named {} already exists; choose another name.", name)
        }
        EngineError::Worker(detail) => format!("Internal error: {}.", detail),
    }
}
