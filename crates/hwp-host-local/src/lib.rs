//! Vendor-free implementations of the hwp-host-core traits.
//!
//! - `MemoryHost`: an in-process document host persisted as JSON or plain text
//! - `LocalStyleStore` / `LocalTemplateStore`: filesystem-backed stores
//! - `CommandGenerator`: the generation service as a blocking child process

mod command_generator;
mod memory_host;
mod style_store;
mod template_store;

pub use command_generator::CommandGenerator;
pub use memory_host::{DocumentModel, Inline, MemoryElement, MemoryHost, Paragraph};
pub use style_store::LocalStyleStore;
pub use template_store::{LocalTemplateStore, DEFAULT_TEMPLATE_EXTENSION};

use hwp_host_core::StoreError;

/// Validate a store entry name: non-empty, no path separators, not hidden.
pub(crate) fn checked_name(name: &str) -> Result<&str, StoreError> {
    let trimmed = name.trim();
    let invalid = trimmed.is_empty()
        || trimmed.starts_with('.')
        || trimmed.contains(['/', '\\'])
        || trimmed.contains("..");
    if invalid {
        return Err(StoreError::InvalidName(name.to_string()));
    }
    Ok(trimmed)
}
