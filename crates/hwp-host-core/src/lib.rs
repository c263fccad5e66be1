//! Core traits and types for hwp-assist document automation.
//!
//! This crate defines the capability surfaces the engine drives but does not implement:
//! - `DocumentHost`: open/close, scanning, cursor and selection, tables, fields, shapes
//! - `DocumentElement`: the element iterator view of a host document
//! - `GenerationService`: the blocking prompt → text service
//! - `StyleStore` / `TemplateStore`: named style definitions and template documents

mod element;
mod error;
mod generation;
mod host;
mod store;

pub use element::{DocumentElement, ElementKind};
pub use error::{GenerationError, HostError, StoreError};
pub use generation::{GenerationOutput, GenerationService};
pub use host::{
    DialogMode, DocumentHost, FieldSpec, HostCommand, MoveUnit, OpenMode, Position, PropertyMap,
    ScanItem, ScanScope,
};
pub use store::{StyleDefinition, StyleStore, TemplateStore};
