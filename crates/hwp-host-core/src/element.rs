use serde::{Deserialize, Serialize};

use crate::host::Position;

/// Kind of a document element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementKind {
    Paragraph,
    Table,
    Field,
}

/// Capability view of one element of a host document.
///
/// Hosts expose their control graph through this trait instead of vendor object types.
pub trait DocumentElement {
    fn kind(&self) -> ElementKind;

    /// Where the element is anchored in the text flow.
    fn anchor(&self) -> Position;

    /// Plain text of a paragraph, or the name of a field.
    fn text(&self) -> String;

    /// Cell texts, row by row, for tables.
    fn cell_grid(&self) -> Option<Vec<Vec<String>>>;
}
