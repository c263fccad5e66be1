//! Serializable outline of a document built from the host's element list.

use std::collections::BTreeMap;
use std::path::PathBuf;

use hwp_host_core::{DocumentElement, ElementKind};
use serde::Serialize;

use crate::session::DocumentType;

/// Field names that hold the document title.
const TITLE_FIELDS: &[&str] = &["제목", "title"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableSummary {
    pub index: usize,
    pub rows: usize,
    pub cols: usize,
    pub cells: Vec<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentStructure {
    pub path: PathBuf,
    pub title: String,
    pub document_type: DocumentType,
    /// Non-empty paragraph texts in document order
    pub paragraphs: Vec<String>,
    /// Field name to current text
    pub fields: BTreeMap<String, String>,
    pub tables: Vec<TableSummary>,
}

impl DocumentStructure {
    /// Fold the element list into a structure. `fields` carries current field text.
    pub fn build<E: DocumentElement>(
        path: PathBuf,
        document_type: DocumentType,
        elements: &[E],
        fields: BTreeMap<String, String>,
    ) -> Self {
        let mut paragraphs = Vec::new();
        let mut tables = Vec::new();

        for element in elements {
            match element.kind() {
                ElementKind::Paragraph => {
                    let text = element.text();
                    let text = text.trim();
                    if !text.is_empty() {
                        paragraphs.push(text.to_string());
                    }
                }
                ElementKind::Table => {
                    let cells = element.cell_grid().unwrap_or_default();
                    tables.push(TableSummary {
                        index: tables.len(),
                        rows: cells.len(),
                        cols: cells.iter().map(Vec::len).max().unwrap_or(0),
                        cells,
                    });
                }
                // Field values come from the host by name, not from the element
                ElementKind::Field => {}
            }
        }

        let title = TITLE_FIELDS
            .iter()
            .filter_map(|name| fields.get(*name))
            .find(|value| !value.trim().is_empty())
            .or_else(|| paragraphs.first())
            .cloned()
            .unwrap_or_default();

        Self {
            path,
            title,
            document_type,
            paragraphs,
            fields,
            tables,
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| "{}".to_string())
    }
}
