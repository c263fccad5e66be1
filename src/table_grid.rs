//! Rectangular cell grids parsed from markdown tables.

use serde::Serialize;

use crate::error::{EngineError, Result};

/// A non-empty rectangular grid of cell texts, row-major.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableGrid {
    cells: Vec<Vec<String>>,
    cols: usize,
}

impl TableGrid {
    /// Build a grid from ragged rows.
    ///
    /// Rows whose cells are all empty are dropped; shorter rows are padded on
    /// the right with empty cells up to the widest row.
    pub fn from_rows(rows: Vec<Vec<String>>) -> Result<Self> {
        let mut cells: Vec<Vec<String>> = rows
            .into_iter()
            .filter(|row| row.iter().any(|cell| !cell.is_empty()))
            .collect();
        let cols = cells.iter().map(Vec::len).max().unwrap_or(0);
        if cells.is_empty() || cols == 0 {
            return Err(EngineError::MalformedInput(
                "table has no rows or no columns".to_string(),
            ));
        }
        for row in cells.iter_mut() {
            row.resize(cols, String::new());
        }
        Ok(Self { cells, cols })
    }

    pub fn rows(&self) -> usize {
        self.cells.len()
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn cells(&self) -> &[Vec<String>] {
        &self.cells
    }

    pub fn into_cells(self) -> Vec<Vec<String>> {
        self.cells
    }

    /// One row as tab-delimited text, ready to paste over a selected table row.
    pub fn row_tsv(&self, row: usize) -> Option<String> {
        self.cells.get(row).map(|cells| {
            cells
                .iter()
                .map(|cell| cell.replace('\t', " "))
                .collect::<Vec<_>>()
                .join("\t")
        })
    }
}

fn is_separator(line: &str) -> bool {
    line.contains('-')
        && line
            .chars()
            .all(|c| c == '|' || c == '-' || c == ':' || c.is_whitespace())
}

fn split_row(line: &str) -> Vec<String> {
    let line = line.strip_prefix('|').unwrap_or(line);
    let line = line.strip_suffix('|').unwrap_or(line);
    line.split('|').map(|cell| cell.trim().to_string()).collect()
}

/// Parse a markdown table.
///
/// Lines without a pipe are prose around the table and are ignored. A
/// separator line is dropped when it is the second table line. Leading and
/// trailing pipes are optional and rows may be ragged.
pub fn parse_markdown_table(text: &str) -> Result<TableGrid> {
    let lines: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && line.contains('|'))
        .collect();

    let rows = lines
        .iter()
        .enumerate()
        .filter(|(index, line)| !(*index == 1 && is_separator(line)))
        .map(|(_, line)| split_row(line))
        .collect();

    TableGrid::from_rows(rows)
}
