use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::element::DocumentElement;
use crate::error::HostError;

/// Formatting properties keyed by host property name ("Height", "Bold", "Align", ...).
pub type PropertyMap = BTreeMap<String, serde_json::Value>;

/// A cursor position inside the host document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Position {
    /// 0-based paragraph (line) index
    pub paragraph: usize,
    /// 0-based character offset inside the paragraph
    pub offset: usize,
}

impl Position {
    pub const START: Position = Position {
        paragraph: 0,
        offset: 0,
    };

    pub fn new(paragraph: usize, offset: usize) -> Self {
        Self { paragraph, offset }
    }
}

/// How a document is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OpenMode {
    /// Shown to the user.
    #[default]
    Visible,
    /// Opened invisibly for side work (template inspection, filling a copy).
    Hidden,
}

/// What a text scan walks over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanScope {
    Document,
    Selection,
}

/// One step of a text scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanItem {
    Text(String),
    End,
}

/// Relative cursor movements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveUnit {
    DocStart,
    DocEnd,
    NextChar,
    PrevChar,
    NextLine,
    LineStart,
    LineEnd,
}

/// Named host commands used while editing tables and selections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostCommand {
    /// Select every cell of the row holding the cursor.
    SelectTableRow,
    /// Move to the next cell, wrapping to the next row.
    AdvanceCell,
    /// Move to the first cell of the next row.
    AdvanceRow,
    /// Paste the clipboard at the cursor or over the selection.
    Paste,
    /// Drop the current selection.
    Cancel,
    /// Leave table-edit mode, placing the cursor after the table.
    ExitTable,
}

impl HostCommand {
    pub fn name(&self) -> &'static str {
        match self {
            HostCommand::SelectTableRow => "TableRowBlockSelect",
            HostCommand::AdvanceCell => "TableRightCell",
            HostCommand::AdvanceRow => "TableLowerCell",
            HostCommand::Paste => "Paste",
            HostCommand::Cancel => "Cancel",
            HostCommand::ExitTable => "CloseTable",
        }
    }
}

/// How the host treats interactive confirmation dialogs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DialogMode {
    /// Dialogs are shown and wait for the user.
    #[default]
    Interactive,
    /// Dialogs are answered automatically with their default button.
    Suppressed,
}

/// A placeholder field to create at the cursor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: String,
    /// Shown in place of the field until a value is written
    pub guide: String,
    pub help: String,
}

/// The word-processor automation surface the engine drives.
///
/// Implementations are single-threaded: every call must come from the thread
/// that created the host.
pub trait DocumentHost {
    type Element: DocumentElement;

    // ── Lifecycle ──────────────────────────────────────────────

    fn open(&mut self, path: &Path, mode: OpenMode) -> Result<(), HostError>;

    fn close(&mut self) -> Result<(), HostError>;

    fn is_open(&self) -> bool;

    fn current_path(&self) -> Option<PathBuf>;

    fn save(&mut self) -> Result<(), HostError>;

    /// Save under a new path; the open document now refers to that path.
    fn save_as(&mut self, path: &Path) -> Result<(), HostError>;

    // ── Reading ────────────────────────────────────────────────

    /// Whole document as plain text, one line per paragraph.
    fn full_text(&mut self) -> Result<String, HostError>;

    fn init_scan(&mut self, scope: ScanScope) -> Result<(), HostError>;

    fn scan_next(&mut self) -> Result<ScanItem, HostError>;

    fn release_scan(&mut self);

    /// Paragraphs, tables and fields in document order.
    fn elements(&mut self) -> Result<Vec<Self::Element>, HostError>;

    // ── Cursor and selection ───────────────────────────────────

    fn position(&self) -> Result<Position, HostError>;

    fn set_position(&mut self, pos: Position) -> Result<(), HostError>;

    fn move_by(&mut self, unit: MoveUnit) -> Result<(), HostError>;

    /// Enter range-select mode anchored at the cursor; later moves extend it.
    fn begin_selection(&mut self) -> Result<(), HostError>;

    fn cancel_selection(&mut self);

    fn has_selection(&self) -> bool;

    /// Search forward from the cursor; on a hit the match becomes the selection.
    fn find_forward(&mut self, text: &str) -> Result<bool, HostError>;

    /// Insert text at the cursor, replacing the selection if there is one.
    fn insert_text(&mut self, text: &str) -> Result<(), HostError>;

    // ── Tables and commands ────────────────────────────────────

    /// Create a table at the cursor and enter table-edit mode on its first cell.
    fn create_table(&mut self, rows: usize, cols: usize) -> Result<(), HostError>;

    fn run(&mut self, command: HostCommand) -> Result<(), HostError>;

    fn set_clipboard(&mut self, text: &str) -> Result<(), HostError>;

    // ── Fields ─────────────────────────────────────────────────

    fn field_names(&mut self) -> Result<Vec<String>, HostError>;

    fn field_text(&mut self, name: &str) -> Result<String, HostError>;

    fn put_field_text(&mut self, name: &str, value: &str) -> Result<(), HostError>;

    /// Create a field anchored at the cursor, replacing the selection if there is one.
    fn create_field(&mut self, spec: &FieldSpec) -> Result<(), HostError>;

    // ── Formatting ─────────────────────────────────────────────

    fn char_shape(&mut self) -> Result<PropertyMap, HostError>;

    fn set_char_shape(&mut self, props: &PropertyMap) -> Result<(), HostError>;

    fn para_shape(&mut self) -> Result<PropertyMap, HostError>;

    fn set_para_shape(&mut self, props: &PropertyMap) -> Result<(), HostError>;

    /// Switch dialog handling, returning the previous mode.
    fn set_dialog_mode(&mut self, mode: DialogMode) -> Result<DialogMode, HostError>;
}
