use std::collections::{HashMap, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};

use hwp_host_core::{
    DialogMode, DocumentElement, DocumentHost, ElementKind, FieldSpec, HostCommand, HostError,
    MoveUnit, OpenMode, Position, PropertyMap, ScanItem, ScanScope,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// One run of content inside a paragraph.
///
/// Text advances the cursor one unit per character; fields and tables are
/// single-unit controls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Inline {
    Text {
        text: String,
    },
    Field {
        name: String,
        guide: String,
        #[serde(default)]
        help: String,
        #[serde(default)]
        value: Option<String>,
    },
    Table {
        cells: Vec<Vec<String>>,
    },
}

impl Inline {
    pub fn text(text: impl Into<String>) -> Self {
        Inline::Text { text: text.into() }
    }

    fn width(&self) -> usize {
        match self {
            Inline::Text { text } => text.chars().count(),
            Inline::Field { .. } | Inline::Table { .. } => 1,
        }
    }

    /// Text contributed to the document body. Guide text is not content.
    fn visible(&self) -> &str {
        match self {
            Inline::Text { text } => text,
            Inline::Field { value, .. } => value.as_deref().unwrap_or(""),
            Inline::Table { .. } => "",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Paragraph {
    #[serde(default)]
    pub inlines: Vec<Inline>,
    #[serde(default, skip_serializing_if = "PropertyMap::is_empty")]
    pub char_shape: PropertyMap,
    #[serde(default, skip_serializing_if = "PropertyMap::is_empty")]
    pub para_shape: PropertyMap,
}

impl Paragraph {
    pub fn from_text(text: &str) -> Self {
        Self {
            inlines: normalize(vec![Inline::text(text)]),
            ..Default::default()
        }
    }

    pub fn len(&self) -> usize {
        self.inlines.iter().map(Inline::width).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn text(&self) -> String {
        self.inlines.iter().map(Inline::visible).collect()
    }

    fn split_at(&self, offset: usize) -> (Vec<Inline>, Vec<Inline>) {
        let mut left = Vec::new();
        let mut right = Vec::new();
        let mut consumed = 0;
        for inline in &self.inlines {
            let width = inline.width();
            if consumed + width <= offset {
                left.push(inline.clone());
            } else if consumed >= offset {
                right.push(inline.clone());
            } else if let Inline::Text { text } = inline {
                // only text is wider than one unit
                let cut = char_to_byte(text, offset - consumed);
                left.push(Inline::text(&text[..cut]));
                right.push(Inline::text(&text[cut..]));
            }
            consumed += width;
        }
        (left, right)
    }

    fn with_inlines(&self, inlines: Vec<Inline>) -> Paragraph {
        Paragraph {
            inlines: normalize(inlines),
            char_shape: self.char_shape.clone(),
            para_shape: self.para_shape.clone(),
        }
    }

    fn text_between(&self, from: usize, to: usize) -> String {
        let (_, tail) = self.split_at(from);
        let tail = Paragraph {
            inlines: tail,
            ..Default::default()
        };
        let (middle, _) = tail.split_at(to.saturating_sub(from));
        middle.iter().map(Inline::visible).collect()
    }
}

fn char_to_byte(text: &str, chars: usize) -> usize {
    text.char_indices()
        .nth(chars)
        .map(|(byte, _)| byte)
        .unwrap_or(text.len())
}

/// Merge adjacent text runs and drop empty ones.
fn normalize(inlines: Vec<Inline>) -> Vec<Inline> {
    let mut out: Vec<Inline> = Vec::with_capacity(inlines.len());
    for inline in inlines {
        match inline {
            Inline::Text { text } if text.is_empty() => {}
            Inline::Text { text } => {
                if let Some(Inline::Text { text: prev }) = out.last_mut() {
                    prev.push_str(&text);
                } else {
                    out.push(Inline::Text { text });
                }
            }
            other => out.push(other),
        }
    }
    out
}

/// Persisted form of a document held by `MemoryHost`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentModel {
    pub paragraphs: Vec<Paragraph>,
}

impl Default for DocumentModel {
    fn default() -> Self {
        Self {
            paragraphs: vec![Paragraph::default()],
        }
    }
}

impl DocumentModel {
    pub fn from_plain_text(text: &str) -> Self {
        let paragraphs: Vec<Paragraph> = text.lines().map(Paragraph::from_text).collect();
        if paragraphs.is_empty() {
            Self::default()
        } else {
            Self { paragraphs }
        }
    }

    pub fn plain_text(&self) -> String {
        self.paragraphs
            .iter()
            .map(Paragraph::text)
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// All fields as `(name, value)` in document order.
    pub fn fields(&self) -> Vec<(String, Option<String>)> {
        self.paragraphs
            .iter()
            .flat_map(|p| p.inlines.iter())
            .filter_map(|inline| match inline {
                Inline::Field { name, value, .. } => Some((name.clone(), value.clone())),
                _ => None,
            })
            .collect()
    }

    /// Cell grids of all tables in document order.
    pub fn tables(&self) -> Vec<Vec<Vec<String>>> {
        self.paragraphs
            .iter()
            .flat_map(|p| p.inlines.iter())
            .filter_map(|inline| match inline {
                Inline::Table { cells } => Some(cells.clone()),
                _ => None,
            })
            .collect()
    }

    fn last_position(&self) -> Position {
        let last = self.paragraphs.len().saturating_sub(1);
        Position::new(last, self.paragraphs.get(last).map_or(0, Paragraph::len))
    }

    fn contains(&self, pos: Position) -> bool {
        self.paragraphs
            .get(pos.paragraph)
            .is_some_and(|p| pos.offset <= p.len())
    }

    fn delete_range(&mut self, start: Position, end: Position) {
        let (left, _) = self.paragraphs[start.paragraph].split_at(start.offset);
        let (_, right) = self.paragraphs[end.paragraph].split_at(end.offset);
        let merged = self.paragraphs[start.paragraph].with_inlines(left.into_iter().chain(right).collect());
        self.paragraphs
            .splice(start.paragraph..=end.paragraph, [merged]);
    }

    /// Insert text at `at`, splitting paragraphs on newlines. Returns the end of the insertion.
    fn insert_text(&mut self, at: Position, text: &str) -> Position {
        let base = self.paragraphs[at.paragraph].clone();
        let (left, right) = base.split_at(at.offset);
        let lines: Vec<&str> = text.split('\n').map(|l| l.trim_end_matches('\r')).collect();
        let last = lines.len() - 1;

        let mut built = Vec::with_capacity(lines.len());
        for (i, line) in lines.iter().enumerate() {
            let mut inlines = Vec::new();
            if i == 0 {
                inlines.extend(left.iter().cloned());
            }
            inlines.push(Inline::text(*line));
            if i == last {
                inlines.extend(right.iter().cloned());
            }
            built.push(base.with_inlines(inlines));
        }
        self.paragraphs.splice(at.paragraph..=at.paragraph, built);

        let tail = lines[last].chars().count();
        if last == 0 {
            Position::new(at.paragraph, at.offset + tail)
        } else {
            Position::new(at.paragraph + last, tail)
        }
    }

    fn insert_inline(&mut self, at: Position, inline: Inline) -> Position {
        let base = &self.paragraphs[at.paragraph];
        let (mut left, right) = base.split_at(at.offset);
        left.push(inline);
        left.extend(right);
        let updated = base.with_inlines(left);
        self.paragraphs[at.paragraph] = updated;
        Position::new(at.paragraph, at.offset + 1)
    }

    fn table_cells_mut(&mut self, paragraph: usize) -> Option<&mut Vec<Vec<String>>> {
        self.paragraphs.get_mut(paragraph)?.inlines.iter_mut().find_map(|inline| match inline {
            Inline::Table { cells } => Some(cells),
            _ => None,
        })
    }
}

/// Element view handed out by `MemoryHost::elements`.
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryElement {
    kind: ElementKind,
    anchor: Position,
    text: String,
    cells: Option<Vec<Vec<String>>>,
}

impl DocumentElement for MemoryElement {
    fn kind(&self) -> ElementKind {
        self.kind
    }

    fn anchor(&self) -> Position {
        self.anchor
    }

    fn text(&self) -> String {
        self.text.clone()
    }

    fn cell_grid(&self) -> Option<Vec<Vec<String>>> {
        self.cells.clone()
    }
}

#[derive(Debug, Clone, Copy)]
struct TableCursor {
    paragraph: usize,
    row: usize,
    col: usize,
    row_selected: bool,
}

#[derive(Debug)]
struct OpenDocument {
    path: PathBuf,
    mode: OpenMode,
    model: DocumentModel,
    cursor: Position,
    anchor: Option<Position>,
    table: Option<TableCursor>,
    scan: Option<VecDeque<String>>,
    dirty: bool,
}

impl OpenDocument {
    fn selection(&self) -> Option<(Position, Position)> {
        let anchor = self.anchor?;
        Some(if anchor <= self.cursor {
            (anchor, self.cursor)
        } else {
            (self.cursor, anchor)
        })
    }

    fn selected_text(&self) -> String {
        let Some((start, end)) = self.selection() else {
            return String::new();
        };
        let mut parts = Vec::new();
        for index in start.paragraph..=end.paragraph {
            let paragraph = &self.model.paragraphs[index];
            let from = if index == start.paragraph { start.offset } else { 0 };
            let to = if index == end.paragraph { end.offset } else { paragraph.len() };
            parts.push(paragraph.text_between(from, to));
        }
        parts.join("\n")
    }

    fn delete_selection(&mut self) {
        if let Some((start, end)) = self.selection() {
            self.model.delete_range(start, end);
            self.cursor = start;
            self.anchor = None;
            self.dirty = true;
        }
    }

    /// Paragraph indices covered by the selection, or the cursor paragraph.
    fn affected_paragraphs(&self) -> std::ops::RangeInclusive<usize> {
        match self.selection() {
            Some((start, end)) => start.paragraph..=end.paragraph,
            None => self.cursor.paragraph..=self.cursor.paragraph,
        }
    }

    fn table_cursor(&self, command: HostCommand) -> Result<TableCursor, HostError> {
        self.table.ok_or_else(|| HostError::InvalidCommand {
            command: command.name().to_string(),
            reason: "cursor is not inside a table".to_string(),
        })
    }
}

/// In-process document host.
///
/// Documents are paragraph lists persisted as JSON; files that are not JSON
/// are imported as plain text (one paragraph per line) and saved back as plain
/// text when their extension is `.txt`.
///
/// A plain-text save drops fields and shapes, so the host keeps the full model
/// of a cleanly closed `.txt` document and hands it back on the next open, as
/// long as the file still holds the text that was saved.
#[derive(Debug, Default)]
pub struct MemoryHost {
    doc: Option<OpenDocument>,
    clipboard: String,
    dialog_mode: DialogMode,
    open_history: Vec<(PathBuf, OpenMode)>,
    retained: HashMap<PathBuf, DocumentModel>,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// The open document's content.
    pub fn document(&self) -> Option<&DocumentModel> {
        self.doc.as_ref().map(|d| &d.model)
    }

    pub fn open_mode(&self) -> Option<OpenMode> {
        self.doc.as_ref().map(|d| d.mode)
    }

    pub fn dialog_mode(&self) -> DialogMode {
        self.dialog_mode
    }

    /// Every document opened so far, in order.
    pub fn open_history(&self) -> &[(PathBuf, OpenMode)] {
        &self.open_history
    }

    /// Read a document file in the format `MemoryHost` persists.
    ///
    /// A JSON document with no paragraphs loads as one empty paragraph.
    pub fn load_model(path: &Path) -> Result<DocumentModel, HostError> {
        let raw = read_document(path)?;
        parse_model(path, &raw)
    }

    /// Write a document file; `.txt` paths get plain text, everything else JSON.
    pub fn store_model(path: &Path, model: &DocumentModel) -> Result<(), HostError> {
        let body = if is_plain_text(path) {
            model.plain_text()
        } else {
            serde_json::to_string_pretty(model)
                .map_err(|e| HostError::Format(e.to_string()))?
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| HostError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        fs::write(path, body).map_err(|source| HostError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    fn doc(&self) -> Result<&OpenDocument, HostError> {
        self.doc.as_ref().ok_or(HostError::NotOpen)
    }

    /// Load `path`, preferring a retained model whose text still matches the file.
    fn load(&mut self, path: &Path) -> Result<DocumentModel, HostError> {
        let raw = read_document(path)?;
        if let Some(model) = self.retained.remove(path) {
            if model.plain_text() == raw {
                debug!(path = %path.display(), "Restored retained document model");
                return Ok(model);
            }
            debug!(path = %path.display(), "File changed since close; dropping retained model");
        }
        parse_model(path, &raw)
    }

    fn doc_mut(&mut self) -> Result<&mut OpenDocument, HostError> {
        self.doc.as_mut().ok_or(HostError::NotOpen)
    }
}

impl DocumentHost for MemoryHost {
    type Element = MemoryElement;

    fn open(&mut self, path: &Path, mode: OpenMode) -> Result<(), HostError> {
        if let Some(doc) = &self.doc {
            return Err(HostError::AlreadyOpen(doc.path.clone()));
        }
        let model = self.load(path)?;
        info!(path = %path.display(), ?mode, paragraphs = model.paragraphs.len(), "Opened document");
        self.doc = Some(OpenDocument {
            path: path.to_path_buf(),
            mode,
            model,
            cursor: Position::START,
            anchor: None,
            table: None,
            scan: None,
            dirty: false,
        });
        self.open_history.push((path.to_path_buf(), mode));
        Ok(())
    }

    fn close(&mut self) -> Result<(), HostError> {
        let doc = self.doc.take().ok_or(HostError::NotOpen)?;
        if doc.dirty {
            debug!(path = %doc.path.display(), "Closing document with unsaved changes");
        } else if is_plain_text(&doc.path) {
            self.retained.insert(doc.path, doc.model);
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.doc.is_some()
    }

    fn current_path(&self) -> Option<PathBuf> {
        self.doc.as_ref().map(|d| d.path.clone())
    }

    fn save(&mut self) -> Result<(), HostError> {
        let doc = self.doc_mut()?;
        Self::store_model(&doc.path, &doc.model)?;
        doc.dirty = false;
        debug!(path = %doc.path.display(), "Saved document");
        Ok(())
    }

    fn save_as(&mut self, path: &Path) -> Result<(), HostError> {
        let doc = self.doc_mut()?;
        Self::store_model(path, &doc.model)?;
        doc.path = path.to_path_buf();
        doc.dirty = false;
        info!(path = %path.display(), "Saved document under new path");
        Ok(())
    }

    fn full_text(&mut self) -> Result<String, HostError> {
        Ok(self.doc()?.model.plain_text())
    }

    fn init_scan(&mut self, scope: ScanScope) -> Result<(), HostError> {
        let doc = self.doc_mut()?;
        let chunks: VecDeque<String> = match scope {
            ScanScope::Document => {
                let count = doc.model.paragraphs.len();
                doc.model
                    .paragraphs
                    .iter()
                    .enumerate()
                    .map(|(i, p)| if i + 1 < count { format!("{}\n", p.text()) } else { p.text() })
                    .collect()
            }
            ScanScope::Selection => {
                let text = doc.selected_text();
                if text.is_empty() {
                    VecDeque::new()
                } else {
                    VecDeque::from([text])
                }
            }
        };
        doc.scan = Some(chunks);
        Ok(())
    }

    fn scan_next(&mut self) -> Result<ScanItem, HostError> {
        let scan = self.doc_mut()?.scan.as_mut().ok_or(HostError::ScanInactive)?;
        Ok(scan.pop_front().map_or(ScanItem::End, ScanItem::Text))
    }

    fn release_scan(&mut self) {
        if let Some(doc) = self.doc.as_mut() {
            doc.scan = None;
        }
    }

    fn elements(&mut self) -> Result<Vec<MemoryElement>, HostError> {
        let doc = self.doc()?;
        let mut elements = Vec::new();
        for (index, paragraph) in doc.model.paragraphs.iter().enumerate() {
            elements.push(MemoryElement {
                kind: ElementKind::Paragraph,
                anchor: Position::new(index, 0),
                text: paragraph.text(),
                cells: None,
            });
            let mut offset = 0;
            for inline in &paragraph.inlines {
                match inline {
                    Inline::Field { name, .. } => elements.push(MemoryElement {
                        kind: ElementKind::Field,
                        anchor: Position::new(index, offset),
                        text: name.clone(),
                        cells: None,
                    }),
                    Inline::Table { cells } => elements.push(MemoryElement {
                        kind: ElementKind::Table,
                        anchor: Position::new(index, offset),
                        text: String::new(),
                        cells: Some(cells.clone()),
                    }),
                    Inline::Text { .. } => {}
                }
                offset += inline.width();
            }
        }
        Ok(elements)
    }

    fn position(&self) -> Result<Position, HostError> {
        Ok(self.doc()?.cursor)
    }

    fn set_position(&mut self, pos: Position) -> Result<(), HostError> {
        let doc = self.doc_mut()?;
        if !doc.model.contains(pos) {
            return Err(HostError::InvalidPosition {
                paragraph: pos.paragraph,
                offset: pos.offset,
            });
        }
        doc.table = None;
        doc.cursor = pos;
        Ok(())
    }

    fn move_by(&mut self, unit: MoveUnit) -> Result<(), HostError> {
        let doc = self.doc_mut()?;
        doc.table = None;
        let paragraphs = &doc.model.paragraphs;
        let Position { paragraph, offset } = doc.cursor;
        let len = paragraphs[paragraph].len();
        doc.cursor = match unit {
            MoveUnit::DocStart => Position::START,
            MoveUnit::DocEnd => doc.model.last_position(),
            MoveUnit::NextChar if offset < len => Position::new(paragraph, offset + 1),
            MoveUnit::NextChar if paragraph + 1 < paragraphs.len() => Position::new(paragraph + 1, 0),
            MoveUnit::NextChar => doc.cursor,
            MoveUnit::PrevChar if offset > 0 => Position::new(paragraph, offset - 1),
            MoveUnit::PrevChar if paragraph > 0 => {
                Position::new(paragraph - 1, paragraphs[paragraph - 1].len())
            }
            MoveUnit::PrevChar => doc.cursor,
            MoveUnit::NextLine if paragraph + 1 < paragraphs.len() => {
                Position::new(paragraph + 1, offset.min(paragraphs[paragraph + 1].len()))
            }
            MoveUnit::NextLine => Position::new(paragraph, len),
            MoveUnit::LineStart => Position::new(paragraph, 0),
            MoveUnit::LineEnd => Position::new(paragraph, len),
        };
        Ok(())
    }

    fn begin_selection(&mut self) -> Result<(), HostError> {
        let doc = self.doc_mut()?;
        doc.anchor = Some(doc.cursor);
        Ok(())
    }

    fn cancel_selection(&mut self) {
        if let Some(doc) = self.doc.as_mut() {
            doc.anchor = None;
            if let Some(table) = doc.table.as_mut() {
                table.row_selected = false;
            }
        }
    }

    fn has_selection(&self) -> bool {
        self.doc.as_ref().is_some_and(|d| d.anchor.is_some())
    }

    fn find_forward(&mut self, text: &str) -> Result<bool, HostError> {
        let doc = self.doc_mut()?;
        if text.is_empty() {
            return Ok(false);
        }
        let needle_len = text.chars().count();
        let from = doc.cursor;
        for (index, paragraph) in doc.model.paragraphs.iter().enumerate().skip(from.paragraph) {
            let mut unit = 0;
            for inline in &paragraph.inlines {
                let width = inline.width();
                if let Inline::Text { text: run } = inline {
                    let skip = if index == from.paragraph {
                        from.offset.saturating_sub(unit)
                    } else {
                        0
                    };
                    if skip < width {
                        let start_byte = char_to_byte(run, skip);
                        if let Some(found) = run[start_byte..].find(text) {
                            let hit = unit + skip + run[start_byte..start_byte + found].chars().count();
                            doc.anchor = Some(Position::new(index, hit));
                            doc.cursor = Position::new(index, hit + needle_len);
                            doc.table = None;
                            return Ok(true);
                        }
                    }
                }
                unit += width;
            }
        }
        Ok(false)
    }

    fn insert_text(&mut self, text: &str) -> Result<(), HostError> {
        let doc = self.doc_mut()?;
        if let Some(table) = doc.table {
            let cells = doc
                .model
                .table_cells_mut(table.paragraph)
                .ok_or_else(|| HostError::Failure("table vanished under cursor".to_string()))?;
            cells[table.row][table.col].push_str(text);
            doc.dirty = true;
            return Ok(());
        }
        doc.delete_selection();
        doc.cursor = doc.model.insert_text(doc.cursor, text);
        doc.dirty = true;
        Ok(())
    }

    fn create_table(&mut self, rows: usize, cols: usize) -> Result<(), HostError> {
        let doc = self.doc_mut()?;
        if rows == 0 || cols == 0 {
            return Err(HostError::InvalidCommand {
                command: "TableCreate".to_string(),
                reason: format!("{}x{} is not a table", rows, cols),
            });
        }
        doc.delete_selection();

        // The table gets a paragraph of its own; text after the cursor follows it.
        let at = doc.cursor;
        let base = doc.model.paragraphs[at.paragraph].clone();
        let (left, right) = base.split_at(at.offset);
        let table = base.with_inlines(vec![Inline::Table {
            cells: vec![vec![String::new(); cols]; rows],
        }]);
        let mut replacement = Vec::with_capacity(3);
        let table_paragraph = if left.is_empty() {
            at.paragraph
        } else {
            replacement.push(base.with_inlines(left));
            at.paragraph + 1
        };
        replacement.push(table);
        if !right.is_empty() {
            replacement.push(base.with_inlines(right));
        }
        doc.model.paragraphs.splice(at.paragraph..=at.paragraph, replacement);

        doc.cursor = Position::new(table_paragraph, 0);
        doc.table = Some(TableCursor {
            paragraph: table_paragraph,
            row: 0,
            col: 0,
            row_selected: false,
        });
        doc.dirty = true;
        debug!(rows, cols, paragraph = table_paragraph, "Created table");
        Ok(())
    }

    fn run(&mut self, command: HostCommand) -> Result<(), HostError> {
        let clipboard = self.clipboard.clone();
        let doc = self.doc_mut()?;
        match command {
            HostCommand::SelectTableRow => {
                let mut table = doc.table_cursor(command)?;
                table.row_selected = true;
                doc.table = Some(table);
            }
            HostCommand::Paste => match doc.table {
                Some(mut table) => {
                    let cells = doc
                        .model
                        .table_cells_mut(table.paragraph)
                        .ok_or_else(|| HostError::Failure("table vanished under cursor".to_string()))?;
                    let row = &mut cells[table.row];
                    if table.row_selected {
                        // tab-delimited text fills the selected row left to right
                        let mut pieces = clipboard.split('\t');
                        for cell in row.iter_mut() {
                            match pieces.next() {
                                Some(piece) => *cell = piece.to_string(),
                                None => break,
                            }
                        }
                        let overflow: Vec<&str> = pieces.collect();
                        if let Some(last) = row.last_mut().filter(|_| !overflow.is_empty()) {
                            last.push(' ');
                            last.push_str(&overflow.join(" "));
                        }
                        table.row_selected = false;
                        table.col = 0;
                    } else {
                        row[table.col].push_str(&clipboard);
                    }
                    doc.table = Some(table);
                    doc.dirty = true;
                }
                None => {
                    doc.delete_selection();
                    doc.cursor = doc.model.insert_text(doc.cursor, &clipboard);
                    doc.dirty = true;
                }
            },
            HostCommand::AdvanceCell => {
                let mut table = doc.table_cursor(command)?;
                let (rows, cols) = table_dims(doc, &table);
                if table.col + 1 < cols {
                    table.col += 1;
                } else if table.row + 1 < rows {
                    table.row += 1;
                    table.col = 0;
                } else {
                    return Err(HostError::InvalidCommand {
                        command: command.name().to_string(),
                        reason: "already in the last cell".to_string(),
                    });
                }
                table.row_selected = false;
                doc.table = Some(table);
            }
            HostCommand::AdvanceRow => {
                let mut table = doc.table_cursor(command)?;
                let (rows, _) = table_dims(doc, &table);
                if table.row + 1 >= rows {
                    return Err(HostError::InvalidCommand {
                        command: command.name().to_string(),
                        reason: "already in the last row".to_string(),
                    });
                }
                table.row += 1;
                table.row_selected = false;
                doc.table = Some(table);
            }
            HostCommand::Cancel => {
                doc.anchor = None;
                if let Some(table) = doc.table.as_mut() {
                    table.row_selected = false;
                }
            }
            HostCommand::ExitTable => {
                let table = doc.table_cursor(command)?;
                doc.table = None;
                doc.cursor = if table.paragraph + 1 < doc.model.paragraphs.len() {
                    Position::new(table.paragraph + 1, 0)
                } else {
                    Position::new(table.paragraph, doc.model.paragraphs[table.paragraph].len())
                };
            }
        }
        Ok(())
    }

    fn set_clipboard(&mut self, text: &str) -> Result<(), HostError> {
        self.clipboard = text.to_string();
        Ok(())
    }

    fn field_names(&mut self) -> Result<Vec<String>, HostError> {
        let mut names: Vec<String> = Vec::new();
        for (name, _) in self.doc()?.model.fields() {
            if !names.contains(&name) {
                names.push(name);
            }
        }
        Ok(names)
    }

    fn field_text(&mut self, name: &str) -> Result<String, HostError> {
        self.doc()?
            .model
            .fields()
            .into_iter()
            .find(|(field, _)| field == name)
            .map(|(_, value)| value.unwrap_or_default())
            .ok_or_else(|| HostError::FieldNotFound(name.to_string()))
    }

    fn put_field_text(&mut self, name: &str, text: &str) -> Result<(), HostError> {
        let doc = self.doc_mut()?;
        let mut written = 0;
        for paragraph in doc.model.paragraphs.iter_mut() {
            for inline in paragraph.inlines.iter_mut() {
                if let Inline::Field { name: field, value, .. } = inline {
                    if field == name {
                        *value = Some(text.to_string());
                        written += 1;
                    }
                }
            }
        }
        if written == 0 {
            return Err(HostError::FieldNotFound(name.to_string()));
        }
        doc.dirty = true;
        Ok(())
    }

    fn create_field(&mut self, spec: &FieldSpec) -> Result<(), HostError> {
        let doc = self.doc_mut()?;
        if doc.table.is_some() {
            return Err(HostError::InvalidCommand {
                command: "InsertFieldTemplate".to_string(),
                reason: "fields cannot be created in table-edit mode".to_string(),
            });
        }
        doc.delete_selection();
        let field = Inline::Field {
            name: spec.name.clone(),
            guide: spec.guide.clone(),
            help: spec.help.clone(),
            value: None,
        };
        doc.cursor = doc.model.insert_inline(doc.cursor, field);
        doc.dirty = true;
        Ok(())
    }

    fn char_shape(&mut self) -> Result<PropertyMap, HostError> {
        let doc = self.doc()?;
        Ok(doc.model.paragraphs[doc.cursor.paragraph].char_shape.clone())
    }

    fn set_char_shape(&mut self, props: &PropertyMap) -> Result<(), HostError> {
        let doc = self.doc_mut()?;
        for index in doc.affected_paragraphs() {
            let shape = &mut doc.model.paragraphs[index].char_shape;
            shape.extend(props.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        doc.dirty = true;
        Ok(())
    }

    fn para_shape(&mut self) -> Result<PropertyMap, HostError> {
        let doc = self.doc()?;
        Ok(doc.model.paragraphs[doc.cursor.paragraph].para_shape.clone())
    }

    fn set_para_shape(&mut self, props: &PropertyMap) -> Result<(), HostError> {
        let doc = self.doc_mut()?;
        for index in doc.affected_paragraphs() {
            let shape = &mut doc.model.paragraphs[index].para_shape;
            shape.extend(props.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        doc.dirty = true;
        Ok(())
    }

    fn set_dialog_mode(&mut self, mode: DialogMode) -> Result<DialogMode, HostError> {
        Ok(std::mem::replace(&mut self.dialog_mode, mode))
    }
}

fn is_plain_text(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("txt"))
}

fn read_document(path: &Path) -> Result<String, HostError> {
    fs::read_to_string(path).map_err(|source| HostError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn parse_model(path: &Path, raw: &str) -> Result<DocumentModel, HostError> {
    if !raw.trim_start().starts_with('{') {
        return Ok(DocumentModel::from_plain_text(raw));
    }
    let mut model: DocumentModel = serde_json::from_str(raw)
        .map_err(|e| HostError::Format(format!("{}: {}", path.display(), e)))?;
    if model.paragraphs.is_empty() {
        model.paragraphs.push(Paragraph::default());
    }
    Ok(model)
}

fn table_dims(doc: &OpenDocument, table: &TableCursor) -> (usize, usize) {
    doc.model.paragraphs[table.paragraph]
        .inlines
        .iter()
        .find_map(|inline| match inline {
            Inline::Table { cells } => Some((cells.len(), cells.first().map_or(0, Vec::len))),
            _ => None,
        })
        .unwrap_or((0, 0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn open_text(text: &str) -> (MemoryHost, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("doc.txt");
        fs::write(&path, text).unwrap();
        let mut host = MemoryHost::new();
        host.open(&path, OpenMode::Visible).unwrap();
        (host, temp_dir)
    }

    #[test]
    fn test_plain_text_round_trip() {
        let (mut host, _temp_dir) = open_text("첫 줄\n둘째 줄\n");
        assert_eq!(host.full_text().unwrap(), "첫 줄\n둘째 줄");
        assert_eq!(host.document().unwrap().paragraphs.len(), 2);
    }

    #[test]
    fn test_second_open_is_rejected() {
        let (mut host, temp_dir) = open_text("a");
        let err = host.open(&temp_dir.path().join("doc.txt"), OpenMode::Hidden);
        assert!(matches!(err, Err(HostError::AlreadyOpen(_))));
    }

    #[test]
    fn test_find_forward_selects_match() {
        let (mut host, _temp_dir) = open_text("계약일: 2024년 3월 1일\n담당: 홍길동");
        assert!(host.find_forward("홍길동").unwrap());
        assert!(host.has_selection());
        host.init_scan(ScanScope::Selection).unwrap();
        assert_eq!(host.scan_next().unwrap(), ScanItem::Text("홍길동".to_string()));
        assert_eq!(host.scan_next().unwrap(), ScanItem::End);
        host.release_scan();
    }

    #[test]
    fn test_find_forward_starts_at_cursor() {
        let (mut host, _temp_dir) = open_text("abc abc");
        host.set_position(Position::new(0, 1)).unwrap();
        assert!(host.find_forward("abc").unwrap());
        assert_eq!(host.position().unwrap(), Position::new(0, 7));
        assert!(!host.find_forward("abc").unwrap());
    }

    #[test]
    fn test_create_field_hides_selected_text() {
        let (mut host, _temp_dir) = open_text("성명: 홍길동 님");
        assert!(host.find_forward("홍길동").unwrap());
        host.create_field(&FieldSpec {
            name: "name".to_string(),
            guide: "홍길동".to_string(),
            help: "name".to_string(),
        })
        .unwrap();
        assert_eq!(host.full_text().unwrap(), "성명:  님");
        assert_eq!(host.field_names().unwrap(), vec!["name".to_string()]);

        host.move_by(MoveUnit::DocStart).unwrap();
        assert!(!host.find_forward("홍길동").unwrap());

        host.put_field_text("name", "김철수").unwrap();
        assert_eq!(host.full_text().unwrap(), "성명: 김철수 님");
        assert_eq!(host.field_text("name").unwrap(), "김철수");
    }

    #[test]
    fn test_put_unknown_field_fails() {
        let (mut host, _temp_dir) = open_text("x");
        assert!(matches!(
            host.put_field_text("missing", "v"),
            Err(HostError::FieldNotFound(_))
        ));
    }

    #[test]
    fn test_insert_text_replaces_multiline_selection() {
        let (mut host, _temp_dir) = open_text("one\ntwo\nthree");
        host.set_position(Position::new(0, 1)).unwrap();
        host.begin_selection().unwrap();
        host.move_by(MoveUnit::NextLine).unwrap();
        host.insert_text("X\nY").unwrap();
        assert_eq!(host.full_text().unwrap(), "oX\nYwo\nthree");
        assert!(!host.has_selection());
    }

    #[test]
    fn test_row_paste_fills_cells() {
        let (mut host, _temp_dir) = open_text("before");
        host.move_by(MoveUnit::LineEnd).unwrap();
        host.create_table(2, 2).unwrap();
        host.run(HostCommand::SelectTableRow).unwrap();
        host.set_clipboard("a\tb").unwrap();
        host.run(HostCommand::Paste).unwrap();
        host.run(HostCommand::AdvanceRow).unwrap();
        host.run(HostCommand::SelectTableRow).unwrap();
        host.set_clipboard("c\td\te").unwrap();
        host.run(HostCommand::Paste).unwrap();
        assert!(host.run(HostCommand::AdvanceRow).is_err());
        host.run(HostCommand::ExitTable).unwrap();

        let tables = host.document().unwrap().tables();
        assert_eq!(
            tables,
            vec![vec![
                vec!["a".to_string(), "b".to_string()],
                vec!["c".to_string(), "d e".to_string()],
            ]]
        );
        assert_eq!(host.document().unwrap().paragraphs.len(), 2);
    }

    #[test]
    fn test_table_commands_require_table() {
        let (mut host, _temp_dir) = open_text("x");
        assert!(matches!(
            host.run(HostCommand::SelectTableRow),
            Err(HostError::InvalidCommand { .. })
        ));
    }

    #[test]
    fn test_shapes_apply_to_selected_paragraphs() {
        let (mut host, _temp_dir) = open_text("a\nb\nc");
        host.move_by(MoveUnit::NextLine).unwrap();
        host.begin_selection().unwrap();
        host.move_by(MoveUnit::NextLine).unwrap();
        host.move_by(MoveUnit::LineEnd).unwrap();
        let mut props = PropertyMap::new();
        props.insert("Bold".to_string(), serde_json::json!(true));
        host.set_char_shape(&props).unwrap();

        let paragraphs = &host.document().unwrap().paragraphs;
        assert!(paragraphs[0].char_shape.is_empty());
        assert_eq!(paragraphs[1].char_shape, props);
        assert_eq!(paragraphs[2].char_shape, props);
    }

    #[test]
    fn test_json_documents_keep_fields() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("doc.txt");
        fs::write(&source, "수신: 총무팀").unwrap();
        let target = temp_dir.path().join("doc.json");

        let mut host = MemoryHost::new();
        host.open(&source, OpenMode::Visible).unwrap();
        assert!(host.find_forward("총무팀").unwrap());
        host.create_field(&FieldSpec {
            name: "recipient".to_string(),
            guide: "총무팀".to_string(),
            help: String::new(),
        })
        .unwrap();
        host.save_as(&target).unwrap();
        host.close().unwrap();

        host.open(&target, OpenMode::Hidden).unwrap();
        assert_eq!(host.field_names().unwrap(), vec!["recipient".to_string()]);
        assert_eq!(host.open_mode(), Some(OpenMode::Hidden));
    }

    #[test]
    fn test_empty_json_document_is_usable() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("empty.json");
        fs::write(&path, r#"{"paragraphs": []}"#).unwrap();

        let mut host = MemoryHost::new();
        host.open(&path, OpenMode::Visible).unwrap();
        host.move_by(MoveUnit::DocStart).unwrap();
        host.move_by(MoveUnit::NextLine).unwrap();
        host.move_by(MoveUnit::LineEnd).unwrap();
        host.insert_text("내용").unwrap();

        assert_eq!(host.full_text().unwrap(), "내용");
    }

    fn convert_to_field(host: &mut MemoryHost, text: &str, name: &str) {
        host.move_by(MoveUnit::DocStart).unwrap();
        assert!(host.find_forward(text).unwrap());
        host.create_field(&FieldSpec {
            name: name.to_string(),
            guide: text.to_string(),
            help: String::new(),
        })
        .unwrap();
    }

    #[test]
    fn test_reopened_text_document_keeps_fields() {
        let (mut host, temp_dir) = open_text("성명: 김철수");
        let path = temp_dir.path().join("doc.txt");
        convert_to_field(&mut host, "김철수", "성명");
        host.set_char_shape(&PropertyMap::from([("Bold".to_string(), serde_json::json!(true))]))
            .unwrap();
        host.save().unwrap();
        host.close().unwrap();

        host.open(&path, OpenMode::Visible).unwrap();

        assert_eq!(host.field_names().unwrap(), vec!["성명".to_string()]);
        assert_eq!(
            host.document().unwrap().paragraphs[0].char_shape["Bold"],
            serde_json::json!(true)
        );
    }

    #[test]
    fn test_edited_text_file_wins_over_retained_model() {
        let (mut host, temp_dir) = open_text("성명: 김철수");
        let path = temp_dir.path().join("doc.txt");
        convert_to_field(&mut host, "김철수", "성명");
        host.save().unwrap();
        host.close().unwrap();
        fs::write(&path, "다른 내용").unwrap();

        host.open(&path, OpenMode::Visible).unwrap();

        assert!(host.field_names().unwrap().is_empty());
        assert_eq!(host.full_text().unwrap(), "다른 내용");
    }

    #[test]
    fn test_unsaved_changes_are_not_retained() {
        let (mut host, temp_dir) = open_text("성명: 김철수");
        let path = temp_dir.path().join("doc.txt");
        convert_to_field(&mut host, "김철수", "성명");
        host.close().unwrap();

        host.open(&path, OpenMode::Visible).unwrap();

        assert!(host.field_names().unwrap().is_empty());
        assert_eq!(host.full_text().unwrap(), "성명: 김철수");
    }

    #[test]
    fn test_elements_report_tables_and_fields() {
        let (mut host, _temp_dir) = open_text("title");
        host.move_by(MoveUnit::LineEnd).unwrap();
        host.create_table(1, 2).unwrap();
        host.run(HostCommand::ExitTable).unwrap();

        let elements = host.elements().unwrap();
        let kinds: Vec<ElementKind> = elements.iter().map(|e| e.kind()).collect();
        assert_eq!(kinds, vec![ElementKind::Paragraph, ElementKind::Paragraph, ElementKind::Table]);
        assert_eq!(elements[2].cell_grid().unwrap(), vec![vec![String::new(), String::new()]]);
    }
}
