//! The document engine: one host, at most one open session.
//!
//! Every method here touches the host and must run on the thread that owns
//! the engine. Work on a second document goes through
//! [`Engine::with_side_document`], which parks the open session and brings it
//! back afterwards.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Local;
use hwp_host_core::{DocumentHost, MoveUnit, OpenMode, ScanItem, ScanScope, StyleStore, TemplateStore};
use serde::Serialize;
use tracing::{debug, error, info, instrument, warn};

use crate::error::{EngineError, HostContext, Result};
use crate::fields;
use crate::sequencer::{self, StyleReport};
use crate::session::DocumentSession;
use crate::structure::DocumentStructure;
use crate::style_plan::{StyleMap, StylePlan};
use crate::table_grid::TableGrid;
use crate::template::TemplatePlan;

/// Timestamp format for filled template outputs.
pub const OUTPUT_TIMESTAMP: &str = "%Y%m%d_%H%M%S";

/// Result of turning the open document into a template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TemplateOutcome {
    pub template: PathBuf,
    pub converted: Vec<String>,
    /// Fields whose text was not found or could not be converted
    pub skipped: Vec<String>,
}

/// Result of filling a template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FillOutcome {
    pub output: PathBuf,
    pub written: usize,
}

pub struct Engine<H: DocumentHost> {
    host: H,
    session: Option<DocumentSession>,
    styles: Arc<dyn StyleStore>,
    templates: Arc<dyn TemplateStore>,
    style_map: StyleMap,
}

impl<H: DocumentHost> Engine<H> {
    pub fn new(host: H, styles: Arc<dyn StyleStore>, templates: Arc<dyn TemplateStore>) -> Self {
        Self {
            host,
            session: None,
            styles,
            templates,
            style_map: StyleMap::new(),
        }
    }

    pub fn with_style_map(mut self, style_map: StyleMap) -> Self {
        self.style_map = style_map;
        self
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn session(&self) -> Option<&DocumentSession> {
        self.session.as_ref()
    }

    fn require_session(&self) -> Result<&DocumentSession> {
        self.session.as_ref().ok_or(EngineError::NoSession)
    }

    // ── Session lifecycle ──────────────────────────────────────

    #[instrument(skip(self), level = "debug")]
    pub fn open(&mut self, path: &Path) -> Result<&DocumentSession> {
        if let Some(session) = &self.session {
            return Err(EngineError::SessionOpen(session.path().to_path_buf()));
        }
        self.host
            .open(path, OpenMode::Visible)
            .context("opening document")?;

        let text = match self.host.full_text() {
            Ok(text) => text,
            Err(e) => {
                if let Err(close_err) = self.host.close() {
                    warn!("Failed to close unreadable document: {}", close_err);
                }
                return Err(EngineError::host("reading document text", e));
            }
        };

        let session = DocumentSession::new(path, &text);
        info!(
            path = %path.display(),
            document_type = %session.document_type(),
            "Document session opened"
        );
        Ok(&*self.session.insert(session))
    }

    /// Close the session. Host errors are logged; the session is dropped regardless.
    pub fn close(&mut self) -> Result<()> {
        let session = self.session.take().ok_or(EngineError::NoSession)?;
        if let Err(e) = self.host.close() {
            warn!(path = %session.path().display(), "Host failed to close document: {}", e);
        }
        info!(path = %session.path().display(), "Document session closed");
        Ok(())
    }

    pub fn save(&mut self) -> Result<PathBuf> {
        let path = self.require_session()?.path().to_path_buf();
        self.host.save().context("saving document")?;
        Ok(path)
    }

    /// Close any open session. Used when the owning thread stops.
    pub fn shutdown(&mut self) {
        if self.session.is_some() {
            if let Err(e) = self.close() {
                warn!("Shutdown close failed: {}", e);
            }
        }
    }

    pub fn document_context(&self) -> Result<String> {
        Ok(self.require_session()?.context_block())
    }

    pub fn document_text(&mut self) -> Result<String> {
        self.require_session()?;
        self.host.full_text().context("reading document text")
    }

    /// Run `op` against another document without losing the open one.
    ///
    /// With a session open: save it, close it, open `path` hidden, run `op`,
    /// close `path`, reopen the session document. Without one, only the middle
    /// three steps run. The session document is reopened even when `op` fails.
    pub fn with_side_document<T>(
        &mut self,
        path: &Path,
        op: impl FnOnce(&mut H) -> Result<T>,
    ) -> Result<T> {
        let resume = match &self.session {
            Some(session) => {
                let resume = session.path().to_path_buf();
                self.host.save().context("saving current document")?;
                self.host.close().context("closing current document")?;
                debug!(path = %resume.display(), "Parked current document");
                Some(resume)
            }
            None => None,
        };

        let outcome = self.run_hidden(path, op);

        if let Some(resume) = resume {
            if let Err(e) = self.host.open(&resume, OpenMode::Visible) {
                error!(path = %resume.display(), "Could not reopen document: {}", e);
                self.session = None;
                return Err(EngineError::host("reopening current document", e));
            }
            debug!(path = %resume.display(), "Restored current document");
        }
        outcome
    }

    fn run_hidden<T>(&mut self, path: &Path, op: impl FnOnce(&mut H) -> Result<T>) -> Result<T> {
        self.host
            .open(path, OpenMode::Hidden)
            .context("opening side document")?;
        let outcome = op(&mut self.host);
        if let Err(e) = self.host.close() {
            warn!(path = %path.display(), "Failed to close side document: {}", e);
        }
        outcome
    }

    // ── Selection editing ──────────────────────────────────────

    /// Trimmed text of the current selection. An empty selection is `NotFound`.
    pub fn selected_text(&mut self) -> Result<String> {
        self.require_session()?;
        self.host
            .init_scan(ScanScope::Selection)
            .context("starting selection scan")?;
        let scanned = read_scan(&mut self.host);
        self.host.release_scan();

        let text = scanned?.trim().to_string();
        if text.is_empty() {
            return Err(EngineError::NotFound("selection".to_string()));
        }
        Ok(text)
    }

    /// Select the first occurrence of `text` from the document start.
    pub fn select_text(&mut self, text: &str) -> Result<bool> {
        self.require_session()?;
        self.host.cancel_selection();
        self.host
            .move_by(MoveUnit::DocStart)
            .context("moving to document start")?;
        self.host.find_forward(text).context("searching")
    }

    pub fn replace_selection(&mut self, text: &str) -> Result<()> {
        self.require_session()?;
        if !self.host.has_selection() {
            return Err(EngineError::NotFound("selection".to_string()));
        }
        self.host.insert_text(text).context("replacing selection")?;
        self.host.cancel_selection();
        info!(chars = text.chars().count(), "Replaced selection");
        Ok(())
    }

    /// Insert `grid` as a table after the line holding the selection.
    pub fn insert_table(&mut self, grid: &TableGrid) -> Result<()> {
        self.require_session()?;
        self.host.cancel_selection();
        self.host
            .move_by(MoveUnit::LineEnd)
            .context("moving past selection")?;
        sequencer::replay_table(&mut self.host, grid)
    }

    // ── Structure and fields ───────────────────────────────────

    pub fn analyze_structure(&mut self) -> Result<DocumentStructure> {
        let session = self.require_session()?;
        let path = session.path().to_path_buf();
        let document_type = session.document_type();

        let elements = self.host.elements().context("reading document elements")?;
        let field_values = fields::field_values(&mut self.host)?;
        Ok(DocumentStructure::build(path, document_type, &elements, field_values))
    }

    pub fn list_fields(&mut self) -> Result<Vec<String>> {
        self.require_session()?;
        fields::list_field_names(&mut self.host)
    }

    pub fn field_values(&mut self) -> Result<BTreeMap<String, String>> {
        self.require_session()?;
        fields::field_values(&mut self.host)
    }

    pub fn convert_text_to_field(&mut self, search_text: &str, field_name: &str) -> Result<bool> {
        self.require_session()?;
        fields::convert_text_to_field(&mut self.host, search_text, field_name)
    }

    pub fn populate_fields(&mut self, values: &BTreeMap<String, String>) -> Result<usize> {
        self.require_session()?;
        Ok(fields::populate_fields(&mut self.host, values))
    }

    // ── Styles ─────────────────────────────────────────────────

    pub fn apply_style_plan(&mut self, plan: &StylePlan) -> Result<StyleReport> {
        self.require_session()?;
        if plan.is_empty() {
            return Err(EngineError::MalformedInput("style plan has no entries".to_string()));
        }
        sequencer::replay_styles(&mut self.host, plan, self.styles.as_ref(), &self.style_map)
    }

    pub fn list_styles(&self) -> Result<Vec<String>> {
        Ok(self.styles.list()?)
    }

    // ── Templates ──────────────────────────────────────────────

    pub fn list_templates(&self) -> Result<Vec<String>> {
        Ok(self.templates.list()?)
    }

    /// Convert each planned field in order, then save the document as template `name`.
    ///
    /// The session follows the document to its template path.
    #[instrument(skip(self, plan), fields(fields = plan.len()))]
    pub fn create_template(&mut self, name: &str, plan: &TemplatePlan) -> Result<TemplateOutcome> {
        self.require_session()?;
        if plan.is_empty() {
            return Err(EngineError::MalformedInput("template plan has no fields".to_string()));
        }
        let template = self.templates.template_path(name)?;

        let mut converted = Vec::new();
        let mut skipped = Vec::new();
        for field in plan.fields() {
            match fields::convert_text_to_field(&mut self.host, &field.located_text, &field.field_name)
            {
                Ok(true) => converted.push(field.field_name.clone()),
                Ok(false) => {
                    warn!(field = %field.field_name, "Text for field not found");
                    skipped.push(field.field_name.clone());
                }
                Err(e) => {
                    warn!(field = %field.field_name, "Failed to create field: {}", e);
                    skipped.push(field.field_name.clone());
                }
            }
        }
        if converted.is_empty() {
            return Err(EngineError::NothingApplied(format!(
                "none of {} planned fields could be created",
                plan.len()
            )));
        }

        self.host.save_as(&template).context("saving template")?;
        if let Some(session) = self.session.as_mut() {
            session.relocate(&template);
        }
        info!(template = %template.display(), converted = converted.len(), "Template created");
        Ok(TemplateOutcome {
            template,
            converted,
            skipped,
        })
    }

    /// Field names of a stored template. The open session is left as it was.
    pub fn template_field_names(&mut self, name: &str) -> Result<Vec<String>> {
        if !self.templates.exists(name) {
            return Err(EngineError::NotFound(format!("template {}", name)));
        }
        let path = self.templates.template_path(name)?;
        self.with_side_document(&path, fields::list_field_names)
    }

    /// Fill a private copy of template `name` and save it as a timestamped output.
    #[instrument(skip(self, values), fields(values = values.len()))]
    pub fn fill_template(
        &mut self,
        name: &str,
        values: &BTreeMap<String, String>,
    ) -> Result<FillOutcome> {
        let values: BTreeMap<String, String> = values
            .iter()
            .filter(|(_, value)| !value.trim().is_empty())
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        if values.is_empty() {
            return Err(EngineError::MalformedInput("no field values were given".to_string()));
        }
        if !self.templates.exists(name) {
            return Err(EngineError::NotFound(format!("template {}", name)));
        }

        let stamp = Local::now().format(OUTPUT_TIMESTAMP).to_string();
        let output = self.templates.output_path(name, &stamp)?;
        let working = self.templates.working_copy(name)?;

        let filled = self.with_side_document(&working, |host| {
            let written = fields::populate_fields(host, &values);
            if written == 0 {
                return Err(EngineError::NothingApplied(format!(
                    "none of {} values matched a field",
                    values.len()
                )));
            }
            host.save_as(&output).context("saving filled document")?;
            Ok(written)
        });

        if let Err(e) = self.templates.discard_working_copy(&working) {
            warn!(path = %working.display(), "Failed to remove working copy: {}", e);
        }
        let written = filled?;
        info!(output = %output.display(), written, "Template filled");
        Ok(FillOutcome { output, written })
    }
}

fn read_scan<H: DocumentHost>(host: &mut H) -> Result<String> {
    let mut text = String::new();
    loop {
        match host.scan_next().context("scanning text")? {
            ScanItem::Text(chunk) => text.push_str(&chunk),
            ScanItem::End => return Ok(text),
        }
    }
}
