//! User-level workflows that combine the document thread and the generation service.
//!
//! Each workflow reads what it needs on the document thread, calls the
//! generator on the blocking pool, then submits a new job to write the
//! result back. Nothing holds the document thread while a generation runs.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use hwp_host_core::DocumentHost;
use serde::Serialize;
use tracing::{info, instrument};

use crate::engine::{Engine, FillOutcome, TemplateOutcome};
use crate::error::{EngineError, Result};
use crate::extractor::{extract, ExpectedShape};
use crate::generation::FallbackGenerator;
use crate::prompts;
use crate::sequencer::StyleReport;
use crate::session::DocumentSession;
use crate::style_plan::StylePlan;
use crate::table_grid::TableGrid;
use crate::template::TemplatePlan;
use crate::variables::find_candidate_variables;
use crate::worker::DocumentThread;

/// A proposed replacement for the current selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EditProposal {
    pub original: String,
    pub proposed: String,
}

pub struct Assistant<H: DocumentHost + 'static> {
    document: DocumentThread<H>,
    generator: Arc<FallbackGenerator>,
}

impl<H: DocumentHost + 'static> Assistant<H> {
    pub fn new(document: DocumentThread<H>, generator: FallbackGenerator) -> Self {
        Self {
            document,
            generator: Arc::new(generator),
        }
    }

    /// Submit a job to the document thread.
    pub async fn with_engine<T, F>(&self, job: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Engine<H>) -> Result<T> + Send + 'static,
    {
        self.document.run(job).await
    }

    async fn generate(&self, prompt: String) -> Result<String> {
        let generator = Arc::clone(&self.generator);
        tokio::task::spawn_blocking(move || generator.generate(&prompt))
            .await
            .map_err(|e| EngineError::Worker(format!("generation task failed: {}", e)))?
    }

    pub async fn open(&self, path: PathBuf) -> Result<DocumentSession> {
        self.with_engine(move |engine| engine.open(&path).cloned())
            .await
    }

    pub async fn close(&self) -> Result<()> {
        self.with_engine(|engine| engine.close()).await
    }

    pub async fn save(&self) -> Result<PathBuf> {
        self.with_engine(|engine| engine.save()).await
    }

    pub async fn select_text(&self, text: String) -> Result<bool> {
        self.with_engine(move |engine| engine.select_text(&text)).await
    }

    pub async fn selected_text(&self) -> Result<String> {
        self.with_engine(|engine| engine.selected_text()).await
    }

    // ── Editing ────────────────────────────────────────────────

    #[instrument(skip(self, request, style_hint))]
    pub async fn propose_edit(&self, request: &str, style_hint: Option<&str>) -> Result<EditProposal> {
        let (context, selection) = self
            .with_engine(|engine| Ok((engine.document_context()?, engine.selected_text()?)))
            .await?;
        let prompt = prompts::edit_prompt(&context, &selection, request, style_hint);
        let proposed = self.generate(prompt).await?.trim().to_string();
        Ok(EditProposal {
            original: selection,
            proposed,
        })
    }

    pub async fn apply_edit(&self, proposal: &EditProposal) -> Result<()> {
        let text = proposal.proposed.clone();
        self.with_engine(move |engine| engine.replace_selection(&text))
            .await
    }

    #[instrument(skip(self))]
    pub async fn create_table_from_selection(&self) -> Result<TableGrid> {
        let (context, selection) = self
            .with_engine(|engine| Ok((engine.document_context()?, engine.selected_text()?)))
            .await?;
        let response = self
            .generate(prompts::table_prompt(&context, &selection))
            .await?;
        let grid = extract(&response, ExpectedShape::Table).into_table()?;
        info!(rows = grid.rows(), cols = grid.cols(), "Parsed generated table");

        let inserted = grid.clone();
        self.with_engine(move |engine| engine.insert_table(&inserted))
            .await?;
        Ok(grid)
    }

    // ── Styles ─────────────────────────────────────────────────

    #[instrument(skip(self))]
    pub async fn propose_style_plan(&self) -> Result<StylePlan> {
        let (context, text, styles) = self
            .with_engine(|engine| {
                Ok((
                    engine.document_context()?,
                    engine.document_text()?,
                    engine.list_styles()?,
                ))
            })
            .await?;
        let response = self
            .generate(prompts::style_prompt(&context, &text, &styles))
            .await?;
        StylePlan::from_response(&response)
    }

    pub async fn apply_style_plan(&self, plan: StylePlan) -> Result<StyleReport> {
        self.with_engine(move |engine| engine.apply_style_plan(&plan))
            .await
    }

    pub async fn list_styles(&self) -> Result<Vec<String>> {
        self.with_engine(|engine| engine.list_styles()).await
    }

    // ── Fields and templates ───────────────────────────────────

    pub async fn list_fields(&self) -> Result<Vec<String>> {
        self.with_engine(|engine| engine.list_fields()).await
    }

    /// Ask the generator which parts of the open document should become fields.
    #[instrument(skip(self))]
    pub async fn propose_template(&self) -> Result<TemplatePlan> {
        let (context, structure, text) = self
            .with_engine(|engine| {
                let structure = engine.analyze_structure()?;
                Ok((engine.document_context()?, structure, engine.document_text()?))
            })
            .await?;
        let candidates = find_candidate_variables(&text);
        let prompt = prompts::template_prompt(&context, &structure.to_json(), &candidates);
        let plan = TemplatePlan::from_response(&self.generate(prompt).await?)?;
        info!(fields = plan.len(), "Template plan proposed");
        Ok(plan)
    }

    pub async fn create_template(&self, name: String, plan: TemplatePlan) -> Result<TemplateOutcome> {
        self.with_engine(move |engine| engine.create_template(&name, &plan))
            .await
    }

    pub async fn template_fields(&self, name: String) -> Result<Vec<String>> {
        self.with_engine(move |engine| engine.template_field_names(&name))
            .await
    }

    pub async fn fill_template(
        &self,
        name: String,
        values: BTreeMap<String, String>,
    ) -> Result<FillOutcome> {
        self.with_engine(move |engine| engine.fill_template(&name, &values))
            .await
    }

    pub async fn list_templates(&self) -> Result<Vec<String>> {
        self.with_engine(|engine| engine.list_templates()).await
    }
}
