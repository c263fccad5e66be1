//! Document automation and template engine.
//!
//! The engine recovers structured data from generated text, turns document
//! text into named fields and back, and replays tables and style plans
//! against a [`hwp_host_core::DocumentHost`].

pub mod assistant;
pub mod config;
pub mod engine;
pub mod error;
pub mod extractor;
pub mod fields;
pub mod generation;
pub mod prompts;
pub mod report;
pub mod sequencer;
pub mod session;
pub mod structure;
pub mod style_plan;
pub mod table_grid;
pub mod template;
pub mod variables;
pub mod worker;

pub use assistant::{Assistant, EditProposal};
pub use engine::{Engine, FillOutcome, TemplateOutcome};
pub use error::{EngineError, Result};
pub use extractor::{extract, ExpectedShape, Extraction};
pub use generation::FallbackGenerator;
pub use sequencer::StyleReport;
pub use session::{DocumentSession, DocumentType};
pub use structure::DocumentStructure;
pub use style_plan::{StyleMap, StylePlan, StylePlanEntry, StyleRole};
pub use table_grid::{parse_markdown_table, TableGrid};
pub use template::{TemplateField, TemplatePlan};
pub use variables::{find_candidate_variables, CandidateVariables};
pub use worker::DocumentThread;
