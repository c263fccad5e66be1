use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use hwp_host_local::{CommandGenerator, LocalStyleStore, LocalTemplateStore, DEFAULT_TEMPLATE_EXTENSION};

use crate::error::Result;
use crate::generation::FallbackGenerator;
use crate::style_plan::StyleMap;

/// Configuration for the hwp-assist command line.
#[derive(Parser, Debug, Clone)]
#[command(name = "hwp-assist")]
#[command(about = "Document editing, tables, styles and templates driven by a text generator")]
pub struct Config {
    /// Directory holding template documents
    #[arg(long, default_value = "templates", env = "HWP_ASSIST_TEMPLATES_DIR")]
    pub templates_dir: PathBuf,

    /// Directory holding style definitions (one JSON file per style)
    #[arg(long, default_value = "styles", env = "HWP_ASSIST_STYLES_DIR")]
    pub styles_dir: PathBuf,

    /// Directory receiving filled templates
    #[arg(long, default_value = "output", env = "HWP_ASSIST_OUTPUT_DIR")]
    pub output_dir: PathBuf,

    /// Directory for private template working copies (defaults to the user cache dir)
    #[arg(long, env = "HWP_ASSIST_WORK_DIR")]
    pub work_dir: Option<PathBuf>,

    /// File extension of template documents
    #[arg(long, default_value = DEFAULT_TEMPLATE_EXTENSION, env = "HWP_ASSIST_TEMPLATE_EXTENSION")]
    pub template_extension: String,

    /// Generator program; receives the prompt on stdin
    #[arg(long, default_value = "gemini", env = "HWP_ASSIST_GENERATOR")]
    pub generator: String,

    /// Model passed to the generator
    #[arg(long, default_value = "models/gemini-2.5-flash", env = "HWP_ASSIST_MODEL")]
    pub model: String,

    /// Model used once when the primary model fails (empty disables the fallback)
    #[arg(long, default_value = "gemini-pro", env = "HWP_ASSIST_FALLBACK_MODEL")]
    pub fallback_model: String,

    /// Style used for a role, as ROLE=STYLE (repeatable)
    #[arg(long = "style-map", value_name = "ROLE=STYLE")]
    pub style_map: Vec<String>,

    /// Document to open at startup
    #[arg(long)]
    pub open: Option<PathBuf>,

    /// Log level used when RUST_LOG is not set
    #[arg(long, default_value = "info", env = "HWP_ASSIST_LOG_LEVEL")]
    pub log_level: String,
}

impl Config {
    pub fn style_map(&self) -> Result<StyleMap> {
        StyleMap::from_assignments(self.style_map.iter().map(String::as_str))
    }

    pub fn work_dir(&self) -> PathBuf {
        self.work_dir.clone().unwrap_or_else(|| {
            dirs::cache_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join("hwp-assist")
                .join("work")
        })
    }

    pub fn style_store(&self) -> LocalStyleStore {
        LocalStyleStore::new(&self.styles_dir)
    }

    pub fn template_store(&self) -> LocalTemplateStore {
        LocalTemplateStore::new(&self.templates_dir, &self.output_dir, self.work_dir())
            .with_extension(self.template_extension.trim_start_matches('.'))
    }

    pub fn primary_generator(&self) -> CommandGenerator {
        CommandGenerator::new(&self.generator, &self.model)
    }

    pub fn fallback_generator(&self) -> Option<CommandGenerator> {
        let model = self.fallback_model.trim();
        if model.is_empty() || model == self.model {
            return None;
        }
        Some(CommandGenerator::new(&self.generator, model))
    }

    pub fn generator(&self) -> FallbackGenerator {
        let generator = FallbackGenerator::new(Arc::new(self.primary_generator()));
        match self.fallback_generator() {
            Some(fallback) => generator.with_fallback(Arc::new(fallback)),
            None => generator,
        }
    }
}
