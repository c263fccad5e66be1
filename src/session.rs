//! The one open document and what the engine caches about it.

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use serde::Serialize;

/// Characters of document text kept for prompt context.
pub const PREVIEW_CHARS: usize = 1000;

/// Coarse document classification used to steer prompts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    AcademicPaper,
    BusinessReport,
    OfficialNotice,
    Generic,
}

impl DocumentType {
    /// Classify by keyword presence. Earlier checks take precedence.
    pub fn detect(text: &str) -> Self {
        if text.contains("논문") || text.contains("연구") {
            DocumentType::AcademicPaper
        } else if text.contains("보고서") {
            DocumentType::BusinessReport
        } else if text.contains("공문") || text.contains("시행") {
            DocumentType::OfficialNotice
        } else {
            DocumentType::Generic
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            DocumentType::AcademicPaper => "학술논문",
            DocumentType::BusinessReport => "업무보고서",
            DocumentType::OfficialNotice => "공문서",
            DocumentType::Generic => "일반문서",
        }
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Handle to the open document. Lives from open to close.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentSession {
    path: PathBuf,
    preview: String,
    document_type: DocumentType,
    opened_at: DateTime<Local>,
}

impl DocumentSession {
    pub(crate) fn new(path: &Path, text: &str) -> Self {
        Self {
            path: path.to_path_buf(),
            preview: text.chars().take(PREVIEW_CHARS).collect(),
            document_type: DocumentType::detect(text),
            opened_at: Local::now(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn preview(&self) -> &str {
        &self.preview
    }

    pub fn document_type(&self) -> DocumentType {
        self.document_type
    }

    pub fn opened_at(&self) -> DateTime<Local> {
        self.opened_at
    }

    /// The session now refers to a document saved elsewhere.
    pub(crate) fn relocate(&mut self, path: &Path) {
        self.path = path.to_path_buf();
    }

    /// Context block prepended to every generation prompt.
    pub fn context_block(&self) -> String {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string());
        format!(
            "문서: {}\n문서 유형: {}\n문서 미리보기:\n{}",
            name, self.document_type, self.preview
        )
    }
}
