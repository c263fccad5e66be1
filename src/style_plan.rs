//! Normalisation of loosely-typed style plans returned by the generation service.

use std::collections::HashMap;
use std::fmt;

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::{EngineError, Result};
use crate::extractor::{extract, ExpectedShape, Extraction};
use crate::table_grid::TableGrid;

/// Confidence assumed when a record carries none.
pub const DEFAULT_CONFIDENCE: f64 = 0.9;

/// Longest content preview kept per entry, in characters.
pub const PREVIEW_CHARS: usize = 50;

const START_KEYS: &[&str] = &["start_line", "start", "line_start", "from_line", "line"];
const END_KEYS: &[&str] = &["end_line", "end", "line_end", "to_line"];
const PREVIEW_KEYS: &[&str] = &["content_preview", "content", "text", "preview"];
const STYLE_KEYS: &[&str] = &["style_type", "suggested_style", "style", "role"];
const CONFIDENCE_KEYS: &[&str] = &["confidence", "score"];

const ROLE_PREFIXES: &[&str] = &["style_", "style:", "hwp_", "custom_"];

/// Semantic role of a styled range.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StyleRole {
    Title,
    Subtitle,
    Body,
    Caption,
    Other(String),
}

impl StyleRole {
    /// Canonical role for a raw style-type value, with known prefixes stripped.
    ///
    /// Whitespace is ignored when matching, so "heading 2" reads as "heading2".
    pub fn parse(raw: &str) -> Self {
        let mut value = raw.trim().to_lowercase();
        for prefix in ROLE_PREFIXES {
            if let Some(rest) = value.strip_prefix(prefix) {
                value = rest.trim().to_string();
                break;
            }
        }
        match compact(&value).as_str() {
            "" | "body" | "normal" | "paragraph" | "본문" => StyleRole::Body,
            "title" | "heading1" | "heading_1" | "h1" | "제목" | "제목1" => StyleRole::Title,
            "subtitle" | "heading2" | "heading_2" | "h2" | "부제목" | "제목2" => StyleRole::Subtitle,
            "caption" | "캡션" => StyleRole::Caption,
            _ => StyleRole::Other(value),
        }
    }

    /// Role for a free-text keyword cell, by substring match.
    fn infer(cell: &str) -> Self {
        let cell = compact(&cell.to_lowercase());
        let has = |words: &[&str]| words.iter().any(|w| cell.contains(w));
        if has(&["subtitle", "heading2", "h2", "부제목", "제목2"]) {
            StyleRole::Subtitle
        } else if has(&["title", "heading1", "h1", "제목"]) {
            StyleRole::Title
        } else if has(&["caption", "캡션"]) {
            StyleRole::Caption
        } else {
            StyleRole::Body
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            StyleRole::Title => "title",
            StyleRole::Subtitle => "subtitle",
            StyleRole::Body => "body",
            StyleRole::Caption => "caption",
            StyleRole::Other(name) => name,
        }
    }
}

impl fmt::Display for StyleRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One line range to style. Lines are 1-based and inclusive.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StylePlanEntry {
    pub start_line: usize,
    pub end_line: usize,
    pub content_preview: String,
    pub style_type: StyleRole,
    pub confidence: f64,
}

/// Ordered style plan. Entries may overlap; later entries win when replayed.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct StylePlan {
    entries: Vec<StylePlanEntry>,
}

impl StylePlan {
    pub fn entries(&self) -> &[StylePlanEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Normalise raw records. Non-object records are skipped but still
    /// occupy their position for line defaults.
    pub fn normalize(records: &[Value]) -> Self {
        let entries = records
            .iter()
            .enumerate()
            .filter_map(|(index, record)| match record {
                Value::Object(map) => Some(normalize_record(map, index + 1)),
                other => {
                    warn!("Skipping style plan record {}: not an object ({})", index + 1, other);
                    None
                }
            })
            .collect();
        Self { entries }
    }

    /// Accept `{"style_plan": [...]}` or a bare list.
    pub fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Array(records) => Ok(Self::normalize(records)),
            Value::Object(map) => match map.get("style_plan") {
                Some(Value::Array(records)) => Ok(Self::normalize(records)),
                _ => Err(EngineError::MalformedInput(
                    "style plan object has no style_plan list".to_string(),
                )),
            },
            _ => Err(EngineError::MalformedInput(
                "style plan is neither an object nor a list".to_string(),
            )),
        }
    }

    /// One entry per data row: first cell is the preview, second the role keyword.
    pub fn from_table(grid: &TableGrid) -> Self {
        let skip = usize::from(grid.rows() > 1);
        let entries = grid
            .cells()
            .iter()
            .skip(skip)
            .enumerate()
            .map(|(index, row)| {
                let preview = row.first().map(String::as_str).unwrap_or_default();
                let keyword = row.get(1).map(String::as_str).unwrap_or_default();
                StylePlanEntry {
                    start_line: index + 1,
                    end_line: index + 1,
                    content_preview: truncate(&strip_bold(preview)),
                    style_type: StyleRole::infer(keyword),
                    confidence: DEFAULT_CONFIDENCE,
                }
            })
            .collect();
        Self { entries }
    }

    /// Parse a generation response: JSON first, a markdown table as the fallback.
    pub fn from_response(text: &str) -> Result<Self> {
        match extract(text, ExpectedShape::Any) {
            Extraction::Json(raw) => match serde_json::from_str::<Value>(&raw) {
                Ok(value) => Self::from_value(&value),
                Err(e) => {
                    debug!("Style plan JSON did not parse ({}), trying table", e);
                    match extract(text, ExpectedShape::Table) {
                        Extraction::Table(grid) => Ok(Self::from_table(&grid)),
                        _ => Err(EngineError::MalformedInput(format!("invalid style plan JSON: {}", e))),
                    }
                }
            },
            Extraction::Table(grid) => Ok(Self::from_table(&grid)),
            Extraction::None => Err(EngineError::NoStructuredData),
        }
    }
}

fn lookup<'a>(map: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|key| map.get(*key).filter(|v| !v.is_null()))
}

fn compact(value: &str) -> String {
    value.split_whitespace().collect()
}

fn as_line(value: &Value) -> Option<usize> {
    match value {
        Value::Number(n) => n.as_u64().and_then(|n| usize::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn as_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn as_confidence(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn normalize_record(map: &Map<String, Value>, position: usize) -> StylePlanEntry {
    let start_line = lookup(map, START_KEYS)
        .and_then(as_line)
        .unwrap_or(position)
        .max(1);
    let end_line = lookup(map, END_KEYS)
        .and_then(as_line)
        .unwrap_or(start_line)
        .max(start_line);
    let content_preview = lookup(map, PREVIEW_KEYS)
        .map(as_text)
        .map(|text| truncate(&text))
        .unwrap_or_default();
    let style_type = lookup(map, STYLE_KEYS)
        .map(|v| StyleRole::parse(&as_text(v)))
        .unwrap_or(StyleRole::Body);
    let confidence = lookup(map, CONFIDENCE_KEYS)
        .and_then(as_confidence)
        .filter(|c| c.is_finite())
        .unwrap_or(DEFAULT_CONFIDENCE)
        .clamp(0.0, 1.0);

    StylePlanEntry {
        start_line,
        end_line,
        content_preview,
        style_type,
        confidence,
    }
}

fn strip_bold(text: &str) -> String {
    text.replace("**", "").replace("__", "").trim().to_string()
}

fn truncate(text: &str) -> String {
    text.chars().take(PREVIEW_CHARS).collect()
}

/// Semantic role to style-store name. Unmapped roles use their own name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StyleMap {
    overrides: HashMap<StyleRole, String>,
}

impl StyleMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, role: StyleRole, style: impl Into<String>) -> Self {
        self.overrides.insert(role, style.into());
        self
    }

    /// Parse `ROLE=STYLE` assignments.
    pub fn from_assignments<'a>(assignments: impl IntoIterator<Item = &'a str>) -> Result<Self> {
        let mut map = Self::new();
        for assignment in assignments {
            let (role, style) = assignment.split_once('=').ok_or_else(|| {
                EngineError::MalformedInput(format!("style mapping {} is not ROLE=STYLE", assignment))
            })?;
            let style = style.trim();
            if style.is_empty() {
                return Err(EngineError::MalformedInput(format!(
                    "style mapping {} has no style name",
                    assignment
                )));
            }
            map.overrides.insert(StyleRole::parse(role), style.to_string());
        }
        Ok(map)
    }

    pub fn resolve(&self, role: &StyleRole) -> String {
        self.overrides
            .get(role)
            .cloned()
            .unwrap_or_else(|| role.as_str().to_string())
    }
}
