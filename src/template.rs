//! Template plans: which document text should become which field.

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::warn;

use crate::error::{EngineError, Result};
use crate::extractor::{extract, ExpectedShape};

const TEXT_KEYS: &[&str] = &["original_text", "located_text", "text", "search_text"];
const NAME_KEYS: &[&str] = &["field_name", "name", "field"];
const DESCRIPTION_KEYS: &[&str] = &["description", "desc", "help"];

/// One proposed field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TemplateField {
    /// Document text the field replaces
    pub located_text: String,
    pub field_name: String,
    pub description: String,
}

/// Ordered field proposals, applied one field per entry in list order.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct TemplatePlan {
    fields: Vec<TemplateField>,
}

impl TemplatePlan {
    pub fn new(fields: Vec<TemplateField>) -> Self {
        Self { fields }
    }

    pub fn fields(&self) -> &[TemplateField] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Keep only the named fields, preserving plan order.
    pub fn select(&self, names: &[String]) -> Self {
        Self {
            fields: self
                .fields
                .iter()
                .filter(|f| names.contains(&f.field_name))
                .cloned()
                .collect(),
        }
    }

    /// Keep the fields picked by 1-based position, as typed by a user.
    ///
    /// `answer` lists positions separated by commas or spaces. A blank answer
    /// or `all` keeps every field.
    pub fn pick(&self, answer: &str) -> Result<Self> {
        let answer = answer.trim();
        if answer.is_empty() || answer.eq_ignore_ascii_case("all") {
            return Ok(self.clone());
        }
        let mut names = Vec::new();
        for token in answer.split(|c: char| c == ',' || c.is_whitespace()) {
            if token.is_empty() {
                continue;
            }
            let field = token
                .parse::<usize>()
                .ok()
                .and_then(|n| n.checked_sub(1))
                .and_then(|index| self.fields.get(index))
                .ok_or_else(|| {
                    EngineError::MalformedInput(format!(
                        "{} is not a field number between 1 and {}",
                        token,
                        self.fields.len()
                    ))
                })?;
            names.push(field.field_name.clone());
        }
        Ok(self.select(&names))
    }

    /// Accept `{"template_fields": [...]}` or a bare list.
    pub fn from_value(value: &Value) -> Result<Self> {
        let records = match value {
            Value::Array(records) => records,
            Value::Object(map) => match map.get("template_fields") {
                Some(Value::Array(records)) => records,
                _ => {
                    return Err(EngineError::MalformedInput(
                        "template plan object has no template_fields list".to_string(),
                    ))
                }
            },
            _ => {
                return Err(EngineError::MalformedInput(
                    "template plan is neither an object nor a list".to_string(),
                ))
            }
        };

        let fields = records
            .iter()
            .enumerate()
            .filter_map(|(index, record)| {
                let field = record.as_object().and_then(parse_field);
                if field.is_none() {
                    warn!("Dropping template field {}: missing text or name", index + 1);
                }
                field
            })
            .collect();
        Ok(Self { fields })
    }

    pub fn from_response(text: &str) -> Result<Self> {
        let value = extract(text, ExpectedShape::Json).into_json()?;
        Self::from_value(&value)
    }
}

fn string_field(map: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|key| map.get(*key).and_then(Value::as_str))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn parse_field(map: &Map<String, Value>) -> Option<TemplateField> {
    Some(TemplateField {
        located_text: string_field(map, TEXT_KEYS)?,
        field_name: string_field(map, NAME_KEYS)?,
        description: string_field(map, DESCRIPTION_KEYS).unwrap_or_default(),
    })
}
