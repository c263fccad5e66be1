//! Recovery of a JSON value or a markdown table from free-form generated text.
//!
//! Generation services wrap their payload in commentary, code fences or both.
//! `extract` tries the cheap, precise fence checks before the general bracket
//! scan so that an unrelated bracketed fragment in the prose cannot win.

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::error::{EngineError, Result};
use crate::table_grid::{parse_markdown_table, TableGrid};

/// What the caller expects to find.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpectedShape {
    /// A JSON object or array.
    Json,
    /// A markdown table.
    Table,
    /// JSON first, a markdown table as the last resort.
    Any,
}

impl ExpectedShape {
    fn wants_json(self) -> bool {
        matches!(self, ExpectedShape::Json | ExpectedShape::Any)
    }

    fn wants_table(self) -> bool {
        matches!(self, ExpectedShape::Table | ExpectedShape::Any)
    }
}

/// Outcome of an extraction. JSON candidates are returned unparsed.
#[derive(Debug, Clone, PartialEq)]
pub enum Extraction {
    Json(String),
    Table(TableGrid),
    None,
}

impl Extraction {
    pub fn is_none(&self) -> bool {
        matches!(self, Extraction::None)
    }

    /// Parse the JSON candidate.
    ///
    /// `None` becomes `NoStructuredData`; a table or an unparseable candidate
    /// becomes `MalformedInput`.
    pub fn into_json(self) -> Result<serde_json::Value> {
        match self {
            Extraction::Json(raw) => serde_json::from_str(&raw)
                .map_err(|e| EngineError::MalformedInput(format!("invalid JSON: {}", e))),
            Extraction::Table(_) => Err(EngineError::MalformedInput(
                "expected JSON but found a table".to_string(),
            )),
            Extraction::None => Err(EngineError::NoStructuredData),
        }
    }

    pub fn into_table(self) -> Result<TableGrid> {
        match self {
            Extraction::Table(grid) => Ok(grid),
            Extraction::Json(_) => Err(EngineError::MalformedInput(
                "expected a table but found JSON".to_string(),
            )),
            Extraction::None => Err(EngineError::NoStructuredData),
        }
    }
}

static FENCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)```(?:[ \t]*json)?[ \t]*\r?\n?(.*?)```").unwrap());

fn looks_like_json(text: &str) -> bool {
    text.starts_with('{') || text.starts_with('[')
}

/// Extract structured data from `text`. Never fails; total failure is `Extraction::None`.
pub fn extract(text: &str, shape: ExpectedShape) -> Extraction {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Extraction::None;
    }

    if shape.wants_json() {
        if let Some(candidate) = json_candidate(text, trimmed) {
            return Extraction::Json(candidate);
        }
    }

    if shape.wants_table() && trimmed.contains('|') {
        match parse_markdown_table(table_candidate(trimmed)) {
            Ok(grid) => {
                debug!(rows = grid.rows(), cols = grid.cols(), "Extracted markdown table");
                return Extraction::Table(grid);
            }
            Err(e) => debug!("Pipe-bearing text is not a table: {}", e),
        }
    }

    Extraction::None
}

fn json_candidate(raw: &str, trimmed: &str) -> Option<String> {
    // 1. fenced block labelled json, or unlabelled
    for captures in FENCE_RE.captures_iter(raw) {
        let content = captures.get(1).map_or("", |m| m.as_str()).trim();
        if looks_like_json(content) {
            debug!("JSON found in fenced block");
            return Some(content.to_string());
        }
    }

    // 2. the whole input is a fence, possibly unterminated
    if let Some(inner) = trimmed.strip_prefix("```") {
        let inner = inner.strip_suffix("```").unwrap_or(inner).trim();
        let inner = match inner.split_once('\n') {
            Some((first, rest))
                if first.trim().eq_ignore_ascii_case("json")
                    || first.trim().eq_ignore_ascii_case("javascript") =>
            {
                rest.trim()
            }
            _ => inner,
        };
        if looks_like_json(inner) {
            debug!("JSON found after stripping a leading fence");
            return Some(inner.to_string());
        }
    }

    // 3. first bracket-balanced span
    if let Some(span) = balanced_span(raw) {
        debug!("JSON found by bracket scan");
        return Some(span.to_string());
    }

    // 4. unbalanced, but the input claims to be JSON
    if looks_like_json(trimmed) {
        debug!("Returning bracket-led input verbatim");
        return Some(trimmed.to_string());
    }

    None
}

/// The substring from the first `{` or `[` to its matching close.
///
/// Only brackets of the opening kind are counted.
fn balanced_span(text: &str) -> Option<&str> {
    let (start, open) = text.char_indices().find(|(_, c)| *c == '{' || *c == '[')?;
    let close = if open == '{' { '}' } else { ']' };
    let mut depth = 0usize;
    for (index, c) in text[start..].char_indices() {
        if c == open {
            depth += 1;
        } else if c == close {
            depth -= 1;
            if depth == 0 {
                return Some(&text[start..start + index + c.len_utf8()]);
            }
        }
    }
    None
}

/// A fenced block holding a table, or the text itself.
fn table_candidate(text: &str) -> &str {
    FENCE_RE
        .captures_iter(text)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str())
        .find(|content| content.contains('|'))
        .map(|content| {
            // drop a language tag such as "markdown"
            match content.split_once('\n') {
                Some((first, rest)) if !first.contains('|') => rest,
                _ => content,
            }
        })
        .unwrap_or(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn json(text: &str) -> Extraction {
        Extraction::Json(text.to_string())
    }

    #[test]
    fn test_fenced_json_after_prose() {
        assert_eq!(extract("Sure! ```json\n{\"a\":1}\n```", ExpectedShape::Json), json("{\"a\":1}"));
    }

    #[test]
    fn test_unlabelled_fence() {
        let text = "결과입니다.\n```\n[1, 2, 3]\n```\n감사합니다.";
        assert_eq!(extract(text, ExpectedShape::Json), json("[1, 2, 3]"));
    }

    #[test]
    fn test_fence_beats_earlier_brackets() {
        let text = "See [note] below.\n```json\n{\"k\": [1]}\n```";
        assert_eq!(extract(text, ExpectedShape::Json), json("{\"k\": [1]}"));
    }

    #[test]
    fn test_non_json_fence_is_skipped() {
        let text = "```python\nprint(1)\n```\n그리고 {\"x\": 2}";
        assert_eq!(extract(text, ExpectedShape::Json), json("{\"x\": 2}"));
    }

    #[test]
    fn test_unterminated_fence() {
        assert_eq!(
            extract("```json\n{\"a\": 1}", ExpectedShape::Json),
            json("{\"a\": 1}")
        );
    }

    #[rstest]
    #[case("Here you go: {\"a\": {\"b\": 2}} hope it helps", "{\"a\": {\"b\": 2}}")]
    #[case("목록: [\"x\", [\"y\"]] 끝", "[\"x\", [\"y\"]]")]
    #[case("{\"s\": \"[unbalanced\"} trailing", "{\"s\": \"[unbalanced\"}")]
    fn test_bracket_scan(#[case] text: &str, #[case] expected: &str) {
        assert_eq!(extract(text, ExpectedShape::Json), json(expected));
    }

    #[test]
    fn test_unbalanced_bracket_led_input_verbatim() {
        assert_eq!(extract("  {\"a\": 1  ", ExpectedShape::Json), json("{\"a\": 1"));
    }

    #[test]
    fn test_table_fallback_for_any() {
        let text = "| 항목 | 수량 |\n|---|---|\n| 사과 | 5개 |";
        match extract(text, ExpectedShape::Any) {
            Extraction::Table(grid) => assert_eq!(grid.rows(), 2),
            other => panic!("expected table, got {:?}", other),
        }
    }

    #[test]
    fn test_table_shape_ignores_brackets_in_cells() {
        let text = "| 구분 | 비고 |\n| [참고] | {없음} |";
        let grid = extract(text, ExpectedShape::Table).into_table().unwrap();
        assert_eq!(grid.cells()[1], vec!["[참고]".to_string(), "{없음}".to_string()]);
    }

    #[test]
    fn test_table_inside_markdown_fence() {
        let text = "표입니다:\n```markdown\n| a | b |\n| 1 | 2 |\n```";
        let grid = extract(text, ExpectedShape::Table).into_table().unwrap();
        assert_eq!(grid.cells()[0], vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_json_shape_never_returns_table() {
        assert_eq!(extract("| a | b |", ExpectedShape::Json), Extraction::None);
    }

    #[rstest]
    #[case("")]
    #[case("   ")]
    #[case("그냥 평범한 문장입니다.")]
    fn test_nothing_structured(#[case] text: &str) {
        assert!(extract(text, ExpectedShape::Any).is_none());
    }

    #[test]
    fn test_none_is_distinct_from_malformed() {
        assert!(matches!(
            Extraction::None.into_json(),
            Err(EngineError::NoStructuredData)
        ));
        assert!(matches!(
            json("{oops").into_json(),
            Err(EngineError::MalformedInput(_))
        ));
    }
}
