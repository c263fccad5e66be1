//! Heuristic scan for text that is likely to vary between documents.
//!
//! Results seed template proposals only; nothing here touches the document.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

static DATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\d{4}\s*년\s*\d{1,2}\s*월(?:\s*\d{1,2}\s*일)?|\d{4}[-./]\d{1,2}[-./]\d{1,2}").unwrap()
});

static NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?:성명|이름|담당자?|작성자|신청인|대표자?)\s*[:：]?\s*[가-힣]{2,4}|[가-힣]{2,4}\s*(?:교수|박사|과장|부장|차장|대리|팀장|실장|원장|선생님)",
    )
    .unwrap()
});

static NUMBER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\d[\d,]*(?:\.\d+)?\s*(?:억원|만원|천원|원|개월|시간|개|명|건|회|세|부|권|대|%|kg|km)").unwrap()
});

/// Candidate variable spans, in document order without duplicates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CandidateVariables {
    pub dates: Vec<String>,
    pub names: Vec<String>,
    pub numbers: Vec<String>,
}

impl CandidateVariables {
    pub fn is_empty(&self) -> bool {
        self.dates.is_empty() && self.names.is_empty() && self.numbers.is_empty()
    }
}

fn collect(re: &Regex, text: &str) -> Vec<String> {
    let mut found: Vec<String> = Vec::new();
    for m in re.find_iter(text) {
        let value = m.as_str().trim().to_string();
        if !found.contains(&value) {
            found.push(value);
        }
    }
    found
}

pub fn find_candidate_variables(text: &str) -> CandidateVariables {
    CandidateVariables {
        dates: collect(&DATE_RE, text),
        names: collect(&NAME_RE, text),
        numbers: collect(&NUMBER_RE, text),
    }
}
