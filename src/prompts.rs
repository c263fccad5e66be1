//! Prompt builders for the generation service.

use crate::variables::CandidateVariables;

pub fn edit_prompt(context: &str, selection: &str, request: &str, style_hint: Option<&str>) -> String {
    let mut prompt = format!(
        "{context}\n\n=== 선택한 텍스트 ===\n{selection}\n\n=== 수정 요청 ===\n{request}\n"
    );
    if let Some(hint) = style_hint.filter(|h| !h.trim().is_empty()) {
        prompt.push_str(&format!("\n=== 문체 ===\n{}\n", hint.trim()));
    }
    prompt.push_str(
        "\n=== 지침 ===\n\
         선택한 텍스트만 요청에 맞게 고쳐 주세요.\n\
         - 원문의 맥락과 문체를 유지하세요.\n\
         - 고친 텍스트만 출력하고 설명은 붙이지 마세요.\n",
    );
    prompt
}

pub fn table_prompt(context: &str, selection: &str) -> String {
    format!(
        "{context}\n\n=== 선택한 텍스트 ===\n{selection}\n\n=== 지침 ===\n\
         위 내용을 표로 정리해 주세요.\n\
         - 첫 행은 머리글입니다.\n\
         - 마크다운 표 형식(| 칸 | 칸 |)으로만 출력하세요.\n\
         - 표 앞뒤에 설명을 붙이지 마세요.\n"
    )
}

/// Number document lines from 1 so plan entries can refer to them.
pub fn numbered_lines(text: &str) -> String {
    text.lines()
        .enumerate()
        .map(|(i, line)| format!("{}: {}", i + 1, line))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn style_prompt(context: &str, document_text: &str, styles: &[String]) -> String {
    let available = if styles.is_empty() {
        "title, subtitle, body, caption".to_string()
    } else {
        styles.join(", ")
    };
    format!(
        "{context}\n\n=== 줄 번호가 붙은 문서 ===\n{numbered}\n\n=== 지침 ===\n\
         각 줄의 역할을 판단해 서식 계획을 세워 주세요.\n\
         - 사용할 수 있는 스타일: {available}\n\
         - 줄 번호는 1부터 시작하며 end_line은 start_line 이상이어야 합니다.\n\
         - 아래 JSON 형식으로만 답하세요.\n\
         {{\"style_plan\": [{{\"start_line\": 1, \"end_line\": 1, \"content_preview\": \"...\", \
         \"style_type\": \"title\", \"confidence\": 0.9}}]}}\n",
        numbered = numbered_lines(document_text),
    )
}

pub fn template_prompt(context: &str, structure_json: &str, candidates: &CandidateVariables) -> String {
    let mut hints = String::new();
    for (label, values) in [
        ("날짜", &candidates.dates),
        ("이름", &candidates.names),
        ("수치", &candidates.numbers),
    ] {
        if !values.is_empty() {
            hints.push_str(&format!("- {}: {}\n", label, values.join(", ")));
        }
    }
    if hints.is_empty() {
        hints.push_str("- (없음)\n");
    }

    format!(
        "{context}\n\n=== 문서 구조 ===\n{structure_json}\n\n=== 변수 후보 ===\n{hints}\n=== 지침 ===\n\
         이 문서를 다시 쓸 수 있는 서식으로 만들려고 합니다.\n\
         문서마다 달라지는 부분을 찾아 필드로 제안해 주세요.\n\
         - original_text는 문서에 나온 그대로 적으세요.\n\
         - field_name은 짧고 겹치지 않게 지으세요.\n\
         - 아래 JSON 형식으로만 답하세요.\n\
         {{\"template_fields\": [{{\"original_text\": \"...\", \"field_name\": \"...\", \
         \"description\": \"...\"}}]}}\n"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_numbered_lines() {
        assert_eq!(numbered_lines("제목\n\n본문"), "1: 제목\n2: \n3: 본문");
    }

    #[test]
    fn test_style_prompt_asks_for_wrapper() {
        let prompt = style_prompt("ctx", "a\nb", &[]);
        assert!(prompt.contains("2: b"));
        assert!(prompt.contains("{\"style_plan\": [{\"start_line\": 1"));
    }

    #[test]
    fn test_template_prompt_lists_candidates() {
        let candidates = CandidateVariables {
            dates: vec!["2024년 3월".to_string()],
            ..Default::default()
        };
        let prompt = template_prompt("ctx", "{}", &candidates);
        assert!(prompt.contains("- 날짜: 2024년 3월\n"));
        assert!(!prompt.contains("이름:"));
        assert!(prompt.contains("\"template_fields\""));
    }

    #[test]
    fn test_edit_prompt_optional_hint() {
        assert!(!edit_prompt("c", "s", "r", None).contains("문체 ==="));
        assert!(edit_prompt("c", "s", "r", Some("공손하게")).contains("=== 문체 ===\n공손하게"));
    }
}
