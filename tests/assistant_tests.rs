use std::collections::{BTreeMap, VecDeque};
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use hwp_assist::{Assistant, DocumentThread, Engine, EngineError, FallbackGenerator};
use hwp_host_core::{GenerationError, GenerationOutput, GenerationService, StyleDefinition, StyleStore};
use hwp_host_local::{LocalStyleStore, LocalTemplateStore, MemoryHost};
use pretty_assertions::assert_eq;
use serde_json::json;
use tempfile::TempDir;

/// Replays canned responses in order and records every prompt.
#[derive(Default)]
struct ScriptedGenerator {
    responses: Mutex<VecDeque<GenerationOutput>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedGenerator {
    fn with(responses: Vec<GenerationOutput>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into()),
            prompts: Mutex::default(),
        })
    }

    fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

impl GenerationService for ScriptedGenerator {
    fn name(&self) -> &str {
        "scripted"
    }

    fn generate(&self, prompt: &str) -> Result<GenerationOutput, GenerationError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        Ok(self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| GenerationOutput::failed(Some(1), "script exhausted")))
    }
}

struct Setup {
    temp_dir: TempDir,
    assistant: Assistant<MemoryHost>,
    generator: Arc<ScriptedGenerator>,
}

impl Setup {
    fn new(responses: Vec<GenerationOutput>) -> Self {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().to_path_buf();

        let styles = LocalStyleStore::new(root.join("styles"));
        let mut title = StyleDefinition {
            name: "title".to_string(),
            ..Default::default()
        };
        title.character.insert("Height".to_string(), json!(1600));
        styles.save(&title).unwrap();

        let document = DocumentThread::spawn(move || {
            Engine::new(
                MemoryHost::new(),
                Arc::new(styles),
                Arc::new(LocalTemplateStore::new(
                    root.join("templates"),
                    root.join("output"),
                    root.join("work"),
                )),
            )
        })
        .unwrap();

        let generator = ScriptedGenerator::with(responses);
        let assistant = Assistant::new(document, FallbackGenerator::new(generator.clone()));
        Self {
            temp_dir,
            assistant,
            generator,
        }
    }

    fn write_doc(&self, name: &str, text: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        fs::write(&path, text).unwrap();
        path
    }

    async fn document_text(&self) -> String {
        self.assistant
            .with_engine(|engine| engine.document_text())
            .await
            .unwrap()
    }
}

#[tokio::test]
async fn test_edit_selection() {
    let setup = Setup::new(vec![GenerationOutput::succeeded("연기되었습니다")]);
    let path = setup.write_doc("notice.txt", "오늘 회의는 취소되었습니다.");
    setup.assistant.open(path).await.unwrap();
    assert!(setup.assistant.select_text("취소되었습니다".to_string()).await.unwrap());

    let proposal = setup
        .assistant
        .propose_edit("일정 변경으로 고쳐 주세요", Some("공손하게"))
        .await
        .unwrap();
    assert_eq!(proposal.original, "취소되었습니다");
    assert_eq!(proposal.proposed, "연기되었습니다");

    let prompt = &setup.generator.prompts()[0];
    assert!(prompt.contains("=== 선택한 텍스트 ===\n취소되었습니다"));
    assert!(prompt.contains("일정 변경으로 고쳐 주세요"));
    assert!(prompt.contains("문서: notice.txt"));

    setup.assistant.apply_edit(&proposal).await.unwrap();
    assert_eq!(setup.document_text().await, "오늘 회의는 연기되었습니다.");
}

#[tokio::test]
async fn test_edit_without_selection_skips_generation() {
    let setup = Setup::new(vec![]);
    let path = setup.write_doc("a.txt", "본문");
    setup.assistant.open(path).await.unwrap();

    let result = setup.assistant.propose_edit("고쳐 주세요", None).await;

    assert!(matches!(result, Err(EngineError::NotFound(what)) if what == "selection"));
    assert!(setup.generator.prompts().is_empty());
}

#[tokio::test]
async fn test_table_from_selection() {
    let response = "다음과 같이 정리했습니다.\n\n| 과일 | 수량 |\n|---|---|\n| 사과 | 5개 |\n| 바나나 | 10개 |\n";
    let setup = Setup::new(vec![GenerationOutput::succeeded(response)]);
    let path = setup.write_doc("fruit.txt", "사과 5개, 바나나 10개\n끝");
    setup.assistant.open(path).await.unwrap();
    setup
        .assistant
        .select_text("사과 5개, 바나나 10개".to_string())
        .await
        .unwrap();

    let grid = setup.assistant.create_table_from_selection().await.unwrap();
    assert_eq!((grid.rows(), grid.cols()), (3, 2));

    let tables = setup
        .assistant
        .with_engine(|engine| Ok(engine.host().document().map(|d| d.tables()).unwrap_or_default()))
        .await
        .unwrap();
    assert_eq!(
        tables,
        vec![vec![
            vec!["과일".to_string(), "수량".to_string()],
            vec!["사과".to_string(), "5개".to_string()],
            vec!["바나나".to_string(), "10개".to_string()],
        ]]
    );
    // the selected text is kept above the table
    assert!(setup.document_text().await.starts_with("사과 5개, 바나나 10개"));
}

#[tokio::test]
async fn test_table_response_without_table() {
    let setup = Setup::new(vec![GenerationOutput::succeeded("표로 만들 수 없습니다.")]);
    let path = setup.write_doc("a.txt", "내용");
    setup.assistant.open(path).await.unwrap();
    setup.assistant.select_text("내용".to_string()).await.unwrap();

    let result = setup.assistant.create_table_from_selection().await;

    assert!(matches!(result, Err(EngineError::NoStructuredData)));
    assert_eq!(setup.document_text().await, "내용");
}

#[tokio::test]
async fn test_style_plan_round_trip() {
    let response = r#"{"style_plan": [{"start_line": 1, "end_line": 1, "content": "연구 개요", "suggested_style": "hwp_title"}]}"#;
    let setup = Setup::new(vec![GenerationOutput::succeeded(response)]);
    let path = setup.write_doc("paper.txt", "연구 개요\n본문입니다");
    setup.assistant.open(path).await.unwrap();

    let plan = setup.assistant.propose_style_plan().await.unwrap();
    assert_eq!(plan.len(), 1);
    assert_eq!(plan.entries()[0].content_preview, "연구 개요");
    let prompt = &setup.generator.prompts()[0];
    assert!(prompt.contains("1: 연구 개요\n2: 본문입니다"));
    assert!(prompt.contains("문서 유형: 학술논문"));
    assert!(prompt.contains("사용할 수 있는 스타일: title"));

    let report = setup.assistant.apply_style_plan(plan).await.unwrap();
    assert_eq!(report.applied, 1);
}

#[tokio::test]
async fn test_template_workflow() {
    let response = "```json\n[{\"original_text\": \"홍길동\", \"field_name\": \"담당자\"}, {\"original_text\": \"2024년 5월 2일\", \"field_name\": \"작성일\"}]\n```";
    let setup = Setup::new(vec![GenerationOutput::succeeded(response)]);
    let path = setup.write_doc("report.txt", "주간 보고서\n담당자: 홍길동\n작성일: 2024년 5월 2일");
    setup.assistant.open(path).await.unwrap();

    let plan = setup.assistant.propose_template().await.unwrap();
    assert_eq!(plan.len(), 2);
    let prompt = &setup.generator.prompts()[0];
    assert!(prompt.contains("- 날짜: 2024년 5월 2일"));
    assert!(prompt.contains("\"title\": \"주간 보고서\""));

    let outcome = setup
        .assistant
        .create_template("주간보고".to_string(), plan)
        .await
        .unwrap();
    assert_eq!(outcome.converted.len(), 2);
    assert_eq!(setup.assistant.list_templates().await.unwrap(), vec!["주간보고".to_string()]);
    setup.assistant.close().await.unwrap();

    assert_eq!(
        setup.assistant.template_fields("주간보고".to_string()).await.unwrap(),
        vec!["담당자".to_string(), "작성일".to_string()]
    );
    let values = BTreeMap::from([
        ("담당자".to_string(), "김영수".to_string()),
        ("작성일".to_string(), "2024년 5월 9일".to_string()),
    ]);
    let filled = setup
        .assistant
        .fill_template("주간보고".to_string(), values)
        .await
        .unwrap();
    assert_eq!(filled.written, 2);
    let model = MemoryHost::load_model(&filled.output).unwrap();
    assert_eq!(model.plain_text(), "주간 보고서\n담당자: 김영수\n작성일: 2024년 5월 9일");
}

#[tokio::test]
async fn test_template_keeps_only_picked_fields() {
    let response = r#"{"template_fields": [{"original_text": "홍길동", "field_name": "담당자"}, {"original_text": "2024년 5월 2일", "field_name": "작성일"}]}"#;
    let setup = Setup::new(vec![GenerationOutput::succeeded(response)]);
    let path = setup.write_doc("report.txt", "담당자: 홍길동\n작성일: 2024년 5월 2일");
    setup.assistant.open(path).await.unwrap();

    let plan = setup.assistant.propose_template().await.unwrap();
    let picked = plan.pick("2").unwrap();
    let outcome = setup
        .assistant
        .create_template("일일보고".to_string(), picked)
        .await
        .unwrap();

    assert_eq!(outcome.converted, vec!["작성일".to_string()]);
    assert!(outcome.skipped.is_empty());
    assert_eq!(setup.assistant.list_fields().await.unwrap(), vec!["작성일".to_string()]);
    assert_eq!(setup.document_text().await, "담당자: 홍길동\n작성일: ");
}

#[tokio::test]
async fn test_generation_failure_is_reported() {
    let setup = Setup::new(vec![GenerationOutput::failed(Some(1), "quota exceeded")]);
    let path = setup.write_doc("a.txt", "본문");
    setup.assistant.open(path).await.unwrap();
    setup.assistant.select_text("본문".to_string()).await.unwrap();

    let result = setup.assistant.propose_edit("고쳐 주세요", None).await;

    match result {
        Err(EngineError::Service(message)) => assert!(message.contains("quota exceeded")),
        other => panic!("unexpected: {:?}", other),
    }
}

#[tokio::test]
async fn test_second_open_is_rejected() {
    let setup = Setup::new(vec![]);
    let a = setup.write_doc("a.txt", "a");
    let b = setup.write_doc("b.txt", "b");
    setup.assistant.open(a.clone()).await.unwrap();

    let result = setup.assistant.open(b).await;

    assert!(matches!(result, Err(EngineError::SessionOpen(path)) if path == a));
}
