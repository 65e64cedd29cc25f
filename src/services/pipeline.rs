//! 生成流水线
//! 提示词 -> 生成接口 -> 解析器，产出草稿试卷。草稿不落盘，是否保存由调用方决定。

use log::{info, warn};
use serde::Serialize;

use crate::error::Result;
use crate::models::{LanguageMode, Question, SourceMode, Test};
use crate::services::client::GenerationClient;
use crate::services::parser::{ParsedQuestions, QuestionParser};
use crate::services::prompt::{MockTestPrompt, TopicRequest};

/// 文本导入时模型和文本都没有给出标题时使用
pub const DEFAULT_IMPORT_TITLE: &str = "Imported Test";

/// 草稿试卷及解析告警
#[derive(Debug, Clone, Serialize)]
pub struct DraftTest {
    pub test: Test,
    pub warnings: Vec<String>,
    pub skipped: usize,
}

/// 生成的相似题
#[derive(Debug, Clone, Serialize)]
pub struct SimilarQuestions {
    pub questions: Vec<Question>,
    pub warnings: Vec<String>,
    pub skipped: usize,
}

pub struct TestPipeline {
    client: GenerationClient,
    parser: QuestionParser,
}

impl TestPipeline {
    pub fn new(client: GenerationClient, parser: QuestionParser) -> Self {
        Self { client, parser }
    }

    /// 按考试名称 / 主题生成整套试卷
    pub async fn from_topic(&self, request: &TopicRequest) -> Result<DraftTest> {
        let prompt = MockTestPrompt::for_topic(request)?;
        let raw = self.client.generate(&prompt).await?;
        let parsed = self.parser.parse_model_output(&raw, request.language)?;

        let fallback_title = format!("{} Mock Test", request.topic.trim());
        let draft = into_draft(
            parsed,
            None,
            &fallback_title,
            request.duration_minutes,
            request.language,
            SourceMode::AiTopic,
        );
        info!(
            "Generated draft '{}' for topic '{}' ({} questions, {} skipped)",
            draft.test.title,
            request.topic.trim(),
            draft.test.questions.len(),
            draft.skipped
        );
        Ok(draft)
    }

    /// 从粘贴的文本导入试卷
    ///
    /// `ai_assist` 为 false 时只在本地解析，不调用生成接口
    pub async fn from_text(
        &self,
        text: &str,
        language: LanguageMode,
        ai_assist: bool,
        title: Option<&str>,
    ) -> Result<DraftTest> {
        let parsed = if ai_assist {
            let prompt = MockTestPrompt::for_text_import(text, language)?;
            let raw = self.client.generate(&prompt).await?;
            self.parser.parse_model_output(&raw, language)?
        } else {
            self.parser.parse_source_text(text, language)?
        };

        let draft = into_draft(
            parsed,
            title,
            DEFAULT_IMPORT_TITLE,
            None,
            language,
            SourceMode::TextImport,
        );
        info!(
            "Imported draft '{}' (ai_assist={}, {} questions, {} skipped)",
            draft.test.title,
            ai_assist,
            draft.test.questions.len(),
            draft.skipped
        );
        Ok(draft)
    }

    /// 生成与给定题目数量相同的相似题
    pub async fn similar(
        &self,
        questions: &[Question],
        language: LanguageMode,
    ) -> Result<SimilarQuestions> {
        let prompt = MockTestPrompt::for_similar(questions, language)?;
        let raw = self.client.generate(&prompt).await?;
        let parsed = self.parser.parse_model_output(&raw, language)?;

        if parsed.questions.len() != questions.len() {
            warn!(
                "Requested {} similar questions, model returned {}",
                questions.len(),
                parsed.questions.len()
            );
        }

        Ok(SimilarQuestions {
            questions: parsed.questions,
            warnings: parsed.warnings,
            skipped: parsed.skipped,
        })
    }
}

/// 标题优先级：调用方指定 > 模型给出 > 默认值；时长同理
fn into_draft(
    parsed: ParsedQuestions,
    title: Option<&str>,
    fallback_title: &str,
    duration_minutes: Option<u32>,
    language: LanguageMode,
    source_mode: SourceMode,
) -> DraftTest {
    let title = title
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .or(parsed.title)
        .unwrap_or_else(|| fallback_title.to_string());

    let mut test = Test::draft(title, language, source_mode, parsed.questions);
    test.duration_minutes = duration_minutes.or(parsed.duration_minutes);

    DraftTest {
        test,
        warnings: parsed.warnings,
        skipped: parsed.skipped,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{GenerationError, MockTestError};
    use crate::services::client::tests::{gemini_text_response, spawn_fake_gemini, test_config};
    use crate::services::parser::MalformedPolicy;
    use axum::http::StatusCode;
    use serde_json::json;

    const MODEL_OUTPUT: &str = "DURATION: 15\n\
=== QUESTION 1 ===\n\
EN: 2 + 2 = ?\n\
HI: 2 + 2 = ?\n\
A) 3 | तीन\n\
B) 4 | चार\n\
ANSWER: B\n\
=== QUESTION 2 ===\n\
EN: Largest ocean?\n\
HI: सबसे बड़ा महासागर?\n\
A) Pacific | प्रशांत\n\
B) Atlantic | अटलांटिक\n\
ANSWER: A\n";

    async fn pipeline_with(status: StatusCode, body: serde_json::Value) -> TestPipeline {
        let url = spawn_fake_gemini(status, body).await;
        let client = GenerationClient::new(test_config(url)).unwrap();
        TestPipeline::new(client, QuestionParser::new())
    }

    #[tokio::test]
    async fn test_from_topic_builds_draft() {
        let pipeline = pipeline_with(StatusCode::OK, gemini_text_response(MODEL_OUTPUT)).await;

        let draft = pipeline
            .from_topic(&TopicRequest::new("Basic GK"))
            .await
            .unwrap();
        assert_eq!(draft.test.title, "Basic GK Mock Test");
        assert_eq!(draft.test.duration_minutes, Some(15));
        assert_eq!(draft.test.source_mode, SourceMode::AiTopic);
        assert!(draft.test.id.is_empty());
        assert_eq!(draft.test.questions.len(), 2);
        assert_eq!(draft.test.questions[0].correct_option_index, 1);
        assert!(draft.test.validate().is_ok());
    }

    #[tokio::test]
    async fn test_requested_duration_wins() {
        let pipeline = pipeline_with(StatusCode::OK, gemini_text_response(MODEL_OUTPUT)).await;
        let mut request = TopicRequest::new("Basic GK");
        request.duration_minutes = Some(45);

        let draft = pipeline.from_topic(&request).await.unwrap();
        assert_eq!(draft.test.duration_minutes, Some(45));
    }

    #[tokio::test]
    async fn test_failing_endpoint_is_generation_failure() {
        let pipeline = pipeline_with(
            StatusCode::SERVICE_UNAVAILABLE,
            json!({"error": {"message": "overloaded"}}),
        )
        .await;

        let err = pipeline
            .from_topic(&TopicRequest::new("Basic GK"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            MockTestError::Generation(GenerationError::Status { status: 503, .. })
        ));
    }

    #[tokio::test]
    async fn test_unparseable_output_is_parse_failure() {
        let pipeline = pipeline_with(
            StatusCode::OK,
            gemini_text_response("Sorry, I cannot help with that."),
        )
        .await;

        let err = pipeline
            .from_topic(&TopicRequest::new("Basic GK"))
            .await
            .unwrap_err();
        assert!(matches!(err, MockTestError::Parse(_)));
    }

    #[tokio::test]
    async fn test_from_text_with_ai_assist_uses_given_title() {
        let pipeline = pipeline_with(StatusCode::OK, gemini_text_response(MODEL_OUTPUT)).await;

        let draft = pipeline
            .from_text("1. 2+2?\nA) 3\nB) 4 ⭕", LanguageMode::Bilingual, true, Some("My Paper"))
            .await
            .unwrap();
        assert_eq!(draft.test.title, "My Paper");
        assert_eq!(draft.test.source_mode, SourceMode::TextImport);
        assert_eq!(draft.test.questions.len(), 2);
    }

    #[tokio::test]
    async fn test_from_text_local_parse_skips_network() {
        // 未配置 key，若访问网络会返回 MissingApiKey
        let client = GenerationClient::new(Default::default()).unwrap();
        let pipeline = TestPipeline::new(client, QuestionParser::with_policy(MalformedPolicy::Skip));

        let text = "1. Capital of France?\nA) Paris *\nB) Rome\n2. 5 x 5?\nA) 10\nB) 25\nAnswer: B";
        let draft = pipeline
            .from_text(text, LanguageMode::English, false, None)
            .await
            .unwrap();
        assert_eq!(draft.test.title, DEFAULT_IMPORT_TITLE);
        assert_eq!(draft.test.questions.len(), 2);
        assert_eq!(draft.test.questions[0].correct_option_index, 0);
        assert_eq!(draft.test.questions[1].correct_option_index, 1);
    }

    #[tokio::test]
    async fn test_similar_questions() {
        let pipeline = pipeline_with(StatusCode::OK, gemini_text_response(MODEL_OUTPUT)).await;
        let seed = Question {
            id: "q1".to_string(),
            text_en: "3 + 3 = ?".to_string(),
            text_hi: Some("3 + 3 = ?".to_string()),
            options_en: vec!["6".into(), "7".into()],
            options_hi: vec!["छह".into(), "सात".into()],
            correct_option_index: 0,
            explanation: None,
        };

        let similar = pipeline
            .similar(&[seed], LanguageMode::Bilingual)
            .await
            .unwrap();
        assert_eq!(similar.questions.len(), 2);
        assert_eq!(similar.skipped, 0);
    }
}
