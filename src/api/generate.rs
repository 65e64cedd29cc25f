// 生成接口：主题生成、文本导入、手动录入，以及相似题

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use log::info;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::AppState;
use crate::error::Result;
use crate::models::{LanguageMode, Question, QuestionInput, SourceMode, Test, TestInput};
use crate::services::{DraftTest, SimilarQuestions, TopicRequest, FORMAT_VERSION};

/// 生成请求，按 `mode` 区分来源
#[derive(Debug, Deserialize)]
#[serde(tag = "mode", rename_all = "kebab-case")]
pub enum GenerateRequest {
    AiTopic {
        topic: String,
        #[serde(default)]
        question_count: Option<u32>,
        #[serde(default)]
        duration_minutes: Option<u32>,
        #[serde(default)]
        language: LanguageMode,
        #[serde(default)]
        save: bool,
    },
    TextImport {
        text: String,
        #[serde(default)]
        language: LanguageMode,
        #[serde(default = "default_ai_assist")]
        ai_assist: bool,
        #[serde(default)]
        title: Option<String>,
        #[serde(default)]
        save: bool,
    },
    Manual {
        #[serde(default)]
        title: Option<String>,
        #[serde(default)]
        duration_minutes: Option<u32>,
        #[serde(default)]
        language: LanguageMode,
        #[serde(default)]
        questions: Vec<QuestionInput>,
        #[serde(default)]
        save: bool,
    },
}

fn default_ai_assist() -> bool {
    true
}

#[derive(Debug, Serialize)]
pub struct GenerateResponse {
    pub test: Test,
    pub warnings: Vec<String>,
    pub skipped: usize,
    pub saved: bool,
}

#[derive(Debug, Deserialize)]
pub struct SimilarRequest {
    pub questions: Vec<Question>,
    #[serde(default)]
    pub language: LanguageMode,
}

/// 生成草稿试卷，`save` 为 true 时一并保存
pub(crate) async fn generate(
    State(state): State<AppState>,
    payload: std::result::Result<Json<GenerateRequest>, JsonRejection>,
) -> Result<Json<GenerateResponse>> {
    let Json(request) = payload?;
    let (draft, save) = match request {
        GenerateRequest::AiTopic {
            topic,
            question_count,
            duration_minutes,
            language,
            save,
        } => {
            let request = TopicRequest {
                topic,
                question_count,
                duration_minutes,
                language,
            };
            (state.pipeline.from_topic(&request).await?, save)
        }
        GenerateRequest::TextImport {
            text,
            language,
            ai_assist,
            title,
            save,
        } => {
            let draft = state
                .pipeline
                .from_text(&text, language, ai_assist, title.as_deref())
                .await?;
            (draft, save)
        }
        GenerateRequest::Manual {
            title,
            duration_minutes,
            language,
            questions,
            save,
        } => {
            let input = TestInput {
                title,
                duration_minutes,
                language: Some(language),
                source_mode: Some(SourceMode::Manual),
                questions,
                ..Default::default()
            };
            let draft = DraftTest {
                test: input.into_test()?,
                warnings: Vec::new(),
                skipped: 0,
            };
            (draft, save)
        }
    };

    let test = if save {
        state.store.save(draft.test)?
    } else {
        draft.test
    };
    if !draft.warnings.is_empty() {
        info!(
            "Draft '{}' returned with {} parse warnings",
            test.title,
            draft.warnings.len()
        );
    }

    Ok(Json(GenerateResponse {
        test,
        warnings: draft.warnings,
        skipped: draft.skipped,
        saved: save,
    }))
}

pub(crate) async fn generate_similar(
    State(state): State<AppState>,
    payload: std::result::Result<Json<SimilarRequest>, JsonRejection>,
) -> Result<Json<SimilarQuestions>> {
    let Json(request) = payload?;
    let similar = state
        .pipeline
        .similar(&request.questions, request.language)
        .await?;
    Ok(Json(similar))
}

pub(crate) async fn health() -> Json<Value> {
    Json(json!({ "status": "ok", "format_version": FORMAT_VERSION }))
}
