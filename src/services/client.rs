//! 生成接口客户端
//! 调用 Gemini generateContent，返回模型输出的原始文本。单次请求，不重试。

use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::config::GenerationConfig;
use crate::error::{GenerationError, Result};

/// 错误信息中保留的响应体长度
const MAX_ERROR_BODY: usize = 500;

/// generateContent 请求
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationSettings,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: Vec<RequestPart<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationSettings {
    temperature: f32,
}

/// generateContent 响应
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

/// 生成接口客户端
#[derive(Clone)]
pub struct GenerationClient {
    config: GenerationConfig,
    http_client: reqwest::Client,
}

impl GenerationClient {
    pub fn new(config: GenerationConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(GenerationError::Request)?;

        Ok(Self {
            config,
            http_client,
        })
    }

    pub fn config(&self) -> &GenerationConfig {
        &self.config
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.config.api_url.trim_end_matches('/'),
            self.config.model
        )
    }

    /// 发送提示词并返回模型输出文本
    pub async fn generate(&self, prompt: &str) -> Result<String> {
        if self.config.api_key.trim().is_empty() {
            return Err(GenerationError::MissingApiKey.into());
        }

        let start_time = Instant::now();
        info!(
            "Sending generation request to {} ({} prompt chars)",
            self.config.model,
            prompt.chars().count()
        );

        let request = GenerateRequest {
            contents: vec![Content {
                parts: vec![RequestPart { text: prompt }],
            }],
            generation_config: GenerationSettings {
                temperature: self.config.temperature,
            },
        };

        let response = self
            .http_client
            .post(self.endpoint())
            .query(&[("key", self.config.api_key.as_str())])
            .json(&request)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| self.classify(e))?;
        if !status.is_success() {
            return Err(GenerationError::Status {
                status: status.as_u16(),
                body: truncate(&body, MAX_ERROR_BODY),
            }
            .into());
        }

        let text = extract_text(&body)?;
        info!(
            "Generation finished in {} ms ({} chars)",
            start_time.elapsed().as_millis(),
            text.chars().count()
        );
        debug!("Raw generation output: {}", text);
        Ok(text)
    }

    /// 请求 URL 带有 key 参数，错误信息里去掉 URL
    fn classify(&self, error: reqwest::Error) -> GenerationError {
        if error.is_timeout() {
            GenerationError::Timeout(self.config.timeout())
        } else {
            GenerationError::Request(error.without_url())
        }
    }
}

/// 从响应体中取出候选文本
fn extract_text(body: &str) -> Result<String, GenerationError> {
    let response: GenerateResponse = serde_json::from_str(body)
        .map_err(|e| GenerationError::InvalidBody(e.to_string()))?;

    if let Some(reason) = response.prompt_feedback.and_then(|f| f.block_reason) {
        return Err(GenerationError::Blocked(reason));
    }

    let text: String = response
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter_map(|part| part.text)
                .collect()
        })
        .unwrap_or_default();

    if text.trim().is_empty() {
        return Err(GenerationError::EmptyResponse);
    }
    Ok(text)
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((pos, _)) => format!("{}...", &text[..pos]),
        None => text.to_string(),
    }
}
