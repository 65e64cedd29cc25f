//! 错误类型
//! 生成、解析、查找、校验、存储五类失败

use std::time::Duration;
use thiserror::Error;

pub type Result<T, E = MockTestError> = std::result::Result<T, E>;

#[derive(Error, Debug)]
pub enum MockTestError {
    #[error("generation failed: {0}")]
    Generation(#[from] GenerationError),

    #[error("could not parse questions: {0}")]
    Parse(String),

    #[error("test '{0}' not found")]
    NotFound(String),

    #[error("invalid test: {0}")]
    Validation(String),

    #[error("storage error: {0}")]
    Storage(#[from] std::io::Error),

    #[error("malformed test collection: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// 调用外部生成接口的失败原因
#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("API key is not configured")]
    MissingApiKey,

    #[error("request timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("request failed: {0}")]
    Request(#[source] reqwest::Error),

    #[error("API returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("request blocked by API: {0}")]
    Blocked(String),

    #[error("invalid response body: {0}")]
    InvalidBody(String),

    #[error("API returned an empty response")]
    EmptyResponse,
}
