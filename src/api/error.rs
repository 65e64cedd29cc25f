use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use log::{error, warn};
use serde::Serialize;

use crate::error::{GenerationError, MockTestError};

/// 错误响应体
#[derive(Debug, Serialize)]
struct ErrorBody {
    error: &'static str,
    detail: String,
}

impl MockTestError {
    /// 状态码与错误类别
    fn status_and_kind(&self) -> (StatusCode, &'static str) {
        match self {
            MockTestError::Generation(GenerationError::Timeout(_)) => {
                (StatusCode::GATEWAY_TIMEOUT, "generation_failure")
            }
            MockTestError::Generation(GenerationError::MissingApiKey) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "generation_failure")
            }
            MockTestError::Generation(_) => (StatusCode::BAD_GATEWAY, "generation_failure"),
            MockTestError::Parse(_) => (StatusCode::UNPROCESSABLE_ENTITY, "parse_failure"),
            MockTestError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            MockTestError::Validation(_) => (StatusCode::BAD_REQUEST, "validation_failure"),
            MockTestError::Storage(_) | MockTestError::Serialization(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "storage_failure")
            }
        }
    }
}

/// 请求体无法反序列化时按校验失败处理
impl From<JsonRejection> for MockTestError {
    fn from(rejection: JsonRejection) -> Self {
        MockTestError::Validation(rejection.body_text())
    }
}

impl IntoResponse for MockTestError {
    fn into_response(self) -> Response {
        let (status, kind) = self.status_and_kind();
        let detail = self.to_string();

        if status.is_server_error() {
            error!("Request failed ({}): {}", status.as_u16(), detail);
        } else {
            warn!("Request rejected ({}): {}", status.as_u16(), detail);
        }

        (status, Json(ErrorBody { error: kind, detail })).into_response()
    }
}
