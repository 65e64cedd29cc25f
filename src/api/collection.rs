// 试卷集合：增删查与交卷评分

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde_json::{json, Value};

use super::AppState;
use crate::error::Result;
use crate::models::{Test, TestInput, TestSummary};
use crate::services::{score_test, ScoreReport, Submission};

pub(crate) async fn list_tests(State(state): State<AppState>) -> Result<Json<Vec<TestSummary>>> {
    Ok(Json(state.store.list()?))
}

pub(crate) async fn get_test(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Test>> {
    Ok(Json(state.store.get(&id)?))
}

/// 保存试卷（手动录入或编辑后的草稿）
pub(crate) async fn save_test(
    State(state): State<AppState>,
    payload: std::result::Result<Json<TestInput>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>)> {
    let Json(input) = payload?;
    let saved = state.store.save(input.into_test()?)?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "status": "success", "test_id": saved.id })),
    ))
}

pub(crate) async fn delete_test(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>> {
    state.store.delete(&id)?;
    Ok(Json(json!({ "status": "success", "deleted_id": id })))
}

/// 交卷评分，结果不保存
pub(crate) async fn submit_test(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: std::result::Result<Json<Submission>, JsonRejection>,
) -> Result<Json<ScoreReport>> {
    let Json(submission) = payload?;
    let test = state.store.get(&id)?;
    Ok(Json(score_test(&test, &submission.answers)))
}
