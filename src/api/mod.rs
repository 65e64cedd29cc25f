//! HTTP 接口层
//! 路由只做参数提取和结果序列化，业务都在 services 中。

mod collection;
mod error;
mod generate;

use axum::routing::{get, post};
use axum::Router;
use log::{info, warn};
use std::path::Path;
use std::sync::Arc;
use tower_http::services::ServeDir;

use crate::services::{TestPipeline, TestStore};

pub use generate::{GenerateRequest, GenerateResponse, SimilarRequest};

/// 各处理函数共享的状态
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn TestStore>,
    pub pipeline: Arc<TestPipeline>,
}

impl AppState {
    pub fn new(store: impl TestStore + 'static, pipeline: TestPipeline) -> Self {
        Self {
            store: Arc::new(store),
            pipeline: Arc::new(pipeline),
        }
    }
}

/// 构建路由；`static_dir` 存在时作为前端静态资源目录
pub fn create_router(state: AppState, static_dir: impl AsRef<Path>) -> Router {
    let api = Router::new()
        .route(
            "/tests",
            get(collection::list_tests).post(collection::save_test),
        )
        .route(
            "/tests/:id",
            get(collection::get_test).delete(collection::delete_test),
        )
        .route("/tests/:id/submit", post(collection::submit_test))
        .route("/generate", post(generate::generate))
        .route("/generate-similar", post(generate::generate_similar))
        .route("/health", get(generate::health));

    let router = Router::new().nest("/api", api);

    let static_dir = static_dir.as_ref();
    let router = if static_dir.is_dir() {
        info!("Serving static files from {}", static_dir.display());
        router.fallback_service(ServeDir::new(static_dir))
    } else {
        warn!(
            "Static directory {} not found, serving API only",
            static_dir.display()
        );
        router
    };

    router.with_state(state)
}
