use anyhow::Context;
use log::{info, warn};
use std::net::SocketAddr;

use mocktest::api::{create_router, AppState};
use mocktest::config::AppConfig;
use mocktest::services::{GenerationClient, JsonFileStore, QuestionParser, TestPipeline};
use mocktest::utils::init_logging;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env()?;
    init_logging(config.log_level).context("failed to initialise logging")?;

    if config.generation.api_key.trim().is_empty() {
        warn!("No API key configured, AI generation requests will fail");
    }

    // 初始化存储与生成流水线
    let store = JsonFileStore::new(&config.db_file)
        .with_context(|| format!("failed to open {}", config.db_file.display()))?;
    info!("Using test collection at {}", store.path().display());

    let client = GenerationClient::new(config.generation.clone())
        .context("failed to build generation client")?;
    let pipeline = TestPipeline::new(client, QuestionParser::with_policy(config.parse_policy));

    let app = create_router(AppState::new(store, pipeline), &config.server.static_dir);

    let addr = SocketAddr::new(config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("Server running on: http://{}", listener.local_addr()?);

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
