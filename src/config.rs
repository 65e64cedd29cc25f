//! 服务配置
//! 默认值 + 环境变量覆盖（支持 .env 文件）

use anyhow::{Context, Result};
use std::net::IpAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::services::parser::MalformedPolicy;
use crate::utils;

/// Gemini 接口默认地址
pub const DEFAULT_API_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
/// 默认模型
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";

/// HTTP 服务配置
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: IpAddr,
    pub port: u16,
    pub static_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::from([127, 0, 0, 1]),
            port: 8000,
            static_dir: PathBuf::from("static"),
        }
    }
}

/// 生成接口配置
#[derive(Debug, Clone)]
pub struct GenerationConfig {
    pub api_key: String,
    pub api_url: String,
    pub model: String,
    pub timeout_secs: u64,
    pub temperature: f32,
}

impl GenerationConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_url: DEFAULT_API_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            timeout_secs: 30,
            temperature: 0.7,
        }
    }
}

/// 应用配置
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub db_file: PathBuf,
    pub generation: GenerationConfig,
    pub parse_policy: MalformedPolicy,
    pub log_level: log::LevelFilter,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            db_file: utils::get_default_db_path(),
            generation: GenerationConfig::default(),
            parse_policy: MalformedPolicy::default(),
            log_level: log::LevelFilter::Info,
        }
    }
}

impl AppConfig {
    /// 读取 .env 与进程环境变量
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 从任意键值来源构建配置
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(host) = get("MOCKTEST_HOST") {
            config.server.host = parse_value("MOCKTEST_HOST", &host)?;
        }
        if let Some(port) = get("MOCKTEST_PORT") {
            config.server.port = parse_value("MOCKTEST_PORT", &port)?;
        }
        if let Some(dir) = get("MOCKTEST_STATIC_DIR") {
            config.server.static_dir = PathBuf::from(dir);
        }
        if let Some(path) = get("MOCKTEST_DB_FILE") {
            config.db_file = PathBuf::from(path);
        }

        if let Some(key) = get("GEMINI_API_KEY").or_else(|| get("MOCKTEST_API_KEY")) {
            config.generation.api_key = key;
        }
        if let Some(url) = get("MOCKTEST_API_URL") {
            config.generation.api_url = url.trim_end_matches('/').to_string();
        }
        if let Some(model) = get("MOCKTEST_MODEL") {
            config.generation.model = model;
        }
        if let Some(secs) = get("MOCKTEST_TIMEOUT_SECS") {
            config.generation.timeout_secs = parse_value("MOCKTEST_TIMEOUT_SECS", &secs)?;
        }
        if let Some(temp) = get("MOCKTEST_TEMPERATURE") {
            config.generation.temperature = parse_value("MOCKTEST_TEMPERATURE", &temp)?;
        }

        if let Some(policy) = get("MOCKTEST_PARSE_POLICY") {
            config.parse_policy = parse_value("MOCKTEST_PARSE_POLICY", &policy)?;
        }
        if let Some(level) = get("MOCKTEST_LOG") {
            config.log_level = parse_value("MOCKTEST_LOG", &level)?;
        }

        Ok(config)
    }
}

fn parse_value<T>(key: &str, value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value
        .parse::<T>()
        .with_context(|| format!("invalid value for {}: '{}'", key, value))
}
