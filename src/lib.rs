//! 双语（英语 / 印地语）模拟考试生成服务

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod services;
pub mod utils;

pub use error::{GenerationError, MockTestError, Result};
