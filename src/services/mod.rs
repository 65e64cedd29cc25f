// 服务模块
// 提供核心业务逻辑服务

pub mod client;
pub mod parser;
pub mod pipeline;
pub mod prompt;
pub mod scoring;
pub mod storage;

pub use client::GenerationClient;

pub use parser::{
    format_instructions,
    split_bilingual,
    MalformedPolicy,
    ParsedQuestions,
    QuestionParser,
    FORMAT_VERSION,
};

pub use pipeline::{DraftTest, SimilarQuestions, TestPipeline};

pub use prompt::{MockTestPrompt, TopicRequest, DEFAULT_QUESTION_COUNT, MAX_QUESTION_COUNT};

pub use scoring::{score_test, QuestionResult, ScoreReport, Submission};

pub use storage::{JsonFileStore, TestStore};
