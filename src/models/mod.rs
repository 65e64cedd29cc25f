//! 数据模型
//! 题目、试卷、试卷摘要以及前端提交的宽松输入结构

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::{MockTestError, Result};

/// 每道题允许的最少选项数
pub const MIN_OPTIONS: usize = 2;
/// 每道题允许的最多选项数
pub const MAX_OPTIONS: usize = 6;

/// 语言模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LanguageMode {
    English,
    /// 英语 + 印地语
    #[default]
    Bilingual,
}

impl LanguageMode {
    pub fn is_bilingual(self) -> bool {
        self == LanguageMode::Bilingual
    }
}

/// 试卷来源
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceMode {
    AiTopic,
    TextImport,
    Manual,
}

/// 选择题
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    pub text_en: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_hi: Option<String>,
    pub options_en: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options_hi: Vec<String>,
    pub correct_option_index: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

impl Question {
    /// 检查单题的结构约束，返回不满足时的原因
    pub fn check(&self, language: LanguageMode) -> std::result::Result<(), String> {
        if self.text_en.trim().is_empty() {
            return Err("question text is empty".to_string());
        }

        let count = self.options_en.len();
        if !(MIN_OPTIONS..=MAX_OPTIONS).contains(&count) {
            return Err(format!(
                "expected {}-{} options, found {}",
                MIN_OPTIONS, MAX_OPTIONS, count
            ));
        }
        if let Some(pos) = self.options_en.iter().position(|o| o.trim().is_empty()) {
            return Err(format!("option {} is empty", option_letter(pos)));
        }
        if self.correct_option_index >= count {
            return Err(format!(
                "correct option index {} is out of range for {} options",
                self.correct_option_index, count
            ));
        }

        if language.is_bilingual() {
            let hindi_stem = self.text_hi.as_deref().unwrap_or("").trim();
            if hindi_stem.is_empty() {
                return Err("Hindi question text is missing".to_string());
            }
            if self.options_hi.len() != count {
                return Err(format!(
                    "expected {} Hindi options, found {}",
                    count,
                    self.options_hi.len()
                ));
            }
            if let Some(pos) = self.options_hi.iter().position(|o| o.trim().is_empty()) {
                return Err(format!("Hindi option {} is empty", option_letter(pos)));
            }
        } else if !self.options_hi.is_empty() && self.options_hi.len() != count {
            return Err(format!(
                "expected {} Hindi options, found {}",
                count,
                self.options_hi.len()
            ));
        }

        Ok(())
    }
}

/// 试卷
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Test {
    #[serde(default)]
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_minutes: Option<u32>,
    #[serde(default)]
    pub language: LanguageMode,
    pub source_mode: SourceMode,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    pub questions: Vec<Question>,
}

impl Test {
    /// 新建草稿试卷，id 留空由存储层分配
    pub fn draft(
        title: impl Into<String>,
        language: LanguageMode,
        source_mode: SourceMode,
        questions: Vec<Question>,
    ) -> Self {
        Self {
            id: String::new(),
            title: title.into(),
            duration_minutes: None,
            language,
            source_mode,
            created_at: Utc::now(),
            questions,
        }
    }

    /// 补齐缺失的题目 id（按位置编号 q1, q2, ...）
    pub fn fill_question_ids(&mut self) {
        for (index, question) in self.questions.iter_mut().enumerate() {
            if question.id.trim().is_empty() {
                question.id = positional_id(index);
            }
        }
    }

    /// 校验整张试卷
    pub fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(MockTestError::Validation("test title is empty".to_string()));
        }
        if self.questions.is_empty() {
            return Err(MockTestError::Validation(
                "test has no questions".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for (index, question) in self.questions.iter().enumerate() {
            question.check(self.language).map_err(|reason| {
                MockTestError::Validation(format!("question {}: {}", index + 1, reason))
            })?;
            if !seen.insert(question.id.as_str()) {
                return Err(MockTestError::Validation(format!(
                    "duplicate question id '{}'",
                    question.id
                )));
            }
        }

        Ok(())
    }

    pub fn summary(&self) -> TestSummary {
        TestSummary {
            id: self.id.clone(),
            title: self.title.clone(),
            created_at: self.created_at,
            question_count: self.questions.len(),
            source_mode: self.source_mode,
        }
    }
}

/// 试卷列表项
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestSummary {
    pub id: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub question_count: usize,
    pub source_mode: SourceMode,
}

// ==================== 前端输入 ====================

/// 手动录入的题目（所有字段可缺省，缺失项在校验阶段报错）
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QuestionInput {
    pub id: Option<String>,
    pub text_en: Option<String>,
    pub text_hi: Option<String>,
    pub options_en: Option<Vec<String>>,
    pub options_hi: Option<Vec<String>>,
    pub correct_option_index: Option<usize>,
    pub explanation: Option<String>,
}

impl QuestionInput {
    /// 转换为题目，`index` 从 0 开始，仅用于错误信息和默认 id
    pub fn into_question(self, index: usize, language: LanguageMode) -> Result<Question> {
        let number = index + 1;
        let invalid = |reason: &str| {
            MockTestError::Validation(format!("question {}: {}", number, reason))
        };

        let text_en = self
            .text_en
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| invalid("question text is missing"))?;
        let options_en = self
            .options_en
            .filter(|o| !o.is_empty())
            .ok_or_else(|| invalid("options are missing"))?;
        let correct_option_index = self
            .correct_option_index
            .ok_or_else(|| invalid("correct option index is missing"))?;

        let question = Question {
            id: self
                .id
                .filter(|id| !id.trim().is_empty())
                .unwrap_or_else(|| positional_id(index)),
            text_en: text_en.trim().to_string(),
            text_hi: self
                .text_hi
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty()),
            options_en: trim_all(options_en),
            options_hi: trim_all(self.options_hi.unwrap_or_default()),
            correct_option_index,
            explanation: self
                .explanation
                .map(|e| e.trim().to_string())
                .filter(|e| !e.is_empty()),
        };

        question.check(language).map_err(|reason| invalid(&reason))?;
        Ok(question)
    }
}

/// 保存试卷的请求体
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TestInput {
    pub id: Option<String>,
    pub title: Option<String>,
    pub duration_minutes: Option<u32>,
    pub language: Option<LanguageMode>,
    pub source_mode: Option<SourceMode>,
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub questions: Vec<QuestionInput>,
}

impl TestInput {
    pub fn into_test(self) -> Result<Test> {
        let language = self.language.unwrap_or_default();
        let title = self
            .title
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .ok_or_else(|| MockTestError::Validation("test title is missing".to_string()))?;

        let questions = self
            .questions
            .into_iter()
            .enumerate()
            .map(|(index, input)| input.into_question(index, language))
            .collect::<Result<Vec<_>>>()?;

        let test = Test {
            id: self.id.unwrap_or_default(),
            title,
            duration_minutes: self.duration_minutes,
            language,
            source_mode: self.source_mode.unwrap_or(SourceMode::Manual),
            created_at: self.created_at.unwrap_or_else(Utc::now),
            questions,
        };
        test.validate()?;
        Ok(test)
    }
}

/// 按位置生成题目 id
pub fn positional_id(index: usize) -> String {
    format!("q{}", index + 1)
}

/// 选项序号对应的字母（0 -> A）
pub fn option_letter(index: usize) -> char {
    (b'A' + (index % 26) as u8) as char
}

fn trim_all(values: Vec<String>) -> Vec<String> {
    values.into_iter().map(|v| v.trim().to_string()).collect()
}
