//! 提示词工程
//! 按主题生成、文本导入、相似题生成三类提示词。输出格式说明统一取自解析器。

use serde::{Deserialize, Serialize};

use crate::error::{MockTestError, Result};
use crate::models::{LanguageMode, Question};
use crate::services::parser::format_instructions;

/// 默认题量
pub const DEFAULT_QUESTION_COUNT: u32 = 10;
/// 单次允许生成的最大题量
pub const MAX_QUESTION_COUNT: u32 = 100;

/// 按主题生成试卷的参数
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicRequest {
    pub topic: String,
    #[serde(default)]
    pub question_count: Option<u32>,
    #[serde(default)]
    pub duration_minutes: Option<u32>,
    #[serde(default)]
    pub language: LanguageMode,
}

impl TopicRequest {
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            question_count: None,
            duration_minutes: None,
            language: LanguageMode::default(),
        }
    }

    /// 校验后的题量
    pub fn question_count(&self) -> Result<u32> {
        let count = self.question_count.unwrap_or(DEFAULT_QUESTION_COUNT);
        if count == 0 || count > MAX_QUESTION_COUNT {
            return Err(MockTestError::Validation(format!(
                "question count must be between 1 and {}, got {}",
                MAX_QUESTION_COUNT, count
            )));
        }
        Ok(count)
    }
}

/// 模拟考试提示词
pub struct MockTestPrompt;

impl MockTestPrompt {
    /// 按考试名称 / 主题生成整套试卷
    pub fn for_topic(request: &TopicRequest) -> Result<String> {
        let topic = request.topic.trim();
        if topic.is_empty() {
            return Err(MockTestError::Validation("topic is empty".to_string()));
        }
        let count = request.question_count()?;

        let duration_instruction = match request.duration_minutes {
            Some(minutes) => format!("Set the test duration to exactly {} minutes.", minutes),
            None => "Choose a duration in minutes that matches the official time limit, scaled to the number of questions.".to_string(),
        };

        Ok(format!(
            r#"You are an expert exam paper creator. Generate a realistic mock test for the exam or topic below, following the real exam's pattern and difficulty as closely as possible.

## Exam / Topic:
{}

## Requirements:
1. Generate exactly {} multiple-choice questions, each with 4 options and exactly one correct option.
2. Write a relevant test title. {}
3. {}
4. Every question must have a complete question stem. Never put the options or the answer inside the stem.
5. DOUBLE-CHECK every answer: the letter after ANSWER must be the truly correct option.
6. Add a brief explanation in English of why the correct answer is correct.

{}

Generate the full mock test now."#,
            topic,
            count,
            duration_instruction,
            language_instruction(request.language),
            format_instructions(request.language)
        ))
    }

    /// 从用户粘贴的文本中提取题目
    pub fn for_text_import(text: &str, language: LanguageMode) -> Result<String> {
        if text.trim().is_empty() {
            return Err(MockTestError::Validation("import text is empty".to_string()));
        }

        Ok(format!(
            r#"You are an expert test creation and translation assistant. Extract the multiple-choice questions from the text below.

## Requirements:
1. Extract each question stem and its options. The correct option is marked with '⭕' or '*', or given on an answer line.
2. {}
3. Normalise every question to exactly 4 options and remove markers such as '(A)', '⭕' and '*' from option text.
4. Keep the questions in their original order. Do not invent questions that are not in the text.
5. If the text contains an explanation, keep it; otherwise write a brief one in English.

{}

## Text to parse:
---
{}
---"#,
            language_instruction(language),
            format_instructions(language),
            text.trim()
        ))
    }

    /// 生成与已有题目相似的新题
    pub fn for_similar(questions: &[Question], language: LanguageMode) -> Result<String> {
        if questions.is_empty() {
            return Err(MockTestError::Validation(
                "at least one example question is required".to_string(),
            ));
        }

        let examples = serde_json::to_string_pretty(questions)?;

        Ok(format!(
            r#"You are an expert question generator. Create new multiple-choice questions similar in topic, style and difficulty to the examples, but not identical to any of them.

## Existing Questions (for context):
{}

## Requirements:
1. Generate exactly {} new questions, each with 4 options and exactly one correct option.
2. {}
3. Add a brief explanation in English of why the correct answer is correct.

{}

Generate the new, similar questions now."#,
            examples,
            questions.len(),
            language_instruction(language),
            format_instructions(language)
        ))
    }
}

fn language_instruction(language: LanguageMode) -> &'static str {
    match language {
        LanguageMode::Bilingual => "Write every question and every option in English and give a high-quality Hindi translation of each on the HI line and after the '|' separator.",
        LanguageMode::English => "Write every question and option in English only.",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topic_prompt_contents() {
        let mut request = TopicRequest::new("SSC CGL Tier 1");
        request.question_count = Some(25);
        request.duration_minutes = Some(60);

        let prompt = MockTestPrompt::for_topic(&request).unwrap();
        assert!(prompt.contains("SSC CGL Tier 1"));
        assert!(prompt.contains("exactly 25 multiple-choice questions"));
        assert!(prompt.contains("exactly 60 minutes"));
        assert!(prompt.contains("Hindi"));
        assert!(prompt.contains("=== QUESTION 1 ==="));
    }

    #[test]
    fn test_topic_prompt_defaults() {
        let mut request = TopicRequest::new("Class 10 Science");
        request.language = LanguageMode::English;

        let prompt = MockTestPrompt::for_topic(&request).unwrap();
        assert!(prompt.contains(&format!("exactly {} multiple-choice", DEFAULT_QUESTION_COUNT)));
        assert!(prompt.contains("official time limit"));
        assert!(!prompt.contains("HI:"));
    }

    #[test]
    fn test_topic_prompt_is_deterministic() {
        let request = TopicRequest::new("NEET Biology");
        assert_eq!(
            MockTestPrompt::for_topic(&request).unwrap(),
            MockTestPrompt::for_topic(&request).unwrap()
        );
    }

    #[test]
    fn test_invalid_topic_requests() {
        assert!(MockTestPrompt::for_topic(&TopicRequest::new("   ")).is_err());

        let mut request = TopicRequest::new("JEE Main");
        request.question_count = Some(0);
        assert!(matches!(
            MockTestPrompt::for_topic(&request),
            Err(MockTestError::Validation(_))
        ));
        request.question_count = Some(MAX_QUESTION_COUNT + 1);
        assert!(MockTestPrompt::for_topic(&request).is_err());
    }

    #[test]
    fn test_text_import_prompt() {
        let prompt =
            MockTestPrompt::for_text_import("1. 2+2?\nA) 3\nB) 4 ⭕", LanguageMode::Bilingual)
                .unwrap();
        assert!(prompt.contains("B) 4 ⭕"));
        assert!(prompt.contains("'⭕' or '*'"));
        assert!(MockTestPrompt::for_text_import("  ", LanguageMode::English).is_err());
    }

    #[test]
    fn test_similar_prompt_embeds_examples() {
        let question = Question {
            id: "q1".to_string(),
            text_en: "Who discovered penicillin?".to_string(),
            text_hi: None,
            options_en: vec!["Fleming".into(), "Curie".into()],
            options_hi: vec![],
            correct_option_index: 0,
            explanation: None,
        };
        let prompt = MockTestPrompt::for_similar(&[question], LanguageMode::English).unwrap();
        assert!(prompt.contains("Who discovered penicillin?"));
        assert!(prompt.contains("exactly 1 new questions"));
        assert!(MockTestPrompt::for_similar(&[], LanguageMode::English).is_err());
    }
}
