//! 题目解析引擎
//! 把模型输出（约定分隔格式或 JSON）以及用户粘贴的试卷文本转换为结构化题目。
//! 分隔格式是带版本号的约定，只在本模块内定义和解析。

use log::warn;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;
use thiserror::Error;

use crate::error::{MockTestError, Result};
use crate::models::{option_letter, positional_id, LanguageMode, Question, MAX_OPTIONS};

/// 分隔格式版本
pub const FORMAT_VERSION: u32 = 1;

/// 格式错误题块的处理策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MalformedPolicy {
    /// 跳过并记录警告
    #[default]
    Skip,
    /// 任一题块出错则整批失败
    Strict,
}

#[derive(Debug, Error)]
#[error("unknown parse policy '{0}', expected 'skip' or 'strict'")]
pub struct UnknownPolicy(String);

impl FromStr for MalformedPolicy {
    type Err = UnknownPolicy;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "skip" => Ok(MalformedPolicy::Skip),
            "strict" => Ok(MalformedPolicy::Strict),
            other => Err(UnknownPolicy(other.to_string())),
        }
    }
}

/// 解析结果
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct ParsedQuestions {
    pub title: Option<String>,
    pub duration_minutes: Option<u32>,
    pub questions: Vec<Question>,
    pub warnings: Vec<String>,
    pub skipped: usize,
}

/// 解析过程中的题块草稿
#[derive(Debug, Default)]
struct QuestionDraft {
    stem_en: String,
    stem_hi: String,
    /// (英文, 印地语)
    options: Vec<(String, Option<String>)>,
    /// 源文本中用 ⭕ / * 标记的选项
    marked: Vec<usize>,
    answer: Option<usize>,
    answer_raw: Option<String>,
    explanation: String,
    /// 条目本身无法识别（如 JSON 字段类型错误）
    error: Option<String>,
}

/// 续行追加到哪个字段
#[derive(Debug, Clone, Copy, PartialEq)]
enum Field {
    StemEn,
    StemHi,
    Option(usize),
    Explanation,
    None,
}

impl QuestionDraft {
    fn append(&mut self, field: Field, text: &str) {
        let target = match field {
            Field::StemEn => &mut self.stem_en,
            Field::StemHi => &mut self.stem_hi,
            Field::Explanation => &mut self.explanation,
            Field::Option(index) => match self.options.get_mut(index) {
                Some((en, _)) => en,
                None => return,
            },
            Field::None => return,
        };
        if !target.is_empty() {
            target.push(' ');
        }
        target.push_str(text.trim());
    }

    fn is_blank(&self) -> bool {
        self.stem_en.trim().is_empty()
            && self.stem_hi.trim().is_empty()
            && self.options.is_empty()
            && self.answer_raw.is_none()
            && self.error.is_none()
    }

    /// 生成题目，`index` 是该题在输出中的位置
    fn finish(self, index: usize, language: LanguageMode) -> std::result::Result<Question, String> {
        if let Some(error) = self.error {
            return Err(error);
        }
        let (text_en, text_hi) = if self.stem_hi.trim().is_empty() {
            split_bilingual(&self.stem_en)
        } else {
            (self.stem_en.trim().to_string(), Some(self.stem_hi.trim().to_string()))
        };

        if self.options.len() > MAX_OPTIONS {
            return Err(format!(
                "expected at most {} options, found {}",
                MAX_OPTIONS,
                self.options.len()
            ));
        }

        let correct_option_index = match (self.answer, self.answer_raw.as_deref()) {
            (Some(answer), _) => answer,
            (None, Some(raw)) => return Err(format!("unrecognised answer '{}'", raw)),
            (None, None) => match self.marked.as_slice() {
                [single] => *single,
                [] => return Err("correct answer is missing".to_string()),
                _ => return Err("more than one option is marked correct".to_string()),
            },
        };

        let mut options_en = Vec::with_capacity(self.options.len());
        let mut options_hi = Vec::with_capacity(self.options.len());
        for (en, hi) in self.options {
            let (en, hi) = match hi {
                Some(hi) => (en.trim().to_string(), Some(hi)),
                None => split_bilingual(&en),
            };
            options_en.push(en);
            options_hi.push(hi);
        }
        let options_hi = if options_hi.iter().all(Option::is_none) {
            Vec::new()
        } else {
            options_hi.into_iter().map(Option::unwrap_or_default).collect()
        };

        let explanation = self.explanation.trim();
        let question = Question {
            id: positional_id(index),
            text_en,
            text_hi,
            options_en,
            options_hi,
            correct_option_index,
            explanation: (!explanation.is_empty()).then(|| explanation.to_string()),
        };
        question.check(language)?;
        Ok(question)
    }
}

/// 编译好的匹配模式
#[derive(Debug)]
struct Patterns {
    question_header: Regex,
    block_end: Regex,
    label: Regex,
    option: Regex,
    initials: Regex,
    source_number: Regex,
    source_answer: Regex,
    source_explanation: Regex,
    answer_value: Regex,
    leading_number: Regex,
}

impl Patterns {
    fn new() -> Self {
        Self {
            question_header: Regex::new(r"(?i)^[#=\-\s]*question(?:\s*#?\s*\d+)?[\s=\-:]*$").unwrap(),
            block_end: Regex::new(r"(?i)^[#=\-\s]*end(?:\s+(?:of\s+)?question)?[\s=\-]*$").unwrap(),
            label: Regex::new(r"(?i)^(title|duration|en|hi|answer|explanation)\s*[:：]\s*(.*)$").unwrap(),
            option: Regex::new(r"^\(?([A-Fa-f])\s*(\.\s|[\):：])\s*(.*)$").unwrap(),
            initials: Regex::new(r"^[A-Za-z]\.\s").unwrap(),
            source_number: Regex::new(r"(?i)^(?:q(?:uestion)?\s*\.?\s*)?(\d{1,3})\s*[.)．:：]\s*(.*)$").unwrap(),
            source_answer: Regex::new(r"(?i)^(?:correct\s+answer|correct\s+option|answer|ans|उत्तर)\s*[:：.\-]\s*(.+)$").unwrap(),
            source_explanation: Regex::new(r"(?i)^(?:explanation|solution|व्याख्या|हल)\s*[:：\-]\s*(.*)$").unwrap(),
            answer_value: Regex::new(r"(?i)^(?:option\s*)?\(?([a-f]|[1-6])\b").unwrap(),
            leading_number: Regex::new(r"\d+").unwrap(),
        }
    }
}

/// 题目解析器
#[derive(Debug)]
pub struct QuestionParser {
    policy: MalformedPolicy,
    patterns: Patterns,
}

impl QuestionParser {
    pub fn new() -> Self {
        Self::with_policy(MalformedPolicy::default())
    }

    pub fn with_policy(policy: MalformedPolicy) -> Self {
        Self {
            policy,
            patterns: Patterns::new(),
        }
    }

    pub fn policy(&self) -> MalformedPolicy {
        self.policy
    }

    /// 解析模型输出：JSON 走结构化路径，其余按分隔格式解析
    pub fn parse_model_output(&self, raw: &str, language: LanguageMode) -> Result<ParsedQuestions> {
        let body = strip_code_fence(raw);
        if body.is_empty() {
            return Err(MockTestError::Parse("response is empty".to_string()));
        }

        if body.starts_with('{') || body.starts_with('[') {
            return self.parse_json(body, language);
        }
        self.parse_delimited(body, language)
    }

    /// 解析用户粘贴的试卷文本（编号题干 + 字母选项）
    pub fn parse_source_text(&self, text: &str, language: LanguageMode) -> Result<ParsedQuestions> {
        let mut title = None;
        let mut drafts: Vec<QuestionDraft> = Vec::new();
        let mut current: Option<QuestionDraft> = None;
        let mut field = Field::None;

        for raw_line in text.lines() {
            let line = raw_line.trim();
            if line.is_empty() {
                continue;
            }

            if let Some(caps) = self.patterns.source_number.captures(line) {
                // 出现选项之前的编号行是题干里的陈述句，不开新题
                let starts_question = current
                    .as_ref()
                    .map_or(true, |d| !d.options.is_empty() || d.answer_raw.is_some());
                if starts_question {
                    if let Some(done) = current.take() {
                        drafts.push(done);
                    }
                    let mut draft = QuestionDraft::default();
                    draft.append(Field::StemEn, &caps[2]);
                    current = Some(draft);
                    field = Field::StemEn;
                    continue;
                }
            }

            let Some(draft) = current.as_mut() else {
                if let Some(caps) = self.patterns.label.captures(line) {
                    if caps[1].eq_ignore_ascii_case("title") {
                        title = non_empty(&caps[2]);
                    }
                }
                continue;
            };

            if let Some(caps) = self.patterns.source_answer.captures(line) {
                let value = caps[1].trim().to_string();
                draft.answer = self.parse_answer(&value);
                draft.answer_raw = Some(value);
                field = Field::None;
                continue;
            }
            if let Some(caps) = self.patterns.source_explanation.captures(line) {
                draft.append(Field::Explanation, &caps[1]);
                field = Field::Explanation;
                continue;
            }

            let (line, leading_mark) = strip_leading_marker(line);
            if let Some(body) = self.option_body(line, draft, field) {
                let (text, trailing_mark) = strip_correct_marker(body);
                let index = draft.options.len();
                if leading_mark || trailing_mark {
                    draft.marked.push(index);
                }
                let (en, hi) = split_pipe(&text);
                draft.options.push((en, hi));
                field = Field::Option(index);
                continue;
            }

            // 题干下方单独一行的印地语译文
            if field == Field::StemEn && draft.stem_hi.is_empty() && is_mostly_devanagari(line) {
                draft.append(Field::StemHi, line);
                field = Field::StemHi;
                continue;
            }
            draft.append(field, line);
        }
        if let Some(done) = current.take() {
            drafts.push(done);
        }

        let mut parsed = self.collect(drafts, language)?;
        parsed.title = title;
        Ok(parsed)
    }

    // ==================== 分隔格式 ====================

    fn parse_delimited(&self, body: &str, language: LanguageMode) -> Result<ParsedQuestions> {
        let mut title = None;
        let mut duration_minutes = None;
        let mut drafts: Vec<QuestionDraft> = Vec::new();
        let mut current: Option<QuestionDraft> = None;
        let mut field = Field::None;

        for raw_line in body.lines() {
            let line = raw_line.trim().replace("**", "");
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            if self.patterns.question_header.is_match(line) {
                if let Some(done) = current.take() {
                    drafts.push(done);
                }
                current = Some(QuestionDraft::default());
                field = Field::StemEn;
                continue;
            }
            if self.patterns.block_end.is_match(line) {
                if let Some(done) = current.take() {
                    drafts.push(done);
                }
                field = Field::None;
                continue;
            }

            if let Some(caps) = self.patterns.label.captures(line) {
                let value = caps[2].trim();
                match caps[1].to_ascii_lowercase().as_str() {
                    "title" => {
                        title = title.or_else(|| non_empty(value));
                        continue;
                    }
                    "duration" => {
                        duration_minutes = duration_minutes.or_else(|| {
                            self.patterns
                                .leading_number
                                .find(value)
                                .and_then(|m| m.as_str().parse::<u32>().ok())
                                .filter(|d| *d >= 1)
                        });
                        continue;
                    }
                    _ => {}
                }

                let Some(draft) = current.as_mut() else {
                    continue;
                };
                match caps[1].to_ascii_lowercase().as_str() {
                    "en" => {
                        draft.append(Field::StemEn, value);
                        field = Field::StemEn;
                    }
                    "hi" => {
                        draft.append(Field::StemHi, value);
                        field = Field::StemHi;
                    }
                    "answer" => {
                        draft.answer = self.parse_answer(value);
                        draft.answer_raw = Some(value.to_string());
                        field = Field::None;
                    }
                    _ => {
                        draft.append(Field::Explanation, value);
                        field = Field::Explanation;
                    }
                }
                continue;
            }

            let Some(draft) = current.as_mut() else {
                continue;
            };
            if let Some(body) = self.option_body(line, draft, field) {
                let index = draft.options.len();
                draft.options.push(split_pipe(body));
                field = Field::Option(index);
                continue;
            }
            draft.append(field, line);
        }
        if let Some(done) = current.take() {
            drafts.push(done);
        }

        if drafts.is_empty() {
            return Err(MockTestError::Parse(format!(
                "no question blocks found (expected format v{})",
                FORMAT_VERSION
            )));
        }

        let mut parsed = self.collect(drafts, language)?;
        parsed.title = title;
        parsed.duration_minutes = duration_minutes;
        Ok(parsed)
    }

    // ==================== JSON 格式 ====================

    fn parse_json(&self, body: &str, language: LanguageMode) -> Result<ParsedQuestions> {
        let value: Value = serde_json::from_str(body)
            .map_err(|e| MockTestError::Parse(format!("response is not valid JSON: {}", e)))?;

        let (title, duration_minutes, items) = match value {
            Value::Array(items) => (None, None, items),
            Value::Object(mut map) => {
                let title = map
                    .get("title")
                    .and_then(Value::as_str)
                    .and_then(non_empty);
                let duration = map
                    .get("duration")
                    .and_then(Value::as_f64)
                    .filter(|d| *d >= 1.0)
                    .map(|d| d.round() as u32);
                match map.remove("questions") {
                    Some(Value::Array(items)) => (title, duration, items),
                    _ => {
                        return Err(MockTestError::Parse(
                            "JSON response has no 'questions' array".to_string(),
                        ))
                    }
                }
            }
            _ => {
                return Err(MockTestError::Parse(
                    "JSON response must be an object or an array".to_string(),
                ))
            }
        };

        let drafts = items
            .into_iter()
            .map(|item| match serde_json::from_value::<JsonQuestion>(item) {
                Ok(question) => question.into_draft(),
                Err(e) => QuestionDraft {
                    error: Some(format!("invalid entry: {}", e)),
                    ..Default::default()
                },
            })
            .collect();

        let mut parsed = self.collect(drafts, language)?;
        parsed.title = title;
        parsed.duration_minutes = duration_minutes;
        Ok(parsed)
    }

    // ==================== 公共部分 ====================

    /// 按策略汇总题块
    fn collect(&self, drafts: Vec<QuestionDraft>, language: LanguageMode) -> Result<ParsedQuestions> {
        let mut parsed = ParsedQuestions::default();

        for (block, draft) in drafts.into_iter().enumerate() {
            if draft.is_blank() {
                continue;
            }
            match draft.finish(parsed.questions.len(), language) {
                Ok(question) => parsed.questions.push(question),
                Err(reason) => {
                    let message = format!("block {}: {}", block + 1, reason);
                    if self.policy == MalformedPolicy::Strict {
                        return Err(MockTestError::Parse(message));
                    }
                    warn!("Skipping malformed question {}", message);
                    parsed.warnings.push(message);
                    parsed.skipped += 1;
                }
            }
        }

        if parsed.questions.is_empty() {
            let detail = match parsed.warnings.first() {
                Some(first) => format!("no valid questions ({})", first),
                None => "no questions found".to_string(),
            };
            return Err(MockTestError::Parse(detail));
        }
        Ok(parsed)
    }

    /// 识别选项行，返回选项正文
    ///
    /// 字母须按 A、B、C 的顺序出现；`A. P. J. Abdul Kalam` 这类缩写开头的续行不算选项
    fn option_body<'a>(&self, line: &'a str, draft: &QuestionDraft, field: Field) -> Option<&'a str> {
        if field == Field::Explanation {
            return None;
        }
        let caps = self.patterns.option.captures(line)?;
        let letter = caps.get(1)?.as_str().chars().next()?.to_ascii_uppercase();
        if letter != option_letter(draft.options.len()) {
            return None;
        }
        let body = caps.get(3)?.as_str();
        if caps[2].starts_with('.') && self.patterns.initials.is_match(body) {
            return None;
        }
        Some(body)
    }

    fn parse_answer(&self, value: &str) -> Option<usize> {
        let caps = self.patterns.answer_value.captures(value.trim())?;
        let token = caps[1].chars().next()?;
        match token {
            '1'..='6' => token.to_digit(10).map(|d| d as usize - 1),
            _ => Some((token.to_ascii_uppercase() as u8 - b'A') as usize),
        }
    }
}

impl Default for QuestionParser {
    fn default() -> Self {
        Self::new()
    }
}

/// 模型 JSON 输出中的题目
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JsonQuestion {
    #[serde(alias = "question", alias = "text")]
    question_text: Option<String>,
    #[serde(default)]
    options: Vec<String>,
    #[serde(alias = "correctAnswer", alias = "answer")]
    correct_option_index: Option<f64>,
    explanation: Option<String>,
}

impl JsonQuestion {
    fn into_draft(self) -> QuestionDraft {
        let (answer, answer_raw) = match self.correct_option_index {
            Some(index) if index >= 0.0 && index.fract() == 0.0 => (Some(index as usize), None),
            Some(index) => (None, Some(index.to_string())),
            None => (None, None),
        };
        QuestionDraft {
            stem_en: self.question_text.unwrap_or_default(),
            options: self.options.into_iter().map(|o| (o, None)).collect(),
            answer,
            answer_raw,
            explanation: self.explanation.unwrap_or_default(),
            ..Default::default()
        }
    }
}

/// 给模型的输出格式说明
pub fn format_instructions(language: LanguageMode) -> String {
    let (hindi_stem, option_form, example_options) = if language.is_bilingual() {
        (
            "HI: <the same question translated to Hindi>\n",
            "<English option> | <Hindi option>",
            "A) Delhi | दिल्ली\nB) Mumbai | मुंबई\nC) Kolkata | कोलकाता\nD) Chennai | चेन्नई",
        )
    } else {
        ("", "<option>", "A) Delhi\nB) Mumbai\nC) Kolkata\nD) Chennai")
    };
    let example_hindi = if language.is_bilingual() {
        "HI: भारत की राजधानी क्या है?\n"
    } else {
        ""
    };

    format!(
        r#"## Output format (version {version})
Plain text only, no JSON, no markdown tables. Use exactly these labels:

TITLE: <test title>
DURATION: <minutes>
=== QUESTION 1 ===
EN: <question in English>
{hindi_stem}A) {option_form}
B) {option_form}
C) {option_form}
D) {option_form}
ANSWER: <letter of the single correct option>
EXPLANATION: <one or two sentences in English>

Start every question with its own "=== QUESTION n ===" line.

## Example
TITLE: General Knowledge Practice
DURATION: 10
=== QUESTION 1 ===
EN: What is the capital of India?
{example_hindi}{example_options}
ANSWER: A
EXPLANATION: New Delhi has been the capital of India since 1931."#,
        version = FORMAT_VERSION,
        hindi_stem = hindi_stem,
        option_form = option_form,
        example_hindi = example_hindi,
        example_options = example_options,
    )
}

/// 拆分 "English Text (हिन्दी टेक्स्ट)" 形式的双语文本
pub fn split_bilingual(text: &str) -> (String, Option<String>) {
    let trimmed = text.trim();
    if !trimmed.ends_with(')') {
        return (trimmed.to_string(), None);
    }

    let mut depth = 0usize;
    for (pos, ch) in trimmed.char_indices().rev() {
        match ch {
            ')' => depth += 1,
            '(' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    let inner = trimmed[pos + 1..trimmed.len() - 1].trim();
                    let outer = trimmed[..pos].trim();
                    if !outer.is_empty() && contains_devanagari(inner) {
                        return (outer.to_string(), Some(inner.to_string()));
                    }
                    break;
                }
            }
            _ => {}
        }
    }
    (trimmed.to_string(), None)
}

fn contains_devanagari(text: &str) -> bool {
    text.chars().any(is_devanagari)
}

fn is_devanagari(ch: char) -> bool {
    ('\u{0900}'..='\u{097F}').contains(&ch)
}

fn is_mostly_devanagari(text: &str) -> bool {
    let hindi = text.chars().filter(|c| is_devanagari(*c)).count();
    let latin = text.chars().filter(|c| c.is_ascii_alphabetic()).count();
    hindi > 0 && hindi > latin
}

/// "English | Hindi"
fn split_pipe(text: &str) -> (String, Option<String>) {
    match text.split_once('|') {
        Some((en, hi)) => (en.trim().to_string(), non_empty(hi)),
        None => (text.trim().to_string(), None),
    }
}

/// 去掉行首的 ⭕ / * 正确答案标记
fn strip_leading_marker(line: &str) -> (&str, bool) {
    for marker in ["⭕", "*"] {
        if let Some(rest) = line.strip_prefix(marker) {
            return (rest.trim_start(), true);
        }
    }
    (line, false)
}

/// 去掉选项文本中的 ⭕ / * 标记
fn strip_correct_marker(text: &str) -> (String, bool) {
    let trimmed = text.trim();
    if trimmed.contains('⭕') {
        return (trimmed.replace('⭕', "").trim().to_string(), true);
    }
    let stripped = trimmed.trim_matches('*').trim();
    (stripped.to_string(), stripped.len() != trimmed.len())
}

/// 去掉 ``` 代码块围栏
fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = match rest.find('\n') {
        Some(pos) => &rest[pos + 1..],
        None => rest,
    };
    rest.trim_end().trim_end_matches("```").trim()
}

fn non_empty(text: &str) -> Option<String> {
    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}
