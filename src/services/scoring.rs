//! 评分
//! 按答案键逐题判分，计算百分制得分（两位小数）。每题只有一个正确选项，不设部分得分。

use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::models::Test;
use crate::utils::round2;

/// 提交的答案：题目 id -> 选项序号
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Submission {
    #[serde(default)]
    pub answers: HashMap<String, usize>,
}

/// 单题判分结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionResult {
    pub question_id: String,
    pub selected: Option<usize>,
    pub correct_option_index: usize,
    pub is_correct: bool,
    pub explanation: Option<String>,
}

/// 评分报告
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreReport {
    pub test_id: String,
    pub total: usize,
    pub answered: usize,
    pub correct: usize,
    /// 百分制，保留两位小数
    pub score: f64,
    pub results: Vec<QuestionResult>,
}

impl ScoreReport {
    pub fn correctness(&self) -> Vec<bool> {
        self.results.iter().map(|r| r.is_correct).collect()
    }
}

/// 对试卷评分。未作答或选项越界均按错误处理
pub fn score_test(test: &Test, answers: &HashMap<String, usize>) -> ScoreReport {
    let results: Vec<QuestionResult> = test
        .questions
        .iter()
        .map(|question| {
            let selected = answers.get(&question.id).copied();
            QuestionResult {
                question_id: question.id.clone(),
                selected,
                correct_option_index: question.correct_option_index,
                is_correct: selected == Some(question.correct_option_index),
                explanation: question.explanation.clone(),
            }
        })
        .collect();

    let unknown = answers
        .keys()
        .filter(|id| !test.questions.iter().any(|q| &q.id == *id))
        .count();
    if unknown > 0 {
        debug!(
            "Ignoring {} answers for unknown questions in test {}",
            unknown, test.id
        );
    }

    let total = results.len();
    let answered = results.iter().filter(|r| r.selected.is_some()).count();
    let correct = results.iter().filter(|r| r.is_correct).count();
    let score = if total > 0 {
        round2(correct as f64 / total as f64 * 100.0)
    } else {
        0.0
    };

    ScoreReport {
        test_id: test.id.clone(),
        total,
        answered,
        correct,
        score,
        results,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{LanguageMode, Question, SourceMode};

    fn question(id: &str, correct: usize, explanation: Option<&str>) -> Question {
        Question {
            id: id.to_string(),
            text_en: format!("Question {}", id),
            text_hi: None,
            options_en: vec!["a".into(), "b".into(), "c".into(), "d".into()],
            options_hi: vec![],
            correct_option_index: correct,
            explanation: explanation.map(str::to_string),
        }
    }

    fn two_question_test() -> Test {
        let mut test = Test::draft(
            "Scoring",
            LanguageMode::English,
            SourceMode::Manual,
            vec![question("q1", 0, Some("A is right")), question("q2", 1, Some("B is right"))],
        );
        test.id = "t1".to_string();
        test
    }

    fn answers(pairs: &[(&str, usize)]) -> HashMap<String, usize> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn test_half_correct() {
        let report = score_test(&two_question_test(), &answers(&[("q1", 0), ("q2", 2)]));

        assert_eq!(report.score, 50.00);
        assert_eq!(report.correctness(), vec![true, false]);
        assert_eq!(report.correct, 1);
        assert_eq!(report.answered, 2);
        // 解析无论对错都返回
        assert_eq!(report.results[1].explanation.as_deref(), Some("B is right"));
    }

    #[test]
    fn test_unanswered_and_unknown() {
        let report = score_test(&two_question_test(), &answers(&[("q2", 1), ("q9", 0)]));

        assert_eq!(report.answered, 1);
        assert_eq!(report.correctness(), vec![false, true]);
        assert_eq!(report.results[0].selected, None);
        assert_eq!(report.score, 50.0);
    }

    #[test]
    fn test_out_of_range_selection_is_incorrect() {
        let report = score_test(&two_question_test(), &answers(&[("q1", 17)]));
        assert!(!report.results[0].is_correct);
        assert_eq!(report.score, 0.0);
    }

    #[test]
    fn test_rounding_to_two_decimals() {
        let mut test = two_question_test();
        test.questions.push(question("q3", 2, None));
        let report = score_test(&test, &answers(&[("q1", 0), ("q2", 1)]));
        assert_eq!(report.score, 66.67);
    }

    #[test]
    fn test_deterministic() {
        let test = two_question_test();
        let submitted = answers(&[("q1", 0), ("q2", 2)]);
        assert_eq!(score_test(&test, &submitted), score_test(&test, &submitted));
    }

    #[test]
    fn test_bounds_and_monotonic() {
        let mut test = two_question_test();
        for i in 3..=7 {
            test.questions.push(question(&format!("q{}", i), 3, None));
        }

        let mut submitted = HashMap::new();
        let mut previous = score_test(&test, &submitted).score;
        assert_eq!(previous, 0.0);

        for question in &test.questions {
            submitted.insert(question.id.clone(), question.correct_option_index);
            let score = score_test(&test, &submitted).score;
            assert!((0.0..=100.0).contains(&score));
            assert!(score >= previous);
            previous = score;
        }
        assert_eq!(previous, 100.0);
    }

    #[test]
    fn test_empty_test_scores_zero() {
        let test = Test::draft("Empty", LanguageMode::English, SourceMode::Manual, vec![]);
        let report = score_test(&test, &HashMap::new());
        assert_eq!(report.total, 0);
        assert_eq!(report.score, 0.0);
    }
}
