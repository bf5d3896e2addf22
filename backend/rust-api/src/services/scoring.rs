//! Pure scoring engine: given question definitions and stored answers,
//! decide correctness and points. No side effects, deterministic — the
//! same inputs are scored at submission time and again for review
//! screens, and must agree.

use std::collections::HashMap;

use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;

use crate::models::attempt::Answer;
use crate::models::exam::{Question, QuestionKind};

lazy_static! {
    static ref WHITESPACE: Regex = Regex::new(r"\s+").unwrap();
}

/// Case-normalized comparison form for short-text and gap-fill answers:
/// trimmed, lowercased, inner whitespace collapsed. No fuzzy matching.
pub fn normalize_text(value: &str) -> String {
    WHITESPACE
        .replace_all(value.trim(), " ")
        .to_lowercase()
}

fn normalize_letter(value: &str) -> String {
    value.trim().to_uppercase()
}

/// What the grader expected, echoed into the review breakdown.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ExpectedAnswer {
    Boolean { value: bool },
    Choice { letter: String },
    AnyOf { accepted: Vec<String> },
    Gaps { fillers: Vec<String> },
    ManualReview,
}

#[derive(Debug, Clone, Serialize)]
pub struct QuestionResult {
    pub question_id: String,
    pub submitted: Option<Answer>,
    pub expected: ExpectedAnswer,
    pub correct: bool,
    pub points_awarded: i32,
    pub max_score: i32,
}

#[derive(Debug, Clone, Serialize)]
pub struct SectionScore {
    pub raw_score: i32,
    pub max_raw_score: i32,
    pub correct_count: u32,
    pub total_questions: u32,
    pub breakdown: Vec<QuestionResult>,
}

/// Score every auto-gradable question of a section against the stored
/// answer map. Free-response questions are skipped entirely — they carry
/// no key and are banded by a teacher instead.
pub fn score_section(questions: &[Question], answers: &HashMap<String, Answer>) -> SectionScore {
    let mut raw_score = 0;
    let mut max_raw_score = 0;
    let mut correct_count = 0;
    let mut total_questions = 0;
    let mut breakdown = Vec::new();

    for question in questions {
        if !question.kind.is_auto_gradable() {
            continue;
        }

        let submitted = answers.get(&question.id);
        let (correct, points_awarded, expected) = grade_question(question, submitted);

        raw_score += points_awarded;
        max_raw_score += question.max_score;
        total_questions += 1;
        if correct {
            correct_count += 1;
        }

        breakdown.push(QuestionResult {
            question_id: question.id.clone(),
            submitted: submitted.cloned(),
            expected,
            correct,
            points_awarded,
            max_score: question.max_score,
        });
    }

    SectionScore {
        raw_score,
        max_raw_score,
        correct_count,
        total_questions,
        breakdown,
    }
}

/// Grade one question. A missing or shape-mismatched answer scores zero.
fn grade_question(
    question: &Question,
    submitted: Option<&Answer>,
) -> (bool, i32, ExpectedAnswer) {
    match &question.kind {
        QuestionKind::TrueFalse { key, .. } => {
            let expected = ExpectedAnswer::Boolean { value: *key };
            let correct = matches!(submitted, Some(Answer::Boolean { value }) if value == key);
            (correct, if correct { question.max_score } else { 0 }, expected)
        }
        QuestionKind::SingleChoice { key, .. } => {
            let expected = ExpectedAnswer::Choice {
                letter: normalize_letter(key),
            };
            let correct = matches!(
                submitted,
                Some(Answer::Choice { letter }) if normalize_letter(letter) == normalize_letter(key)
            );
            (correct, if correct { question.max_score } else { 0 }, expected)
        }
        QuestionKind::ShortText { accepted, .. } => {
            let expected = ExpectedAnswer::AnyOf {
                accepted: accepted.clone(),
            };
            let correct = match submitted {
                Some(Answer::Text { value }) => {
                    let normalized = normalize_text(value);
                    accepted.iter().any(|a| normalize_text(a) == normalized)
                }
                _ => false,
            };
            (correct, if correct { question.max_score } else { 0 }, expected)
        }
        QuestionKind::GapFill { key, .. } => {
            let expected = ExpectedAnswer::Gaps {
                fillers: key.clone(),
            };
            let matched = match submitted {
                Some(Answer::Gaps { fillers }) => key
                    .iter()
                    .zip(fillers.iter())
                    .filter(|(want, got)| normalize_text(want) == normalize_text(got))
                    .count(),
                _ => 0,
            };
            let total = key.len();
            let points = proportional_points(question.max_score, matched, total);
            (total > 0 && matched == total, points, expected)
        }
        QuestionKind::FreeResponse { .. } => (false, 0, ExpectedAnswer::ManualReview),
    }
}

/// Proportional credit, rounded half-up. Integer arithmetic so
/// 3-of-4 gaps on a 4-point question is exactly 3 and half points always
/// round away from zero.
fn proportional_points(max_score: i32, matched: usize, total: usize) -> i32 {
    if total == 0 || matched == 0 {
        return 0;
    }
    let max = max_score as i64;
    let matched = matched as i64;
    let total = total as i64;
    ((2 * max * matched + total) / (2 * total)) as i32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::exam::ChoiceOption;

    fn question(id: &str, max_score: i32, kind: QuestionKind) -> Question {
        Question {
            id: id.into(),
            order: 1,
            max_score,
            kind,
        }
    }

    fn objective_fixture() -> Vec<Question> {
        vec![
            question(
                "q1",
                1,
                QuestionKind::TrueFalse {
                    prompt: "The tide follows the moon".into(),
                    key: true,
                },
            ),
            question(
                "q2",
                1,
                QuestionKind::SingleChoice {
                    prompt: "Pick the main cause".into(),
                    options: vec![
                        ChoiceOption {
                            letter: "A".into(),
                            text: "wind".into(),
                        },
                        ChoiceOption {
                            letter: "B".into(),
                            text: "gravity".into(),
                        },
                    ],
                    key: "B".into(),
                },
            ),
            question(
                "q3",
                1,
                QuestionKind::ShortText {
                    prompt: "Name the port".into(),
                    accepted: vec!["harbour".into(), "harbor".into()],
                },
            ),
            question(
                "q4",
                4,
                QuestionKind::GapFill {
                    prompt: "Fill the gaps".into(),
                    tokens: vec!["tide".into(), "moon".into(), "sun".into(), "wind".into()],
                    key: vec!["tide".into(), "moon".into(), "sun".into(), "wind".into()],
                },
            ),
        ]
    }

    fn perfect_answers() -> HashMap<String, Answer> {
        HashMap::from([
            ("q1".to_string(), Answer::Boolean { value: true }),
            ("q2".to_string(), Answer::Choice { letter: "b".into() }),
            (
                "q3".to_string(),
                Answer::Text {
                    value: "  Harbour ".into(),
                },
            ),
            (
                "q4".to_string(),
                Answer::Gaps {
                    fillers: vec!["tide".into(), "Moon".into(), "sun".into(), "wind".into()],
                },
            ),
        ])
    }

    #[test]
    fn perfect_answers_score_full_marks() {
        let score = score_section(&objective_fixture(), &perfect_answers());
        assert_eq!(score.raw_score, score.max_raw_score);
        assert_eq!(score.raw_score, 7);
        assert_eq!(score.correct_count, 4);
        assert_eq!(score.total_questions, 4);
        assert!(score.breakdown.iter().all(|r| r.correct));
    }

    #[test]
    fn no_answers_score_zero() {
        let score = score_section(&objective_fixture(), &HashMap::new());
        assert_eq!(score.raw_score, 0);
        assert_eq!(score.max_raw_score, 7);
        assert_eq!(score.correct_count, 0);
        assert!(score.breakdown.iter().all(|r| !r.correct));
    }

    #[test]
    fn scoring_is_deterministic() {
        let questions = objective_fixture();
        let answers = perfect_answers();
        let first = score_section(&questions, &answers);
        let second = score_section(&questions, &answers);
        assert_eq!(first.raw_score, second.raw_score);
        assert_eq!(first.correct_count, second.correct_count);
    }

    #[test]
    fn true_false_awards_all_or_nothing() {
        let q = vec![question(
            "q1",
            2,
            QuestionKind::TrueFalse {
                prompt: "T or F".into(),
                key: false,
            },
        )];
        let wrong = HashMap::from([("q1".to_string(), Answer::Boolean { value: true })]);
        assert_eq!(score_section(&q, &wrong).raw_score, 0);
        let right = HashMap::from([("q1".to_string(), Answer::Boolean { value: false })]);
        assert_eq!(score_section(&q, &right).raw_score, 2);
    }

    #[test]
    fn short_text_matching_is_case_normalized_not_fuzzy() {
        let q = vec![question(
            "q1",
            1,
            QuestionKind::ShortText {
                prompt: "Name it".into(),
                accepted: vec!["carbon dioxide".into()],
            },
        )];
        let spaced = HashMap::from([(
            "q1".to_string(),
            Answer::Text {
                value: "Carbon   Dioxide".into(),
            },
        )]);
        assert_eq!(score_section(&q, &spaced).raw_score, 1);

        let typo = HashMap::from([(
            "q1".to_string(),
            Answer::Text {
                value: "carbon dioxid".into(),
            },
        )]);
        assert_eq!(score_section(&q, &typo).raw_score, 0);
    }

    #[test]
    fn gap_fill_awards_proportional_credit_half_up() {
        // 4 gaps, max 4 points, 3 correct -> 3 points.
        let q = vec![question(
            "g1",
            4,
            QuestionKind::GapFill {
                prompt: "Fill".into(),
                tokens: vec![],
                key: vec!["a".into(), "b".into(), "c".into(), "d".into()],
            },
        )];
        let answers = HashMap::from([(
            "g1".to_string(),
            Answer::Gaps {
                fillers: vec!["a".into(), "b".into(), "c".into(), "x".into()],
            },
        )]);
        let score = score_section(&q, &answers);
        assert_eq!(score.raw_score, 3);
        assert_eq!(score.correct_count, 0, "partial credit is not correctness");

        // 1 of 2 gaps on a 1-point question: 0.5 rounds up to 1.
        let q = vec![question(
            "g2",
            1,
            QuestionKind::GapFill {
                prompt: "Fill".into(),
                tokens: vec![],
                key: vec!["a".into(), "b".into()],
            },
        )];
        let answers = HashMap::from([(
            "g2".to_string(),
            Answer::Gaps {
                fillers: vec!["a".into(), "z".into()],
            },
        )]);
        assert_eq!(score_section(&q, &answers).raw_score, 1);
    }

    #[test]
    fn gap_fill_ignores_extra_submitted_fillers() {
        let q = vec![question(
            "g1",
            2,
            QuestionKind::GapFill {
                prompt: "Fill".into(),
                tokens: vec![],
                key: vec!["a".into(), "b".into()],
            },
        )];
        let answers = HashMap::from([(
            "g1".to_string(),
            Answer::Gaps {
                fillers: vec!["a".into(), "b".into(), "c".into()],
            },
        )]);
        let score = score_section(&q, &answers);
        assert_eq!(score.raw_score, 2);
        assert_eq!(score.correct_count, 1);
    }

    #[test]
    fn free_response_is_skipped_entirely() {
        let q = vec![
            question(
                "w1",
                1,
                QuestionKind::FreeResponse {
                    prompt: "Describe the chart".into(),
                },
            ),
            question(
                "q1",
                1,
                QuestionKind::TrueFalse {
                    prompt: "T or F".into(),
                    key: true,
                },
            ),
        ];
        let answers = HashMap::from([
            (
                "w1".to_string(),
                Answer::Text {
                    value: "An essay".into(),
                },
            ),
            ("q1".to_string(), Answer::Boolean { value: true }),
        ]);
        let score = score_section(&q, &answers);
        assert_eq!(score.total_questions, 1);
        assert_eq!(score.max_raw_score, 1);
        assert_eq!(score.breakdown.len(), 1);
        assert_eq!(score.breakdown[0].question_id, "q1");
    }

    #[test]
    fn mismatched_answer_shape_scores_zero() {
        let q = vec![question(
            "q1",
            1,
            QuestionKind::TrueFalse {
                prompt: "T or F".into(),
                key: true,
            },
        )];
        let answers = HashMap::from([(
            "q1".to_string(),
            Answer::Text {
                value: "true".into(),
            },
        )]);
        assert_eq!(score_section(&q, &answers).raw_score, 0);
    }
}
