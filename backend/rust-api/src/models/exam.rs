use serde::{Deserialize, Serialize};

use super::attempt::Answer;

/// Skill block of an exam. Reading/Listening/Grammar/Vocabulary are scored
/// by the engine; Writing and Speaking go through the teacher grading queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionType {
    Reading,
    Listening,
    Writing,
    Speaking,
    Grammar,
    Vocabulary,
}

impl SectionType {
    pub fn is_auto_gradable(&self) -> bool {
        !matches!(self, SectionType::Writing | SectionType::Speaking)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SectionType::Reading => "reading",
            SectionType::Listening => "listening",
            SectionType::Writing => "writing",
            SectionType::Speaking => "speaking",
            SectionType::Grammar => "grammar",
            SectionType::Vocabulary => "vocabulary",
        }
    }
}

impl std::fmt::Display for SectionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Exam definition. Authored once by content admins, immutable while any
/// attempt against it is live.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Exam {
    #[serde(rename = "_id")]
    pub id: String,
    /// Exam family, e.g. "ielts_academic" or "general_grammar". Keys the
    /// band map together with the section type.
    pub exam_type: String,
    pub sections: Vec<SectionDef>,
}

impl Exam {
    pub fn section(&self, section_type: SectionType) -> Option<&SectionDef> {
        self.sections
            .iter()
            .find(|s| s.section_type == section_type)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionDef {
    pub section_type: SectionType,
    pub order: u32,
    pub duration_minutes: u32,
    pub questions: Vec<Question>,
}

fn default_max_score() -> i32 {
    1
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    pub order: u32,
    #[serde(default = "default_max_score")]
    pub max_score: i32,
    #[serde(flatten)]
    pub kind: QuestionKind,
}

/// Question payloads, one shape per question type. Objective types carry
/// their answer key structurally; free-response never has one.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QuestionKind {
    TrueFalse {
        prompt: String,
        key: bool,
    },
    SingleChoice {
        prompt: String,
        options: Vec<ChoiceOption>,
        /// Letter of the correct option.
        key: String,
    },
    ShortText {
        prompt: String,
        /// One or more acceptable strings, compared case-normalized.
        accepted: Vec<String>,
    },
    GapFill {
        prompt: String,
        /// Draggable fillers offered to the student.
        tokens: Vec<String>,
        /// Expected filler per gap, in gap order.
        key: Vec<String>,
    },
    FreeResponse {
        prompt: String,
    },
}

impl QuestionKind {
    pub fn is_auto_gradable(&self) -> bool {
        !matches!(self, QuestionKind::FreeResponse { .. })
    }

    /// Whether a submitted answer has the shape this question expects.
    /// Checked at the HTTP boundary so untyped payloads never reach the
    /// scoring engine.
    pub fn accepts(&self, answer: &Answer) -> bool {
        matches!(
            (self, answer),
            (QuestionKind::TrueFalse { .. }, Answer::Boolean { .. })
                | (QuestionKind::SingleChoice { .. }, Answer::Choice { .. })
                | (QuestionKind::ShortText { .. }, Answer::Text { .. })
                | (QuestionKind::GapFill { .. }, Answer::Gaps { .. })
                | (QuestionKind::FreeResponse { .. }, Answer::Text { .. })
                | (QuestionKind::FreeResponse { .. }, Answer::Recording { .. })
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChoiceOption {
    pub letter: String,
    pub text: String,
}
