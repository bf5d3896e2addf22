use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::exam::SectionType;

/// A student answer, tagged by shape. Validated against the question type
/// at the boundary; stored opaquely on the attempt section afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Answer {
    Boolean { value: bool },
    Choice { letter: String },
    Text { value: String },
    Gaps { fillers: Vec<String> },
    /// Reference to an uploaded speaking recording; storage itself is an
    /// external collaborator.
    Recording { file_id: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
    InProgress,
    Submitted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionStatus {
    NotStarted,
    InProgress,
    /// Closed by the student via EndSection.
    Completed,
    /// Closed by whole-attempt submission.
    Submitted,
}

/// One student's sitting of one exam. Sections are created together with
/// the attempt from the booking's assigned types and never added to or
/// removed from afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attempt {
    #[serde(rename = "_id")]
    pub id: String,
    pub booking_id: String,
    pub student_id: String,
    /// Denormalized from the booking so the grading queue can filter by
    /// teacher without a join.
    pub teacher_id: String,
    pub exam_id: String,
    pub exam_type: String,
    pub status: AttemptStatus,
    pub started_at: DateTime<Utc>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub band_overall: Option<f64>,
    pub sections: Vec<AttemptSection>,
}

impl Attempt {
    pub fn section(&self, section_type: SectionType) -> Option<&AttemptSection> {
        self.sections
            .iter()
            .find(|s| s.section_type == section_type)
    }

    pub fn section_mut(&mut self, section_type: SectionType) -> Option<&mut AttemptSection> {
        self.sections
            .iter_mut()
            .find(|s| s.section_type == section_type)
    }

    /// True once every section carries a band, auto or teacher-assigned.
    pub fn fully_banded(&self) -> bool {
        !self.sections.is_empty() && self.sections.iter().all(|s| s.band_score.is_some())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptSection {
    pub section_type: SectionType,
    pub status: SectionStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub answers: HashMap<String, Answer>,
    pub raw_score: Option<i32>,
    pub max_score: Option<i32>,
    pub band_score: Option<f64>,
    pub feedback: Option<String>,
    /// Free-form structured grading notes.
    pub rubric: Option<serde_json::Value>,
    pub graded_by: Option<String>,
}

impl AttemptSection {
    pub fn new(section_type: SectionType) -> Self {
        Self {
            section_type,
            status: SectionStatus::NotStarted,
            started_at: None,
            ended_at: None,
            answers: HashMap::new(),
            raw_score: None,
            max_score: None,
            band_score: None,
            feedback: None,
            rubric: None,
            graded_by: None,
        }
    }

    /// Answers are frozen once the section is closed, by either path.
    pub fn is_locked(&self) -> bool {
        matches!(
            self.status,
            SectionStatus::Completed | SectionStatus::Submitted
        )
    }
}
