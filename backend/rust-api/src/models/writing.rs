use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::exam::SectionType;

/// Denormalized record of a Writing section's two-task response, created
/// exactly once per attempt section when the attempt is submitted. A
/// second insert for the same section is rejected by the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WritingSubmission {
    #[serde(rename = "_id")]
    pub id: String,
    pub attempt_id: String,
    pub section_type: SectionType,
    pub task1_text: String,
    pub task2_text: String,
    pub task1_words: u32,
    pub task2_words: u32,
    pub submitted_at: DateTime<Utc>,
}

pub fn word_count(text: &str) -> u32 {
    text.split_whitespace().count() as u32
}
