use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::exam::SectionType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    InProgress,
    Completed,
}

/// A scheduled sitting, created by a teacher through the administration
/// surface. The engine consumes it exactly once to create an attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    #[serde(rename = "_id")]
    pub id: String,
    pub student_id: String,
    pub teacher_id: String,
    pub exam_id: String,
    /// Section types assigned to this sitting; a subset of the exam's
    /// sections.
    pub sections: Vec<SectionType>,
    pub scheduled_at: DateTime<Utc>,
    pub status: BookingStatus,
}
