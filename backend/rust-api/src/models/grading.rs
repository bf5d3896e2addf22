use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::attempt::AttemptSection;
use super::exam::SectionType;

/// Teacher grade for a Writing or Speaking section. Band must sit on the
/// 0.5-step grid; the service rejects off-grid values after the range
/// check here.
#[derive(Debug, Deserialize, Validate)]
pub struct GradeSectionRequest {
    #[validate(range(min = 0.0, max = 9.0))]
    pub band_score: f64,
    pub rubric: Option<serde_json::Value>,
    #[validate(length(max = 4000))]
    pub feedback: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct GradeSectionResponse {
    pub attempt_id: String,
    pub section: AttemptSection,
    /// True when this grade was the last missing band of the attempt.
    pub attempt_fully_graded: bool,
    pub band_overall: Option<f64>,
}

/// One row of the teacher's grading queue: a submitted attempt on one of
/// their bookings that still has ungraded subjective sections.
#[derive(Debug, Serialize)]
pub struct GradingQueueItem {
    pub attempt_id: String,
    pub booking_id: String,
    pub student_id: String,
    pub exam_id: String,
    pub exam_type: String,
    pub submitted_at: Option<DateTime<Utc>>,
    pub pending_sections: Vec<SectionType>,
}
