use serde::Serialize;

/// Events handed to the external notification system. Delivery is not
/// this service's responsibility; emitters may drop on failure.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum NotificationEvent {
    AttemptCreated {
        attempt_id: String,
        booking_id: String,
        student_id: String,
        teacher_id: String,
    },
    AttemptFullyGraded {
        attempt_id: String,
        student_id: String,
        teacher_id: String,
        band_overall: f64,
    },
}
