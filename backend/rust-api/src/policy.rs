//! Authorization policy, consolidated in one place: every core operation
//! asks these checks instead of re-deriving role logic per endpoint.

use crate::error::ApiError;
use crate::middlewares::auth::JwtClaims;
use crate::models::attempt::Attempt;
use crate::models::booking::Booking;

pub const ROLE_STUDENT: &str = "student";
pub const ROLE_TEACHER: &str = "teacher";
pub const ROLE_ADMIN: &str = "admin";

fn is_admin(claims: &JwtClaims) -> bool {
    claims.role == ROLE_ADMIN
}

pub fn ensure_role(claims: &JwtClaims, allowed: &[&str]) -> Result<(), ApiError> {
    if allowed.contains(&claims.role.as_str()) || is_admin(claims) {
        Ok(())
    } else {
        Err(ApiError::forbidden(format!(
            "Role '{}' may not perform this operation",
            claims.role
        )))
    }
}

/// Only the booked student may create or sit the attempt.
pub fn ensure_booking_student(claims: &JwtClaims, booking: &Booking) -> Result<(), ApiError> {
    if claims.sub == booking.student_id || is_admin(claims) {
        Ok(())
    } else {
        Err(ApiError::forbidden("Booking belongs to another student"))
    }
}

/// Student operations on a live attempt: owner only.
pub fn ensure_attempt_owner(claims: &JwtClaims, attempt: &Attempt) -> Result<(), ApiError> {
    if claims.sub == attempt.student_id || is_admin(claims) {
        Ok(())
    } else {
        Err(ApiError::forbidden("Attempt belongs to another student"))
    }
}

/// Reading an attempt: the sitting student or the supervising teacher.
pub fn ensure_attempt_reader(claims: &JwtClaims, attempt: &Attempt) -> Result<(), ApiError> {
    if claims.sub == attempt.student_id || claims.sub == attempt.teacher_id || is_admin(claims) {
        Ok(())
    } else {
        Err(ApiError::forbidden("Not a participant of this attempt"))
    }
}

/// Grading and rescoring: the booking's teacher.
pub fn ensure_attempt_grader(claims: &JwtClaims, attempt: &Attempt) -> Result<(), ApiError> {
    ensure_role(claims, &[ROLE_TEACHER])?;
    if claims.sub == attempt.teacher_id || is_admin(claims) {
        Ok(())
    } else {
        Err(ApiError::forbidden(
            "Attempt belongs to another teacher's booking",
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::attempt::AttemptStatus;
    use chrono::Utc;

    fn claims(sub: &str, role: &str) -> JwtClaims {
        JwtClaims {
            sub: sub.into(),
            role: role.into(),
            exp: (Utc::now().timestamp() + 3600) as usize,
            iat: Utc::now().timestamp() as usize,
        }
    }

    fn attempt() -> Attempt {
        Attempt {
            id: "attempt-1".into(),
            booking_id: "booking-1".into(),
            student_id: "student-1".into(),
            teacher_id: "teacher-1".into(),
            exam_id: "exam-1".into(),
            exam_type: "ielts_academic".into(),
            status: AttemptStatus::InProgress,
            started_at: Utc::now(),
            submitted_at: None,
            band_overall: None,
            sections: Vec::new(),
        }
    }

    #[test]
    fn owner_and_admin_pass_owner_check() {
        assert!(ensure_attempt_owner(&claims("student-1", ROLE_STUDENT), &attempt()).is_ok());
        assert!(ensure_attempt_owner(&claims("someone", ROLE_ADMIN), &attempt()).is_ok());
        assert!(ensure_attempt_owner(&claims("student-2", ROLE_STUDENT), &attempt()).is_err());
    }

    #[test]
    fn reader_check_includes_the_teacher() {
        assert!(ensure_attempt_reader(&claims("teacher-1", ROLE_TEACHER), &attempt()).is_ok());
        assert!(ensure_attempt_reader(&claims("teacher-2", ROLE_TEACHER), &attempt()).is_err());
    }

    #[test]
    fn grading_requires_the_owning_teacher() {
        assert!(ensure_attempt_grader(&claims("teacher-1", ROLE_TEACHER), &attempt()).is_ok());
        assert!(ensure_attempt_grader(&claims("teacher-2", ROLE_TEACHER), &attempt()).is_err());
        // Students never grade, even their own attempt.
        assert!(ensure_attempt_grader(&claims("student-1", ROLE_STUDENT), &attempt()).is_err());
        assert!(ensure_attempt_grader(&claims("root", ROLE_ADMIN), &attempt()).is_ok());
    }
}
