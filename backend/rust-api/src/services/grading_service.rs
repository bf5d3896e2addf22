//! Teacher grading workflow for Writing and Speaking sections: a queue of
//! ungraded submitted attempts and the grade operation that fills in the
//! missing bands. Regrading is allowed — unlike section answers there is
//! no lock on a grade.

use std::sync::Arc;

use validator::Validate;

use crate::error::ApiError;
use crate::metrics::SECTIONS_GRADED_TOTAL;
use crate::middlewares::auth::JwtClaims;
use crate::models::attempt::AttemptStatus;
use crate::models::band::is_valid_band;
use crate::models::exam::SectionType;
use crate::models::grading::{GradeSectionRequest, GradeSectionResponse, GradingQueueItem};
use crate::policy;
use crate::store::AttemptStore;

use super::attempt_service::finalize_band_overall;
use super::notifier::Notifier;

pub struct GradingService {
    store: Arc<dyn AttemptStore>,
    notifier: Arc<dyn Notifier>,
}

impl GradingService {
    pub fn new(store: Arc<dyn AttemptStore>, notifier: Arc<dyn Notifier>) -> Self {
        Self { store, notifier }
    }

    /// Submitted attempts on the caller's bookings with at least one
    /// subjective section still missing a band, oldest submission first.
    pub async fn queue_for_teacher(
        &self,
        claims: &JwtClaims,
    ) -> Result<Vec<GradingQueueItem>, ApiError> {
        policy::ensure_role(claims, &[policy::ROLE_TEACHER])?;

        let attempts = self.store.ungraded_attempts_for_teacher(&claims.sub).await?;
        let queue = attempts
            .into_iter()
            .map(|attempt| GradingQueueItem {
                pending_sections: attempt
                    .sections
                    .iter()
                    .filter(|s| !s.section_type.is_auto_gradable() && s.band_score.is_none())
                    .map(|s| s.section_type)
                    .collect(),
                attempt_id: attempt.id,
                booking_id: attempt.booking_id,
                student_id: attempt.student_id,
                exam_id: attempt.exam_id,
                exam_type: attempt.exam_type,
                submitted_at: attempt.submitted_at,
            })
            .collect();

        Ok(queue)
    }

    pub async fn grade_section(
        &self,
        claims: &JwtClaims,
        attempt_id: &str,
        section_type: SectionType,
        request: GradeSectionRequest,
    ) -> Result<GradeSectionResponse, ApiError> {
        request
            .validate()
            .map_err(|err| ApiError::validation(format!("Invalid grade request: {}", err)))?;
        if !is_valid_band(request.band_score) {
            return Err(ApiError::validation(
                "Band score must be a multiple of 0.5 between 0 and 9",
            ));
        }
        if section_type.is_auto_gradable() {
            return Err(ApiError::validation(format!(
                "Section '{}' is auto-scored and cannot be graded manually",
                section_type
            )));
        }

        let attempt = self
            .store
            .fetch_attempt(attempt_id)
            .await?
            .ok_or_else(|| ApiError::not_found("Attempt not found"))?;
        policy::ensure_attempt_grader(claims, &attempt)?;

        if attempt.status != AttemptStatus::Submitted {
            return Err(ApiError::conflict(
                "Attempt has not been submitted for grading yet",
            ));
        }
        if attempt.section(section_type).is_none() {
            return Err(ApiError::not_found("Section is not part of this attempt"));
        }

        self.store
            .set_section_grade(
                attempt_id,
                section_type,
                request.band_score,
                request.rubric,
                request.feedback,
                &claims.sub,
            )
            .await?;

        SECTIONS_GRADED_TOTAL
            .with_label_values(&[section_type.as_str()])
            .inc();
        tracing::info!(
            "Section {} of attempt {} graded {} by {}",
            section_type,
            attempt_id,
            request.band_score,
            claims.sub
        );

        finalize_band_overall(&self.store, &self.notifier, attempt_id).await?;

        let attempt = self
            .store
            .fetch_attempt(attempt_id)
            .await?
            .ok_or_else(|| ApiError::not_found("Attempt not found"))?;
        let section = attempt
            .section(section_type)
            .ok_or_else(|| ApiError::not_found("Section is not part of this attempt"))?
            .clone();

        Ok(GradeSectionResponse {
            attempt_id: attempt.id.clone(),
            section,
            attempt_fully_graded: attempt.fully_banded(),
            band_overall: attempt.band_overall,
        })
    }
}
