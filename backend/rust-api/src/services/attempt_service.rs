//! Attempt lifecycle: creation from a booking, per-section start/save/end
//! transitions, submission with force-close and synchronous auto-scoring.
//! No transition ever moves backward.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::error::ApiError;
use crate::metrics::{
    ATTEMPTS_CREATED_TOTAL, ATTEMPTS_FULLY_GRADED_TOTAL, ATTEMPTS_SUBMITTED_TOTAL,
    BAND_MAP_MISSES_TOTAL, SCORING_FAILURES_TOTAL, SECTIONS_COMPLETED_TOTAL, SECTIONS_SCORED_TOTAL,
};
use crate::middlewares::auth::JwtClaims;
use crate::models::attempt::{Answer, Attempt, AttemptSection, AttemptStatus, SectionStatus};
use crate::models::band::{lookup_band, overall_band};
use crate::models::booking::BookingStatus;
use crate::models::exam::{Exam, Question, QuestionKind, SectionDef, SectionType};
use crate::models::notification::NotificationEvent;
use crate::models::writing::{word_count, WritingSubmission};
use crate::policy;
use crate::store::{AttemptStore, ExamCatalog};

use super::notifier::Notifier;
use super::scoring::{score_section, QuestionResult};

pub struct AttemptService {
    store: Arc<dyn AttemptStore>,
    catalog: Arc<dyn ExamCatalog>,
    notifier: Arc<dyn Notifier>,
}

#[derive(Debug, Serialize)]
pub struct SectionView {
    pub section_type: SectionType,
    pub status: SectionStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub duration_minutes: Option<u32>,
    pub answers: HashMap<String, Answer>,
    pub raw_score: Option<i32>,
    pub max_score: Option<i32>,
    pub band_score: Option<f64>,
    pub feedback: Option<String>,
    pub graded_by: Option<String>,
    /// Per-question correctness, present on auto-scored sections once the
    /// attempt is submitted (review screens).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub breakdown: Option<Vec<QuestionResult>>,
}

#[derive(Debug, Serialize)]
pub struct AttemptView {
    pub id: String,
    pub booking_id: String,
    pub student_id: String,
    pub exam_id: String,
    pub exam_type: String,
    pub status: AttemptStatus,
    pub started_at: DateTime<Utc>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub band_overall: Option<f64>,
    pub sections: Vec<SectionView>,
}

#[derive(Debug, Serialize)]
pub struct StartSectionResponse {
    pub section_type: SectionType,
    pub status: SectionStatus,
    pub started_at: DateTime<Utc>,
    /// Configured budget so the client can render a countdown. The server
    /// does not enforce the deadline.
    pub duration_minutes: u32,
}

/// Outcome of one auto-scoring pass. Failed sections keep null scores and
/// stay retryable; they never roll back a submission.
#[derive(Debug, Serialize)]
pub struct ScoreReport {
    pub scored_sections: Vec<SectionType>,
    pub failed_sections: Vec<SectionType>,
    pub band_overall: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub attempt: AttemptView,
    pub scoring: ScoreReport,
}

impl AttemptService {
    pub fn new(
        store: Arc<dyn AttemptStore>,
        catalog: Arc<dyn ExamCatalog>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            store,
            catalog,
            notifier,
        }
    }

    pub async fn create_attempt(
        &self,
        claims: &JwtClaims,
        booking_id: &str,
    ) -> Result<AttemptView, ApiError> {
        policy::ensure_role(claims, &[policy::ROLE_STUDENT])?;

        let booking = self
            .store
            .fetch_booking(booking_id)
            .await?
            .ok_or_else(|| ApiError::not_found("Booking not found"))?;
        policy::ensure_booking_student(claims, &booking)?;

        match booking.status {
            BookingStatus::Confirmed => {}
            BookingStatus::Pending => {
                return Err(ApiError::conflict("Booking is not confirmed yet"));
            }
            BookingStatus::InProgress | BookingStatus::Completed => {
                return Err(ApiError::conflict("Booking has already been sat"));
            }
        }

        let exam = self
            .catalog
            .fetch_exam(&booking.exam_id)
            .await?
            .ok_or_else(|| ApiError::not_found("Exam not found in catalog"))?;

        // Section set is fixed here, in exam order, and never changes for
        // the lifetime of the attempt.
        let mut defs: Vec<&SectionDef> = exam
            .sections
            .iter()
            .filter(|def| booking.sections.contains(&def.section_type))
            .collect();
        defs.sort_by_key(|def| def.order);
        if defs.is_empty() {
            return Err(ApiError::validation(
                "Booking assigns no sections present in the exam",
            ));
        }

        let attempt = Attempt {
            id: Uuid::new_v4().to_string(),
            booking_id: booking.id.clone(),
            student_id: booking.student_id.clone(),
            teacher_id: booking.teacher_id.clone(),
            exam_id: exam.id.clone(),
            exam_type: exam.exam_type.clone(),
            status: AttemptStatus::InProgress,
            started_at: Utc::now(),
            submitted_at: None,
            band_overall: None,
            sections: defs
                .iter()
                .map(|def| AttemptSection::new(def.section_type))
                .collect(),
        };

        if !self.store.insert_attempt(&attempt).await? {
            return Err(ApiError::conflict("Booking already has an attempt"));
        }
        self.store
            .set_booking_status(&booking.id, BookingStatus::InProgress)
            .await?;

        ATTEMPTS_CREATED_TOTAL.inc();
        tracing::info!(
            "Attempt {} created from booking {} for student {}",
            attempt.id,
            booking.id,
            booking.student_id
        );

        self.notifier
            .notify(&NotificationEvent::AttemptCreated {
                attempt_id: attempt.id.clone(),
                booking_id: booking.id.clone(),
                student_id: booking.student_id.clone(),
                teacher_id: booking.teacher_id.clone(),
            })
            .await;

        Ok(build_view(&attempt, &exam))
    }

    pub async fn fetch_state(
        &self,
        claims: &JwtClaims,
        attempt_id: &str,
    ) -> Result<AttemptView, ApiError> {
        let attempt = self.load_attempt(attempt_id).await?;
        policy::ensure_attempt_reader(claims, &attempt)?;
        let exam = self.load_exam(&attempt).await?;
        Ok(build_view(&attempt, &exam))
    }

    pub async fn start_section(
        &self,
        claims: &JwtClaims,
        attempt_id: &str,
        section_type: SectionType,
    ) -> Result<StartSectionResponse, ApiError> {
        let mut attempt = self.load_attempt(attempt_id).await?;
        policy::ensure_attempt_owner(claims, &attempt)?;
        ensure_attempt_open(&attempt)?;

        let exam = self.load_exam(&attempt).await?;
        let duration_minutes = exam
            .section(section_type)
            .map(|def| def.duration_minutes)
            .ok_or_else(|| ApiError::not_found("Section not defined for this exam"))?;

        let section = attempt
            .section_mut(section_type)
            .ok_or_else(|| ApiError::not_found("Section is not part of this attempt"))?;
        if section.is_locked() {
            return Err(ApiError::conflict("Section has already been completed"));
        }

        // Idempotent re-entry: the clock starts once and only once.
        let started_at = match section.started_at {
            Some(started_at) => started_at,
            None => {
                let now = Utc::now();
                section.started_at = Some(now);
                section.status = SectionStatus::InProgress;
                self.store.update_section(attempt_id, section).await?;
                now
            }
        };

        Ok(StartSectionResponse {
            section_type,
            status: section.status,
            started_at,
            duration_minutes,
        })
    }

    pub async fn save_answers(
        &self,
        claims: &JwtClaims,
        attempt_id: &str,
        section_type: SectionType,
        answers: HashMap<String, Answer>,
    ) -> Result<(), ApiError> {
        let mut attempt = self.load_attempt(attempt_id).await?;
        policy::ensure_attempt_owner(claims, &attempt)?;
        ensure_attempt_open(&attempt)?;

        let exam = self.load_exam(&attempt).await?;
        let def = exam
            .section(section_type)
            .ok_or_else(|| ApiError::not_found("Section not defined for this exam"))?;
        validate_answers(def, &answers)?;

        let section = attempt
            .section_mut(section_type)
            .ok_or_else(|| ApiError::not_found("Section is not part of this attempt"))?;
        if section.is_locked() {
            return Err(ApiError::conflict(
                "Section is completed; answers are locked",
            ));
        }

        // Wholesale overwrite: last write wins, no merge.
        section.answers = answers;
        self.store.update_section(attempt_id, section).await?;
        Ok(())
    }

    pub async fn end_section(
        &self,
        claims: &JwtClaims,
        attempt_id: &str,
        section_type: SectionType,
    ) -> Result<SectionView, ApiError> {
        let mut attempt = self.load_attempt(attempt_id).await?;
        policy::ensure_attempt_owner(claims, &attempt)?;
        ensure_attempt_open(&attempt)?;

        let exam = self.load_exam(&attempt).await?;
        let section = attempt
            .section_mut(section_type)
            .ok_or_else(|| ApiError::not_found("Section is not part of this attempt"))?;
        if section.is_locked() {
            return Err(ApiError::conflict("Section has already been completed"));
        }

        section.status = SectionStatus::Completed;
        section.ended_at = Some(Utc::now());
        self.store.update_section(attempt_id, section).await?;

        SECTIONS_COMPLETED_TOTAL
            .with_label_values(&[section_type.as_str()])
            .inc();
        tracing::info!(
            "Section {} of attempt {} completed by student",
            section_type,
            attempt_id
        );

        let section = section.clone();
        Ok(build_section_view(&section, &exam, false))
    }

    /// Submit the whole attempt: force-close open sections, lock answers,
    /// then auto-score synchronously. Scoring failures are logged and do
    /// not roll the submission back.
    pub async fn submit(
        &self,
        claims: &JwtClaims,
        attempt_id: &str,
    ) -> Result<SubmitResponse, ApiError> {
        let attempt = self.load_attempt(attempt_id).await?;
        policy::ensure_attempt_owner(claims, &attempt)?;
        if attempt.status != AttemptStatus::InProgress {
            return Err(ApiError::conflict("Attempt has already been submitted"));
        }

        let exam = self.load_exam(&attempt).await?;
        let now = Utc::now();

        let mut submitted = attempt;
        submitted.status = AttemptStatus::Submitted;
        submitted.submitted_at = Some(now);
        for section in &mut submitted.sections {
            if !section.is_locked() {
                // Sections the student never ended are closed by the
                // submission itself.
                section.status = SectionStatus::Submitted;
                if section.ended_at.is_none() {
                    section.ended_at = Some(now);
                }
                SECTIONS_COMPLETED_TOTAL
                    .with_label_values(&[section.section_type.as_str()])
                    .inc();
            }
        }

        // Compare-and-set: of two racing submissions only one replaces
        // the IN_PROGRESS document and runs the pipeline below.
        if !self.store.replace_if_in_progress(&submitted).await? {
            return Err(ApiError::conflict("Attempt has already been submitted"));
        }

        ATTEMPTS_SUBMITTED_TOTAL.inc();
        tracing::info!("Attempt {} submitted", attempt_id);

        if let Err(err) = self
            .store
            .set_booking_status(&submitted.booking_id, BookingStatus::Completed)
            .await
        {
            tracing::error!(
                "Failed to mark booking {} completed: {:#}",
                submitted.booking_id,
                err
            );
        }

        self.record_writing_submissions(&submitted, &exam, now).await;

        let scoring = self.score_attempt(&submitted, &exam).await;

        let attempt = self.load_attempt(attempt_id).await?;
        Ok(SubmitResponse {
            attempt: build_view(&attempt, &exam),
            scoring,
        })
    }

    /// Re-run auto-scoring on a submitted attempt. Pure function of the
    /// stored answers and question keys, so repeating it is safe.
    pub async fn rescore(
        &self,
        claims: &JwtClaims,
        attempt_id: &str,
    ) -> Result<ScoreReport, ApiError> {
        let attempt = self.load_attempt(attempt_id).await?;
        policy::ensure_attempt_grader(claims, &attempt)?;
        if attempt.status != AttemptStatus::Submitted {
            return Err(ApiError::conflict("Attempt has not been submitted yet"));
        }

        let exam = self.load_exam(&attempt).await?;
        Ok(self.score_attempt(&attempt, &exam).await)
    }

    async fn load_attempt(&self, attempt_id: &str) -> Result<Attempt, ApiError> {
        self.store
            .fetch_attempt(attempt_id)
            .await?
            .ok_or_else(|| ApiError::not_found("Attempt not found"))
    }

    async fn load_exam(&self, attempt: &Attempt) -> Result<Exam, ApiError> {
        self.catalog
            .fetch_exam(&attempt.exam_id)
            .await?
            .ok_or_else(|| {
                ApiError::Internal(anyhow::anyhow!(
                    "Exam {} referenced by attempt {} is missing from the catalog",
                    attempt.exam_id,
                    attempt.id
                ))
            })
    }

    /// Writing sections are denormalized into their own records exactly
    /// once; a duplicate insert means a concurrent writer got there first
    /// and is ignored.
    async fn record_writing_submissions(
        &self,
        attempt: &Attempt,
        exam: &Exam,
        now: DateTime<Utc>,
    ) {
        for section in &attempt.sections {
            if section.section_type != SectionType::Writing {
                continue;
            }
            let Some(def) = exam.section(section.section_type) else {
                continue;
            };
            let Some(submission) = build_writing_submission(attempt, section, def, now) else {
                continue;
            };

            match self.store.insert_writing_submission(&submission).await {
                Ok(true) => {
                    tracing::info!(
                        "Writing submission recorded for attempt {} ({} + {} words)",
                        attempt.id,
                        submission.task1_words,
                        submission.task2_words
                    );
                }
                Ok(false) => {
                    tracing::debug!(
                        "Writing submission for attempt {} already exists",
                        attempt.id
                    );
                }
                Err(err) => {
                    tracing::error!(
                        "Failed to record writing submission for attempt {}: {:#}",
                        attempt.id,
                        err
                    );
                }
            }
        }
    }

    /// Score every auto-gradable section, persist raw scores and mapped
    /// bands, then aggregate the overall band if nothing is missing.
    async fn score_attempt(&self, attempt: &Attempt, exam: &Exam) -> ScoreReport {
        let mut scored_sections = Vec::new();
        let mut failed_sections = Vec::new();

        for section in &attempt.sections {
            if !section.section_type.is_auto_gradable() {
                continue;
            }

            let Some(def) = exam.section(section.section_type) else {
                tracing::error!(
                    "Attempt {} section {} has no definition in exam {}",
                    attempt.id,
                    section.section_type,
                    exam.id
                );
                SCORING_FAILURES_TOTAL
                    .with_label_values(&[section.section_type.as_str()])
                    .inc();
                failed_sections.push(section.section_type);
                continue;
            };

            let score = score_section(&def.questions, &section.answers);
            let band = match self
                .catalog
                .band_entries(&attempt.exam_type, section.section_type)
                .await
            {
                Ok(entries) => {
                    let band = lookup_band(&entries, score.raw_score);
                    if band.is_none() {
                        // Tolerated: a gap in the table leaves the band
                        // null, it does not fail the submission.
                        BAND_MAP_MISSES_TOTAL
                            .with_label_values(&[section.section_type.as_str()])
                            .inc();
                        tracing::warn!(
                            "No band mapping for {}/{} raw score {}",
                            attempt.exam_type,
                            section.section_type,
                            score.raw_score
                        );
                    }
                    band
                }
                Err(err) => {
                    tracing::error!(
                        "Band map lookup failed for attempt {} section {}: {:#}",
                        attempt.id,
                        section.section_type,
                        err
                    );
                    None
                }
            };

            match self
                .store
                .set_section_scores(
                    &attempt.id,
                    section.section_type,
                    score.raw_score,
                    score.max_raw_score,
                    band,
                )
                .await
            {
                Ok(()) => {
                    SECTIONS_SCORED_TOTAL
                        .with_label_values(&[section.section_type.as_str()])
                        .inc();
                    scored_sections.push(section.section_type);
                }
                Err(err) => {
                    SCORING_FAILURES_TOTAL
                        .with_label_values(&[section.section_type.as_str()])
                        .inc();
                    tracing::error!(
                        "Failed to persist scores for attempt {} section {}: {:#}",
                        attempt.id,
                        section.section_type,
                        err
                    );
                    failed_sections.push(section.section_type);
                }
            }
        }

        let band_overall =
            match finalize_band_overall(&self.store, &self.notifier, &attempt.id).await {
                Ok(band) => band,
                Err(err) => {
                    tracing::error!(
                        "Overall band aggregation failed for attempt {}: {:#}",
                        attempt.id,
                        err
                    );
                    None
                }
            };

        ScoreReport {
            scored_sections,
            failed_sections,
            band_overall,
        }
    }
}

fn ensure_attempt_open(attempt: &Attempt) -> Result<(), ApiError> {
    if attempt.status == AttemptStatus::InProgress {
        Ok(())
    } else {
        Err(ApiError::conflict("Attempt has already been submitted"))
    }
}

/// Boundary validation of an autosave payload: every answer must address
/// a real question of the section and carry the shape its type expects.
fn validate_answers(
    def: &SectionDef,
    answers: &HashMap<String, Answer>,
) -> Result<(), ApiError> {
    for (question_id, answer) in answers {
        let question = def
            .questions
            .iter()
            .find(|q| &q.id == question_id)
            .ok_or_else(|| {
                ApiError::validation(format!("Unknown question '{}' in answers", question_id))
            })?;
        if !question.kind.accepts(answer) {
            return Err(ApiError::validation(format!(
                "Answer for question '{}' does not match its question type",
                question_id
            )));
        }
    }
    Ok(())
}

/// Once every section of the attempt carries a band, compute and persist
/// the overall band. Notifies exactly once, on the transition from null.
pub(crate) async fn finalize_band_overall(
    store: &Arc<dyn AttemptStore>,
    notifier: &Arc<dyn Notifier>,
    attempt_id: &str,
) -> anyhow::Result<Option<f64>> {
    let Some(attempt) = store.fetch_attempt(attempt_id).await? else {
        return Ok(None);
    };
    if !attempt.fully_banded() {
        return Ok(None);
    }

    let bands: Vec<f64> = attempt.sections.iter().filter_map(|s| s.band_score).collect();
    let Some(overall) = overall_band(&bands) else {
        return Ok(None);
    };

    store.set_band_overall(attempt_id, overall).await?;
    tracing::info!("Attempt {} overall band {}", attempt_id, overall);

    if attempt.band_overall.is_none() {
        ATTEMPTS_FULLY_GRADED_TOTAL.inc();
        notifier
            .notify(&NotificationEvent::AttemptFullyGraded {
                attempt_id: attempt.id.clone(),
                student_id: attempt.student_id.clone(),
                teacher_id: attempt.teacher_id.clone(),
                band_overall: overall,
            })
            .await;
    }

    Ok(Some(overall))
}

fn build_section_view(section: &AttemptSection, exam: &Exam, submitted: bool) -> SectionView {
    let def = exam.section(section.section_type);
    let breakdown = if submitted && section.section_type.is_auto_gradable() {
        def.map(|d| score_section(&d.questions, &section.answers).breakdown)
    } else {
        None
    };

    SectionView {
        section_type: section.section_type,
        status: section.status,
        started_at: section.started_at,
        ended_at: section.ended_at,
        duration_minutes: def.map(|d| d.duration_minutes),
        answers: section.answers.clone(),
        raw_score: section.raw_score,
        max_score: section.max_score,
        band_score: section.band_score,
        feedback: section.feedback.clone(),
        graded_by: section.graded_by.clone(),
        breakdown,
    }
}

fn build_view(attempt: &Attempt, exam: &Exam) -> AttemptView {
    let submitted = attempt.status == AttemptStatus::Submitted;
    AttemptView {
        id: attempt.id.clone(),
        booking_id: attempt.booking_id.clone(),
        student_id: attempt.student_id.clone(),
        exam_id: attempt.exam_id.clone(),
        exam_type: attempt.exam_type.clone(),
        status: attempt.status,
        started_at: attempt.started_at,
        submitted_at: attempt.submitted_at,
        band_overall: attempt.band_overall,
        sections: attempt
            .sections
            .iter()
            .map(|s| build_section_view(s, exam, submitted))
            .collect(),
    }
}

fn build_writing_submission(
    attempt: &Attempt,
    section: &AttemptSection,
    def: &SectionDef,
    now: DateTime<Utc>,
) -> Option<WritingSubmission> {
    let mut tasks: Vec<&Question> = def
        .questions
        .iter()
        .filter(|q| matches!(q.kind, QuestionKind::FreeResponse { .. }))
        .collect();
    tasks.sort_by_key(|q| q.order);

    let text_for = |index: usize| -> String {
        tasks
            .get(index)
            .and_then(|q| section.answers.get(&q.id))
            .and_then(|answer| match answer {
                Answer::Text { value } => Some(value.clone()),
                _ => None,
            })
            .unwrap_or_default()
    };

    let task1_text = text_for(0);
    let task2_text = text_for(1);
    if task1_text.is_empty() && task2_text.is_empty() {
        return None;
    }

    Some(WritingSubmission {
        id: Uuid::new_v4().to_string(),
        attempt_id: attempt.id.clone(),
        section_type: section.section_type,
        task1_words: word_count(&task1_text),
        task2_words: word_count(&task2_text),
        task1_text,
        task2_text,
        submitted_at: now,
    })
}
