//! In-memory attempt store. Backs the test suite and the ephemeral
//! `storage.backend = "memory"` dev mode; everything is lost on restart.

use std::collections::HashMap;
use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::attempt::{Attempt, AttemptSection, AttemptStatus};
use crate::models::booking::{Booking, BookingStatus};
use crate::models::exam::SectionType;
use crate::models::writing::WritingSubmission;

use super::AttemptStore;

#[derive(Default)]
struct Inner {
    bookings: HashMap<String, Booking>,
    attempts: HashMap<String, Attempt>,
    attempts_by_booking: HashMap<String, String>,
    writing_submissions: HashMap<(String, SectionType), WritingSubmission>,
}

#[derive(Default)]
pub struct MemoryAttemptStore {
    inner: Mutex<Inner>,
}

impl MemoryAttemptStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed_booking(&self, booking: Booking) {
        let mut inner = self.inner.lock().unwrap();
        inner.bookings.insert(booking.id.clone(), booking);
    }

    /// Test accessor: the writing submission stored for one attempt
    /// section, if any.
    pub fn writing_submission(
        &self,
        attempt_id: &str,
        section_type: SectionType,
    ) -> Option<WritingSubmission> {
        let inner = self.inner.lock().unwrap();
        inner
            .writing_submissions
            .get(&(attempt_id.to_string(), section_type))
            .cloned()
    }

    /// Test accessor: current booking state.
    pub fn booking(&self, booking_id: &str) -> Option<Booking> {
        let inner = self.inner.lock().unwrap();
        inner.bookings.get(booking_id).cloned()
    }
}

#[async_trait]
impl AttemptStore for MemoryAttemptStore {
    async fn fetch_booking(&self, booking_id: &str) -> Result<Option<Booking>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.bookings.get(booking_id).cloned())
    }

    async fn set_booking_status(&self, booking_id: &str, status: BookingStatus) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(booking) = inner.bookings.get_mut(booking_id) {
            booking.status = status;
        }
        Ok(())
    }

    async fn insert_attempt(&self, attempt: &Attempt) -> Result<bool> {
        let mut inner = self.inner.lock().unwrap();
        if inner.attempts_by_booking.contains_key(&attempt.booking_id) {
            return Ok(false);
        }
        inner
            .attempts_by_booking
            .insert(attempt.booking_id.clone(), attempt.id.clone());
        inner.attempts.insert(attempt.id.clone(), attempt.clone());
        Ok(true)
    }

    async fn fetch_attempt(&self, attempt_id: &str) -> Result<Option<Attempt>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.attempts.get(attempt_id).cloned())
    }

    async fn update_section(&self, attempt_id: &str, section: &AttemptSection) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(attempt) = inner.attempts.get_mut(attempt_id) {
            if let Some(slot) = attempt.section_mut(section.section_type) {
                *slot = section.clone();
            }
        }
        Ok(())
    }

    async fn replace_if_in_progress(&self, attempt: &Attempt) -> Result<bool> {
        let mut inner = self.inner.lock().unwrap();
        match inner.attempts.get_mut(&attempt.id) {
            Some(stored) if stored.status == AttemptStatus::InProgress => {
                *stored = attempt.clone();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn set_section_scores(
        &self,
        attempt_id: &str,
        section_type: SectionType,
        raw_score: i32,
        max_score: i32,
        band_score: Option<f64>,
    ) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(attempt) = inner.attempts.get_mut(attempt_id) {
            if let Some(section) = attempt.section_mut(section_type) {
                section.raw_score = Some(raw_score);
                section.max_score = Some(max_score);
                section.band_score = band_score;
            }
        }
        Ok(())
    }

    async fn set_section_grade(
        &self,
        attempt_id: &str,
        section_type: SectionType,
        band_score: f64,
        rubric: Option<serde_json::Value>,
        feedback: Option<String>,
        graded_by: &str,
    ) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(attempt) = inner.attempts.get_mut(attempt_id) {
            if let Some(section) = attempt.section_mut(section_type) {
                section.band_score = Some(band_score);
                section.rubric = rubric;
                section.feedback = feedback;
                section.graded_by = Some(graded_by.to_string());
            }
        }
        Ok(())
    }

    async fn set_band_overall(&self, attempt_id: &str, band_overall: f64) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(attempt) = inner.attempts.get_mut(attempt_id) {
            attempt.band_overall = Some(band_overall);
        }
        Ok(())
    }

    async fn insert_writing_submission(&self, submission: &WritingSubmission) -> Result<bool> {
        let mut inner = self.inner.lock().unwrap();
        let key = (submission.attempt_id.clone(), submission.section_type);
        if inner.writing_submissions.contains_key(&key) {
            return Ok(false);
        }
        inner.writing_submissions.insert(key, submission.clone());
        Ok(true)
    }

    async fn ungraded_attempts_for_teacher(&self, teacher_id: &str) -> Result<Vec<Attempt>> {
        let inner = self.inner.lock().unwrap();
        let mut attempts: Vec<Attempt> = inner
            .attempts
            .values()
            .filter(|a| {
                a.teacher_id == teacher_id
                    && a.status == AttemptStatus::Submitted
                    && a.sections.iter().any(|s| {
                        !s.section_type.is_auto_gradable() && s.band_score.is_none()
                    })
            })
            .cloned()
            .collect();
        attempts.sort_by(|a, b| a.submitted_at.cmp(&b.submitted_at));
        Ok(attempts)
    }
}
