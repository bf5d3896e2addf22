//! Durable-state boundary. The engine is agnostic about where bookings,
//! attempts and the exam catalog live: MongoDB in production, a JSON
//! catalog file for file-served exam content, and an in-memory store for
//! tests and the ephemeral dev mode.

use anyhow::Result;
use async_trait::async_trait;

use crate::models::attempt::{Attempt, AttemptSection};
use crate::models::band::BandMapEntry;
use crate::models::booking::{Booking, BookingStatus};
use crate::models::exam::{Exam, SectionType};
use crate::models::writing::WritingSubmission;

pub mod file_catalog;
pub mod memory;
pub mod mongo;

pub use file_catalog::FileCatalog;
pub use memory::MemoryAttemptStore;
pub use mongo::{MongoAttemptStore, MongoCatalog};

#[async_trait]
pub trait AttemptStore: Send + Sync {
    async fn fetch_booking(&self, booking_id: &str) -> Result<Option<Booking>>;

    async fn set_booking_status(&self, booking_id: &str, status: BookingStatus) -> Result<()>;

    /// Insert a freshly created attempt. Returns `Ok(false)` when the
    /// booking already has one (one attempt per booking).
    async fn insert_attempt(&self, attempt: &Attempt) -> Result<bool>;

    async fn fetch_attempt(&self, attempt_id: &str) -> Result<Option<Attempt>>;

    /// Overwrite one embedded section wholesale (last-write-wins
    /// autosave).
    async fn update_section(&self, attempt_id: &str, section: &AttemptSection) -> Result<()>;

    /// Compare-and-set submission: replace the attempt with its submitted
    /// form only if it is still IN_PROGRESS. Returns `Ok(false)` when the
    /// guard fails, so concurrent double-submits cannot both proceed.
    async fn replace_if_in_progress(&self, attempt: &Attempt) -> Result<bool>;

    async fn set_section_scores(
        &self,
        attempt_id: &str,
        section_type: SectionType,
        raw_score: i32,
        max_score: i32,
        band_score: Option<f64>,
    ) -> Result<()>;

    async fn set_section_grade(
        &self,
        attempt_id: &str,
        section_type: SectionType,
        band_score: f64,
        rubric: Option<serde_json::Value>,
        feedback: Option<String>,
        graded_by: &str,
    ) -> Result<()>;

    async fn set_band_overall(&self, attempt_id: &str, band_overall: f64) -> Result<()>;

    /// Returns `Ok(false)` when a submission already exists for this
    /// attempt section.
    async fn insert_writing_submission(&self, submission: &WritingSubmission) -> Result<bool>;

    /// SUBMITTED attempts on this teacher's bookings that still have a
    /// Writing/Speaking section without a band.
    async fn ungraded_attempts_for_teacher(&self, teacher_id: &str) -> Result<Vec<Attempt>>;
}

#[async_trait]
pub trait ExamCatalog: Send + Sync {
    async fn fetch_exam(&self, exam_id: &str) -> Result<Option<Exam>>;

    /// Band map rows for one (exam_type, section_type) pair.
    async fn band_entries(
        &self,
        exam_type: &str,
        section_type: SectionType,
    ) -> Result<Vec<BandMapEntry>>;

    /// Startup sanity pass over the band map; returns human-readable
    /// warnings (overlapping ranges) without failing the boot.
    async fn validate(&self) -> Result<Vec<String>>;
}
