//! MongoDB-backed implementations of the storage traits.

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::bson::{doc, Bson};
use mongodb::options::{FindOptions, IndexOptions};
use mongodb::{Collection, Database, IndexModel};

use crate::metrics::track_db_operation;
use crate::models::attempt::{Attempt, AttemptSection};
use crate::models::band::{overlap_warnings, BandMapEntry};
use crate::models::booking::{Booking, BookingStatus};
use crate::models::exam::{Exam, SectionType};
use crate::models::writing::WritingSubmission;
use crate::utils::retry::{with_backoff, RetryConfig};

use super::{AttemptStore, ExamCatalog};

pub struct MongoAttemptStore {
    db: Database,
}

impl MongoAttemptStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    fn bookings(&self) -> Collection<Booking> {
        self.db.collection("bookings")
    }

    fn attempts(&self) -> Collection<Attempt> {
        self.db.collection("attempts")
    }

    fn writing_submissions(&self) -> Collection<WritingSubmission> {
        self.db.collection("writing_submissions")
    }

    /// Idempotent index reconciliation, run once at boot. The unique
    /// indexes are what make "one attempt per booking" and "one writing
    /// submission per section" hold under concurrent writers.
    pub async fn ensure_indexes(&self) -> Result<()> {
        let unique = IndexOptions::builder().unique(true).build();

        self.attempts()
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "booking_id": 1 })
                    .options(unique.clone())
                    .build(),
            )
            .await
            .context("Failed to ensure attempts.booking_id index")?;

        self.attempts()
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "teacher_id": 1, "status": 1 })
                    .build(),
            )
            .await
            .context("Failed to ensure attempts teacher/status index")?;

        self.writing_submissions()
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "attempt_id": 1, "section_type": 1 })
                    .options(unique)
                    .build(),
            )
            .await
            .context("Failed to ensure writing_submissions uniqueness index")?;

        Ok(())
    }
}

fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    matches!(
        *err.kind,
        mongodb::error::ErrorKind::Write(mongodb::error::WriteFailure::WriteError(ref we))
            if we.code == 11000
    )
}

#[async_trait]
impl AttemptStore for MongoAttemptStore {
    async fn fetch_booking(&self, booking_id: &str) -> Result<Option<Booking>> {
        let collection = self.bookings();
        track_db_operation("find_one", "bookings", async {
            with_backoff(RetryConfig::default(), || async {
                collection.find_one(doc! { "_id": booking_id }).await
            })
            .await
            .context("Failed to load booking")
        })
        .await
    }

    async fn set_booking_status(&self, booking_id: &str, status: BookingStatus) -> Result<()> {
        let collection = self.bookings();
        let status_bson = mongodb::bson::to_bson(&status)?;
        track_db_operation("update_one", "bookings", async {
            with_backoff(RetryConfig::writes(), || async {
                collection
                    .update_one(
                        doc! { "_id": booking_id },
                        doc! { "$set": { "status": status_bson.clone() } },
                    )
                    .await
            })
            .await
            .context("Failed to update booking status")?;
            Ok(())
        })
        .await
    }

    async fn insert_attempt(&self, attempt: &Attempt) -> Result<bool> {
        let collection = self.attempts();
        match collection.insert_one(attempt).await {
            Ok(_) => Ok(true),
            Err(err) if is_duplicate_key(&err) => Ok(false),
            Err(err) => Err(err).context("Failed to insert attempt"),
        }
    }

    async fn fetch_attempt(&self, attempt_id: &str) -> Result<Option<Attempt>> {
        let collection = self.attempts();
        track_db_operation("find_one", "attempts", async {
            with_backoff(RetryConfig::default(), || async {
                collection.find_one(doc! { "_id": attempt_id }).await
            })
            .await
            .context("Failed to load attempt")
        })
        .await
    }

    async fn update_section(&self, attempt_id: &str, section: &AttemptSection) -> Result<()> {
        let collection = self.attempts();
        let section_bson = mongodb::bson::to_bson(section)?;
        track_db_operation("update_one", "attempts", async {
            with_backoff(RetryConfig::writes(), || async {
                collection
                    .update_one(
                        doc! {
                            "_id": attempt_id,
                            "sections.section_type": section.section_type.as_str(),
                        },
                        doc! { "$set": { "sections.$": section_bson.clone() } },
                    )
                    .await
            })
            .await
            .context("Failed to update attempt section")?;
            Ok(())
        })
        .await
    }

    async fn replace_if_in_progress(&self, attempt: &Attempt) -> Result<bool> {
        // The status filter makes the replace a compare-and-set: of two
        // concurrent submissions only one can match the IN_PROGRESS doc.
        let collection = self.attempts();
        let result = track_db_operation("replace_one", "attempts", async {
            collection
                .replace_one(
                    doc! { "_id": &attempt.id, "status": "in_progress" },
                    attempt,
                )
                .await
                .context("Failed to submit attempt")
        })
        .await?;
        Ok(result.modified_count > 0)
    }

    async fn set_section_scores(
        &self,
        attempt_id: &str,
        section_type: SectionType,
        raw_score: i32,
        max_score: i32,
        band_score: Option<f64>,
    ) -> Result<()> {
        let collection = self.attempts();
        let band_bson = band_score.map(Bson::Double).unwrap_or(Bson::Null);
        track_db_operation("update_one", "attempts", async {
            with_backoff(RetryConfig::writes(), || async {
                collection
                    .update_one(
                        doc! {
                            "_id": attempt_id,
                            "sections.section_type": section_type.as_str(),
                        },
                        doc! { "$set": {
                            "sections.$.raw_score": raw_score,
                            "sections.$.max_score": max_score,
                            "sections.$.band_score": band_bson.clone(),
                        }},
                    )
                    .await
            })
            .await
            .context("Failed to persist section scores")?;
            Ok(())
        })
        .await
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
        let collection = self.attempts();
        let rubric_bson = match rubric {
            Some(value) => mongodb::bson::to_bson(&value)?,
            None => Bson::Null,
        };
        let feedback_bson = feedback.map(Bson::String).unwrap_or(Bson::Null);
        track_db_operation("update_one", "attempts", async {
            with_backoff(RetryConfig::writes(), || async {
                collection
                    .update_one(
                        doc! {
                            "_id": attempt_id,
                            "sections.section_type": section_type.as_str(),
                        },
                        doc! { "$set": {
                            "sections.$.band_score": band_score,
                            "sections.$.rubric": rubric_bson.clone(),
                            "sections.$.feedback": feedback_bson.clone(),
                            "sections.$.graded_by": graded_by,
                        }},
                    )
                    .await
            })
            .await
            .context("Failed to persist section grade")?;
            Ok(())
        })
        .await
    }

    async fn set_band_overall(&self, attempt_id: &str, band_overall: f64) -> Result<()> {
        let collection = self.attempts();
        track_db_operation("update_one", "attempts", async {
            with_backoff(RetryConfig::writes(), || async {
                collection
                    .update_one(
                        doc! { "_id": attempt_id },
                        doc! { "$set": { "band_overall": band_overall } },
                    )
                    .await
            })
            .await
            .context("Failed to persist overall band")?;
            Ok(())
        })
        .await
    }

    async fn insert_writing_submission(&self, submission: &WritingSubmission) -> Result<bool> {
        let collection = self.writing_submissions();
        match collection.insert_one(submission).await {
            Ok(_) => Ok(true),
            Err(err) if is_duplicate_key(&err) => Ok(false),
            Err(err) => Err(err).context("Failed to insert writing submission"),
        }
    }

    async fn ungraded_attempts_for_teacher(&self, teacher_id: &str) -> Result<Vec<Attempt>> {
        let collection = self.attempts();
        let filter = doc! {
            "teacher_id": teacher_id,
            "status": "submitted",
            "sections": { "$elemMatch": {
                "section_type": { "$in": ["writing", "speaking"] },
                "band_score": Bson::Null,
            }},
        };

        let options = FindOptions::builder()
            .sort(doc! { "submitted_at": 1 })
            .build();

        track_db_operation("find", "attempts", async {
            let mut cursor = collection
                .find(filter)
                .with_options(options)
                .await
                .context("Failed to query grading queue")?;

            let mut attempts = Vec::new();
            while let Some(attempt) = cursor
                .try_next()
                .await
                .context("Grading queue cursor error")?
            {
                attempts.push(attempt);
            }
            Ok(attempts)
        })
        .await
    }
}

pub struct MongoCatalog {
    db: Database,
}

impl MongoCatalog {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    fn exams(&self) -> Collection<Exam> {
        self.db.collection("exams")
    }

    fn band_map(&self) -> Collection<BandMapEntry> {
        self.db.collection("band_map")
    }
}

#[async_trait]
impl ExamCatalog for MongoCatalog {
    async fn fetch_exam(&self, exam_id: &str) -> Result<Option<Exam>> {
        let collection = self.exams();
        track_db_operation("find_one", "exams", async {
            with_backoff(RetryConfig::default(), || async {
                collection.find_one(doc! { "_id": exam_id }).await
            })
            .await
            .context("Failed to load exam")
        })
        .await
    }

    async fn band_entries(
        &self,
        exam_type: &str,
        section_type: SectionType,
    ) -> Result<Vec<BandMapEntry>> {
        let collection = self.band_map();
        let filter = doc! {
            "exam_type": exam_type,
            "section_type": section_type.as_str(),
        };

        let options = FindOptions::builder().sort(doc! { "min_raw": 1 }).build();

        track_db_operation("find", "band_map", async {
            let mut cursor = collection
                .find(filter)
                .with_options(options)
                .await
                .context("Failed to query band map")?;

            let mut entries = Vec::new();
            while let Some(entry) = cursor.try_next().await.context("Band map cursor error")? {
                entries.push(entry);
            }
            Ok(entries)
        })
        .await
    }

    async fn validate(&self) -> Result<Vec<String>> {
        let collection = self.band_map();
        let mut cursor = collection
            .find(doc! {})
            .await
            .context("Failed to scan band map")?;

        let mut entries = Vec::new();
        while let Some(entry) = cursor.try_next().await.context("Band map cursor error")? {
            entries.push(entry);
        }

        let mut warnings: Vec<String> = entries
            .iter()
            .filter(|e| e.max_raw < e.min_raw)
            .map(|e| {
                format!(
                    "band map entry for {}/{} has inverted range [{}, {}]",
                    e.exam_type, e.section_type, e.min_raw, e.max_raw
                )
            })
            .collect();
        warnings.extend(overlap_warnings(&entries));
        Ok(warnings)
    }
}
