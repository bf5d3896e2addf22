//! Structured-file exam catalog: exams and the band map loaded once from
//! a JSON document. Serves deployments where content is authored as
//! files instead of living in the relational/document store; the engine
//! cannot tell the difference.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;

use crate::models::band::{overlap_warnings, BandMapEntry};
use crate::models::exam::{Exam, SectionType};

use super::ExamCatalog;

#[derive(Debug, Deserialize)]
struct CatalogFile {
    exams: Vec<Exam>,
    #[serde(default)]
    band_map: Vec<BandMapEntry>,
}

pub struct FileCatalog {
    exams: HashMap<String, Exam>,
    band_map: Vec<BandMapEntry>,
}

impl FileCatalog {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read catalog file {}", path.display()))?;
        let parsed: CatalogFile = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse catalog file {}", path.display()))?;

        let catalog = Self::from_parts(parsed.exams, parsed.band_map);
        for warning in catalog.band_warnings() {
            tracing::warn!("{}", warning);
        }
        tracing::info!(
            "Loaded file catalog: {} exams, {} band map entries",
            catalog.exams.len(),
            catalog.band_map.len()
        );
        Ok(catalog)
    }

    pub fn from_parts(exams: Vec<Exam>, band_map: Vec<BandMapEntry>) -> Self {
        let exams = exams.into_iter().map(|e| (e.id.clone(), e)).collect();
        Self { exams, band_map }
    }

    fn band_warnings(&self) -> Vec<String> {
        let mut warnings: Vec<String> = self
            .band_map
            .iter()
            .filter(|e| e.max_raw < e.min_raw)
            .map(|e| {
                format!(
                    "band map entry for {}/{} has inverted range [{}, {}]",
                    e.exam_type, e.section_type, e.min_raw, e.max_raw
                )
            })
            .collect();
        warnings.extend(overlap_warnings(&self.band_map));
        warnings
    }
}

#[async_trait]
impl ExamCatalog for FileCatalog {
    async fn fetch_exam(&self, exam_id: &str) -> Result<Option<Exam>> {
        Ok(self.exams.get(exam_id).cloned())
    }

    async fn band_entries(
        &self,
        exam_type: &str,
        section_type: SectionType,
    ) -> Result<Vec<BandMapEntry>> {
        Ok(self
            .band_map
            .iter()
            .filter(|e| e.exam_type == exam_type && e.section_type == section_type)
            .cloned()
            .collect())
    }

    async fn validate(&self) -> Result<Vec<String>> {
        Ok(self.band_warnings())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(
        exam_type: &str,
        section_type: SectionType,
        min_raw: i32,
        max_raw: i32,
        band: f64,
    ) -> BandMapEntry {
        BandMapEntry {
            exam_type: exam_type.into(),
            section_type,
            min_raw,
            max_raw,
            band,
        }
    }

    #[tokio::test]
    async fn band_entries_filter_by_exam_and_section() {
        let catalog = FileCatalog::from_parts(
            Vec::new(),
            vec![
                entry("ielts_academic", SectionType::Reading, 0, 12, 4.0),
                entry("ielts_academic", SectionType::Listening, 0, 12, 4.5),
                entry("general_grammar", SectionType::Grammar, 0, 10, 5.0),
            ],
        );

        let entries = catalog
            .band_entries("ielts_academic", SectionType::Reading)
            .await
            .unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].band, 4.0);
    }

    #[tokio::test]
    async fn validate_warns_on_inverted_and_overlapping_ranges() {
        let catalog = FileCatalog::from_parts(
            Vec::new(),
            vec![
                entry("ielts_academic", SectionType::Reading, 10, 5, 4.0),
                entry("ielts_academic", SectionType::Listening, 0, 10, 4.5),
                entry("ielts_academic", SectionType::Listening, 8, 15, 5.0),
            ],
        );

        let warnings = catalog.validate().await.unwrap();
        assert_eq!(warnings.len(), 2);
    }

    #[test]
    fn catalog_file_parses_exams_and_band_map() {
        let parsed: CatalogFile = serde_json::from_value(serde_json::json!({
            "exams": [{
                "_id": "exam-1",
                "exam_type": "ielts_academic",
                "sections": [{
                    "section_type": "reading",
                    "order": 1,
                    "duration_minutes": 60,
                    "questions": [{
                        "id": "q1",
                        "order": 1,
                        "type": "true_false",
                        "prompt": "T or F",
                        "key": true
                    }]
                }]
            }],
            "band_map": [{
                "exam_type": "ielts_academic",
                "section_type": "reading",
                "min_raw": 0,
                "max_raw": 1,
                "band": 5.0
            }]
        }))
        .unwrap();

        assert_eq!(parsed.exams.len(), 1);
        assert_eq!(parsed.band_map.len(), 1);
    }
}
