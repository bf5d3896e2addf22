use serde::{Deserialize, Serialize};

use super::exam::SectionType;

/// One row of the raw-score → band lookup table. Entries for a given
/// (exam_type, section_type) are expected to partition the raw range;
/// overlaps are warned about at load time and gaps yield a null band.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BandMapEntry {
    pub exam_type: String,
    pub section_type: SectionType,
    pub min_raw: i32,
    pub max_raw: i32,
    pub band: f64,
}

/// Look a raw score up in a pre-filtered entry list. First matching range
/// wins; no match means the table has a gap for this score.
pub fn lookup_band(entries: &[BandMapEntry], raw_score: i32) -> Option<f64> {
    entries
        .iter()
        .find(|e| e.min_raw <= raw_score && raw_score <= e.max_raw)
        .map(|e| e.band)
}

/// Human-readable descriptions of overlapping ranges within one
/// (exam_type, section_type) entry list.
pub fn overlap_warnings(entries: &[BandMapEntry]) -> Vec<String> {
    let mut warnings = Vec::new();
    for (i, a) in entries.iter().enumerate() {
        for b in entries.iter().skip(i + 1) {
            if a.exam_type == b.exam_type
                && a.section_type == b.section_type
                && a.min_raw <= b.max_raw
                && b.min_raw <= a.max_raw
            {
                warnings.push(format!(
                    "band map overlap for {}/{}: [{}, {}] and [{}, {}]",
                    a.exam_type, a.section_type, a.min_raw, a.max_raw, b.min_raw, b.max_raw
                ));
            }
        }
    }
    warnings
}

/// A band is valid when it sits on the 0.5-step grid in [0, 9].
pub fn is_valid_band(band: f64) -> bool {
    if !(0.0..=9.0).contains(&band) {
        return false;
    }
    let doubled = band * 2.0;
    (doubled - doubled.round()).abs() < 1e-9
}

/// IELTS rounding: a fractional part of .25 rounds up to the next half
/// step, .75 rounds up to the next whole band, everything else goes to
/// the nearest half step.
pub fn round_band(value: f64) -> f64 {
    let whole = value.floor();
    let fraction = value - whole;
    // Section bands are half steps, so averages land on quarter-ish
    // fractions; the epsilon absorbs the division error.
    if fraction >= 0.75 - 1e-9 {
        whole + 1.0
    } else if fraction >= 0.25 - 1e-9 {
        whole + 0.5
    } else {
        whole
    }
}

/// Average the per-section bands and round to the permitted step. Callers
/// only invoke this once every section of the attempt carries a band.
pub fn overall_band(section_bands: &[f64]) -> Option<f64> {
    if section_bands.is_empty() {
        return None;
    }
    let sum: f64 = section_bands.iter().sum();
    Some(round_band(sum / section_bands.len() as f64))
}
