//! Retention-time matching of fitted peaks to known compounds.

use serde::Serialize;

use crate::domain::{CalibrationPoint, Compound, CompoundTable, FittedPeak};
use crate::error::ChromError;

/// The compound whose expected retention time is nearest to `rt`, if it lies
/// within the table tolerance (inclusive). Ties go to the earlier compound.
pub fn match_compound(rt: f64, table: &CompoundTable) -> Option<&Compound> {
    table
        .compounds()
        .iter()
        .map(|c| (c, (c.retention_time - rt).abs()))
        .filter(|(_, d)| *d <= table.tolerance)
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(c, _)| c)
}

/// Match every peak; the result is index-aligned with `peaks`.
///
/// Two peaks may map to the same compound; callers decide how to report that.
pub fn assign_compounds<'a>(peaks: &[FittedPeak], table: &'a CompoundTable) -> Vec<Option<&'a Compound>> {
    peaks.iter().map(|p| match_compound(p.location, table)).collect()
}

/// Fitted peaks of one calibration standard.
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationSample {
    pub name: String,
    pub concentration: f64,
    pub peaks: Vec<FittedPeak>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum MatchIssue {
    /// More than one peak in a standard matched the compound.
    DuplicateMatch { compound: String, sample: String, count: usize },
    /// No peak in a standard matched the compound.
    MissingMatch { compound: String, sample: String },
}

impl MatchIssue {
    pub fn compound(&self) -> &str {
        match self {
            MatchIssue::DuplicateMatch { compound, .. } | MatchIssue::MissingMatch { compound, .. } => compound,
        }
    }

    pub fn to_error(&self) -> ChromError {
        let reason = match self {
            MatchIssue::DuplicateMatch { sample, count, .. } => {
                format!("{count} peaks matched in `{sample}`, expected exactly one")
            }
            MatchIssue::MissingMatch { sample, .. } => format!("no peak matched in `{sample}`"),
        };
        ChromError::InsufficientCalibrationData {
            compound: self.compound().to_string(),
            reason,
        }
    }
}

/// Calibration points for every compound matched exactly once in every standard.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatchedCalibration {
    pub points: Vec<CalibrationPoint>,
    /// Compounds with any issue are absent from `points`.
    pub issues: Vec<MatchIssue>,
}

pub fn validate_calibration_matches(samples: &[CalibrationSample], table: &CompoundTable) -> MatchedCalibration {
    let assignments: Vec<Vec<Option<&Compound>>> = samples
        .iter()
        .map(|s| assign_compounds(&s.peaks, table))
        .collect();

    let mut out = MatchedCalibration::default();
    for compound in table.compounds() {
        let mut points = Vec::with_capacity(samples.len());
        let mut issues = Vec::new();
        for (sample, assigned) in samples.iter().zip(assignments.iter()) {
            let matched: Vec<&FittedPeak> = sample
                .peaks
                .iter()
                .zip(assigned.iter())
                .filter(|(_, c)| c.is_some_and(|c| c.name == compound.name))
                .map(|(p, _)| p)
                .collect();
            match matched.as_slice() {
                [peak] => points.push(CalibrationPoint {
                    compound: compound.name.clone(),
                    concentration: sample.concentration,
                    area: peak.area,
                }),
                [] => issues.push(MatchIssue::MissingMatch {
                    compound: compound.name.clone(),
                    sample: sample.name.clone(),
                }),
                many => issues.push(MatchIssue::DuplicateMatch {
                    compound: compound.name.clone(),
                    sample: sample.name.clone(),
                    count: many.len(),
                }),
            }
        }
        if issues.is_empty() {
            out.points.extend(points);
        } else {
            out.issues.extend(issues);
        }
    }
    out
}
