//! Back-calculation of concentrations from calibration lines.

use serde::Serialize;

use crate::calibration::matching::match_compound;
use crate::domain::{CalibrationCurve, CompoundTable, FittedPeak};
use crate::error::{ChromError, Result};

/// `concentration = (area - intercept) / slope`.
pub fn resolve(area: f64, curve: &CalibrationCurve) -> Result<f64> {
    if !area.is_finite() {
        return Err(ChromError::invalid(format!(
            "peak area for `{}` is not finite ({area})",
            curve.compound
        )));
    }
    if curve.slope == 0.0 || !curve.slope.is_finite() {
        return Err(ChromError::DivisionUndefined {
            compound: curve.compound.clone(),
            slope: curve.slope,
        });
    }
    Ok((area - curve.intercept) / curve.slope)
}

/// One fitted peak of an unknown sample, identified and quantified where possible.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Quantitation {
    pub sample: String,
    pub peak_index: usize,
    pub retention_time: f64,
    pub area: f64,
    pub compound: Option<String>,
    pub concentration: Option<f64>,
    /// Why `concentration` is missing, if it is.
    pub note: Option<String>,
}

/// Identify every peak of a sample and resolve its concentration.
///
/// Peaks that match no compound are kept with `compound = None`. A compound
/// without a curve, or with an unusable curve, is reported in `note`.
pub fn quantify_sample(
    sample: &str,
    peaks: &[FittedPeak],
    table: &CompoundTable,
    curves: &[CalibrationCurve],
) -> Vec<Quantitation> {
    peaks
        .iter()
        .map(|p| {
            let mut q = Quantitation {
                sample: sample.to_string(),
                peak_index: p.peak_index,
                retention_time: p.location,
                area: p.area,
                compound: None,
                concentration: None,
                note: None,
            };
            let Some(compound) = match_compound(p.location, table) else {
                q.note = Some("unidentified".to_string());
                return q;
            };
            q.compound = Some(compound.name.clone());
            match curves.iter().find(|c| c.compound == compound.name) {
                None => q.note = Some("no calibration curve".to_string()),
                Some(curve) => match resolve(p.area, curve) {
                    Ok(c) => q.concentration = Some(c),
                    Err(e) => q.note = Some(e.to_string()),
                },
            }
            q
        })
        .collect()
}
