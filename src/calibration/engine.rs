//! Calibration curves: ordinary least squares of peak area on concentration.

use rayon::prelude::*;
use tracing::warn;

use crate::domain::{CalibrationCurve, CalibrationPoint};
use crate::error::{ChromError, Result};
use crate::math::linear_fit;

/// Curves fitted per compound plus the compounds that could not be calibrated.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CalibrationSet {
    pub curves: Vec<CalibrationCurve>,
    pub failures: Vec<(String, ChromError)>,
}

impl CalibrationSet {
    pub fn curve(&self, compound: &str) -> Option<&CalibrationCurve> {
        self.curves.iter().find(|c| c.compound == compound)
    }
}

/// Fit `area = slope · concentration + intercept` for one compound.
///
/// Only points whose `compound` matches are used. At least two distinct
/// concentrations are required.
pub fn fit_curve(compound: &str, points: &[CalibrationPoint]) -> Result<CalibrationCurve> {
    let own: Vec<&CalibrationPoint> = points.iter().filter(|p| p.compound == compound).collect();
    if let Some(p) = own
        .iter()
        .find(|p| !p.concentration.is_finite() || !p.area.is_finite())
    {
        return Err(ChromError::invalid(format!(
            "calibration point for `{compound}` is not finite (concentration {}, area {})",
            p.concentration, p.area
        )));
    }

    let conc: Vec<f64> = own.iter().map(|p| p.concentration).collect();
    let area: Vec<f64> = own.iter().map(|p| p.area).collect();

    let mut levels = conc.clone();
    levels.sort_by(f64::total_cmp);
    levels.dedup();
    if levels.len() < 2 {
        return Err(ChromError::InsufficientCalibrationData {
            compound: compound.to_string(),
            reason: format!(
                "need at least 2 distinct concentrations, got {} from {} point(s)",
                levels.len(),
                own.len()
            ),
        });
    }

    let fit = linear_fit(&conc, &area).ok_or_else(|| ChromError::InsufficientCalibrationData {
        compound: compound.to_string(),
        reason: "regression is undefined".to_string(),
    })?;

    Ok(CalibrationCurve {
        compound: compound.to_string(),
        slope: fit.slope,
        intercept: fit.intercept,
        r_squared: fit.r_squared,
        n_points: own.len(),
    })
}

/// Fit one curve per compound (in order of first appearance), independently.
pub fn fit_curves(points: &[CalibrationPoint]) -> CalibrationSet {
    let mut compounds: Vec<&str> = Vec::new();
    for p in points {
        if !compounds.contains(&p.compound.as_str()) {
            compounds.push(&p.compound);
        }
    }

    let results: Vec<(&str, Result<CalibrationCurve>)> = compounds
        .par_iter()
        .map(|&c| (c, fit_curve(c, points)))
        .collect();

    let mut set = CalibrationSet::default();
    for (compound, result) in results {
        match result {
            Ok(curve) => set.curves.push(curve),
            Err(err) => {
                warn!(compound, error = %err, "calibration failed");
                set.failures.push((compound.to_string(), err));
            }
        }
    }
    set
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pt(compound: &str, concentration: f64, area: f64) -> CalibrationPoint {
        CalibrationPoint {
            compound: compound.to_string(),
            concentration,
            area,
        }
    }

    #[test]
    fn exact_calibration_line() {
        let points = [pt("Gln", 1.0, 100.0), pt("Gln", 2.0, 200.0), pt("Gln", 3.0, 300.0)];
        let curve = fit_curve("Gln", &points).unwrap();
        assert!((curve.slope - 100.0).abs() < 1e-9);
        assert!(curve.intercept.abs() < 1e-9);
        assert!((curve.r_squared - 1.0).abs() < 1e-12);
        assert_eq!(curve.n_points, 3);
    }

    #[test]
    fn single_level_is_insufficient() {
        let points = [pt("Gln", 1.0, 100.0), pt("Gln", 1.0, 110.0)];
        let err = fit_curve("Gln", &points).unwrap_err();
        assert!(matches!(err, ChromError::InsufficientCalibrationData { .. }));
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn non_finite_point_is_invalid() {
        let points = [pt("Gln", 1.0, f64::NAN), pt("Gln", 2.0, 200.0)];
        assert!(matches!(fit_curve("Gln", &points), Err(ChromError::InvalidInput(_))));
    }

    #[test]
    fn compounds_are_fitted_independently() {
        let points = [
            pt("Arg", 1.0, 10.0),
            pt("Glu", 1.0, 50.0),
            pt("Arg", 2.0, 20.0),
            pt("Glu", 1.0, 55.0),
        ];
        let set = fit_curves(&points);
        assert_eq!(set.curves.len(), 1);
        assert_eq!(set.curves[0].compound, "Arg");
        assert_eq!(set.failures.len(), 1);
        assert_eq!(set.failures[0].0, "Glu");
        assert!(set.curve("Arg").is_some());
    }
}
