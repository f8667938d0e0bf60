//! Calibration and quantitation.
//!
//! - `engine`: per-compound calibration lines (area vs. concentration)
//! - `matching`: retention-time identification and calibration-set validation
//! - `resolve`: concentrations of unknowns from a calibration line

pub mod engine;
pub mod matching;
pub mod resolve;

pub use engine::{CalibrationSet, fit_curve, fit_curves};
pub use matching::{
    CalibrationSample, MatchIssue, MatchedCalibration, assign_compounds, match_compound,
    validate_calibration_matches,
};
pub use resolve::{Quantitation, quantify_sample, resolve};
