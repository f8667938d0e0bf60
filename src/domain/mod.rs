//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - the validated input trace (`Trace`)
//! - intermediate stage outputs (`BaselineResult`, `PeakWindow`, `Segmentation`)
//! - fit and calibration outputs (`FittedPeak`, `CalibrationCurve`, etc.)
//! - run configuration (`QuantifyConfig`, `BoundsPolicy`)

pub mod types;

pub use types::*;
