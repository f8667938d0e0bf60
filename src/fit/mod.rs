//! Mixture fitting orchestration.
//!
//! Responsibilities:
//!
//! - seed one skew-normal per candidate and build its parameter box
//! - fit each window's mixture with bounded Levenberg–Marquardt (parallel over windows)
//! - integrate fitted peaks and collect per-window failures

pub mod bounds;
pub mod fitter;

pub use bounds::*;
pub use fitter::*;
