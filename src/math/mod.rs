//! Mathematical utilities: least squares (linear and bounded nonlinear),
//! straight-line regression and descriptive statistics.

pub mod lm;
pub mod ols;
pub mod regression;
pub mod stats;

pub use lm::{LeastSquaresProblem, LmError, LmOptions, LmReport, Termination, minimize};
pub use ols::*;
pub use regression::{LinearFit, linear_fit};
pub use stats::*;
