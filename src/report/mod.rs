//! Reporting utilities: terminal tables for traces, calibrations and quantitation.

pub mod format;

pub use format::*;
