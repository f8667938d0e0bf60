//! Input/output helpers.
//!
//! - trace ingest: tidy CSV and instrument text export (`ingest`)
//! - compound tables (`compounds`)
//! - result exports (CSV) (`export`)
//! - calibration JSON read/write (`curve`)

pub mod compounds;
pub mod curve;
pub mod export;
pub mod ingest;

pub use compounds::*;
pub use curve::*;
pub use export::*;
pub use ingest::*;
