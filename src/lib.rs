//! `hplc-quant` library crate.
//!
//! The binary (`hplc`) is a thin wrapper around this library so that:
//!
//! - the numerical core is testable without spawning processes
//! - the pipeline stages are reusable on in-memory traces
//! - code stays easy to navigate as the project grows
//!
//! Core stages, leaves first: [`signal`] (baseline, segmentation), [`fit`]
//! (skew-normal mixture fit), [`calibration`] (curves, matching, resolution).

pub mod app;
pub mod calibration;
pub mod cli;
pub mod data;
pub mod domain;
pub mod error;
pub mod fit;
pub mod io;
pub mod math;
pub mod models;
pub mod plot;
pub mod report;
pub mod signal;
