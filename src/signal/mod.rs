//! Signal conditioning: baseline removal and peak-window segmentation.

pub mod baseline;
pub mod peaks;
pub mod windows;

pub use baseline::{BaselineOptions, estimate_baseline, estimate_baseline_with};
pub use windows::{SegmentOptions, position_to_index, segment};
