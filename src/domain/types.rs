//! Shared domain types.
//!
//! These types are intentionally kept lightweight and serializable so they can be:
//!
//! - used in-memory by the numerical core
//! - exported to CSV/JSON
//! - reloaded later (calibration files) for measurement batches

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ChromError, Result};

/// A chromatogram: strictly increasing time with one intensity per sample.
///
/// The fields are private so every `Trace` in the program has passed
/// validation in [`Trace::new`].
#[derive(Debug, Clone, PartialEq)]
pub struct Trace {
    time: Vec<f64>,
    intensity: Vec<f64>,
}

impl Trace {
    /// Minimum number of samples for peak detection to be meaningful.
    pub const MIN_SAMPLES: usize = 3;

    pub fn new(time: Vec<f64>, intensity: Vec<f64>) -> Result<Self> {
        if time.len() != intensity.len() {
            return Err(ChromError::invalid(format!(
                "time and intensity lengths differ ({} vs {})",
                time.len(),
                intensity.len()
            )));
        }
        if time.len() < Self::MIN_SAMPLES {
            return Err(ChromError::invalid(format!(
                "trace needs at least {} samples, got {}",
                Self::MIN_SAMPLES,
                time.len()
            )));
        }
        if let Some(i) = time.iter().chain(intensity.iter()).position(|v| !v.is_finite()) {
            return Err(ChromError::invalid(format!("non-finite value at position {i}")));
        }
        if let Some(i) = time.windows(2).position(|w| w[1] <= w[0]) {
            return Err(ChromError::invalid(format!(
                "time is not strictly increasing at sample {} ({} -> {})",
                i + 1,
                time[i],
                time[i + 1]
            )));
        }
        Ok(Self { time, intensity })
    }

    pub fn time(&self) -> &[f64] {
        &self.time
    }

    pub fn intensity(&self) -> &[f64] {
        &self.intensity
    }

    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    /// Mean spacing between consecutive samples.
    pub fn mean_step(&self) -> f64 {
        let n = self.time.len();
        (self.time[n - 1] - self.time[0]) / (n as f64 - 1.0)
    }

    /// Same time axis, new intensities.
    pub fn with_intensity(&self, intensity: Vec<f64>) -> Result<Self> {
        Self::new(self.time.clone(), intensity)
    }

    /// Restrict to `start <= t <= end`.
    pub fn crop(&self, start: f64, end: f64) -> Result<Self> {
        if !(start.is_finite() && end.is_finite()) || start >= end {
            return Err(ChromError::invalid(format!(
                "time window [{start}, {end}] must be finite with start < end"
            )));
        }
        let (time, intensity): (Vec<f64>, Vec<f64>) = self
            .time
            .iter()
            .zip(self.intensity.iter())
            .filter(|(t, _)| **t >= start && **t <= end)
            .map(|(&t, &y)| (t, y))
            .unzip();
        Self::new(time, intensity).map_err(|e| {
            ChromError::invalid(format!("time window [{start}, {end}] leaves no usable trace ({e})"))
        })
    }
}

/// Output of baseline estimation, index-aligned with the input trace.
#[derive(Debug, Clone, PartialEq)]
pub struct BaselineResult {
    pub baseline: Vec<f64>,
    pub corrected: Vec<f64>,
    /// Constant shift applied before clipping (median of negative samples, or 0).
    pub shift: f64,
}

impl BaselineResult {
    /// True when the corrected signal has no variance (nothing to segment).
    pub fn is_flat(&self) -> bool {
        let Some(first) = self.corrected.first() else {
            return true;
        };
        self.corrected.iter().all(|v| v == first)
    }
}

/// A detected (or manually placed) peak used to seed the fit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeakCandidate {
    /// Index into the full trace.
    pub index: usize,
    pub amplitude: f64,
    /// Time at `index`.
    pub location: f64,
    /// Full width at half height, in time units.
    pub width: f64,
}

/// A contiguous range of the trace holding one peak cluster.
#[derive(Debug, Clone, PartialEq)]
pub struct PeakWindow {
    /// 1-based window id.
    pub id: usize,
    /// First trace index (inclusive).
    pub start: usize,
    /// Last trace index (exclusive).
    pub end: usize,
    pub time: Vec<f64>,
    pub intensity: Vec<f64>,
    /// Evaluation height of the peak that defined this window.
    pub baseline_height: f64,
    pub candidates: Vec<PeakCandidate>,
}

impl PeakWindow {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    pub fn contains_index(&self, index: usize) -> bool {
        index >= self.start && index < self.end
    }
}

/// A sample range claimed by two raw windows; the later window keeps it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WindowOverlap {
    pub earlier: usize,
    pub later: usize,
    pub start: usize,
    pub end: usize,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Segmentation {
    pub windows: Vec<PeakWindow>,
    pub overlaps: Vec<WindowOverlap>,
    /// Candidates dropped because they sat exactly on the first sample.
    pub discarded_at_boundary: usize,
}

impl Segmentation {
    pub fn candidate_count(&self) -> usize {
        self.windows.iter().map(|w| w.candidates.len()).sum()
    }
}

/// Skew-normal lineshape parameters for one peak.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PeakParams {
    pub amplitude: f64,
    pub location: f64,
    pub scale: f64,
    pub skew: f64,
}

/// One fitted peak.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedPeak {
    pub window_id: usize,
    /// 1-based position of the peak within the trace's fit output.
    pub peak_index: usize,
    /// Candidate location the optimizer started from.
    pub seed_location: f64,
    pub amplitude: f64,
    /// Retention time.
    pub location: f64,
    pub scale: f64,
    pub skew: f64,
    pub area: f64,
}

impl FittedPeak {
    pub fn params(&self) -> PeakParams {
        PeakParams {
            amplitude: self.amplitude,
            location: self.location,
            scale: self.scale,
            skew: self.skew,
        }
    }
}

/// A window that produced no peaks, and why.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowFailure {
    pub window_id: usize,
    pub error: ChromError,
}

/// Aggregated fit output for one trace.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FitReport {
    pub peaks: Vec<FittedPeak>,
    pub failures: Vec<WindowFailure>,
}

/// Bounds used by the mixture fitter.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum BoundsPolicy {
    /// `[0.5 A, t_min, 0, -inf]` .. `[2 A + 2, t_max, +inf, +inf]` per peak.
    #[default]
    Default,
    /// `[aLo, tLo, sLo, kLo, aHi, tHi, sHi, kHi]`: amplitude multipliers, offsets
    /// around the seed location, literal scale and skew limits.
    Custom([f64; 8]),
}

impl BoundsPolicy {
    /// Parse `"aLo,tLo,sLo,kLo,aHi,tHi,sHi,kHi"` (`inf`/`-inf` accepted).
    pub fn parse(s: &str) -> Result<Self> {
        let values: Vec<f64> = s
            .split(',')
            .map(|v| {
                v.trim()
                    .parse::<f64>()
                    .map_err(|_| ChromError::invalid(format!("invalid bound value `{}`", v.trim())))
            })
            .collect::<Result<_>>()?;
        let arr: [f64; 8] = values.as_slice().try_into().map_err(|_| {
            ChromError::invalid(format!("bounds need exactly 8 values, got {}", values.len()))
        })?;
        if arr.iter().any(|v| v.is_nan()) {
            return Err(ChromError::invalid("bounds must not contain NaN"));
        }
        Ok(BoundsPolicy::Custom(arr))
    }
}

/// A known analyte and where it elutes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Compound {
    pub name: String,
    pub retention_time: f64,
}

/// Expected retention times, sorted ascending, plus the match tolerance.
#[derive(Debug, Clone, PartialEq)]
pub struct CompoundTable {
    compounds: Vec<Compound>,
    pub tolerance: f64,
}

impl CompoundTable {
    pub fn new(mut compounds: Vec<Compound>, tolerance: f64) -> Result<Self> {
        if !(tolerance.is_finite() && tolerance >= 0.0) {
            return Err(ChromError::invalid(format!(
                "retention time tolerance must be finite and >= 0, got {tolerance}"
            )));
        }
        if let Some(c) = compounds.iter().find(|c| !c.retention_time.is_finite()) {
            return Err(ChromError::invalid(format!(
                "compound `{}` has a non-finite retention time",
                c.name
            )));
        }
        compounds.sort_by(|a, b| a.retention_time.total_cmp(&b.retention_time));
        Ok(Self { compounds, tolerance })
    }

    pub fn compounds(&self) -> &[Compound] {
        &self.compounds
    }

    /// Expected retention times, in table order (usable as manual peak positions).
    pub fn retention_times(&self) -> Vec<f64> {
        self.compounds.iter().map(|c| c.retention_time).collect()
    }
}

/// One (sample, compound) measurement used to build a calibration line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationPoint {
    pub compound: String,
    pub concentration: f64,
    pub area: f64,
}

/// `area = slope * concentration + intercept`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationCurve {
    pub compound: String,
    pub slope: f64,
    pub intercept: f64,
    pub r_squared: f64,
    pub n_points: usize,
}

/// A saved calibration file (JSON).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalibrationFile {
    pub tool: String,
    pub generated_at: DateTime<Utc>,
    pub rt_tolerance: f64,
    pub compounds: Vec<Compound>,
    pub curves: Vec<CalibrationCurve>,
}

/// A full quantification run's configuration as understood by the pipeline.
///
/// This is derived from CLI flags (plus defaults).
#[derive(Debug, Clone, PartialEq)]
pub struct QuantifyConfig {
    pub time_column: String,
    pub intensity_column: String,
    /// Optional `[start, end]` crop applied before anything else.
    pub time_window: Option<(f64, f64)>,
    /// Subtract the first intensity from every sample before baseline estimation.
    pub zero_first_sample: bool,

    /// LLS iterations (0 disables baseline subtraction).
    pub baseline_iterations: usize,
    /// Shift by the median negative value before clipping.
    pub shift_negative: bool,

    pub prominence: f64,
    pub rel_height: f64,
    /// Window padding in samples.
    pub buffer: usize,
    pub manual_positions: Option<Vec<f64>>,
    /// Subtract the window baseline height before fitting.
    pub window_baseline_correction: bool,

    pub bounds: BoundsPolicy,
    pub max_iter: usize,
}

impl Default for QuantifyConfig {
    fn default() -> Self {
        Self {
            time_column: "time_min".to_string(),
            intensity_column: "intensity_mV".to_string(),
            time_window: None,
            zero_first_sample: false,
            baseline_iterations: 80,
            shift_negative: true,
            prominence: 1e-3,
            rel_height: 1.0,
            buffer: 100,
            manual_positions: None,
            window_baseline_correction: false,
            bounds: BoundsPolicy::Default,
            max_iter: 10_000,
        }
    }
}
