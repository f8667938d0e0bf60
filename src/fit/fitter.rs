//! Per-window mixture fitting.
//!
//! Given a [`PeakWindow`] with `k` candidates we fit a sum of `k` skew-normal
//! lineshapes to the window's samples:
//!
//! - seeds and bounds come from [`crate::fit::bounds`]
//! - the bounded Levenberg–Marquardt solver in [`crate::math::lm`] does the fit
//! - each fitted peak is integrated over the window to give its area
//!
//! Windows are independent: [`fit_windows`] fits them in parallel and records
//! failures without affecting sibling windows.

use nalgebra::{DMatrix, DVector};
use rayon::prelude::*;
use tracing::{debug, warn};

use crate::domain::{
    BoundsPolicy, FitReport, FittedPeak, PeakParams, PeakWindow, QuantifyConfig, WindowFailure,
};
use crate::error::{ChromError, Result};
use crate::fit::bounds::{initial_guess, window_bounds};
use crate::math::lm::{LeastSquaresProblem, LmError, LmOptions, minimize};
use crate::models::{PARAMS_PER_PEAK, evaluate, evaluate_mixture, fill_jacobian_row, flatten_params, unflatten_params};

#[derive(Debug, Clone, PartialEq, Default)]
pub struct FitOptions {
    pub bounds: BoundsPolicy,
    pub lm: LmOptions,
}

impl From<&QuantifyConfig> for FitOptions {
    fn from(cfg: &QuantifyConfig) -> Self {
        Self {
            bounds: cfg.bounds,
            lm: LmOptions {
                max_iter: cfg.max_iter,
                ..LmOptions::default()
            },
        }
    }
}

/// Residuals of a skew-normal sum against one window.
struct WindowProblem<'a> {
    time: &'a [f64],
    intensity: &'a [f64],
}

impl LeastSquaresProblem for WindowProblem<'_> {
    fn residual_count(&self) -> usize {
        self.time.len()
    }

    fn residuals(&self, params: &[f64], out: &mut DVector<f64>) {
        let peaks = unflatten_params(params);
        for (i, (&t, &y)) in self.time.iter().zip(self.intensity).enumerate() {
            out[i] = evaluate_mixture(t, &peaks) - y;
        }
    }

    fn jacobian(&self, params: &[f64], out: &mut DMatrix<f64>) {
        let peaks = unflatten_params(params);
        let mut row = [0.0; PARAMS_PER_PEAK];
        for (i, &t) in self.time.iter().enumerate() {
            for (k, p) in peaks.iter().enumerate() {
                fill_jacobian_row(t, p, &mut row);
                for (j, v) in row.iter().enumerate() {
                    out[(i, k * PARAMS_PER_PEAK + j)] = *v;
                }
            }
        }
    }
}

/// Area of one peak over the window's time range (rectangle rule on the samples).
pub fn peak_area(params: &PeakParams, time: &[f64]) -> f64 {
    let n = time.len();
    if n < 2 {
        return 0.0;
    }
    let dt = (time[n - 1] - time[0]) / (n - 1) as f64;
    time.iter().map(|&t| evaluate(t, params)).sum::<f64>() * dt
}

/// Fit all candidates of one window jointly.
///
/// Peaks are returned in candidate order with `peak_index` counting from 1
/// within the window. A window without candidates yields no peaks.
pub fn fit_window(window: &PeakWindow, opts: &FitOptions) -> Result<Vec<FittedPeak>> {
    if window.candidates.is_empty() {
        return Ok(Vec::new());
    }
    if window.time.len() < 2 || window.time.len() != window.intensity.len() {
        return Err(ChromError::invalid(format!(
            "window {} needs at least two samples with matching time/intensity",
            window.id
        )));
    }

    let seeds = initial_guess(window);
    let bounds = window_bounds(&opts.bounds, window, &seeds)?;
    let problem = WindowProblem {
        time: &window.time,
        intensity: &window.intensity,
    };

    let report = minimize(&problem, &flatten_params(&seeds), &bounds.lower, &bounds.upper, &opts.lm)
        .map_err(|e| match e {
            LmError::InvalidBounds { .. } | LmError::DimensionMismatch => {
                ChromError::invalid(format!("window {}: {e}", window.id))
            }
            LmError::MaxIterations { .. } | LmError::NonFinite { .. } => ChromError::FitNonConvergence {
                window: window.id,
                iterations: e.iterations(),
                reason: e.to_string(),
            },
        })?;

    if report.params.iter().any(|v| !v.is_finite()) {
        return Err(ChromError::FitNonConvergence {
            window: window.id,
            iterations: report.iterations,
            reason: "non-finite parameters".to_string(),
        });
    }
    debug!(
        window = window.id,
        peaks = seeds.len(),
        iterations = report.iterations,
        cost = report.cost,
        termination = ?report.termination,
        "window fitted"
    );

    let fitted = unflatten_params(&report.params);
    Ok(fitted
        .iter()
        .zip(window.candidates.iter())
        .enumerate()
        .map(|(k, (p, c))| FittedPeak {
            window_id: window.id,
            peak_index: k + 1,
            seed_location: c.location,
            amplitude: p.amplitude,
            location: p.location,
            scale: p.scale,
            skew: p.skew,
            area: peak_area(p, &window.time),
        })
        .collect())
}

/// Fit every window in parallel and aggregate in window order.
///
/// `peak_index` is renumbered to run from 1 across the whole trace.
pub fn fit_windows(windows: &[PeakWindow], opts: &FitOptions) -> FitReport {
    let results: Vec<(usize, Result<Vec<FittedPeak>>)> = windows
        .par_iter()
        .filter(|w| !w.candidates.is_empty())
        .map(|w| (w.id, fit_window(w, opts)))
        .collect();

    let mut report = FitReport::default();
    for (window_id, result) in results {
        match result {
            Ok(peaks) => report.peaks.extend(peaks),
            Err(error) => {
                warn!(window = window_id, error = %error, "window fit failed");
                report.failures.push(WindowFailure { window_id, error });
            }
        }
    }
    for (i, p) in report.peaks.iter_mut().enumerate() {
        p.peak_index = i + 1;
    }
    report
}

/// Each fitted peak evaluated over the full time axis (one row per peak).
pub fn mixture_components(time: &[f64], peaks: &[FittedPeak]) -> Vec<Vec<f64>> {
    peaks
        .iter()
        .map(|p| {
            let params = p.params();
            time.iter().map(|&t| evaluate(t, &params)).collect()
        })
        .collect()
}
