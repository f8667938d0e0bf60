//! Skew-normal lineshape.
//!
//! ```text
//! f(t) = A · exp(-u²/2) · (1 + erf(α u / √2)),   u = (t - μ) / σ
//! ```
//!
//! The fitter needs three primitives:
//! - evaluate one peak (or a sum of peaks) at `t`
//! - fill the four Jacobian entries of one peak at `t`
//! - move between `[PeakParams]` and the flat vector the optimizer works on

use std::f64::consts::{FRAC_1_SQRT_2, PI};

use statrs::function::erf::erf;

use crate::domain::PeakParams;

/// Number of parameters per peak.
pub const PARAMS_PER_PEAK: usize = 4;

/// Evaluate one peak at `t`.
pub fn evaluate(t: f64, p: &PeakParams) -> f64 {
    let u = (t - p.location) / p.scale;
    p.amplitude * (-0.5 * u * u).exp() * (1.0 + erf(p.skew * u * FRAC_1_SQRT_2))
}

/// Evaluate a sum of peaks at `t`.
pub fn evaluate_mixture(t: f64, peaks: &[PeakParams]) -> f64 {
    peaks.iter().map(|p| evaluate(t, p)).sum()
}

/// Partial derivatives of [`evaluate`] with respect to
/// `(amplitude, location, scale, skew)`, written into `out`.
///
/// # Panics
/// Panics if `out.len() < 4`.
pub fn fill_jacobian_row(t: f64, p: &PeakParams, out: &mut [f64]) {
    let u = (t - p.location) / p.scale;
    let gauss = (-0.5 * u * u).exp();
    let z = p.skew * u * FRAC_1_SQRT_2;
    let cdf_term = 1.0 + erf(z);
    // d/dz erf(z) = 2/√π · exp(-z²)
    let erf_slope = 2.0 / PI.sqrt() * (-z * z).exp();

    // df/du at fixed A, α.
    let df_du = p.amplitude * gauss * (-u * cdf_term + erf_slope * p.skew * FRAC_1_SQRT_2);

    out[0] = gauss * cdf_term;
    out[1] = -df_du / p.scale;
    out[2] = -df_du * u / p.scale;
    out[3] = p.amplitude * gauss * erf_slope * u * FRAC_1_SQRT_2;
}

/// `[A0, μ0, σ0, α0, A1, μ1, ...]`.
pub fn flatten_params(peaks: &[PeakParams]) -> Vec<f64> {
    peaks
        .iter()
        .flat_map(|p| [p.amplitude, p.location, p.scale, p.skew])
        .collect()
}

/// Inverse of [`flatten_params`]; trailing values that do not fill a peak are ignored.
pub fn unflatten_params(flat: &[f64]) -> Vec<PeakParams> {
    flat.chunks_exact(PARAMS_PER_PEAK)
        .map(|c| PeakParams {
            amplitude: c[0],
            location: c[1],
            scale: c[2],
            skew: c[3],
        })
        .collect()
}

/// Closed-form area under one peak: `A · σ · √(2π)` (independent of skew).
pub fn analytic_area(p: &PeakParams) -> f64 {
    p.amplitude * p.scale * (2.0 * PI).sqrt()
}
