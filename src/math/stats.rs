//! Small descriptive statistics helpers.

use serde::Serialize;

/// Median of a slice; sorts in place. `None` when empty.
pub fn median(values: &mut [f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mid = values.len() / 2;
    if values.len() % 2 == 1 {
        Some(values[mid])
    } else {
        Some((values[mid - 1] + values[mid]) / 2.0)
    }
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Summary of replicate measurements (population standard deviation).
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ReplicateStats {
    pub n: usize,
    pub mean: f64,
    pub std_dev: f64,
    /// Coefficient of variation in percent; NaN when the mean is zero.
    pub cv_percent: f64,
}

pub fn replicate_stats(values: &[f64]) -> Option<ReplicateStats> {
    let m = mean(values)?;
    let n = values.len();
    let ss: f64 = values.iter().map(|v| (v - m).powi(2)).sum();
    let std_dev = (ss / n as f64).sqrt();
    let cv_percent = if m != 0.0 {
        100.0 * std_dev / m.abs()
    } else {
        f64::NAN
    };
    Some(ReplicateStats {
        n,
        mean: m,
        std_dev,
        cv_percent,
    })
}
