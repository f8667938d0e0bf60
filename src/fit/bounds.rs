//! Initial guesses and parameter boxes for window fits.
//!
//! Per peak the parameter order is `(amplitude, location, scale, skew)`.
//!
//! - `BoundsPolicy::Default`: amplitude in `[0.5 A, 2 A + 2]`, location anywhere
//!   inside the window, scale non-negative, skew free.
//! - `BoundsPolicy::Custom([aLo, tLo, sLo, kLo, aHi, tHi, sHi, kHi])`: amplitude
//!   scaled from the seed, location offset from the seed, scale and skew literal.
//!
//! The scale lower bound is always raised to [`MIN_SCALE`] so the lineshape stays finite.

use crate::domain::{BoundsPolicy, PeakParams, PeakWindow};
use crate::error::{ChromError, Result};

/// Smallest scale the optimizer may reach.
pub const MIN_SCALE: f64 = 1e-9;

/// Seed scale floor, in time units.
const MIN_SEED_SCALE: f64 = 0.05;

/// Lower and upper bounds in flattened parameter order.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamBounds {
    pub lower: Vec<f64>,
    pub upper: Vec<f64>,
}

/// One skew-normal per candidate: observed amplitude and location, a quarter of
/// the half-height width as scale, no skew.
pub fn initial_guess(window: &PeakWindow) -> Vec<PeakParams> {
    window
        .candidates
        .iter()
        .map(|c| PeakParams {
            amplitude: c.amplitude,
            location: c.location,
            scale: (c.width / 4.0).max(MIN_SEED_SCALE),
            skew: 0.0,
        })
        .collect()
}

pub fn window_bounds(policy: &BoundsPolicy, window: &PeakWindow, seeds: &[PeakParams]) -> Result<ParamBounds> {
    let (t_min, t_max) = match (window.time.first(), window.time.last()) {
        (Some(&a), Some(&b)) => (a, b),
        _ => {
            return Err(ChromError::invalid(format!("window {} has no samples", window.id)));
        }
    };

    let mut lower = Vec::with_capacity(seeds.len() * 4);
    let mut upper = Vec::with_capacity(seeds.len() * 4);
    for s in seeds {
        let (lo, hi) = match policy {
            BoundsPolicy::Default => (
                [0.5 * s.amplitude, t_min, 0.0, f64::NEG_INFINITY],
                [2.0 * s.amplitude + 2.0, t_max, f64::INFINITY, f64::INFINITY],
            ),
            BoundsPolicy::Custom(b) => (
                [s.amplitude * b[0], s.location - b[1], b[2], b[3]],
                [s.amplitude * b[4] + 2.0, s.location + b[5], b[6], b[7]],
            ),
        };
        lower.extend_from_slice(&lo);
        upper.extend_from_slice(&hi);
        let k = lower.len() - 2;
        lower[k] = lower[k].max(MIN_SCALE);
    }

    if let Some(k) = (0..lower.len()).find(|&k| !(lower[k] <= upper[k])) {
        const NAMES: [&str; 4] = ["amplitude", "location", "scale", "skew"];
        return Err(ChromError::invalid(format!(
            "window {}: {} bound of peak {} is empty ([{}, {}])",
            window.id,
            NAMES[k % 4],
            k / 4 + 1,
            lower[k],
            upper[k]
        )));
    }

    Ok(ParamBounds { lower, upper })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PeakCandidate;

    fn window() -> PeakWindow {
        PeakWindow {
            id: 3,
            start: 10,
            end: 15,
            time: vec![1.0, 1.1, 1.2, 1.3, 1.4],
            intensity: vec![0.0, 2.0, 4.0, 2.0, 0.0],
            baseline_height: 0.0,
            candidates: vec![PeakCandidate {
                index: 12,
                amplitude: 4.0,
                location: 1.2,
                width: 0.1,
            }],
        }
    }

    #[test]
    fn seed_scale_has_a_floor() {
        let seeds = initial_guess(&window());
        assert_eq!(seeds.len(), 1);
        assert_eq!(seeds[0].scale, 0.05);
        assert_eq!(seeds[0].skew, 0.0);
    }

    #[test]
    fn default_bounds() {
        let w = window();
        let b = window_bounds(&BoundsPolicy::Default, &w, &initial_guess(&w)).unwrap();
        assert_eq!(b.lower[..2], [2.0, 1.0]);
        assert_eq!(b.lower[2], MIN_SCALE);
        assert_eq!(b.lower[3], f64::NEG_INFINITY);
        assert_eq!(b.upper[..3], [10.0, 1.4, f64::INFINITY]);
    }

    #[test]
    fn custom_bounds_are_relative_to_the_seed() {
        let w = window();
        let policy = BoundsPolicy::Custom([0.9, 0.05, 0.01, -2.0, 1.1, 0.05, 0.5, 2.0]);
        let b = window_bounds(&policy, &w, &initial_guess(&w)).unwrap();
        assert!((b.lower[0] - 3.6).abs() < 1e-12);
        assert!((b.upper[0] - 6.4).abs() < 1e-12);
        assert!((b.lower[1] - 1.15).abs() < 1e-12);
        assert!((b.upper[1] - 1.25).abs() < 1e-12);
        assert_eq!(b.lower[2], 0.01);
        assert_eq!(b.upper[3], 2.0);
    }

    #[test]
    fn empty_bound_is_invalid_input() {
        let w = window();
        let policy = BoundsPolicy::Custom([1.0, 0.1, 0.5, -1.0, 1.0, 0.1, 0.1, 1.0]);
        let err = window_bounds(&policy, &w, &initial_guess(&w)).unwrap_err();
        assert!(matches!(err, ChromError::InvalidInput(ref m) if m.contains("scale")));
    }
}
