//! Peak-window segmentation.
//!
//! Each candidate peak gets a raw window `[left_ip - buffer, right_ip + buffer]`
//! (half-open, clamped to the trace). Raw windows are then reconciled as plain
//! intervals:
//!
//! - a window contained in another one is dropped (of identical windows the
//!   first candidate's is kept)
//! - partially overlapping windows are both kept; shared samples go to the
//!   later window and the overlap is recorded in [`Segmentation::overlaps`]
//!
//! Candidates are then re-attached to every surviving window whose final
//! sample range contains them.

use tracing::{debug, warn};

use crate::domain::{PeakCandidate, PeakWindow, QuantifyConfig, Segmentation, Trace, WindowOverlap};
use crate::error::{ChromError, Result};
use crate::signal::peaks::{find_peaks, peak_prominence, peak_width};

#[derive(Debug, Clone, PartialEq)]
pub struct SegmentOptions {
    /// Minimum prominence on the `[0, 1]`-normalised signal.
    pub prominence: f64,
    /// Relative height at which window bounds are measured (1.0 = full base).
    pub rel_height: f64,
    /// Padding added on both sides of each window, in samples.
    pub buffer: usize,
    /// Use these retention times instead of automatic detection.
    pub manual_positions: Option<Vec<f64>>,
    pub window_baseline_correction: bool,
}

impl Default for SegmentOptions {
    fn default() -> Self {
        Self {
            prominence: 1e-3,
            rel_height: 1.0,
            buffer: 100,
            manual_positions: None,
            window_baseline_correction: false,
        }
    }
}

impl From<&QuantifyConfig> for SegmentOptions {
    fn from(cfg: &QuantifyConfig) -> Self {
        Self {
            prominence: cfg.prominence,
            rel_height: cfg.rel_height,
            buffer: cfg.buffer,
            manual_positions: cfg.manual_positions.clone(),
            window_baseline_correction: cfg.window_baseline_correction,
        }
    }
}

impl SegmentOptions {
    fn validate(&self) -> Result<()> {
        for (name, v) in [("prominence", self.prominence), ("rel_height", self.rel_height)] {
            if !v.is_finite() || !(0.0..=1.0).contains(&v) {
                return Err(ChromError::invalid(format!(
                    "{name} must be within [0, 1], got {v}"
                )));
            }
        }
        Ok(())
    }
}

/// A candidate together with the measurements taken on it.
#[derive(Debug, Clone, Copy)]
struct Measured {
    index: usize,
    /// FWHM in time units.
    half_width: f64,
    /// Evaluation height at `rel_height`.
    base_height: f64,
}

/// Half-open sample range `[start, end)` owned by candidate `slot`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Interval {
    start: usize,
    end: usize,
    slot: usize,
}

impl Interval {
    fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    fn intersection(&self, other: &Interval) -> Option<(usize, usize)> {
        let start = self.start.max(other.start);
        let end = self.end.min(other.end);
        (start < end).then_some((start, end))
    }
}

/// Map a retention time onto a sample index.
///
/// Uses the mean step over `n` intervals and truncates, so a position equal to
/// the first time maps to index 0 and the last time maps to `n - 1`.
pub fn position_to_index(trace: &Trace, position: f64) -> Result<usize> {
    let time = trace.time();
    let n = time.len();
    let (t0, t_last) = (time[0], time[n - 1]);
    if !position.is_finite() || position < t0 || position > t_last {
        return Err(ChromError::invalid(format!(
            "manual peak position {position} is outside the trace time range [{t0}, {t_last}]"
        )));
    }
    let step = (t_last - t0) / n as f64;
    let idx = ((position - t0) / step).trunc() as usize;
    Ok(idx.min(n - 1))
}

/// Locate candidate peaks and group them into fitting windows.
///
/// `trace` should already be baseline corrected.
pub fn segment(trace: &Trace, opts: &SegmentOptions) -> Result<Segmentation> {
    opts.validate()?;
    let x = trace.intensity();
    let time = trace.time();
    let n = x.len();

    let (min, max) = x
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    let range = max - min;
    if range <= 0.0 {
        debug!("constant trace, nothing to segment");
        return Ok(Segmentation::default());
    }

    let mut indices = match &opts.manual_positions {
        Some(positions) => positions
            .iter()
            .map(|&p| position_to_index(trace, p))
            .collect::<Result<Vec<_>>>()?,
        None => {
            let norm: Vec<f64> = x.iter().map(|v| (v - min) / range).collect();
            find_peaks(&norm, opts.prominence)
        }
    };

    let before = indices.len();
    indices.retain(|&i| i != 0);
    let discarded_at_boundary = before - indices.len();
    if discarded_at_boundary > 0 {
        warn!(count = discarded_at_boundary, "discarded peak positions at the first sample");
    }

    let dt = trace.mean_step();
    let buffer = opts.buffer as f64;
    let mut measured = Vec::with_capacity(indices.len());
    let mut intervals = Vec::with_capacity(indices.len());
    for (slot, &index) in indices.iter().enumerate() {
        let prom = peak_prominence(x, index);
        let bounds = peak_width(x, index, &prom, opts.rel_height);
        let half = peak_width(x, index, &prom, 0.5);
        measured.push(Measured {
            index,
            half_width: half.width * dt,
            base_height: bounds.height,
        });
        intervals.push(Interval {
            start: clamp_round(bounds.left_ip - buffer, n),
            end: clamp_round(bounds.right_ip + buffer, n),
            slot,
        });
    }

    let survivors = drop_nested(intervals);
    let overlaps = find_overlaps(&survivors);
    for o in &overlaps {
        warn!(
            earlier = o.earlier,
            later = o.later,
            start = o.start,
            end = o.end,
            "peak windows overlap; shared samples assigned to the later window"
        );
    }

    let mut windows = Vec::with_capacity(survivors.len());
    for (pos, iv) in survivors.iter().enumerate() {
        // Later windows take shared samples, and starts are increasing.
        let end = match survivors.get(pos + 1) {
            Some(next) => iv.end.min(next.start),
            None => iv.end,
        };
        if end <= iv.start {
            continue;
        }
        let own = measured[iv.slot];
        let correction = if opts.window_baseline_correction {
            own.base_height
        } else {
            0.0
        };

        let mut members: Vec<&Measured> = measured
            .iter()
            .filter(|m| m.index >= iv.start && m.index < end && x[m.index] > 0.0)
            .collect();
        members.sort_by_key(|m| m.index);
        let candidates = members
            .into_iter()
            .map(|m| PeakCandidate {
                index: m.index,
                amplitude: x[m.index] - correction,
                location: time[m.index],
                width: m.half_width,
            })
            .collect();

        windows.push(PeakWindow {
            id: pos + 1,
            start: iv.start,
            end,
            time: time[iv.start..end].to_vec(),
            intensity: x[iv.start..end].iter().map(|v| v - correction).collect(),
            baseline_height: own.base_height,
            candidates,
        });
    }

    debug!(
        candidates = indices.len(),
        windows = windows.len(),
        "segmentation complete"
    );
    Ok(Segmentation {
        windows,
        overlaps,
        discarded_at_boundary,
    })
}

fn clamp_round(v: f64, n: usize) -> usize {
    v.clamp(0.0, n as f64).round_ties_even() as usize
}

/// Remove empty intervals and intervals contained in another one.
///
/// Returns the survivors ordered by start (their ends are then increasing too).
fn drop_nested(mut intervals: Vec<Interval>) -> Vec<Interval> {
    intervals.retain(|iv| !iv.is_empty());
    intervals.sort_by(|a, b| {
        a.start
            .cmp(&b.start)
            .then(b.end.cmp(&a.end))
            .then(a.slot.cmp(&b.slot))
    });
    let mut out: Vec<Interval> = Vec::with_capacity(intervals.len());
    for iv in intervals {
        match out.last() {
            Some(prev) if iv.end <= prev.end => {}
            _ => out.push(iv),
        }
    }
    out
}

fn find_overlaps(survivors: &[Interval]) -> Vec<WindowOverlap> {
    let mut out = Vec::new();
    for (a, first) in survivors.iter().enumerate() {
        for (b, second) in survivors.iter().enumerate().skip(a + 1) {
            if second.start >= first.end {
                break;
            }
            if let Some((start, end)) = first.intersection(second) {
                out.push(WindowOverlap {
                    earlier: a + 1,
                    later: b + 1,
                    start,
                    end,
                });
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gaussian(t: f64, a: f64, mu: f64, sigma: f64) -> f64 {
        a * (-(t - mu).powi(2) / (2.0 * sigma * sigma)).exp()
    }

    fn trace_of(peaks: &[(f64, f64, f64)], n: usize, dt: f64) -> Trace {
        let time: Vec<f64> = (0..n).map(|i| i as f64 * dt).collect();
        let y = time
            .iter()
            .map(|&t| peaks.iter().map(|&(a, mu, s)| gaussian(t, a, mu, s)).sum())
            .collect();
        Trace::new(time, y).unwrap()
    }

    fn iv(start: usize, end: usize, slot: usize) -> Interval {
        Interval { start, end, slot }
    }

    #[test]
    fn nested_and_identical_intervals_are_dropped() {
        let out = drop_nested(vec![iv(10, 20, 0), iv(0, 30, 1), iv(40, 50, 2), iv(40, 50, 3), iv(5, 5, 4)]);
        assert_eq!(out, vec![iv(0, 30, 1), iv(40, 50, 2)]);
    }

    #[test]
    fn partial_overlaps_are_kept_and_reported() {
        let out = drop_nested(vec![iv(0, 20, 0), iv(15, 30, 1), iv(18, 40, 2)]);
        assert_eq!(out.len(), 3);
        let overlaps = find_overlaps(&out);
        assert_eq!(
            overlaps,
            vec![
                WindowOverlap { earlier: 1, later: 2, start: 15, end: 20 },
                WindowOverlap { earlier: 1, later: 3, start: 18, end: 20 },
                WindowOverlap { earlier: 2, later: 3, start: 18, end: 30 },
            ]
        );
    }

    #[test]
    fn separated_peaks_get_separate_windows() {
        // Noise-free tails never reach a local minimum, so bound the windows below full height.
        let trace = trace_of(&[(50.0, 4.0, 0.1), (30.0, 10.0, 0.1)], 1401, 0.01);
        let opts = SegmentOptions {
            buffer: 20,
            rel_height: 0.95,
            ..SegmentOptions::default()
        };
        let seg = segment(&trace, &opts).unwrap();
        assert_eq!(seg.windows.len(), 2);
        assert!(seg.overlaps.is_empty());
        let w = &seg.windows[0];
        assert_eq!(w.id, 1);
        assert_eq!(w.candidates.len(), 1);
        assert_eq!(w.candidates[0].index, 400);
        assert!((w.candidates[0].location - 4.0).abs() < 1e-9);
        assert!((w.candidates[0].amplitude - 50.0).abs() < 1e-9);
        // FWHM of a Gaussian is 2.3548 sigma.
        assert!((w.candidates[0].width - 0.235).abs() < 0.01);
        assert_eq!(w.time.len(), w.end - w.start);
        assert_eq!(seg.windows[1].candidates[0].index, 1000);
    }

    #[test]
    fn shared_base_peaks_share_a_window() {
        // The smaller peak's full-height window is nested in the larger one's.
        let trace = trace_of(&[(50.0, 5.0, 0.3), (20.0, 6.0, 0.2)], 1001, 0.01);
        let seg = segment(&trace, &SegmentOptions { buffer: 10, ..SegmentOptions::default() }).unwrap();
        assert_eq!(seg.windows.len(), 1);
        assert_eq!(seg.windows[0].candidates.len(), 2);
    }

    #[test]
    fn constant_trace_yields_nothing() {
        let trace = Trace::new(vec![0.0, 1.0, 2.0, 3.0], vec![1.0; 4]).unwrap();
        let seg = segment(&trace, &SegmentOptions::default()).unwrap();
        assert!(seg.windows.is_empty());
    }

    #[test]
    fn manual_positions_map_to_indices() {
        let trace = trace_of(&[(10.0, 2.0, 0.1), (10.0, 6.0, 0.1)], 801, 0.01);
        let opts = SegmentOptions {
            manual_positions: Some(vec![0.0, 2.0, 6.0]),
            buffer: 10,
            ..SegmentOptions::default()
        };
        let seg = segment(&trace, &opts).unwrap();
        assert_eq!(seg.discarded_at_boundary, 1);
        assert_eq!(seg.candidate_count(), 2);
        assert_eq!(position_to_index(&trace, 2.0).unwrap(), 200);
        assert_eq!(position_to_index(&trace, 8.0).unwrap(), 800);
    }

    #[test]
    fn manual_position_outside_range_is_rejected() {
        let trace = trace_of(&[(10.0, 2.0, 0.1)], 401, 0.01);
        let opts = SegmentOptions {
            manual_positions: Some(vec![4.5]),
            ..SegmentOptions::default()
        };
        assert!(matches!(segment(&trace, &opts), Err(ChromError::InvalidInput(_))));
    }

    #[test]
    fn out_of_range_prominence_is_rejected() {
        let trace = trace_of(&[(10.0, 2.0, 0.1)], 401, 0.01);
        let opts = SegmentOptions { prominence: 1.5, ..SegmentOptions::default() };
        assert!(segment(&trace, &opts).is_err());
    }

    #[test]
    fn window_baseline_correction_lowers_amplitude() {
        let time: Vec<f64> = (0..601).map(|i| i as f64 * 0.01).collect();
        let y: Vec<f64> = time
            .iter()
            .map(|&t| gaussian(t, 10.0, 3.0, 0.2) + 2.0 + 0.1 * t)
            .collect();
        let trace = Trace::new(time, y).unwrap();
        let opts = SegmentOptions {
            buffer: 5,
            window_baseline_correction: true,
            ..SegmentOptions::default()
        };
        let seg = segment(&trace, &opts).unwrap();
        let w = &seg.windows[0];
        let c = &w.candidates[0];
        assert!(w.baseline_height > 2.0);
        assert!((c.amplitude - (trace.intensity()[c.index] - w.baseline_height)).abs() < 1e-12);
    }
}
