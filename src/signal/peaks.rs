//! Local-maximum detection, prominence and width-at-relative-height.
//!
//! These follow the usual definitions used in chromatography software:
//!
//! - a local maximum is a sample strictly higher than its left neighbour and
//!   strictly higher than the first differing sample on its right (plateaus
//!   report their midpoint)
//! - prominence is the height above the higher of the two lowest points reached
//!   when walking outwards until a strictly higher sample (or the trace edge)
//! - width is measured at `x[peak] - prominence * rel_height`, walking out to the
//!   prominence bases and interpolating linearly between samples

/// Prominence of a single peak and the bases it was measured against.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prominence {
    pub prominence: f64,
    pub left_base: usize,
    pub right_base: usize,
}

/// Width of a peak at a given evaluation height.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PeakWidth {
    /// Width in samples (fractional).
    pub width: f64,
    /// Height at which the width was evaluated.
    pub height: f64,
    pub left_ip: f64,
    pub right_ip: f64,
}

/// Indices of local maxima, ascending.
pub fn local_maxima(x: &[f64]) -> Vec<usize> {
    let n = x.len();
    let mut out = Vec::new();
    if n < 3 {
        return out;
    }
    let i_max = n - 1;
    let mut i = 1;
    while i < i_max {
        if x[i - 1] < x[i] {
            let mut ahead = i + 1;
            while ahead < i_max && x[ahead] == x[i] {
                ahead += 1;
            }
            if x[ahead] < x[i] {
                let right_edge = ahead - 1;
                out.push((i + right_edge) / 2);
                i = ahead;
            }
        }
        i += 1;
    }
    out
}

/// Local maxima whose prominence is at least `min_prominence`.
pub fn find_peaks(x: &[f64], min_prominence: f64) -> Vec<usize> {
    local_maxima(x)
        .into_iter()
        .filter(|&p| peak_prominence(x, p).prominence >= min_prominence)
        .collect()
}

pub fn peak_prominence(x: &[f64], peak: usize) -> Prominence {
    let height = x[peak];

    let mut left_min = height;
    let mut left_base = peak;
    let mut i = peak as isize;
    while i >= 0 && x[i as usize] <= height {
        if x[i as usize] < left_min {
            left_min = x[i as usize];
            left_base = i as usize;
        }
        i -= 1;
    }

    let mut right_min = height;
    let mut right_base = peak;
    let mut i = peak;
    while i < x.len() && x[i] <= height {
        if x[i] < right_min {
            right_min = x[i];
            right_base = i;
        }
        i += 1;
    }

    Prominence {
        prominence: height - left_min.max(right_min),
        left_base,
        right_base,
    }
}

pub fn peak_width(x: &[f64], peak: usize, prom: &Prominence, rel_height: f64) -> PeakWidth {
    let height = x[peak] - prom.prominence * rel_height;

    let mut i = peak;
    while prom.left_base < i && height < x[i] {
        i -= 1;
    }
    let mut left_ip = i as f64;
    if x[i] < height {
        left_ip += (height - x[i]) / (x[i + 1] - x[i]);
    }

    let mut i = peak;
    while i < prom.right_base && height < x[i] {
        i += 1;
    }
    let mut right_ip = i as f64;
    if x[i] < height {
        right_ip -= (height - x[i]) / (x[i - 1] - x[i]);
    }

    PeakWidth {
        width: right_ip - left_ip,
        height,
        left_ip,
        right_ip,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maxima_include_plateau_midpoints() {
        let x = [0.0, 1.0, 0.0, 2.0, 2.0, 2.0, 0.0, 3.0];
        assert_eq!(local_maxima(&x), vec![1, 4]);
    }

    #[test]
    fn edges_are_never_maxima() {
        let x = [5.0, 1.0, 0.0, 1.0, 5.0];
        assert!(local_maxima(&x).is_empty());
    }

    #[test]
    fn prominence_uses_higher_base() {
        // Peak at 3 sits between a valley at 1.0 (left) and 0.0 (right).
        let x = [0.0, 4.0, 1.0, 3.0, 0.0];
        let p = peak_prominence(&x, 3);
        assert!((p.prominence - 2.0).abs() < 1e-12);
        assert_eq!(p.left_base, 2);
        assert_eq!(p.right_base, 4);

        let p = peak_prominence(&x, 1);
        assert!((p.prominence - 4.0).abs() < 1e-12);
    }

    #[test]
    fn find_peaks_filters_by_prominence() {
        let x = [0.0, 4.0, 3.8, 3.9, 0.0];
        assert_eq!(find_peaks(&x, 0.5), vec![1]);
        assert_eq!(find_peaks(&x, 0.05), vec![1, 3]);
    }

    #[test]
    fn triangle_width_at_half_height() {
        let x = [0.0, 1.0, 2.0, 3.0, 4.0, 3.0, 2.0, 1.0, 0.0];
        let prom = peak_prominence(&x, 4);
        let w = peak_width(&x, 4, &prom, 0.5);
        assert!((w.height - 2.0).abs() < 1e-12);
        assert!((w.left_ip - 2.0).abs() < 1e-12);
        assert!((w.right_ip - 6.0).abs() < 1e-12);
        assert!((w.width - 4.0).abs() < 1e-12);

        let w = peak_width(&x, 4, &prom, 1.0);
        assert!((w.width - 8.0).abs() < 1e-12);
        assert_eq!(w.height, 0.0);
    }

    #[test]
    fn gaussian_half_width_matches_fwhm() {
        let sigma = 10.0;
        let x: Vec<f64> = (0..201)
            .map(|i| (-((i as f64 - 100.0).powi(2)) / (2.0 * sigma * sigma)).exp())
            .collect();
        let prom = peak_prominence(&x, 100);
        let w = peak_width(&x, 100, &prom, 0.5);
        let fwhm = 2.0 * (2.0 * 2f64.ln()).sqrt() * sigma;
        assert!((w.width - fwhm).abs() < 0.1, "width {} vs fwhm {fwhm}", w.width);
    }
}
