//! Simple linear regression `y = slope · x + intercept`.

/// Result of an ordinary least-squares line fit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearFit {
    pub slope: f64,
    pub intercept: f64,
    /// Squared Pearson correlation.
    pub r_squared: f64,
}

/// Fit a straight line through `(x, y)`.
///
/// Returns `None` when fewer than two points are given, the lengths differ, or
/// all `x` are identical (the slope is undefined).
pub fn linear_fit(x: &[f64], y: &[f64]) -> Option<LinearFit> {
    let n = x.len();
    if n < 2 || y.len() != n {
        return None;
    }
    let nf = n as f64;
    let mean_x = x.iter().sum::<f64>() / nf;
    let mean_y = y.iter().sum::<f64>() / nf;

    let (mut sxx, mut sxy, mut syy) = (0.0, 0.0, 0.0);
    for (&xi, &yi) in x.iter().zip(y) {
        let dx = xi - mean_x;
        let dy = yi - mean_y;
        sxx += dx * dx;
        sxy += dx * dy;
        syy += dy * dy;
    }
    if sxx <= 0.0 {
        return None;
    }

    let slope = sxy / sxx;
    let intercept = mean_y - slope * mean_x;
    // A horizontal line through identical y values is an exact fit.
    let r_squared = if syy <= 0.0 { 1.0 } else { (sxy * sxy) / (sxx * syy) };

    Some(LinearFit {
        slope,
        intercept,
        r_squared,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_line() {
        let fit = linear_fit(&[1.0, 2.0, 3.0], &[100.0, 200.0, 300.0]).unwrap();
        assert!((fit.slope - 100.0).abs() < 1e-12);
        assert!(fit.intercept.abs() < 1e-9);
        assert!((fit.r_squared - 1.0).abs() < 1e-12);
    }

    #[test]
    fn noisy_line_has_r_squared_below_one() {
        let fit = linear_fit(&[0.0, 1.0, 2.0, 3.0], &[0.1, 0.9, 2.2, 2.8]).unwrap();
        assert!(fit.r_squared < 1.0 && fit.r_squared > 0.95);
        assert!((fit.slope - 0.94).abs() < 1e-9);
    }

    #[test]
    fn degenerate_inputs() {
        assert!(linear_fit(&[1.0], &[2.0]).is_none());
        assert!(linear_fit(&[2.0, 2.0], &[1.0, 3.0]).is_none());
        let flat = linear_fit(&[1.0, 2.0], &[5.0, 5.0]).unwrap();
        assert_eq!(flat.slope, 0.0);
        assert_eq!(flat.r_squared, 1.0);
    }
}
