//! Linear least squares via SVD.
//!
//! Used for the damped Gauss-Newton steps of the peak optimizer, where the
//! system is the window Jacobian stacked on top of a diagonal damping block:
//!
//! ```text
//! minimize || J δ - r ||² + λ Σ d_j δ_j²
//! ```
//!
//! - The augmented matrix is always tall, so `QR::solve` (square only) is not an option.
//! - Columns can be nearly collinear when two skew-normals overlap heavily, so the
//!   SVD solve is retried with progressively looser singular value cut-offs.

use nalgebra::{DMatrix, DVector};

/// Solve a least squares problem using SVD.
///
/// Returns `None` if the system is too ill-conditioned to solve robustly.
pub fn solve_least_squares(x: &DMatrix<f64>, y: &DVector<f64>) -> Option<DVector<f64>> {
    let svd = x.clone().svd(true, true);

    for &tol in &[1e-10, 1e-8, 1e-6] {
        if let Ok(beta) = svd.solve(y, tol) {
            if beta.iter().all(|v| v.is_finite()) {
                return Some(beta);
            }
        }
    }

    None
}

/// Solve `[J; sqrt(λ d)] δ = [r; 0]`.
pub fn solve_damped(j: &DMatrix<f64>, r: &DVector<f64>, damping: &[f64]) -> Option<DVector<f64>> {
    let (m, p) = j.shape();
    let mut a = DMatrix::<f64>::zeros(m + p, p);
    a.view_mut((0, 0), (m, p)).copy_from(j);
    for (k, d) in damping.iter().enumerate().take(p) {
        a[(m + k, k)] = d.max(0.0).sqrt();
    }
    let mut b = DVector::<f64>::zeros(m + p);
    b.rows_mut(0, m).copy_from(r);
    solve_least_squares(&a, &b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn least_squares_solves_simple_system() {
        // Fit y = 2 + 3x on x = [0,1,2]
        let x = DMatrix::from_row_slice(3, 2, &[1.0, 0.0, 1.0, 1.0, 1.0, 2.0]);
        let y = DVector::from_row_slice(&[2.0, 5.0, 8.0]);

        let beta = solve_least_squares(&x, &y).unwrap();
        assert!((beta[0] - 2.0).abs() < 1e-10);
        assert!((beta[1] - 3.0).abs() < 1e-10);
    }

    #[test]
    fn damping_shrinks_the_step() {
        let j = DMatrix::from_row_slice(2, 1, &[1.0, 1.0]);
        let r = DVector::from_row_slice(&[2.0, 2.0]);
        let free = solve_damped(&j, &r, &[0.0]).unwrap();
        assert!((free[0] - 2.0).abs() < 1e-10);
        // (JᵀJ + λ) δ = Jᵀr  →  (2 + 2) δ = 4
        let damped = solve_damped(&j, &r, &[2.0]).unwrap();
        assert!((damped[0] - 1.0).abs() < 1e-10);
    }
}
