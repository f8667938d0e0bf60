//! Bounded Levenberg–Marquardt for small nonlinear least-squares problems.
//!
//! Minimizes `½ Σ r_i(p)²` subject to box constraints `lo <= p <= hi`.
//!
//! - Each iteration solves the damped system `[J; √(λ D)] δ = [-r; 0]` through
//!   the SVD solver in [`crate::math::ols`], with `D = diag(JᵀJ)` (Marquardt
//!   scaling, so the damping is invariant to parameter units).
//! - Trial points are projected back into the box; a step is accepted only if
//!   it lowers the cost.
//! - The gradient test uses the projected gradient, so a parameter pinned at a
//!   bound with the gradient pointing outwards does not block convergence.

use nalgebra::{DMatrix, DVector};
use thiserror::Error;

use crate::math::ols::solve_damped;

/// A residual vector and its Jacobian.
pub trait LeastSquaresProblem {
    fn residual_count(&self) -> usize;

    /// Fill `out` with `model(params) - data`.
    fn residuals(&self, params: &[f64], out: &mut DVector<f64>);

    /// Fill `out` (residual_count × params.len()) with `∂r_i/∂p_j`.
    fn jacobian(&self, params: &[f64], out: &mut DMatrix<f64>);
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LmOptions {
    pub max_iter: usize,
    /// Relative cost reduction below which the fit is converged.
    pub ftol: f64,
    /// Relative step size below which the fit is converged.
    pub xtol: f64,
    /// Projected gradient (infinity norm) below which the fit is converged.
    pub gtol: f64,
    pub initial_lambda: f64,
}

impl Default for LmOptions {
    fn default() -> Self {
        Self {
            max_iter: 10_000,
            ftol: 1e-12,
            xtol: 1e-10,
            gtol: 1e-12,
            initial_lambda: 1e-3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    CostReduction,
    StepSize,
    Gradient,
    ZeroResidual,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LmReport {
    pub params: Vec<f64>,
    /// `½ Σ r²` at `params`.
    pub cost: f64,
    pub iterations: usize,
    pub termination: Termination,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum LmError {
    #[error("parameter and bound lengths differ")]
    DimensionMismatch,
    #[error("lower bound {lo} exceeds upper bound {hi} for parameter {index}")]
    InvalidBounds { index: usize, lo: f64, hi: f64 },
    #[error("iteration limit reached")]
    MaxIterations { iterations: usize },
    #[error("non-finite residuals or Jacobian")]
    NonFinite { iterations: usize },
}

impl LmError {
    pub fn iterations(&self) -> usize {
        match self {
            LmError::MaxIterations { iterations } | LmError::NonFinite { iterations } => *iterations,
            _ => 0,
        }
    }
}

/// Cost at or below which the residual is treated as exactly zero.
const ZERO_COST: f64 = 1e-30;
/// Damping beyond which no further progress is possible.
const MAX_LAMBDA: f64 = 1e16;

fn project(params: &mut [f64], lo: &[f64], hi: &[f64]) {
    for ((p, &l), &h) in params.iter_mut().zip(lo).zip(hi) {
        *p = p.clamp(l, h);
    }
}

fn half_sum_sq(r: &DVector<f64>) -> f64 {
    0.5 * r.norm_squared()
}

/// Minimize the problem's cost starting from `initial` inside `[lo, hi]`.
pub fn minimize<P: LeastSquaresProblem>(
    problem: &P,
    initial: &[f64],
    lo: &[f64],
    hi: &[f64],
    opts: &LmOptions,
) -> Result<LmReport, LmError> {
    let p = initial.len();
    if lo.len() != p || hi.len() != p {
        return Err(LmError::DimensionMismatch);
    }
    if let Some(index) = (0..p).find(|&k| lo[k] > hi[k]) {
        return Err(LmError::InvalidBounds {
            index,
            lo: lo[index],
            hi: hi[index],
        });
    }
    let m = problem.residual_count();

    let mut x = initial.to_vec();
    project(&mut x, lo, hi);
    let mut r = DVector::<f64>::zeros(m);
    problem.residuals(&x, &mut r);
    let mut cost = half_sum_sq(&r);
    if !cost.is_finite() {
        return Err(LmError::NonFinite { iterations: 0 });
    }

    let mut jac = DMatrix::<f64>::zeros(m, p);
    let mut r_trial = DVector::<f64>::zeros(m);
    let mut lambda = opts.initial_lambda;

    for iter in 1..=opts.max_iter {
        if cost <= ZERO_COST {
            return Ok(LmReport { params: x, cost, iterations: iter - 1, termination: Termination::ZeroResidual });
        }

        problem.jacobian(&x, &mut jac);
        if jac.iter().any(|v| !v.is_finite()) {
            return Err(LmError::NonFinite { iterations: iter });
        }
        let grad = jac.tr_mul(&r);
        let projected_grad = (0..p)
            .map(|k| {
                let g = grad[k];
                let pinned = (x[k] <= lo[k] && g > 0.0) || (x[k] >= hi[k] && g < 0.0);
                if pinned { 0.0 } else { g.abs() }
            })
            .fold(0.0, f64::max);
        if projected_grad <= opts.gtol {
            return Ok(LmReport { params: x, cost, iterations: iter, termination: Termination::Gradient });
        }

        let diag: Vec<f64> = (0..p).map(|k| jac.column(k).norm_squared().max(1e-12)).collect();
        let neg_r = r.map(|v| -v);
        let x_norm = x.iter().map(|v| v * v).sum::<f64>().sqrt();

        loop {
            let damping: Vec<f64> = diag.iter().map(|d| lambda * d).collect();
            let Some(delta) = solve_damped(&jac, &neg_r, &damping) else {
                lambda *= 10.0;
                if lambda > MAX_LAMBDA {
                    return Ok(LmReport { params: x, cost, iterations: iter, termination: Termination::StepSize });
                }
                continue;
            };

            let mut trial: Vec<f64> = x.iter().zip(delta.iter()).map(|(a, d)| a + d).collect();
            project(&mut trial, lo, hi);
            let step_norm = trial
                .iter()
                .zip(x.iter())
                .map(|(a, b)| (a - b).powi(2))
                .sum::<f64>()
                .sqrt();
            let small_step = step_norm <= opts.xtol * (x_norm + opts.xtol);

            problem.residuals(&trial, &mut r_trial);
            let trial_cost = half_sum_sq(&r_trial);

            if trial_cost.is_finite() && trial_cost < cost {
                let reduction = cost - trial_cost;
                let prev_cost = cost;
                x = trial;
                std::mem::swap(&mut r, &mut r_trial);
                cost = trial_cost;
                lambda = (lambda / 3.0).max(1e-15);
                if reduction <= opts.ftol * prev_cost {
                    return Ok(LmReport { params: x, cost, iterations: iter, termination: Termination::CostReduction });
                }
                if small_step {
                    return Ok(LmReport { params: x, cost, iterations: iter, termination: Termination::StepSize });
                }
                break;
            }

            if small_step || lambda > MAX_LAMBDA {
                return Ok(LmReport { params: x, cost, iterations: iter, termination: Termination::StepSize });
            }
            lambda *= 2.0;
        }
    }

    Err(LmError::MaxIterations { iterations: opts.max_iter })
}

#[cfg(test)]
mod tests {
    use super::*;

    /// y = a · exp(-b t)
    struct Decay {
        t: Vec<f64>,
        y: Vec<f64>,
    }

    impl LeastSquaresProblem for Decay {
        fn residual_count(&self) -> usize {
            self.t.len()
        }

        fn residuals(&self, p: &[f64], out: &mut DVector<f64>) {
            for (i, (&t, &y)) in self.t.iter().zip(self.y.iter()).enumerate() {
                out[i] = p[0] * (-p[1] * t).exp() - y;
            }
        }

        fn jacobian(&self, p: &[f64], out: &mut DMatrix<f64>) {
            for (i, &t) in self.t.iter().enumerate() {
                let e = (-p[1] * t).exp();
                out[(i, 0)] = e;
                out[(i, 1)] = -p[0] * t * e;
            }
        }
    }

    fn decay(a: f64, b: f64) -> Decay {
        let t: Vec<f64> = (0..40).map(|i| i as f64 * 0.1).collect();
        let y = t.iter().map(|&t| a * (-b * t).exp()).collect();
        Decay { t, y }
    }

    #[test]
    fn recovers_exponential_decay() {
        let problem = decay(3.0, 0.7);
        let inf = f64::INFINITY;
        let report = minimize(&problem, &[1.0, 0.1], &[-inf, -inf], &[inf, inf], &LmOptions::default()).unwrap();
        assert!((report.params[0] - 3.0).abs() < 1e-8);
        assert!((report.params[1] - 0.7).abs() < 1e-8);
        assert!(report.cost < 1e-12);
    }

    #[test]
    fn respects_active_bound() {
        let problem = decay(3.0, 0.7);
        let report = minimize(&problem, &[1.0, 0.1], &[0.0, 0.0], &[2.0, 5.0], &LmOptions::default()).unwrap();
        assert!(report.params[0] <= 2.0);
        assert!(report.params[0] > 1.9);
        assert!(report.params[1] > 0.0);
    }

    #[test]
    fn initial_guess_is_projected() {
        let problem = decay(3.0, 0.7);
        let report = minimize(&problem, &[50.0, 0.7], &[0.0, 0.0], &[10.0, 5.0], &LmOptions::default()).unwrap();
        assert!((report.params[0] - 3.0).abs() < 1e-8);
    }

    #[test]
    fn inverted_bounds_are_rejected() {
        let problem = decay(3.0, 0.7);
        let err = minimize(&problem, &[1.0, 0.1], &[0.0, 1.0], &[5.0, 0.5], &LmOptions::default()).unwrap_err();
        assert!(matches!(err, LmError::InvalidBounds { index: 1, .. }));
    }

    #[test]
    fn iteration_cap_is_reported() {
        let problem = decay(3.0, 0.7);
        let inf = f64::INFINITY;
        let opts = LmOptions { max_iter: 1, ..LmOptions::default() };
        let err = minimize(&problem, &[1.0, 0.1], &[-inf, -inf], &[inf, inf], &opts).unwrap_err();
        assert_eq!(err, LmError::MaxIterations { iterations: 1 });
    }
}
