//! Box-constrained Levenberg-Marquardt least squares.
//!
//! References:
//! - Levenberg (1944), Marquardt (1963).
//! - More (1978), implementation and convergence behavior.

use nalgebra::{DMatrix, DVector};

use crate::calibration::core::{BoxConstraints, ConvergenceInfo, TerminationReason};
use crate::core::ModelError;

/// Solver controls. Defaults are tuned for the 4-parameter ECF problem.
#[derive(Debug, Clone, Copy)]
pub struct FitOptions {
    pub max_iterations: usize,
    pub initial_lambda: f64,
    pub lambda_up: f64,
    pub lambda_down: f64,
    pub gradient_tolerance: f64,
    pub step_tolerance: f64,
    pub objective_tolerance: f64,
    pub finite_diff_epsilon: f64,
    pub max_stagnation: usize,
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            max_iterations: 200,
            initial_lambda: 1.0e-2,
            lambda_up: 3.0,
            lambda_down: 0.35,
            gradient_tolerance: 1.0e-8,
            step_tolerance: 1.0e-9,
            objective_tolerance: 1.0e-12,
            finite_diff_epsilon: 1.0e-5,
            max_stagnation: 20,
        }
    }
}

/// Fit outcome: solution, residual objective, and convergence metadata.
#[derive(Debug, Clone)]
pub struct LeastSquaresSolution {
    pub x: Vec<f64>,
    pub objective: f64,
    pub convergence: ConvergenceInfo,
}

#[inline]
fn half_squared_norm(residuals: &[f64]) -> f64 {
    0.5 * residuals.iter().map(|r| r * r).sum::<f64>()
}

/// Forward-difference Jacobian of the residual vector, respecting bounds when
/// choosing the perturbation direction.
fn jacobian<F>(
    x: &[f64],
    base: &[f64],
    bounds: &BoxConstraints,
    eps_scale: f64,
    residual_fn: &mut F,
    evals: &mut usize,
) -> DMatrix<f64>
where
    F: FnMut(&[f64]) -> Vec<f64>,
{
    let m = base.len();
    let n = x.len();
    let mut j = DMatrix::zeros(m, n);

    for c in 0..n {
        let mut xp = x.to_vec();
        let h = (x[c].abs() * eps_scale).max(1.0e-8);

        xp[c] = (x[c] + h).min(bounds.upper[c]);
        if (xp[c] - x[c]).abs() < 1.0e-14 {
            xp[c] = (x[c] - h).max(bounds.lower[c]);
        }

        let denom = xp[c] - x[c];
        if denom.abs() < 1.0e-14 {
            continue;
        }

        let rp = residual_fn(&xp);
        *evals += 1;
        for r in 0..m {
            j[(r, c)] = (rp[r] - base[r]) / denom;
        }
    }

    j
}

/// Minimizes `0.5 * ||residual_fn(x)||^2` subject to box constraints.
///
/// Iterates are clamped to the box after every step, so constraint
/// violations behave as an infinite objective outside the feasible region.
pub fn least_squares_fit<F>(
    initial: &[f64],
    bounds: &BoxConstraints,
    options: FitOptions,
    mut residual_fn: F,
) -> Result<LeastSquaresSolution, ModelError>
where
    F: FnMut(&[f64]) -> Vec<f64>,
{
    if initial.len() != bounds.dimension() {
        return Err(ModelError::InvalidInput(format!(
            "initial vector dimension {} does not match bounds dimension {}",
            initial.len(),
            bounds.dimension()
        )));
    }

    let mut x = bounds.clamp(initial);
    let mut evals = 0usize;
    let mut residuals = residual_fn(&x);
    evals += 1;
    if residuals.is_empty() {
        return Err(ModelError::InvalidInput(
            "residual function returned an empty vector".to_string(),
        ));
    }

    let mut objective = half_squared_norm(&residuals);
    if !objective.is_finite() {
        return Err(ModelError::NumericalError(format!(
            "objective is not finite at initial point {x:?}"
        )));
    }

    let initial_objective = objective;
    let mut lambda = options.initial_lambda.max(1.0e-12);
    let mut iterations = 0usize;
    let mut gradient_norm = f64::INFINITY;
    let mut step_norm = f64::INFINITY;
    let mut reason = TerminationReason::MaxIterations;
    let mut converged = false;
    let mut stagnation = 0usize;

    for iter in 0..options.max_iterations {
        iterations = iter + 1;

        let j = jacobian(
            &x,
            &residuals,
            bounds,
            options.finite_diff_epsilon,
            &mut residual_fn,
            &mut evals,
        );

        let r_vec = DVector::from_column_slice(&residuals);
        let jt = j.transpose();
        let mut a = &jt * &j;
        let g = &jt * r_vec;

        gradient_norm = g.norm();
        if !gradient_norm.is_finite() {
            reason = TerminationReason::NumericalFailure;
            break;
        }
        if gradient_norm <= options.gradient_tolerance {
            converged = true;
            reason = TerminationReason::GradientTolerance;
            break;
        }

        for i in 0..a.nrows() {
            a[(i, i)] += lambda * (a[(i, i)].abs() + 1.0);
        }

        let Some(delta) = a.lu().solve(&(-g)) else {
            lambda = (lambda * options.lambda_up).min(1.0e12);
            stagnation += 1;
            if stagnation >= options.max_stagnation {
                converged = objective < initial_objective || gradient_norm <= 1.0e-2;
                reason = TerminationReason::Stagnation;
                break;
            }
            continue;
        };

        step_norm = delta.norm();
        if step_norm <= options.step_tolerance {
            converged = true;
            reason = TerminationReason::StepTolerance;
            break;
        }

        let mut candidate = x.clone();
        for (ci, d) in candidate.iter_mut().zip(delta.iter()) {
            *ci += d;
        }
        candidate = bounds.clamp(&candidate);

        let candidate_residuals = residual_fn(&candidate);
        evals += 1;
        let candidate_obj = half_squared_norm(&candidate_residuals);

        if candidate_obj.is_finite() && candidate_obj + 1.0e-16 < objective {
            let improvement = objective - candidate_obj;
            x = candidate;
            residuals = candidate_residuals;
            objective = candidate_obj;
            lambda = (lambda * options.lambda_down).max(1.0e-12);
            stagnation = 0;

            if improvement <= options.objective_tolerance {
                converged = true;
                reason = TerminationReason::ObjectiveTolerance;
                break;
            }
        } else {
            lambda = (lambda * options.lambda_up).min(1.0e12);
            stagnation += 1;
            if stagnation >= options.max_stagnation {
                // A stalled search that already descended (or sits at a
                // near-stationary point) is convergence in practice.
                converged = objective < initial_objective || gradient_norm <= 1.0e-2;
                reason = TerminationReason::Stagnation;
                break;
            }
        }
    }

    Ok(LeastSquaresSolution {
        x,
        objective,
        convergence: ConvergenceInfo {
            iterations,
            objective_evaluations: evals,
            gradient_norm,
            step_norm,
            converged,
            reason,
        },
    })
}
