//! Generic Hamiltonian Monte Carlo over any differentiable log-density.
//!
//! References:
//! - Neal (2011), *MCMC using Hamiltonian dynamics*, Handbook of MCMC Ch. 5.
//! - Geweke (1992), spectral-window convergence diagnostic (simplified here).
//!
//! The engine knows nothing about the target beyond the [`LogDensity`]
//! contract; gradients default to central finite differences and may be
//! overridden with analytic ones. Non-finite gradients or energies abort the
//! chain rather than letting NaNs leak into later samples.

use rand::Rng;
use rand::rngs::StdRng;
use rand_distr::{Distribution, StandardNormal};
use statrs::distribution::{ContinuousCDF, Normal};

use crate::core::ModelError;

/// A target distribution known up to an additive log-constant.
pub trait LogDensity {
    /// Dimensionality of the position vector.
    fn dim(&self) -> usize;

    /// Unnormalized log-density at `x`.
    fn log_density(&self, x: &[f64]) -> f64;

    /// Gradient of the log-density. Default: central finite differences.
    fn grad(&self, x: &[f64]) -> Vec<f64> {
        let mut g = vec![0.0; x.len()];
        let mut xp = x.to_vec();
        for i in 0..x.len() {
            let h = (x[i].abs() * 1.0e-6).max(1.0e-8);
            xp[i] = x[i] + h;
            let up = self.log_density(&xp);
            xp[i] = x[i] - h;
            let dn = self.log_density(&xp);
            xp[i] = x[i];
            g[i] = (up - dn) / (2.0 * h);
        }
        g
    }
}

/// HMC controls. The defaults are the reference configuration for the
/// stable-posterior workload: the step size is tuned against the
/// sample-size-weighted posterior so the acceptance rate sits inside the
/// 0.1-0.9 diagnostic band rather than saturating near 1.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HmcSampler {
    /// Leapfrog step size.
    pub step_size: f64,
    /// Leapfrog steps per proposal.
    pub num_leapfrog_steps: usize,
    /// Post-burn-in samples to record.
    pub num_samples: usize,
    /// Leading iterations discarded while the chain reaches stationarity.
    pub burn_in: usize,
}

impl Default for HmcSampler {
    fn default() -> Self {
        Self {
            step_size: 0.012,
            num_leapfrog_steps: 20,
            num_samples: 1_000,
            burn_in: 200,
        }
    }
}

/// Chain output: recorded positions plus acceptance diagnostics.
#[derive(Debug, Clone)]
pub struct HmcChain {
    /// Post-burn-in positions, one per requested sample. Rejected proposals
    /// record the retained (reverted) position.
    pub samples: Vec<Vec<f64>>,
    /// Accepted proposals over all iterations, burn-in included.
    pub acceptance_rate: f64,
}

impl HmcChain {
    /// Two-sided Geweke-style p-value comparing the means of the early 10%
    /// and late 50% of the chain for one coordinate. Values near zero flag a
    /// chain that has not reached stationarity.
    pub fn geweke_p_value(&self, coordinate: usize) -> Option<f64> {
        if self.samples.len() < 20 {
            return None;
        }
        let series: Vec<f64> = self.samples.iter().map(|s| s[coordinate]).collect();
        let head = &series[..series.len() / 10];
        let tail = &series[series.len() / 2..];

        let stats = |xs: &[f64]| {
            let n = xs.len() as f64;
            let m = xs.iter().sum::<f64>() / n;
            let v = xs.iter().map(|x| (x - m) * (x - m)).sum::<f64>() / (n - 1.0);
            (m, v / n)
        };
        let (m1, se1) = stats(head);
        let (m2, se2) = stats(tail);

        let denom = (se1 + se2).sqrt();
        if denom < 1.0e-300 {
            // Frozen chain: identical means count as stationary.
            return Some(if (m1 - m2).abs() < 1.0e-12 { 1.0 } else { 0.0 });
        }

        let z = (m1 - m2) / denom;
        let normal = Normal::new(0.0, 1.0).ok()?;
        Some(2.0 * (1.0 - normal.cdf(z.abs())))
    }
}

impl HmcSampler {
    /// Runs one chain from `initial`, returning `num_samples` post-burn-in
    /// positions.
    ///
    /// Per iteration: draw momentum from a standard normal, integrate the
    /// Hamiltonian with leapfrog (half/full/half momentum pattern, final
    /// momentum negation), then Metropolis-accept on the total-energy change.
    pub fn sample<T: LogDensity>(
        &self,
        target: &T,
        initial: &[f64],
        rng: &mut StdRng,
    ) -> Result<HmcChain, ModelError> {
        if initial.len() != target.dim() {
            return Err(ModelError::InvalidInput(format!(
                "initial position dimension {} does not match target dimension {}",
                initial.len(),
                target.dim()
            )));
        }
        if !(self.step_size.is_finite() && self.step_size > 0.0) || self.num_leapfrog_steps == 0 {
            return Err(ModelError::InvalidInput(format!(
                "HMC requires step_size > 0 and num_leapfrog_steps > 0, got {} and {}",
                self.step_size, self.num_leapfrog_steps
            )));
        }

        let dim = target.dim();
        let total_iterations = self.burn_in + self.num_samples;
        let mut position = initial.to_vec();
        let mut samples = Vec::with_capacity(self.num_samples);
        let mut accepted = 0usize;

        for iteration in 0..total_iterations {
            let momentum: Vec<f64> = (0..dim).map(|_| StandardNormal.sample(rng)).collect();

            let current_u = -target.log_density(&position);
            let current_k = 0.5 * momentum.iter().map(|p| p * p).sum::<f64>();
            if !current_u.is_finite() || !current_k.is_finite() {
                return Err(ModelError::SamplingFailure(format!(
                    "non-finite energy at iteration {iteration}, position {position:?}"
                )));
            }

            let (proposal, proposed_momentum) =
                self.leapfrog(target, &position, &momentum, iteration)?;

            let proposed_u = -target.log_density(&proposal);
            let proposed_k = 0.5 * proposed_momentum.iter().map(|p| p * p).sum::<f64>();
            if !proposed_u.is_finite() || !proposed_k.is_finite() {
                return Err(ModelError::SamplingFailure(format!(
                    "non-finite energy after leapfrog at iteration {iteration}, proposal {proposal:?}"
                )));
            }

            let log_accept = (current_u + current_k) - (proposed_u + proposed_k);
            let u: f64 = rng.random();
            if u.ln() < log_accept {
                position = proposal;
                accepted += 1;
            }

            if iteration >= self.burn_in {
                samples.push(position.clone());
            }
        }

        Ok(HmcChain {
            samples,
            acceptance_rate: accepted as f64 / total_iterations.max(1) as f64,
        })
    }

    /// Leapfrog integration of Hamilton's equations with `U = -log_density`,
    /// ending with momentum negation for time-reversal symmetry.
    fn leapfrog<T: LogDensity>(
        &self,
        target: &T,
        position: &[f64],
        momentum: &[f64],
        iteration: usize,
    ) -> Result<(Vec<f64>, Vec<f64>), ModelError> {
        let eps = self.step_size;
        let mut q = position.to_vec();
        let mut p = momentum.to_vec();

        let mut grad_u = Self::grad_u(target, &q, iteration)?;
        for (pi, g) in p.iter_mut().zip(&grad_u) {
            *pi -= 0.5 * eps * g;
        }

        for step in 0..self.num_leapfrog_steps {
            for (qi, pi) in q.iter_mut().zip(&p) {
                *qi += eps * pi;
            }
            grad_u = Self::grad_u(target, &q, iteration)?;

            let momentum_step = if step + 1 == self.num_leapfrog_steps {
                0.5 * eps
            } else {
                eps
            };
            for (pi, g) in p.iter_mut().zip(&grad_u) {
                *pi -= momentum_step * g;
            }
        }

        for pi in p.iter_mut() {
            *pi = -*pi;
        }
        Ok((q, p))
    }

    fn grad_u<T: LogDensity>(
        target: &T,
        q: &[f64],
        iteration: usize,
    ) -> Result<Vec<f64>, ModelError> {
        let grad_logp = target.grad(q);
        if grad_logp.iter().any(|g| !g.is_finite()) {
            return Err(ModelError::SamplingFailure(format!(
                "non-finite gradient at iteration {iteration}, position {q:?}"
            )));
        }
        Ok(grad_logp.into_iter().map(|g| -g).collect())
    }
}
