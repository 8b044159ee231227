//! Alpha-stable (Lévy-stable) distribution: parameters, characteristic
//! functions, and random variate generation.
//!
//! References:
//! - Samorodnitsky and Taqqu, *Stable Non-Gaussian Random Processes* (1994).
//! - Chambers, Mallows and Stuck (1976), stable variate generation.
//! - Weron (1996), correction of the CMS scaling for `alpha = 1`.
//!
//! The stable density has no closed form for general parameters; all fitting
//! in this crate therefore works through the characteristic function, which
//! does. The `S1` parameterization is used throughout, matching the CF
//! formulas below.

use std::f64::consts::{FRAC_2_PI, FRAC_PI_2};

use num_complex::Complex;
use rand::Rng;
use rand_distr::{Distribution, Exp1};
use serde::{Deserialize, Serialize};

/// Width of the band around `alpha = 1` inside which the log-CF branches are
/// blended continuously. Exact equality against 1.0 is fragile and the
/// `alpha != 1` branch degenerates there (`tan(pi*alpha/2)` pole).
pub const ALPHA_ONE_BAND: f64 = 5.0e-3;

/// Frequencies below this are clamped away from zero before CF evaluation,
/// protecting `ln|theta|` in the `alpha = 1` branch.
const THETA_EPS: f64 = 1.0e-10;

/// Alpha-stable distribution parameters in the `S1` parameterization.
///
/// `alpha` is the stability index in `(0, 2]`, `beta` the skewness in
/// `[-1, 1]`, `gamma > 0` the scale, and `delta` the location.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StableParams {
    /// Stability index (tail exponent), `0 < alpha <= 2`.
    pub alpha: f64,
    /// Skewness, `-1 <= beta <= 1`.
    pub beta: f64,
    /// Scale, `gamma > 0`.
    pub gamma: f64,
    /// Location.
    pub delta: f64,
}

impl StableParams {
    pub fn new(alpha: f64, beta: f64, gamma: f64, delta: f64) -> Self {
        Self {
            alpha,
            beta,
            gamma,
            delta,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if !self.alpha.is_finite() || self.alpha <= 0.0 || self.alpha > 2.0 {
            return Err(format!("stable requires alpha in (0, 2], got {}", self.alpha));
        }
        if !self.beta.is_finite() || self.beta.abs() > 1.0 {
            return Err(format!("stable requires beta in [-1, 1], got {}", self.beta));
        }
        if !self.gamma.is_finite() || self.gamma <= 0.0 {
            return Err(format!("stable requires gamma > 0, got {}", self.gamma));
        }
        if !self.delta.is_finite() {
            return Err(format!("stable requires finite delta, got {}", self.delta));
        }
        Ok(())
    }

    /// Parameters as a position vector `[alpha, beta, gamma, delta]`.
    pub fn to_array(self) -> [f64; 4] {
        [self.alpha, self.beta, self.gamma, self.delta]
    }

    pub fn from_slice(x: &[f64]) -> Self {
        Self::new(x[0], x[1], x[2], x[3])
    }

    /// Log of the characteristic function at frequency `theta`, for the
    /// `alpha != 1` branch:
    /// `-gamma^alpha |theta|^alpha (1 - i beta sgn(theta) tan(pi alpha / 2)) + i delta theta`.
    fn log_cf_nonunit(&self, theta: f64) -> Complex<f64> {
        let i = Complex::new(0.0, 1.0);
        let abs_t = theta.abs();
        let scale = self.gamma.powf(self.alpha) * abs_t.powf(self.alpha);
        let skew = self.beta * theta.signum() * (FRAC_PI_2 * self.alpha).tan();
        -scale * (Complex::new(1.0, 0.0) - i * skew) + i * self.delta * theta
    }

    /// Log-CF inside the `alpha = 1` tolerance band.
    ///
    /// The `tan(pi alpha / 2)` skew factor diverges at `alpha = 1`, so
    /// mixing whole log-CFs leaves a sign-flipping phase at the center. The
    /// factor itself is interpolated instead: linear in `alpha` between its
    /// band-edge values and equal to the `alpha = 1` branch's
    /// `-(2/pi) ln|theta|` at the center. The result agrees with
    /// [`Self::log_cf_nonunit`] at both band edges and with the exact
    /// `alpha = 1` formula at the center, and is continuous in between.
    fn log_cf_banded(&self, theta: f64) -> Complex<f64> {
        let i = Complex::new(0.0, 1.0);
        let abs_t = theta.abs();
        let s = (self.alpha - 1.0) / ALPHA_ONE_BAND;
        let edge_tan = (FRAC_PI_2 * (1.0 + ALPHA_ONE_BAND)).tan();
        let skew_factor = s * edge_tan - (1.0 - s.abs()) * FRAC_2_PI * abs_t.ln();
        let scale = self.gamma.powf(self.alpha) * abs_t.powf(self.alpha);
        let skew = self.beta * theta.signum() * skew_factor;
        -scale * (Complex::new(1.0, 0.0) - i * skew) + i * self.delta * theta
    }

    /// Theoretical characteristic function at frequency `theta`.
    ///
    /// Inside `|alpha - 1| < ALPHA_ONE_BAND` the divergent skew factor is
    /// interpolated (see [`Self::log_cf_banded`]) so the value and its
    /// finite-difference gradients in `alpha` stay bounded and continuous
    /// through `alpha = 1`, skewed cases included.
    pub fn theoretical_cf(&self, theta: f64) -> Complex<f64> {
        let t = if theta.abs() < THETA_EPS {
            THETA_EPS.copysign(if theta == 0.0 { 1.0 } else { theta })
        } else {
            theta
        };

        let dist = (self.alpha - 1.0).abs();
        let log_cf = if dist >= ALPHA_ONE_BAND {
            self.log_cf_nonunit(t)
        } else {
            self.log_cf_banded(t)
        };
        log_cf.exp()
    }

    /// Theoretical CF evaluated over a grid, one complex value per frequency.
    pub fn theoretical_cf_grid(&self, thetas: &[f64]) -> Vec<Complex<f64>> {
        thetas.iter().map(|&t| self.theoretical_cf(t)).collect()
    }

    /// Draws one stable variate via the Chambers-Mallows-Stuck transform,
    /// scaled to `(gamma, delta)`.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        let u: f64 = rng.random_range(-FRAC_PI_2..FRAC_PI_2);
        let w: f64 = Exp1.sample(rng);
        let w = w.max(1.0e-300);

        if (self.alpha - 1.0).abs() < ALPHA_ONE_BAND {
            let t = FRAC_PI_2 + self.beta * u;
            let x = FRAC_2_PI
                * (t * u.tan() - self.beta * ((FRAC_PI_2 * w * u.cos()) / t).ln());
            // Weron's location correction for the alpha = 1 scaling.
            self.gamma * x + self.delta + FRAC_2_PI * self.beta * self.gamma * self.gamma.ln()
        } else {
            let tan_half = (FRAC_PI_2 * self.alpha).tan();
            let b = (self.beta * tan_half).atan() / self.alpha;
            let s = (1.0 + self.beta * self.beta * tan_half * tan_half)
                .powf(1.0 / (2.0 * self.alpha));
            let x = s * (self.alpha * (u + b)).sin() / u.cos().powf(1.0 / self.alpha)
                * ((u - self.alpha * (u + b)).cos().max(1.0e-300) / w)
                    .powf((1.0 - self.alpha) / self.alpha);
            self.gamma * x + self.delta
        }
    }

    /// Draws `count` i.i.d. stable variates.
    pub fn sample_n<R: Rng + ?Sized>(&self, rng: &mut R, count: usize) -> Vec<f64> {
        (0..count).map(|_| self.sample(rng)).collect()
    }
}

/// Empirical characteristic function `mean(exp(i theta x))`, evaluated per
/// grid point. The result keeps one complex value per frequency; collapsing
/// the outer product to a single scalar destroys the estimator.
pub fn empirical_cf(sample: &[f64], thetas: &[f64]) -> Vec<Complex<f64>> {
    let n = sample.len().max(1) as f64;
    thetas
        .iter()
        .map(|&theta| {
            let mut acc = Complex::new(0.0, 0.0);
            for &x in sample {
                acc += Complex::new(0.0, theta * x).exp();
            }
            acc / n
        })
        .collect()
}

/// Fixed frequency grid shared by the ECF point estimator and the
/// log-posterior. Both must evaluate on the same grid for their objectives
/// to be comparable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrequencyGrid {
    thetas: Vec<f64>,
}

impl FrequencyGrid {
    /// `count` frequencies linearly spaced on `(min, max]`.
    pub fn new(min: f64, max: f64, count: usize) -> Result<Self, String> {
        if !(min.is_finite() && max.is_finite()) || min < 0.0 || max <= min {
            return Err(format!("frequency grid requires 0 <= min < max, got [{min}, {max}]"));
        }
        if count == 0 {
            return Err("frequency grid requires at least one point".to_string());
        }
        let step = (max - min) / count as f64;
        let thetas = (1..=count).map(|i| min + step * i as f64).collect();
        Ok(Self { thetas })
    }

    pub fn thetas(&self) -> &[f64] {
        &self.thetas
    }

    pub fn len(&self) -> usize {
        self.thetas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.thetas.is_empty()
    }
}

impl Default for FrequencyGrid {
    /// 100 points on `(0.1, 10]`.
    fn default() -> Self {
        Self::new(0.1, 10.0, 100).expect("default grid bounds are valid")
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;

    #[test]
    fn cf_approaches_one_at_zero_frequency() {
        for params in [
            StableParams::new(1.5, 0.0, 1.0, 0.0),
            StableParams::new(0.8, -0.5, 2.0, 1.0),
            StableParams::new(2.0, 0.3, 0.5, -0.2),
            StableParams::new(1.0, 0.7, 1.3, 0.4),
        ] {
            let cf = params.theoretical_cf(1.0e-9);
            assert!((cf.re - 1.0).abs() < 1.0e-6, "Re CF(0) = {} for {params:?}", cf.re);
            assert!(cf.im.abs() < 1.0e-6, "Im CF(0) = {} for {params:?}", cf.im);
        }
    }

    #[test]
    fn gaussian_case_matches_closed_form() {
        // alpha = 2 is Gaussian with variance 2 gamma^2: CF = exp(-gamma^2 t^2 + i delta t).
        let params = StableParams::new(2.0, 0.0, 0.7, 0.3);
        for &t in &[0.5, 1.0, 2.5] {
            let cf = params.theoretical_cf(t);
            let expected = Complex::new(-0.49 * t * t, 0.3 * t).exp();
            assert_relative_eq!(cf.re, expected.re, epsilon = 1.0e-10);
            assert_relative_eq!(cf.im, expected.im, epsilon = 1.0e-10);
        }
    }

    #[test]
    fn skewed_cf_is_continuous_through_alpha_one() {
        let at_one = StableParams::new(1.0, 0.5, 1.0, 0.0);
        let below = StableParams::new(1.0 - 1.0e-9, 0.5, 1.0, 0.0);
        let above = StableParams::new(1.0 + 1.0e-9, 0.5, 1.0, 0.0);
        for &t in &[0.3, 0.5, 1.0, 2.0, 4.0] {
            let c = at_one.theoretical_cf(t);
            let lo = below.theoretical_cf(t);
            let hi = above.theoretical_cf(t);
            assert!((lo - c).norm() < 1.0e-4, "jump {} below alpha=1 at theta={t}", (lo - c).norm());
            assert!((hi - c).norm() < 1.0e-4, "jump {} above alpha=1 at theta={t}", (hi - c).norm());
            assert!((hi - lo).norm() < 1.0e-4, "jump {} across alpha=1 at theta={t}", (hi - lo).norm());
        }
    }

    #[test]
    fn skewed_cf_is_continuous_at_the_band_edges() {
        for sign in [-1.0, 1.0] {
            let outside = StableParams::new(1.0 + sign * ALPHA_ONE_BAND * (1.0 + 1.0e-9), 0.5, 1.0, 0.0);
            let inside = StableParams::new(1.0 + sign * ALPHA_ONE_BAND * (1.0 - 1.0e-9), 0.5, 1.0, 0.0);
            for &t in &[0.3, 1.0, 4.0] {
                let a = outside.theoretical_cf(t);
                let b = inside.theoretical_cf(t);
                assert!(
                    (a - b).norm() < 1.0e-6,
                    "CF jump {} at theta={t}, band edge sign {sign}",
                    (a - b).norm()
                );
            }
        }
    }

    #[test]
    fn empirical_cf_of_degenerate_sample_is_exact() {
        let c = 0.37;
        let sample = vec![c; 25];
        let thetas = [0.2, 1.0, 5.0, 9.9];
        let ecf = empirical_cf(&sample, &thetas);
        for (&theta, phi) in thetas.iter().zip(&ecf) {
            let expected = Complex::new(0.0, theta * c).exp();
            assert_relative_eq!(phi.re, expected.re, epsilon = 1.0e-12);
            assert_relative_eq!(phi.im, expected.im, epsilon = 1.0e-12);
        }
    }

    #[test]
    fn empirical_cf_keeps_one_value_per_frequency() {
        let sample = [0.1, -0.4, 0.9, 0.2];
        let grid = FrequencyGrid::default();
        let ecf = empirical_cf(&sample, grid.thetas());
        assert_eq!(ecf.len(), grid.len());
    }

    #[test]
    fn default_grid_excludes_origin_and_includes_upper_bound() {
        let grid = FrequencyGrid::default();
        assert_eq!(grid.len(), 100);
        assert!(grid.thetas()[0] > 0.1);
        assert_relative_eq!(*grid.thetas().last().unwrap(), 10.0, epsilon = 1.0e-12);
    }

    #[test]
    fn gaussian_samples_have_matching_moments() {
        let params = StableParams::new(2.0, 0.0, 1.0, 0.5);
        let mut rng = StdRng::seed_from_u64(7);
        let draws = params.sample_n(&mut rng, 40_000);

        let mean = draws.iter().sum::<f64>() / draws.len() as f64;
        let var = draws.iter().map(|x| (x - mean) * (x - mean)).sum::<f64>()
            / (draws.len() - 1) as f64;

        // alpha = 2 stable is N(delta, 2 gamma^2).
        assert!((mean - 0.5).abs() < 0.03, "mean {mean}");
        assert!((var - 2.0).abs() < 0.1, "variance {var}");
    }

    #[test]
    fn cauchy_samples_have_matching_median_and_quartiles() {
        // alpha = 1, beta = 0 is Cauchy(delta, gamma): quartiles at delta +- gamma.
        let params = StableParams::new(1.0, 0.0, 2.0, 1.0);
        let mut rng = StdRng::seed_from_u64(11);
        let mut draws = params.sample_n(&mut rng, 40_000);
        draws.sort_by(|a, b| a.total_cmp(b));

        let q = |p: f64| draws[(p * draws.len() as f64) as usize];
        assert!((q(0.5) - 1.0).abs() < 0.08, "median {}", q(0.5));
        assert!((q(0.25) - (1.0 - 2.0)).abs() < 0.15, "q1 {}", q(0.25));
        assert!((q(0.75) - (1.0 + 2.0)).abs() < 0.15, "q3 {}", q(0.75));
    }

    #[test]
    fn sampled_ecf_tracks_theoretical_cf() {
        let params = StableParams::new(1.5, 0.3, 1.0, 0.0);
        let mut rng = StdRng::seed_from_u64(3);
        let draws = params.sample_n(&mut rng, 60_000);

        let thetas = [0.3, 0.8, 1.5];
        let ecf = empirical_cf(&draws, &thetas);
        for (&theta, phi_hat) in thetas.iter().zip(&ecf) {
            let phi = params.theoretical_cf(theta);
            assert!(
                (phi - phi_hat).norm() < 0.02,
                "ECF mismatch {} at theta={theta}",
                (phi - phi_hat).norm()
            );
        }
    }

    #[test]
    fn validate_rejects_out_of_range_parameters() {
        assert!(StableParams::new(0.0, 0.0, 1.0, 0.0).validate().is_err());
        assert!(StableParams::new(2.1, 0.0, 1.0, 0.0).validate().is_err());
        assert!(StableParams::new(1.5, 1.5, 1.0, 0.0).validate().is_err());
        assert!(StableParams::new(1.5, 0.0, 0.0, 0.0).validate().is_err());
        assert!(StableParams::new(1.5, 0.0, 1.0, f64::NAN).validate().is_err());
        assert!(StableParams::new(1.5, 0.0, 1.0, 0.0).validate().is_ok());
    }
}
