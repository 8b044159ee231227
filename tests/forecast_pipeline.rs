//! End-to-end pipeline scenarios: backtest window bookkeeping, correlation
//! diagnostics, seed reproducibility, and posterior-chain calibration.

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::{Distribution, Normal};

use stablepaths::calibration::StablePosterior;
use stablepaths::math::stable::{FrequencyGrid, StableParams};
use stablepaths::model::{AssetRole, ModelConfig, StochasticPriceModel};
use stablepaths::sampling::hmc::HmcSampler;

const EIGHT_PRICES: [f64; 8] = [100.0, 101.0, 99.0, 103.0, 105.0, 107.0, 104.0, 108.0];

/// Small chain keeps the scenario tests quick without changing semantics.
fn fast_hmc() -> HmcSampler {
    HmcSampler {
        num_samples: 200,
        burn_in: 50,
        ..HmcSampler::default()
    }
}

fn synthetic_prices(seed: u64, len: usize) -> Vec<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    let step = Normal::new(0.0005, 0.02).unwrap();
    let mut prices = Vec::with_capacity(len);
    let mut p = 100.0_f64;
    prices.push(p);
    for _ in 1..len {
        let r: f64 = step.sample(&mut rng);
        p *= r.exp();
        prices.push(p);
    }
    prices
}

#[test]
fn eight_price_backtest_scenario() {
    let mut model = StochasticPriceModel::new(EIGHT_PRICES.to_vec(), Vec::new()).unwrap();
    let config = ModelConfig {
        backtesting: true,
        train_size: 0.75,
        path_count: 400,
        hmc: fast_hmc(),
        ..ModelConfig::default()
    };
    model.run_liquid(&config).unwrap();

    assert_eq!(model.train().unwrap().len(), 6);
    assert_eq!(model.test().unwrap().len(), 2);
    assert_eq!(model.median_confidence().unwrap().len(), 2);
    assert_eq!(model.lower_confidence().unwrap().len(), 2);
    assert_eq!(model.upper_confidence().unwrap().len(), 2);
    assert_eq!(model.average_confidence().unwrap().len(), 2);
    assert_eq!(model.last_role(), Some(AssetRole::Liquid));
    assert_eq!(model.last_run_was_backtest(), Some(true));

    let mape = model.backtest_mape().unwrap();
    assert!(mape.is_finite() && mape >= 0.0, "MAPE = {mape}");
    assert!(model.selected_parameters().is_some());
}

#[test]
fn forecast_bands_are_ordered_and_positive() {
    let prices = synthetic_prices(2024, 300);
    let mut model = StochasticPriceModel::new(prices, Vec::new()).unwrap();
    let config = ModelConfig {
        horizon: 10,
        path_count: 500,
        hmc: fast_hmc(),
        ..ModelConfig::default()
    };
    model.run_liquid(&config).unwrap();

    let lower = model.lower_confidence().unwrap();
    let median = model.median_confidence().unwrap();
    let upper = model.upper_confidence().unwrap();
    assert_eq!(median.len(), 10);
    assert!(model.backtest_mape().is_none());

    for t in 0..10 {
        assert!(lower[t] > 0.0, "lower band not positive at t={t}");
        assert!(
            lower[t] <= median[t] && median[t] <= upper[t],
            "band ordering broken at t={t}: {} / {} / {}",
            lower[t],
            median[t],
            upper[t]
        );
    }
}

#[test]
fn identical_seeds_reproduce_trajectories() {
    let prices = synthetic_prices(7, 200);
    let config = ModelConfig {
        horizon: 5,
        path_count: 300,
        hmc: fast_hmc(),
        ..ModelConfig::default()
    };

    let mut a = StochasticPriceModel::new(prices.clone(), Vec::new()).unwrap();
    a.run_liquid(&config).unwrap();
    let mut b = StochasticPriceModel::new(prices, Vec::new()).unwrap();
    b.run_liquid(&config).unwrap();

    assert_eq!(a.median_confidence().unwrap(), b.median_confidence().unwrap());
    assert_eq!(a.lower_confidence().unwrap(), b.lower_confidence().unwrap());
    assert_eq!(a.upper_confidence().unwrap(), b.upper_confidence().unwrap());

    // Re-running the same model with the same seed is also idempotent.
    a.run_liquid(&config).unwrap();
    assert_eq!(a.median_confidence().unwrap(), b.median_confidence().unwrap());
}

#[test]
fn anticorrelated_pair_reports_rho_of_minus_one() {
    let liquid = synthetic_prices(99, 120);
    // Mirror every log return so the illiquid series is perfectly
    // anti-correlated with the liquid one.
    let mut illiquid = Vec::with_capacity(liquid.len());
    let mut p = 50.0_f64;
    illiquid.push(p);
    for w in liquid.windows(2) {
        let r = (w[1] / w[0]).ln();
        p *= (-r).exp();
        illiquid.push(p);
    }

    let mut model = StochasticPriceModel::new(liquid, illiquid).unwrap();
    let config = ModelConfig {
        backtesting: true,
        train_size: 0.8,
        path_count: 300,
        hmc: fast_hmc(),
        ..ModelConfig::default()
    };
    model.run_illiquid(&config).unwrap();

    let rho = model.asset_correlation().unwrap();
    assert!((rho + 1.0).abs() < 1.0e-6, "rho = {rho}");
    assert_eq!(model.last_role(), Some(AssetRole::Illiquid));
    assert!(model.backtest_mape().unwrap().is_finite());
}

#[test]
fn posterior_chain_is_neither_frozen_nor_divergent() {
    let truth = StableParams::new(1.5, 0.0, 1.0, 0.0);
    let mut rng = StdRng::seed_from_u64(13);
    let draws = truth.sample_n(&mut rng, 2_000);

    let posterior = StablePosterior::new(&FrequencyGrid::default(), &draws);
    let sampler = HmcSampler {
        num_samples: 300,
        burn_in: 50,
        ..HmcSampler::default()
    };
    let mut chain_rng = StdRng::seed_from_u64(14);
    let chain = sampler
        .sample(&posterior, &[1.5, 0.0, 1.0, 0.0], &mut chain_rng)
        .unwrap();

    assert_eq!(chain.samples.len(), 300);
    assert!(
        chain.acceptance_rate > 0.1,
        "chain frozen: acceptance {}",
        chain.acceptance_rate
    );
    assert!(
        chain.acceptance_rate < 0.9,
        "posterior too flat for the reference step size: acceptance {}",
        chain.acceptance_rate
    );

    // The chain must actually move.
    let first = &chain.samples[0];
    assert!(
        chain.samples.iter().any(|s| s != first),
        "no accepted move in {} samples",
        chain.samples.len()
    );

    // Every recorded draw stays inside the feasible box.
    for s in &chain.samples {
        assert!(s[0] > 0.0 && s[0] <= 2.0, "alpha out of box: {}", s[0]);
        assert!(s[1].abs() <= 1.0, "beta out of box: {}", s[1]);
        assert!(s[2] > 0.0, "gamma out of box: {}", s[2]);
    }
}
