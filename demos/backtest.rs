//! Backtesting a liquid price series and forecasting a correlated illiquid one.

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::{Distribution, Normal};

use stablepaths::model::{ModelConfig, StochasticPriceModel};

fn random_walk(seed: u64, len: usize, start: f64, drift: f64, vol: f64) -> Vec<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    let step = Normal::new(drift, vol).unwrap();
    let mut prices = Vec::with_capacity(len);
    let mut p = start;
    prices.push(p);
    for _ in 1..len {
        let r: f64 = step.sample(&mut rng);
        p *= r.exp();
        prices.push(p);
    }
    prices
}

fn main() {
    let liquid = random_walk(7, 250, 100.0, 0.0005, 0.02);
    let illiquid = random_walk(8, 250, 40.0, 0.0003, 0.03);

    // Liquid backtest: calibrate on the first 80%, score against the rest.
    let mut model = StochasticPriceModel::new(liquid, illiquid).unwrap();
    let config = ModelConfig {
        backtesting: true,
        train_size: 0.8,
        path_count: 2_000,
        ..ModelConfig::default()
    };
    model.run_liquid(&config).unwrap();

    let fit = model.selected_fit().unwrap();
    println!("Liquid backtest:");
    println!(
        "  fit: alpha={:.4} beta={:.4} gamma={:.6} delta={:.6}",
        fit.params.alpha, fit.params.beta, fit.params.gamma, fit.params.delta
    );
    println!("  {:?} after {} iterations", fit.convergence.reason, fit.convergence.iterations);
    println!("  MAPE = {:.3}%", model.backtest_mape().unwrap());

    let lower = model.lower_confidence().unwrap();
    let median = model.median_confidence().unwrap();
    let upper = model.upper_confidence().unwrap();
    let test = model.test().unwrap();
    println!("  t    5%        50%       95%       actual");
    for t in 0..median.len().min(10) {
        println!(
            "  {t:<3}  {:8.3}  {:8.3}  {:8.3}  {:8.3}",
            lower[t], median[t], upper[t], test[t]
        );
    }

    // Illiquid forecast: stable innovations correlated with the liquid asset.
    let forecast = ModelConfig {
        horizon: 20,
        path_count: 2_000,
        ..ModelConfig::default()
    };
    model.run_illiquid(&forecast).unwrap();

    println!("\nIlliquid forecast (horizon 20):");
    println!("  correlation with liquid returns = {:.4}", model.asset_correlation().unwrap());
    let median = model.median_confidence().unwrap();
    let mean = model.average_confidence().unwrap();
    println!("  t    median    mean");
    for t in [0, 4, 9, 14, 19] {
        println!("  {t:<3}  {:8.3}  {:8.3}", median[t], mean[t]);
    }
}
