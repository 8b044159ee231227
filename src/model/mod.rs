//! Orchestration of the full forecasting pipeline: return derivation, ECF
//! point estimation, HMC posterior sampling, and path simulation, with a
//! chronological backtest mode.
//!
//! The orchestrator is the only stateful component; everything below it is a
//! pure function of its inputs. Randomness enters through one explicitly
//! seeded `StdRng` per run, threaded through the sampler and simulator.

use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

use crate::calibration::{EcfEstimator, StableFit, StablePosterior};
use crate::core::ModelError;
use crate::math::stable::{FrequencyGrid, StableParams};
use crate::math::timeseries::{log_returns, mape, mean, pearson_correlation, sample_std};
use crate::mc::paths::{ConfidenceBands, Innovation, simulate, simulate_correlated};
use crate::sampling::hmc::HmcSampler;

/// Which asset a run modeled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssetRole {
    Liquid,
    Illiquid,
}

/// Per-run configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelConfig {
    /// When true, withhold a trailing test window and score the forecast.
    pub backtesting: bool,
    /// Forecast steps; ignored in backtest mode, where the horizon is the
    /// held-out test length.
    pub horizon: usize,
    /// Simulated paths per run.
    pub path_count: usize,
    /// Chronological train fraction for backtests; the split index is
    /// `floor(train_size * len)`.
    pub train_size: f64,
    /// Seed of the run's RNG stream.
    pub seed: u64,
    /// HMC controls for the posterior chain.
    pub hmc: HmcSampler,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            backtesting: false,
            horizon: 30,
            path_count: 1_000,
            train_size: 0.8,
            seed: 42,
            hmc: HmcSampler::default(),
        }
    }
}

/// Outputs of the most recent run. Overwritten wholesale by every invocation.
#[derive(Debug, Clone)]
struct RunState {
    role: AssetRole,
    backtesting: bool,
    train: Vec<f64>,
    test: Vec<f64>,
    bands: ConfidenceBands,
    mape: Option<f64>,
    correlation: Option<f64>,
}

/// Bayesian stable-return price model over a liquid asset and an optional
/// index-aligned illiquid companion.
#[derive(Debug, Clone)]
pub struct StochasticPriceModel {
    liquid_prices: Vec<f64>,
    illiquid_prices: Vec<f64>,
    liquid_returns: Vec<f64>,
    illiquid_returns: Vec<f64>,
    fit: Option<StableFit>,
    state: Option<RunState>,
}

impl StochasticPriceModel {
    /// Builds the model and derives log returns eagerly. `illiquid_prices`
    /// may be empty; otherwise it must align index-for-index with the liquid
    /// series.
    pub fn new(liquid_prices: Vec<f64>, illiquid_prices: Vec<f64>) -> Result<Self, ModelError> {
        let liquid_returns = log_returns(&liquid_prices)?;
        let illiquid_returns = if illiquid_prices.is_empty() {
            Vec::new()
        } else {
            if illiquid_prices.len() != liquid_prices.len() {
                return Err(ModelError::InvalidInput(format!(
                    "asset series lengths differ: liquid {} vs illiquid {}",
                    liquid_prices.len(),
                    illiquid_prices.len()
                )));
            }
            log_returns(&illiquid_prices)?
        };

        Ok(Self {
            liquid_prices,
            illiquid_prices,
            liquid_returns,
            illiquid_returns,
            fit: None,
            state: None,
        })
    }

    /// Chronological train/test split of a price series and its returns.
    fn split<'a>(
        prices: &'a [f64],
        returns: &'a [f64],
        config: &ModelConfig,
    ) -> Result<(&'a [f64], &'a [f64], &'a [f64], usize), ModelError> {
        if config.backtesting {
            if !(0.0..=1.0).contains(&config.train_size) {
                return Err(ModelError::InvalidInput(format!(
                    "train_size must lie in [0, 1], got {}",
                    config.train_size
                )));
            }
            let split = (config.train_size * prices.len() as f64).floor() as usize;
            if split < 3 || split >= prices.len() {
                return Err(ModelError::InvalidInput(format!(
                    "backtest split {split} of {} prices leaves no usable train/test window",
                    prices.len()
                )));
            }
            let horizon = prices.len() - split;
            Ok((&prices[..split], &prices[split..], &returns[..split - 1], horizon))
        } else {
            if config.horizon == 0 {
                return Err(ModelError::InvalidInput(
                    "forecast horizon must be positive".to_string(),
                ));
            }
            Ok((prices, &[], returns, config.horizon))
        }
    }

    /// Cached point estimate, fitting on first use.
    fn point_estimate(
        &mut self,
        train_returns: &[f64],
        grid: &FrequencyGrid,
    ) -> Result<StableFit, ModelError> {
        if let Some(fit) = &self.fit {
            return Ok(fit.clone());
        }
        let fit = EcfEstimator::default().fit(train_returns, grid)?;
        self.fit = Some(fit.clone());
        Ok(fit)
    }

    /// Drops the cached point estimate so the next run refits.
    pub fn refit(&mut self) {
        self.fit = None;
    }

    /// Runs the liquid-asset pipeline: ECF fit, HMC posterior chain over the
    /// CF-mismatch posterior, and posterior-ensemble path simulation.
    pub fn run_liquid(&mut self, config: &ModelConfig) -> Result<(), ModelError> {
        let prices = std::mem::take(&mut self.liquid_prices);
        let returns = std::mem::take(&mut self.liquid_returns);
        let result = self.run_liquid_inner(&prices, &returns, config);
        self.liquid_prices = prices;
        self.liquid_returns = returns;
        result
    }

    fn run_liquid_inner(
        &mut self,
        prices: &[f64],
        returns: &[f64],
        config: &ModelConfig,
    ) -> Result<(), ModelError> {
        let (train, test, train_returns, horizon) = Self::split(prices, returns, config)?;
        let mut rng = StdRng::seed_from_u64(config.seed);
        let grid = FrequencyGrid::default();

        let fit = self.point_estimate(train_returns, &grid)?;

        let posterior = StablePosterior::new(&grid, train_returns);
        let chain = config
            .hmc
            .sample(&posterior, &fit.params.to_array(), &mut rng)?;

        // The penalized posterior keeps accepted positions feasible; an
        // infeasible draw indicates a sampler fault, so the ensemble always
        // carries the full requested sample count.
        let mut ensemble = Vec::with_capacity(chain.samples.len());
        for sample in &chain.samples {
            let params = StableParams::from_slice(sample);
            params.validate().map_err(ModelError::SamplingFailure)?;
            ensemble.push(params);
        }

        let initial_price = *train.last().expect("split guarantees a non-empty train");
        let cube = simulate(&ensemble, initial_price, horizon, config.path_count, &mut rng)?;
        let bands = ConfidenceBands::from_cube(&cube);

        let score = if config.backtesting {
            Some(mape(&bands.median, test)?)
        } else {
            None
        };

        self.state = Some(RunState {
            role: AssetRole::Liquid,
            backtesting: config.backtesting,
            train: train.to_vec(),
            test: test.to_vec(),
            bands,
            mape: score,
            correlation: None,
        });
        Ok(())
    }

    /// Runs the illiquid-asset pipeline: the stable point estimate selects
    /// the innovation marginal, and forward paths follow the correlated
    /// drift/diffusion decomposition against the liquid asset.
    pub fn run_illiquid(&mut self, config: &ModelConfig) -> Result<(), ModelError> {
        if self.illiquid_prices.is_empty() {
            return Err(ModelError::InvalidInput(
                "no illiquid price series was provided".to_string(),
            ));
        }

        let prices = std::mem::take(&mut self.illiquid_prices);
        let returns = std::mem::take(&mut self.illiquid_returns);
        let result = self.run_illiquid_inner(&prices, &returns, config);
        self.illiquid_prices = prices;
        self.illiquid_returns = returns;
        result
    }

    fn run_illiquid_inner(
        &mut self,
        prices: &[f64],
        returns: &[f64],
        config: &ModelConfig,
    ) -> Result<(), ModelError> {
        let (train, test, train_returns, horizon) = Self::split(prices, returns, config)?;
        let liquid_train_returns = &self.liquid_returns[..train_returns.len()];
        let rho = pearson_correlation(liquid_train_returns, train_returns)?;

        let mut rng = StdRng::seed_from_u64(config.seed);
        let grid = FrequencyGrid::default();
        let fit = self.point_estimate(train_returns, &grid)?;

        let mu = mean(train_returns);
        let sigma = sample_std(train_returns);
        let innovation = Innovation::Stable(StableParams::new(
            fit.params.alpha,
            fit.params.beta,
            1.0,
            0.0,
        ));

        let initial_price = *train.last().expect("split guarantees a non-empty train");
        let cube = simulate_correlated(
            innovation,
            mu,
            sigma,
            rho,
            initial_price,
            horizon,
            config.path_count,
            &mut rng,
        )?;
        let bands = ConfidenceBands::from_cube(&cube);

        let score = if config.backtesting {
            Some(mape(&bands.median, test)?)
        } else {
            None
        };

        self.state = Some(RunState {
            role: AssetRole::Illiquid,
            backtesting: config.backtesting,
            train: train.to_vec(),
            test: test.to_vec(),
            bands,
            mape: score,
            correlation: Some(rho),
        });
        Ok(())
    }

    /// 5th-percentile price trajectory of the last run.
    pub fn lower_confidence(&self) -> Option<&[f64]> {
        self.state.as_ref().map(|s| s.bands.lower.as_slice())
    }

    /// Median price trajectory of the last run.
    pub fn median_confidence(&self) -> Option<&[f64]> {
        self.state.as_ref().map(|s| s.bands.median.as_slice())
    }

    /// Mean price trajectory of the last run.
    pub fn average_confidence(&self) -> Option<&[f64]> {
        self.state.as_ref().map(|s| s.bands.mean.as_slice())
    }

    /// 95th-percentile price trajectory of the last run.
    pub fn upper_confidence(&self) -> Option<&[f64]> {
        self.state.as_ref().map(|s| s.bands.upper.as_slice())
    }

    /// MAPE of the median trajectory against the held-out prices, percent.
    /// `None` outside backtest mode.
    pub fn backtest_mape(&self) -> Option<f64> {
        self.state.as_ref().and_then(|s| s.mape)
    }

    /// Liquid/illiquid training-return correlation. `None` until an illiquid
    /// run completes.
    pub fn asset_correlation(&self) -> Option<f64> {
        self.state.as_ref().and_then(|s| s.correlation)
    }

    /// Cached stable point estimate, if a fit has run.
    pub fn selected_parameters(&self) -> Option<StableParams> {
        self.fit.as_ref().map(|f| f.params)
    }

    /// Full point-estimate payload including convergence metadata.
    pub fn selected_fit(&self) -> Option<&StableFit> {
        self.fit.as_ref()
    }

    /// Training price window of the last run (indices `0..len(train)`).
    pub fn train(&self) -> Option<&[f64]> {
        self.state.as_ref().map(|s| s.train.as_slice())
    }

    /// Held-out price window of the last run (indices
    /// `len(train)..len(train) + horizon`); empty outside backtest mode.
    pub fn test(&self) -> Option<&[f64]> {
        self.state.as_ref().map(|s| s.test.as_slice())
    }

    /// Asset role of the last run.
    pub fn last_role(&self) -> Option<AssetRole> {
        self.state.as_ref().map(|s| s.role)
    }

    /// Whether the last run was a backtest.
    pub fn last_run_was_backtest(&self) -> Option<bool> {
        self.state.as_ref().map(|s| s.backtesting)
    }

    /// Liquid log-return series.
    pub fn liquid_returns(&self) -> &[f64] {
        &self.liquid_returns
    }

    /// Illiquid log-return series (empty when no illiquid asset was given).
    pub fn illiquid_returns(&self) -> &[f64] {
        &self.illiquid_returns
    }
}
