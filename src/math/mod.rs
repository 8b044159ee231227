//! Numerical building blocks: the stable distribution and time-series
//! statistics shared by calibration, sampling, and simulation.

pub mod stable;
pub mod timeseries;

pub use stable::{ALPHA_ONE_BAND, FrequencyGrid, StableParams, empirical_cf};
pub use timeseries::{
    empirical_quantile, log_returns, mape, mean, pearson_correlation, sample_std,
};
