//! Monte Carlo forward simulation and its quantile reductions.

pub mod paths;

pub use paths::{ConfidenceBands, Innovation, PriceCube, simulate, simulate_correlated};

#[cfg(feature = "parallel")]
pub use paths::simulate_parallel;
