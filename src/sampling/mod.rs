//! Posterior sampling engines.

pub mod hmc;

pub use hmc::{HmcChain, HmcSampler, LogDensity};
