//! Stable-parameter calibration: box-constrained least squares over the
//! empirical characteristic function, plus the posterior density the HMC
//! sampler explores.

pub mod core;
pub mod ecf;
pub mod lm;
pub mod posterior;

pub use self::core::{BoxConstraints, ConvergenceInfo, TerminationReason};
pub use ecf::{EcfEstimator, INITIAL_GUESS, StableFit};
pub use lm::{FitOptions, LeastSquaresSolution, least_squares_fit};
pub use posterior::StablePosterior;
