//! Library-wide error and result types.

/// Errors surfaced by the estimation, sampling, and simulation stages.
///
/// Every failure identifies the stage it came from; callers retry with
/// adjusted inputs (initial guess, grid, step size) rather than relying on
/// any in-library recovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    /// Input validation error (non-positive prices, empty or mismatched series).
    InvalidInput(String),
    /// The point estimator failed to converge.
    ConvergenceFailure(String),
    /// Non-finite gradient or energy inside the HMC chain.
    SamplingFailure(String),
    /// Fewer than two complete observation pairs for a correlation.
    DegenerateCorrelation(String),
    /// Numerical issue (overflow, invalid state, etc.).
    NumericalError(String),
}

impl std::fmt::Display for ModelError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidInput(msg) => write!(f, "invalid input: {msg}"),
            Self::ConvergenceFailure(msg) => write!(f, "convergence failure: {msg}"),
            Self::SamplingFailure(msg) => write!(f, "sampling failure: {msg}"),
            Self::DegenerateCorrelation(msg) => write!(f, "degenerate correlation: {msg}"),
            Self::NumericalError(msg) => write!(f, "numerical error: {msg}"),
        }
    }
}

impl std::error::Error for ModelError {}
