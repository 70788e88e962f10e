//! Evaluation faults surfaced to the calling procedure.

use thiserror::Error;

use crate::conformance::trace::Channel;

/// Local evaluation fault.
///
/// A failed conformance verdict is *not* an error: it is reported through
/// the `passed`/`*_valid` fields of the evaluation. These variants cover
/// malformed input only, and the evaluator never retries after one.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConformanceError {
    #[error("invalid curve: {reason}")]
    InvalidCurve { reason: String },
    #[error("insufficient data: {samples} sample(s), at least 2 required")]
    InsufficientData { samples: usize },
    #[error("time regression at sample {index}: t={current} does not follow t={previous}")]
    TimeRegression {
        index: usize,
        previous: f64,
        current: f64,
    },
    #[error("tolerance computation: invalid {quantity} ({value})")]
    ToleranceComputation { quantity: &'static str, value: f64 },
    #[error("sample {index} has no {channel} reading")]
    MissingChannel { channel: Channel, index: usize },
    #[error("environment fault: {0}")]
    Environment(String),
}

impl ConformanceError {
    /// Returns `true` for faults that must abort the step immediately.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::TimeRegression { .. })
    }
}

pub type Result<T> = std::result::Result<T, ConformanceError>;
