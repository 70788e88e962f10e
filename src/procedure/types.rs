use std::fmt;

use serde::Deserialize;

use crate::conformance::sequencer::{CurveStepSequencer, StepPoint};

/// What a procedure does when a step raises a non-fatal fault.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnFault {
    /// Stop the run and return the fault.
    #[default]
    Abort,
    /// Record the step as failed and move on.
    RecordFailure,
}

/// Per-run values, passed in rather than kept on the procedure.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunContext {
    /// Available active power as a fraction of rated.
    pub power_level: f64,
    /// 1-based repetition number.
    pub iteration: usize,
    pub on_fault: OnFault,
}

impl RunContext {
    pub fn new(power_level: f64, iteration: usize, on_fault: OnFault) -> Self {
        Self {
            power_level,
            iteration,
            on_fault,
        }
    }
}

impl Default for RunContext {
    fn default() -> Self {
        Self::new(1.0, 1, OnFault::Abort)
    }
}

impl fmt::Display for RunContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "P{:.0}% #{}",
            100.0 * self.power_level,
            self.iteration
        )
    }
}

/// Sequence of curve inputs a procedure steps through.
#[derive(Debug, Clone, PartialEq)]
pub enum StimulusPlan {
    /// Walk the curve's breakpoints.
    Traverse(CurveStepSequencer),
    /// Fixed list, in order.
    Explicit(Vec<StepPoint>),
}
