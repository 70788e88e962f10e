//! Append-only log of evaluated epochs.

use std::fmt;

use tracing::info;

use crate::conformance::evaluator::{CriteriaBands, StepEvaluation};
use crate::conformance::trace::MeasurementTrace;

/// One recorded slice of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct Epoch {
    pub label: String,
    /// Start of the slice (s).
    pub start: f64,
    /// End of the slice (s).
    pub end: f64,
    pub passed: bool,
    /// Bands the verdict was taken against; `None` for slices that were not
    /// evaluated, such as a failed step with no trace.
    pub criteria: Option<CriteriaBands>,
    pub trace: Option<MeasurementTrace>,
    /// Distance of the steady-state mean inside its band, when evaluated.
    pub ss_margin: Option<f64>,
}

impl fmt::Display for Epoch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verdict = if self.passed { "PASS" } else { "FAIL" };
        write!(
            f,
            "{:<22} {:>9.3}s -> {:>9.3}s  {verdict}",
            self.label, self.start, self.end
        )?;
        if let Some(c) = &self.criteria {
            write!(f, "  olrt {}  ss {}", c.olrt, c.steady_state)?;
        }
        if let Some(m) = self.ss_margin {
            write!(f, "  margin {m:.4}")?;
        }
        Ok(())
    }
}

/// Ordered record of every epoch in a run.
///
/// Epochs can only be appended. Each one is identified by its index, which
/// never changes once returned.
#[derive(Debug, Clone, Default)]
pub struct ConformanceRecorder {
    epochs: Vec<Epoch>,
}

impl ConformanceRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an epoch and returns its index.
    pub fn record_epoch(
        &mut self,
        trace: Option<MeasurementTrace>,
        criteria: Option<CriteriaBands>,
        start: f64,
        end: f64,
        label: impl Into<String>,
        passed: bool,
    ) -> usize {
        self.push(Epoch {
            label: label.into(),
            start,
            end,
            passed,
            criteria,
            trace,
            ss_margin: None,
        })
    }

    /// Appends the outcome of a step evaluation.
    pub fn record_evaluation(&mut self, label: impl Into<String>, eval: StepEvaluation) -> usize {
        self.push(Epoch {
            label: label.into(),
            start: eval.t_init,
            end: eval.t_ss1,
            passed: eval.passed(),
            criteria: Some(eval.criteria()),
            ss_margin: Some(eval.ss_margin()),
            trace: Some(eval.trace),
        })
    }

    fn push(&mut self, epoch: Epoch) -> usize {
        info!(epoch = %epoch, "recorded");
        self.epochs.push(epoch);
        self.epochs.len() - 1
    }

    pub fn epochs(&self) -> &[Epoch] {
        &self.epochs
    }

    pub fn len(&self) -> usize {
        self.epochs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.epochs.is_empty()
    }

    /// Every recorded epoch passed. Vacuously true for an empty run.
    pub fn passed(&self) -> bool {
        self.epochs.iter().all(|e| e.passed)
    }

    /// Epochs that failed, in recording order.
    pub fn failures(&self) -> impl Iterator<Item = &Epoch> {
        self.epochs.iter().filter(|e| !e.passed)
    }
}
