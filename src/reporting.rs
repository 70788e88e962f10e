//! Post-hoc run summary computed from the recorder.

use std::fmt;

use crate::conformance::recorder::ConformanceRecorder;

/// Aggregate verdict counts for a complete run.
///
/// Computed post-hoc from the recorder so the summary can never disagree
/// with the recorded epochs.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    /// Number of recorded epochs.
    pub epochs: usize,
    pub passed: usize,
    pub failed: usize,
    /// Epochs recorded without an evaluation (faulted steps).
    pub faulted: usize,
    /// Smallest steady-state margin over evaluated epochs; negative when
    /// some steady-state mean fell outside its band.
    pub worst_ss_margin: Option<f64>,
    /// Label of the epoch holding `worst_ss_margin`.
    pub worst_label: Option<String>,
}

impl RunSummary {
    pub fn from_recorder(recorder: &ConformanceRecorder) -> Self {
        let mut summary = Self {
            epochs: recorder.len(),
            passed: 0,
            failed: 0,
            faulted: 0,
            worst_ss_margin: None,
            worst_label: None,
        };

        for epoch in recorder.epochs() {
            if epoch.passed {
                summary.passed += 1;
            } else {
                summary.failed += 1;
            }
            if epoch.criteria.is_none() {
                summary.faulted += 1;
            }
            if let Some(m) = epoch.ss_margin {
                if summary.worst_ss_margin.is_none_or(|w| m < w) {
                    summary.worst_ss_margin = Some(m);
                    summary.worst_label = Some(epoch.label.clone());
                }
            }
        }
        summary
    }

    /// Every epoch passed. Vacuously true for an empty run.
    pub fn all_passed(&self) -> bool {
        self.failed == 0
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "--- Conformance Report ---")?;
        writeln!(f, "Epochs recorded:       {}", self.epochs)?;
        writeln!(f, "Passed:                {}", self.passed)?;
        writeln!(f, "Failed:                {}", self.failed)?;
        writeln!(f, "Faulted steps:         {}", self.faulted)?;
        match (&self.worst_ss_margin, &self.worst_label) {
            (Some(m), Some(label)) => writeln!(f, "Worst ss margin:       {m:.4} ({label})")?,
            _ => writeln!(f, "Worst ss margin:       n/a")?,
        }
        let verdict = if self.all_passed() { "PASS" } else { "FAIL" };
        write!(f, "Verdict:               {verdict}")
    }
}
