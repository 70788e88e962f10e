//! Step-response conformance validation for grid-support inverter functions.

pub mod config;
/// Curves, accuracies, tolerance bands, step evaluation and recording.
pub mod conformance;
/// Grid simulator and measurement front-end.
pub mod env;
pub mod error;
pub mod eut;
pub mod io;
/// Procedures that step a bench through a control curve.
pub mod procedure;
pub mod reporting;
