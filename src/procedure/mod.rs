//! Test procedures that drive a bench through a sequence of steps.

pub mod engine;
pub mod types;

pub use engine::CurveProcedure;
pub use types::{OnFault, RunContext, StimulusPlan};
