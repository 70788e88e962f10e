//! Conformance core: curves, accuracies, tolerance bands and step verdicts.

/// Measurement-accuracy constants.
pub mod accuracy;
/// Piecewise-linear characteristics and target functions.
pub mod curve;
pub mod evaluator;
/// Append-only epoch log.
pub mod recorder;
pub mod sequencer;
pub mod settling;
pub mod tolerance;
/// Timestamped channel samples.
pub mod trace;

pub use accuracy::AccuracyModel;
pub use curve::{PiecewiseCurve, Shifted, TargetFn, TargetFunction};
pub use evaluator::{
    CriteriaBands, ExponentialApproach, InputSource, StepEvaluation, StepResponseEvaluator,
    StepSpec,
};
pub use recorder::{ConformanceRecorder, Epoch};
pub use sequencer::{CurveStepSequencer, Excursion, SkipRule, StepPoint};
pub use settling::{Settling, await_settling};
pub use tolerance::{Sidedness, ToleranceBand, tolerance_band};
pub use trace::{Channel, MeasurementTrace, Sample};
