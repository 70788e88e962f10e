//! Step-response conformance evaluation.
//!
//! One evaluator serves every control mode. A step is judged twice:
//!
//! 1. **Transient** at one open-loop response time (olrt) after the step,
//!    against an exponential approach that has covered 90% of the step by
//!    then, with the olrt itself carrying the timing uncertainty.
//! 2. **Steady state**, averaged from one olrt after the step to the end of
//!    the observation window, against the mode's target function at the
//!    averaged input.
//!
//! Both bands come from [`tolerance_band`]. A failed check is a verdict,
//! not an error.

use std::fmt;

use tracing::debug;

use crate::conformance::accuracy::AccuracyModel;
use crate::conformance::curve::TargetFunction;
use crate::conformance::tolerance::{Sidedness, ToleranceBand, tolerance_band};
use crate::conformance::trace::{Channel, MeasurementTrace};
use crate::env::Environment;
use crate::error::{ConformanceError, Result};
use crate::eut::ControlMode;

/// Default observation window, in multiples of the olrt.
pub const DEFAULT_WINDOW_MULTIPLE: f64 = 4.0;

/// Fraction of the step still outstanding at one olrt.
const RESIDUAL_AT_OLRT: f64 = 0.1;

/// Where the curve input of a step comes from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputSource {
    /// Averaged from a measured channel over the steady-state window.
    Measured(Channel),
    /// Known exactly because it was commanded (e.g. a power limit).
    Commanded(f64),
}

/// Parameters of one step evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct StepSpec {
    /// Open-loop response time (s).
    pub olrt: f64,
    /// Observation window measured from the pre-step sample (s).
    pub trace_window: f64,
    /// Curve input.
    pub input: InputSource,
    /// Controlled output channel.
    pub output: Channel,
    /// Accuracy of the curve input.
    pub xacc: f64,
    /// Accuracy of the output.
    pub yacc: f64,
    /// Which band edges each check uses.
    pub sidedness: Sidedness,
}

impl StepSpec {
    /// Creates a spec with a `4 * olrt` window and two-sided checks.
    pub fn new(olrt: f64, input: InputSource, output: Channel, xacc: f64, yacc: f64) -> Self {
        Self {
            olrt,
            trace_window: DEFAULT_WINDOW_MULTIPLE * olrt,
            input,
            output,
            xacc,
            yacc,
            sidedness: Sidedness::Both,
        }
    }

    /// Derives channels and accuracies from a control mode.
    ///
    /// `x` is the input the step drives to; it is only used when the mode's
    /// input is commanded rather than measured.
    pub fn for_mode(mode: ControlMode, accuracy: &AccuracyModel, olrt: f64, x: f64) -> Self {
        let input = mode
            .input_channel()
            .map_or(InputSource::Commanded(x), InputSource::Measured);
        Self::new(
            olrt,
            input,
            mode.output_channel(),
            mode.x_accuracy(accuracy),
            mode.y_accuracy(accuracy),
        )
    }

    pub fn with_trace_window(mut self, trace_window: f64) -> Self {
        self.trace_window = trace_window;
        self
    }

    pub fn with_sidedness(mut self, sidedness: Sidedness) -> Self {
        self.sidedness = sidedness;
        self
    }

    /// Channels every sample must carry.
    pub fn channels(&self) -> Vec<Channel> {
        match self.input {
            InputSource::Measured(channel) if channel != self.output => vec![channel, self.output],
            _ => vec![self.output],
        }
    }

    fn check(&self) -> Result<()> {
        if !self.olrt.is_finite() || self.olrt <= 0.0 {
            return Err(ConformanceError::ToleranceComputation {
                quantity: "open-loop response time",
                value: self.olrt,
            });
        }
        if !self.trace_window.is_finite() || self.trace_window <= 0.0 {
            return Err(ConformanceError::ToleranceComputation {
                quantity: "trace window",
                value: self.trace_window,
            });
        }
        Ok(())
    }
}

/// Predicted response `y(t) = y_ss + (y_init - y_ss) * 0.1^(t / olrt)`.
///
/// `t` is seconds since the pre-step sample. The model is calibrated so
/// that 90% of the step is covered at exactly one olrt, whatever the
/// device's real time constant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExponentialApproach {
    pub y_init: f64,
    pub y_ss: f64,
    pub olrt: f64,
}

impl TargetFunction for ExponentialApproach {
    fn y_of_x(&self, t: f64) -> f64 {
        let residual = RESIDUAL_AT_OLRT.powf(t.max(0.0) / self.olrt);
        self.y_ss + (self.y_init - self.y_ss) * residual
    }
}

/// Band edges recorded alongside a verdict.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CriteriaBands {
    pub olrt: ToleranceBand,
    pub steady_state: ToleranceBand,
}

/// Landmarks, bands and verdicts of one step.
///
/// Created fresh by every evaluation and never mutated afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct StepEvaluation {
    /// Pre-step sample time.
    pub t_init: f64,
    /// Time the perturbation call returned.
    pub t_perturb: f64,
    /// Sample nearest `t_init + olrt`.
    pub t_olrt: f64,
    /// Start of the steady-state window (equal to `t_olrt`).
    pub t_ss0: f64,
    /// End of the steady-state window (last sample).
    pub t_ss1: f64,
    /// Output before the step.
    pub y_init: f64,
    /// Output at `t_olrt`.
    pub y_olrt: f64,
    /// Mean output over the steady-state window.
    pub y_ss: f64,
    /// Mean input over the steady-state window.
    pub x_ss: f64,
    /// Predicted output at one olrt.
    pub y_olrt_target: f64,
    /// Target output at `x_ss`.
    pub y_ss_target: f64,
    pub olrt_band: ToleranceBand,
    pub ss_band: ToleranceBand,
    pub olrt_valid: bool,
    pub ss_valid: bool,
    pub sidedness: Sidedness,
    /// Samples the verdict was computed from.
    pub trace: MeasurementTrace,
}

impl StepEvaluation {
    /// Both checks held.
    pub fn passed(&self) -> bool {
        self.olrt_valid && self.ss_valid
    }

    pub fn criteria(&self) -> CriteriaBands {
        CriteriaBands {
            olrt: self.olrt_band,
            steady_state: self.ss_band,
        }
    }

    /// Signed distance of `y_ss` inside its band; negative when outside.
    pub fn ss_margin(&self) -> f64 {
        self.ss_band.margin(self.y_ss, self.sidedness)
    }
}

impl fmt::Display for StepEvaluation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "olrt: y={:.4} in {} -> {} | ss: x={:.4} y={:.4} (target {:.4}) in {} -> {}",
            self.y_olrt,
            self.olrt_band,
            self.olrt_valid,
            self.x_ss,
            self.y_ss,
            self.y_ss_target,
            self.ss_band,
            self.ss_valid,
        )
    }
}

/// Samples a step response and judges it.
#[derive(Debug, Clone, Copy)]
pub struct StepResponseEvaluator {
    accuracy: AccuracyModel,
}

impl StepResponseEvaluator {
    pub fn new(accuracy: AccuracyModel) -> Self {
        Self { accuracy }
    }

    pub fn accuracy(&self) -> &AccuracyModel {
        &self.accuracy
    }

    /// Samples once, runs `perturb`, keeps sampling until `spec.trace_window`
    /// has passed since the first sample, then evaluates the trace.
    ///
    /// The sampling cadence is the timing accuracy at the olrt.
    ///
    /// # Errors
    ///
    /// * `ToleranceComputation` for a non-positive olrt or window
    /// * `InsufficientData` if the perturbation left no room for a sample
    ///   after the step
    /// * `TimeRegression` if the environment's clock is not strictly increasing
    /// * `MissingChannel` if a sample lacks a required channel
    /// * anything `perturb` or the environment returns
    pub fn evaluate_step<E, P, T>(
        &self,
        env: &mut E,
        perturb: P,
        target: &T,
        spec: &StepSpec,
    ) -> Result<StepEvaluation>
    where
        E: Environment + ?Sized,
        P: FnOnce(&mut E) -> Result<()>,
        T: TargetFunction + ?Sized,
    {
        spec.check()?;
        let channels = spec.channels();

        let initial = env.sample(&channels)?;
        perturb(env)?;
        let t_perturb = env.time_now();

        let cadence = self.accuracy.time_accuracy(spec.olrt);
        let remaining = spec.trace_window - (t_perturb - initial.time);
        let window = env.collect_samples(remaining, cadence, &channels)?;

        let mut samples = Vec::with_capacity(window.len() + 1);
        samples.push(initial);
        samples.extend(window);
        // indices in faults refer to the combined trace
        let trace = MeasurementTrace::new(samples)?;

        self.evaluate_trace(trace, t_perturb, target, spec)
    }

    /// Judges an already captured trace whose first sample precedes the step.
    ///
    /// # Errors
    ///
    /// `ToleranceComputation` for bad accuracies or olrt, `MissingChannel`
    /// if a sample lacks a required channel.
    pub fn evaluate_trace<T>(
        &self,
        trace: MeasurementTrace,
        t_perturb: f64,
        target: &T,
        spec: &StepSpec,
    ) -> Result<StepEvaluation>
    where
        T: TargetFunction + ?Sized,
    {
        spec.check()?;
        let t_init = trace.start_time();
        let olrt_index = trace.nearest_index(t_init + spec.olrt);
        let last = trace.len() - 1;
        let steady = olrt_index..=last;

        let y_init = trace.value(0, spec.output)?;
        let y_olrt = trace.value(olrt_index, spec.output)?;
        let y_ss = trace.mean(spec.output, steady.clone())?;
        let x_ss = match spec.input {
            InputSource::Measured(channel) => trace.mean(channel, steady)?,
            InputSource::Commanded(x) => x,
        };

        let predictor = ExponentialApproach {
            y_init,
            y_ss,
            olrt: spec.olrt,
        };
        let tacc = self.accuracy.time_accuracy(spec.olrt);
        let olrt_band = tolerance_band(&predictor, spec.olrt, tacc, spec.yacc)?;
        let ss_band = tolerance_band(target, x_ss, spec.xacc, spec.yacc)?;

        let olrt_valid = olrt_band.accepts(y_olrt, spec.sidedness);
        let ss_valid = ss_band.accepts(y_ss, spec.sidedness);
        let t_olrt = trace.samples()[olrt_index].time;

        debug!(
            t_olrt,
            y_olrt,
            %olrt_band,
            olrt_valid,
            x_ss,
            y_ss,
            %ss_band,
            ss_valid,
            samples = trace.len(),
            "step evaluated"
        );

        Ok(StepEvaluation {
            t_init,
            t_perturb,
            t_olrt,
            t_ss0: t_olrt,
            t_ss1: trace.end_time(),
            y_init,
            y_olrt,
            y_ss,
            x_ss,
            y_olrt_target: predictor.y_of_x(spec.olrt),
            y_ss_target: target.y_of_x(x_ss),
            olrt_band,
            ss_band,
            olrt_valid,
            ss_valid,
            sidedness: spec.sidedness,
            trace,
        })
    }
}
