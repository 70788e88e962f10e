//! Curve step procedure: configure, settle on the reference, step, record.

use tracing::{debug, info, warn};

use crate::conformance::accuracy::AccuracyModel;
use crate::conformance::curve::{PiecewiseCurve, Shifted, TargetFn, TargetFunction};
use crate::conformance::evaluator::{DEFAULT_WINDOW_MULTIPLE, StepResponseEvaluator, StepSpec};
use crate::conformance::recorder::ConformanceRecorder;
use crate::conformance::sequencer::StepPoint;
use crate::conformance::settling::await_settling;
use crate::conformance::tolerance::{Sidedness, tolerance_band};
use crate::conformance::trace::Channel;
use crate::env::{Environment, Setpoint, Stimulus, TestBench};
use crate::error::Result;
use crate::eut::{ControlMode, DeviceUnderTest};

use super::types::{OnFault, RunContext, StimulusPlan};

/// Steps one control function through its curve and records every verdict.
///
/// The procedure holds only what is fixed for a test (mode, curve, timing,
/// plan). Per-run values such as the power level come in through a
/// [`RunContext`], so one procedure can be run repeatedly.
#[derive(Debug, Clone)]
pub struct CurveProcedure {
    mode: ControlMode,
    curve: PiecewiseCurve,
    olrt: f64,
    window_multiple: f64,
    reference: f64,
    vref_shift: f64,
    sidedness: Sidedness,
    plan: StimulusPlan,
    settle_early_exit: Option<usize>,
    evaluator: StepResponseEvaluator,
}

impl CurveProcedure {
    /// Creates a procedure.
    ///
    /// # Arguments
    ///
    /// * `mode` - Control function under test
    /// * `curve` - Characteristic in physical units
    /// * `olrt` - Open-loop response time (s)
    /// * `reference` - Curve input the EUT rests at before stepping
    /// * `plan` - Inputs to step through
    /// * `accuracy` - Measurement accuracies for the bench
    pub fn new(
        mode: ControlMode,
        curve: PiecewiseCurve,
        olrt: f64,
        reference: f64,
        plan: StimulusPlan,
        accuracy: AccuracyModel,
    ) -> Self {
        Self {
            mode,
            curve,
            olrt,
            window_multiple: DEFAULT_WINDOW_MULTIPLE,
            reference,
            vref_shift: 0.0,
            sidedness: Sidedness::Both,
            plan,
            settle_early_exit: None,
            evaluator: StepResponseEvaluator::new(accuracy),
        }
    }

    /// Observation window per step, in multiples of the olrt.
    pub fn with_window_multiple(mut self, window_multiple: f64) -> Self {
        self.window_multiple = window_multiple;
        self
    }

    /// Moves the curve along its input axis, as an autonomously adjusted
    /// voltage reference would.
    pub fn with_vref_shift(mut self, shift: f64) -> Self {
        self.vref_shift = shift;
        self
    }

    pub fn with_sidedness(mut self, sidedness: Sidedness) -> Self {
        self.sidedness = sidedness;
        self
    }

    pub fn with_settle_early_exit(mut self, consecutive: Option<usize>) -> Self {
        self.settle_early_exit = consecutive;
        self
    }

    pub fn mode(&self) -> ControlMode {
        self.mode
    }

    pub fn plan(&self) -> &StimulusPlan {
        &self.plan
    }

    /// The curve as the EUT is configured with it, shift included.
    pub fn device_curve(&self) -> Result<PiecewiseCurve> {
        self.curve.shifted(self.vref_shift)
    }

    /// Inputs the plan steps through, in order.
    pub fn stimuli(&self) -> Result<Vec<StepPoint>> {
        match &self.plan {
            StimulusPlan::Traverse(sequencer) => Ok(sequencer.traverse(&self.device_curve()?)),
            StimulusPlan::Explicit(points) => Ok(points.clone()),
        }
    }

    /// Runs the procedure once.
    ///
    /// A failed verdict is recorded, not returned. Faults are returned
    /// unless `ctx.on_fault` says to record them, and a time regression
    /// always stops the run.
    ///
    /// # Errors
    ///
    /// Configuration faults from the EUT, environment faults while
    /// settling, and step faults under [`OnFault::Abort`].
    pub fn run<B>(
        &self,
        bench: &mut B,
        ctx: &RunContext,
        recorder: &mut ConformanceRecorder,
    ) -> Result<()>
    where
        B: TestBench + ?Sized,
    {
        let p_rated = bench.eut().nameplate().p_rated;
        let p_available = ctx.power_level * p_rated;
        let steps = self.stimuli()?;
        {
            let eut = bench.eut();
            eut.set_control_mode(self.mode, self.device_curve()?)?;
            eut.set_response_time(self.olrt)?;
            eut.set_active_power_limit(p_rated)?;
        }

        let shifted = Shifted {
            inner: &self.curve,
            shift: self.vref_shift,
        };
        let caps_power = self.mode.output_channel() == Channel::ActivePower;
        let target = TargetFn(|x: f64| {
            let y = shifted.y_of_x(x);
            if caps_power { y.min(p_available) } else { y }
        });

        let accuracy = self.evaluator.accuracy();
        let window = self.window_multiple * self.olrt;
        let cadence = accuracy.time_accuracy(self.olrt);

        info!(mode = %self.mode, run = %ctx, steps = steps.len(), "starting procedure");
        bench.apply_stimulus(
            &Stimulus::single(Setpoint::ActivePowerAvailable(p_available))
                .with(self.mode.setpoint(self.reference)),
        )?;
        let rest = StepSpec::for_mode(self.mode, accuracy, self.olrt, self.reference);
        let band = tolerance_band(&target, self.reference, rest.xacc, rest.yacc)?;
        let settling = await_settling(
            bench,
            self.mode.output_channel(),
            &band,
            window,
            cadence,
            self.settle_early_exit,
        )?;
        if settling.settled {
            debug!(elapsed = settling.elapsed, %band, "settled on reference");
        } else {
            warn!(
                last = ?settling.last_value,
                %band,
                "output did not settle on the reference"
            );
        }

        for step in &steps {
            let label = format!("{} {ctx} {}", self.mode, step.label);
            let spec = StepSpec::for_mode(self.mode, accuracy, self.olrt, step.value)
                .with_trace_window(window)
                .with_sidedness(self.sidedness);
            let stimulus = Stimulus::single(self.mode.setpoint(step.value));
            let start = bench.time_now();

            let outcome = self.evaluator.evaluate_step(
                bench,
                |env| env.apply_stimulus(&stimulus),
                &target,
                &spec,
            );
            match outcome {
                Ok(eval) => {
                    recorder.record_evaluation(label, eval);
                }
                Err(err) if err.is_fatal() || ctx.on_fault == OnFault::Abort => return Err(err),
                Err(err) => {
                    warn!(%label, error = %err, "step fault recorded as a failure");
                    recorder.record_epoch(None, None, start, bench.time_now(), label, false);
                }
            }
        }
        Ok(())
    }
}
