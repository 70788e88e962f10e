//! End-to-end step evaluation against the simulated bench.

mod common;

use der_conformance::conformance::{
    Channel, ConformanceRecorder, CurveStepSequencer, MeasurementTrace, Sample, Sidedness,
    StepResponseEvaluator, TargetFunction,
};
use der_conformance::env::{Environment, SimEnvironment, Setpoint, Stimulus};
use der_conformance::error::{ConformanceError, Result};

#[test]
fn exponential_settling_to_minus_point_three_passes() {
    let curve = common::volt_var_curve();
    // gain puts the settled output at -0.30 for a step to 1.05
    let mut env = common::volt_var_bench(5.0, 0.30 / 0.22, 0.0, 1);
    let evaluator = StepResponseEvaluator::new(common::pu_accuracy());
    let spec = common::volt_var_spec();

    let eval = evaluator
        .evaluate_step(
            &mut env,
            |env| env.apply_stimulus(&Stimulus::single(Setpoint::Voltage(1.05))),
            &curve,
            &spec,
        )
        .expect("evaluation should succeed");

    assert_eq!(eval.y_init, 0.0);
    assert!((eval.y_ss - -0.30).abs() < 0.01, "y_ss = {}", eval.y_ss);
    assert!((eval.x_ss - 1.05).abs() < 1e-12);
    assert!(eval.ss_valid);
    assert!(eval.olrt_valid);
    assert!(eval.ss_band.accepts(eval.y_ss_target, Sidedness::Both));
    assert!(eval.ss_band.accepts(-0.30, Sidedness::Both));
    assert!(eval.t_perturb <= eval.t_olrt && eval.t_olrt <= eval.t_ss1);
}

#[test]
fn noisy_ideal_device_passes_at_every_seed() {
    let curve = common::volt_var_curve();
    let evaluator = StepResponseEvaluator::new(common::pu_accuracy());
    let spec = common::volt_var_spec();
    for seed in 0..5 {
        let mut env = common::volt_var_bench(5.0, 1.0, 0.005, seed);
        let eval = evaluator
            .evaluate_step(
                &mut env,
                |env| env.apply_stimulus(&Stimulus::single(Setpoint::Voltage(1.07))),
                &curve,
                &spec,
            )
            .expect("evaluation should succeed");
        assert!(eval.passed(), "seed {seed}: {eval}");
    }
}

#[test]
fn out_of_range_step_is_judged_against_clamped_curve() {
    let curve = common::volt_var_curve();
    assert_eq!(curve.y_of_x(1.2), -0.44);
    let evaluator = StepResponseEvaluator::new(common::pu_accuracy());
    let trace = common::step_trace(1.2, 0.05, 20.0, |t| if t > 0.0 { -0.44 } else { 0.0 });
    let eval = evaluator
        .evaluate_trace(trace, 0.0, &curve, &common::volt_var_spec())
        .expect("evaluation should succeed");
    assert!(eval.ss_valid);
    assert!((eval.y_ss_target - -0.44).abs() < 1e-12);
}

#[test]
fn regressing_clock_is_fatal() {
    let samples = vec![
        Sample::new(0.0).with(Channel::Voltage, 1.0),
        Sample::new(1.0).with(Channel::Voltage, 1.0),
        Sample::new(0.5).with(Channel::Voltage, 1.0),
    ];
    let err = MeasurementTrace::new(samples).unwrap_err();
    assert!(matches!(err, ConformanceError::TimeRegression { index: 2, .. }));
    assert!(err.is_fatal());
}

#[test]
fn evaluations_are_independent() {
    let curve = common::volt_var_curve();
    let evaluator = StepResponseEvaluator::new(common::pu_accuracy());
    let spec = common::volt_var_spec();
    let good = common::step_trace(1.05, 0.05, 20.0, |t| {
        -0.22 * (1.0 - 0.1_f64.powf(t / 5.0))
    });

    let first = evaluator
        .evaluate_trace(good.clone(), 0.0, &curve, &spec)
        .unwrap();
    let bad = common::step_trace(1.05, 0.05, 20.0, |_| 0.0);
    let _ = evaluator.evaluate_trace(bad, 0.0, &curve, &spec).unwrap();
    let again = evaluator.evaluate_trace(good, 0.0, &curve, &spec).unwrap();
    assert_eq!(first, again);
}

#[test]
fn sequencer_covers_breakpoints_and_recorder_keeps_order() {
    let curve = common::volt_var_curve();
    let breakpoints = [0.9, 0.98, 1.02, 1.08];
    let seq = CurveStepSequencer::new((0.88, 1.10), 0.01, 1.0).unwrap();
    let points = seq.candidates(&breakpoints);
    for x in breakpoints {
        for v in [x - 0.01, x + 0.01] {
            assert!(
                points.iter().any(|p| (p.value - v).abs() < 1e-9),
                "missing {v}"
            );
        }
    }

    let mut env = common::volt_var_bench(5.0, 1.0, 0.0, 3);
    let evaluator = StepResponseEvaluator::new(common::pu_accuracy());
    let mut recorder = ConformanceRecorder::new();
    for step in seq.traverse(&curve) {
        let eval = evaluator
            .evaluate_step(
                &mut env,
                |env| env.apply_stimulus(&Stimulus::single(Setpoint::Voltage(step.value))),
                &curve,
                &common::volt_var_spec(),
            )
            .unwrap();
        recorder.record_evaluation(step.label, eval);
    }
    assert!(recorder.passed());
    assert!(
        recorder
            .epochs()
            .windows(2)
            .all(|w| w[1].start >= w[0].end)
    );
}

#[test]
fn perturbation_leaving_one_cadence_still_evaluates() {
    let curve = common::volt_var_curve();
    let mut env = common::volt_var_bench(5.0, 1.0, 0.0, 1);
    let evaluator = StepResponseEvaluator::new(common::pu_accuracy());
    let spec = common::volt_var_spec();

    // the step eats all but 0.03 s of the 20 s window; cadence is 0.05 s
    let eval = evaluator
        .evaluate_step(
            &mut env,
            |env| {
                env.apply_stimulus(&Stimulus::single(Setpoint::Voltage(1.05)))?;
                env.sleep(19.97);
                Ok(())
            },
            &curve,
            &spec,
        )
        .expect("pre-step sample plus one window sample is enough");
    assert_eq!(eval.trace.len(), 2);
    assert!(eval.t_ss1 > eval.t_perturb);
}

/// Simulated bench whose `rewind_at`-th sample is stamped 10 s early.
struct RewindingEnv {
    inner: SimEnvironment,
    taken: usize,
    rewind_at: usize,
}

impl Environment for RewindingEnv {
    fn sleep(&mut self, duration: f64) {
        self.inner.sleep(duration);
    }

    fn time_now(&self) -> f64 {
        self.inner.time_now()
    }

    fn sample(&mut self, channels: &[Channel]) -> Result<Sample> {
        let mut sample = self.inner.sample(channels)?;
        self.taken += 1;
        if self.taken == self.rewind_at {
            sample.time -= 10.0;
        }
        Ok(sample)
    }

    fn apply_stimulus(&mut self, stimulus: &Stimulus) -> Result<()> {
        self.inner.apply_stimulus(stimulus)
    }
}

#[test]
fn rewinding_environment_fails_the_step_with_time_regression() {
    let curve = common::volt_var_curve();
    let mut env = RewindingEnv {
        inner: common::volt_var_bench(5.0, 1.0, 0.0, 1),
        taken: 0,
        rewind_at: 5,
    };
    let evaluator = StepResponseEvaluator::new(common::pu_accuracy());
    let err = evaluator
        .evaluate_step(
            &mut env,
            |env| env.apply_stimulus(&Stimulus::single(Setpoint::Voltage(1.05))),
            &curve,
            &common::volt_var_spec(),
        )
        .unwrap_err();
    // the fifth sample taken sits at index 4 of the combined trace
    assert!(
        matches!(err, ConformanceError::TimeRegression { index: 4, current, previous } if current < previous),
        "{err:?}"
    );
    assert!(err.is_fatal());
}
