//! Shared test fixtures for integration tests.

#![allow(dead_code)]

use der_conformance::conformance::{
    AccuracyModel, Channel, InputSource, MeasurementTrace, PiecewiseCurve, Sample, StepSpec,
};
use der_conformance::env::SimEnvironment;
use der_conformance::eut::{Category, ControlMode, Nameplate, SimulatedEut};

/// Category B volt-var curve in per-unit.
pub fn volt_var_curve() -> PiecewiseCurve {
    PiecewiseCurve::new(&[0.92, 0.98, 1.02, 1.08], &[0.44, 0.0, 0.0, -0.44])
        .expect("volt-var curve is well formed")
}

/// Per-unit nameplate (1.0 V, 1.0 W, 1.0 VA; 0.88-1.10 pu voltage range).
pub fn pu_nameplate() -> Nameplate {
    Nameplate {
        p_rated: 1.0,
        s_rated: 1.0,
        v_nom: 1.0,
        v_min: 0.88,
        v_max: 1.10,
        f_nom: 60.0,
        f_min: 56.5,
        f_max: 66.0,
        category: Category::B,
    }
}

/// Accuracy for the per-unit nameplate: 0.01 pu voltage, 0.05 pu power.
pub fn pu_accuracy() -> AccuracyModel {
    AccuracyModel::from_nameplate(&pu_nameplate(), 0.01).expect("positive ratings")
}

/// Volt-var step spec with a 5 s olrt and a 20 s window.
pub fn volt_var_spec() -> StepSpec {
    StepSpec::new(
        5.0,
        InputSource::Measured(Channel::Voltage),
        Channel::ReactivePower,
        0.01,
        0.05,
    )
}

/// Simulated volt-var bench with no settling delay.
pub fn volt_var_bench(response_time: f64, gain: f64, noise_std: f64, seed: u64) -> SimEnvironment {
    let eut = SimulatedEut::new(
        pu_nameplate(),
        ControlMode::VoltVar,
        volt_var_curve(),
        response_time,
        seed,
    )
    .with_calibration(gain, 0.0)
    .with_noise(noise_std);
    SimEnvironment::new(eut, 0.0)
}

/// Trace of a voltage step from 1.0 to `v` at t=0 with the output given by `q(t)`.
///
/// Samples every `dt` seconds up to and including `end`.
pub fn step_trace(v: f64, dt: f64, end: f64, q: impl Fn(f64) -> f64) -> MeasurementTrace {
    let n = (end / dt).round() as usize;
    let samples = (0..=n)
        .map(|i| {
            let t = i as f64 * dt;
            Sample::new(t)
                .with(Channel::Voltage, if i == 0 { 1.0 } else { v })
                .with(Channel::ReactivePower, q(t))
        })
        .collect();
    MeasurementTrace::new(samples).expect("strictly increasing sample times")
}
