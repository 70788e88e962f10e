//! Test-bench collaborators: the grid/EUT environment the engine drives.

/// Virtual time source for simulated benches.
pub mod clock;
pub mod simulated;

pub use clock::VirtualClock;
pub use simulated::SimEnvironment;

use crate::conformance::trace::{Channel, MeasurementTrace, Sample};
use crate::error::{ConformanceError, Result};
use crate::eut::DeviceUnderTest;

/// One commanded input condition.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Setpoint {
    /// Grid voltage at the point of connection (V).
    Voltage(f64),
    /// Grid frequency (Hz).
    Frequency(f64),
    /// Active power the primary source can deliver (W).
    ActivePowerAvailable(f64),
    /// Active power limit commanded to the EUT (W).
    ActivePowerLimit(f64),
}

/// Ordered set of setpoints applied together.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Stimulus {
    setpoints: Vec<Setpoint>,
}

impl Stimulus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(setpoint: Setpoint) -> Self {
        Self {
            setpoints: vec![setpoint],
        }
    }

    /// Returns the stimulus with `setpoint` appended.
    pub fn with(mut self, setpoint: Setpoint) -> Self {
        self.setpoints.push(setpoint);
        self
    }

    pub fn setpoints(&self) -> &[Setpoint] {
        &self.setpoints
    }
}

/// Grid simulator plus measurement front-end.
///
/// Execution is synchronous: `sleep` is the only suspension point, and a
/// stimulus is fully applied (including any settling delay the device
/// needs) before `apply_stimulus` returns.
pub trait Environment {
    /// Waits `duration` seconds.
    fn sleep(&mut self, duration: f64);

    /// Current timestamp in seconds.
    fn time_now(&self) -> f64;

    /// Reads `channels` once.
    ///
    /// # Errors
    ///
    /// Adapters report acquisition faults as `Environment`.
    fn sample(&mut self, channels: &[Channel]) -> Result<Sample>;

    /// Samples every `cadence` seconds until `duration` has elapsed.
    ///
    /// # Errors
    ///
    /// Returns `ToleranceComputation` for a non-positive cadence and any
    /// trace construction error (fewer than two samples, time regression).
    fn sample_window(
        &mut self,
        duration: f64,
        cadence: f64,
        channels: &[Channel],
    ) -> Result<MeasurementTrace> {
        MeasurementTrace::new(self.collect_samples(duration, cadence, channels)?)
    }

    /// Raw samples taken every `cadence` seconds until `duration` has
    /// elapsed, unchecked. May be empty when `duration` is not positive.
    ///
    /// # Errors
    ///
    /// Returns `ToleranceComputation` for a non-positive cadence and any
    /// acquisition fault from `sample`.
    fn collect_samples(
        &mut self,
        duration: f64,
        cadence: f64,
        channels: &[Channel],
    ) -> Result<Vec<Sample>> {
        if !cadence.is_finite() || cadence <= 0.0 {
            return Err(ConformanceError::ToleranceComputation {
                quantity: "sampling cadence",
                value: cadence,
            });
        }
        let start = self.time_now();
        let mut samples = Vec::new();
        while self.time_now() - start < duration {
            self.sleep(cadence);
            samples.push(self.sample(channels)?);
        }
        Ok(samples)
    }

    /// Drives the inputs of the EUT; may block for a device settling delay.
    ///
    /// # Errors
    ///
    /// Adapters report rejected setpoints as `Environment`.
    fn apply_stimulus(&mut self, stimulus: &Stimulus) -> Result<()>;
}

/// An environment with a configurable device attached.
pub trait TestBench: Environment {
    type Eut: DeviceUnderTest;

    fn eut(&mut self) -> &mut Self::Eut;
}
