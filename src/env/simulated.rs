//! Deterministic grid simulator on virtual time.

use crate::conformance::trace::{Channel, Sample};
use crate::error::{ConformanceError, Result};
use crate::eut::SimulatedEut;

use super::clock::VirtualClock;
use super::{Environment, Setpoint, Stimulus, TestBench};

/// Grid simulator wired to a [`SimulatedEut`].
///
/// `sleep` advances a [`VirtualClock`], so runs are instantaneous and
/// reproducible for a fixed EUT seed.
#[derive(Debug, Clone)]
pub struct SimEnvironment {
    clock: VirtualClock,
    eut: SimulatedEut,
    settling_delay: f64,
}

impl SimEnvironment {
    /// Creates a bench at `t = 0`.
    ///
    /// # Arguments
    ///
    /// * `eut` - Device attached to the simulated grid
    /// * `settling_delay` - Time each `apply_stimulus` call blocks for (s)
    pub fn new(eut: SimulatedEut, settling_delay: f64) -> Self {
        Self {
            clock: VirtualClock::default(),
            eut,
            settling_delay: settling_delay.max(0.0),
        }
    }
}

impl Environment for SimEnvironment {
    fn sleep(&mut self, duration: f64) {
        self.clock.advance(duration);
    }

    fn time_now(&self) -> f64 {
        self.clock.now()
    }

    fn sample(&mut self, channels: &[Channel]) -> Result<Sample> {
        Ok(self.eut.measure(self.clock.now(), channels))
    }

    fn apply_stimulus(&mut self, stimulus: &Stimulus) -> Result<()> {
        for &setpoint in stimulus.setpoints() {
            let value = match setpoint {
                Setpoint::Voltage(v)
                | Setpoint::Frequency(v)
                | Setpoint::ActivePowerAvailable(v)
                | Setpoint::ActivePowerLimit(v) => v,
            };
            if !value.is_finite() || value < 0.0 {
                return Err(ConformanceError::Environment(format!(
                    "grid simulator rejected setpoint {setpoint:?}"
                )));
            }
            self.eut.apply(setpoint, self.clock.now());
        }
        self.clock.advance(self.settling_delay);
        Ok(())
    }
}

impl TestBench for SimEnvironment {
    type Eut = SimulatedEut;

    fn eut(&mut self) -> &mut SimulatedEut {
        &mut self.eut
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conformance::curve::PiecewiseCurve;
    use crate::eut::{Category, ControlMode, Nameplate};

    fn bench(settling_delay: f64) -> SimEnvironment {
        let nameplate = Nameplate {
            p_rated: 1.0,
            s_rated: 1.0,
            v_nom: 1.0,
            v_min: 0.88,
            v_max: 1.10,
            f_nom: 60.0,
            f_min: 56.5,
            f_max: 66.0,
            category: Category::B,
        };
        let curve =
            PiecewiseCurve::new(&[0.92, 0.98, 1.02, 1.08], &[0.44, 0.0, 0.0, -0.44]).unwrap();
        let eut = SimulatedEut::new(nameplate, ControlMode::VoltVar, curve, 5.0, 3);
        SimEnvironment::new(eut, settling_delay)
    }

    #[test]
    fn stimulus_blocks_for_settling_delay() {
        let mut env = bench(0.25);
        env.apply_stimulus(&Stimulus::single(Setpoint::Voltage(1.05)))
            .unwrap();
        assert_eq!(env.time_now(), 0.25);
    }

    #[test]
    fn sample_window_is_strictly_ordered() {
        let mut env = bench(0.0);
        let trace = env
            .sample_window(1.0, 0.1, &[Channel::Voltage, Channel::ReactivePower])
            .unwrap();
        assert!(trace.len() >= 10);
        assert!(trace.samples().windows(2).all(|w| w[1].time > w[0].time));
    }

    #[test]
    fn sample_window_rejects_zero_cadence() {
        let mut env = bench(0.0);
        assert!(env.sample_window(1.0, 0.0, &[Channel::Voltage]).is_err());
    }

    #[test]
    fn rejects_negative_setpoint() {
        let mut env = bench(0.0);
        let err = env
            .apply_stimulus(&Stimulus::single(Setpoint::Voltage(-1.0)))
            .unwrap_err();
        assert!(matches!(err, ConformanceError::Environment(_)));
    }
}
