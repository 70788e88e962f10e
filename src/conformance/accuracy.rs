//! Minimum required measurement accuracy per physical quantity.

use crate::conformance::trace::Channel;
use crate::error::{ConformanceError, Result};
use crate::eut::Nameplate;

/// Voltage accuracy as a fraction of nominal voltage.
pub const VOLTAGE_MRA_FRACTION: f64 = 0.01;
/// Active and reactive power accuracy as a fraction of rated apparent power.
pub const POWER_MRA_FRACTION: f64 = 0.05;
/// Default absolute frequency accuracy (Hz).
pub const DEFAULT_FREQUENCY_MRA_HZ: f64 = 0.01;

/// Timing accuracy as a fraction of the measured duration.
const TIME_MRA_FRACTION: f64 = 0.01;
/// Durations below this are scored as if they were this long (s).
const TIME_FLOOR_S: f64 = 5.0;
/// Durations above this are scored as if they were this long (s).
const TIME_CEILING_S: f64 = 600.0;

/// Per-quantity accuracy constants for one EUT.
///
/// Built once from nameplate values and never changed afterwards.
///
/// # Examples
///
/// ```
/// use der_conformance::conformance::accuracy::AccuracyModel;
///
/// let acc = AccuracyModel::new(240.0, 5000.0, 0.01).unwrap();
/// assert!((acc.voltage() - 2.4).abs() < 1e-12);
/// assert_eq!(acc.time_accuracy(2.0), acc.time_accuracy(5.0));
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AccuracyModel {
    voltage: f64,
    frequency: f64,
    active_power: f64,
    reactive_power: f64,
}

impl AccuracyModel {
    /// Derives the constants from nominal voltage and rated apparent power.
    ///
    /// # Errors
    ///
    /// Returns `ToleranceComputation` if any input is not a positive finite number.
    pub fn new(v_nom: f64, s_rated: f64, frequency_accuracy: f64) -> Result<Self> {
        let v_nom = positive("nominal voltage", v_nom)?;
        let s_rated = positive("rated apparent power", s_rated)?;
        let frequency = positive("frequency accuracy", frequency_accuracy)?;
        let power = POWER_MRA_FRACTION * s_rated;

        Ok(Self {
            voltage: VOLTAGE_MRA_FRACTION * v_nom,
            frequency,
            active_power: power,
            reactive_power: power,
        })
    }

    /// Builds the model from an EUT nameplate.
    ///
    /// # Errors
    ///
    /// Same as [`AccuracyModel::new`].
    pub fn from_nameplate(nameplate: &Nameplate, frequency_accuracy: f64) -> Result<Self> {
        Self::new(nameplate.v_nom, nameplate.s_rated, frequency_accuracy)
    }

    pub fn voltage(&self) -> f64 {
        self.voltage
    }

    pub fn frequency(&self) -> f64 {
        self.frequency
    }

    pub fn active_power(&self) -> f64 {
        self.active_power
    }

    pub fn reactive_power(&self) -> f64 {
        self.reactive_power
    }

    /// Accuracy of whatever quantity `channel` measures.
    pub fn for_channel(&self, channel: Channel) -> f64 {
        match channel {
            Channel::Voltage => self.voltage,
            Channel::Frequency => self.frequency,
            Channel::ActivePower => self.active_power,
            Channel::ReactivePower => self.reactive_power,
        }
    }

    /// Timing accuracy for a measured duration: `0.01 * clamp(duration, 5, 600)`.
    ///
    /// Non-decreasing on `[5, 600]` s and flat outside it.
    pub fn time_accuracy(&self, duration: f64) -> f64 {
        TIME_MRA_FRACTION * duration.clamp(TIME_FLOOR_S, TIME_CEILING_S)
    }
}

fn positive(quantity: &'static str, value: f64) -> Result<f64> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(ConformanceError::ToleranceComputation { quantity, value })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model() -> AccuracyModel {
        AccuracyModel::new(240.0, 5000.0, DEFAULT_FREQUENCY_MRA_HZ).unwrap()
    }

    #[test]
    fn constants_scale_with_nameplate() {
        let acc = model();
        assert!((acc.voltage() - 2.4).abs() < 1e-12);
        assert!((acc.active_power() - 250.0).abs() < 1e-9);
        assert!((acc.reactive_power() - 250.0).abs() < 1e-9);
        assert_eq!(acc.frequency(), 0.01);
        assert_eq!(acc.for_channel(Channel::Voltage), acc.voltage());
    }

    #[test]
    fn time_accuracy_is_flat_outside_limits() {
        let acc = model();
        assert_eq!(acc.time_accuracy(2.0), acc.time_accuracy(5.0));
        assert_eq!(acc.time_accuracy(700.0), acc.time_accuracy(600.0));
        assert!((acc.time_accuracy(10.0) - 0.1).abs() < 1e-12);
    }

    #[test]
    fn time_accuracy_is_non_decreasing() {
        let acc = model();
        let mut prev = acc.time_accuracy(0.0);
        for i in 0..=700 {
            let next = acc.time_accuracy(i as f64);
            assert!(next >= prev);
            prev = next;
        }
    }

    #[test]
    fn rejects_non_positive_constants() {
        assert!(AccuracyModel::new(0.0, 5000.0, 0.01).is_err());
        assert!(AccuracyModel::new(240.0, -1.0, 0.01).is_err());
        let err = AccuracyModel::new(240.0, 5000.0, 0.0).unwrap_err();
        assert!(matches!(
            err,
            ConformanceError::ToleranceComputation {
                quantity: "frequency accuracy",
                ..
            }
        ));
    }
}
