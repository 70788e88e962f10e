//! Grid-support control modes and what each one reads and drives.

use std::fmt;

use serde::Deserialize;

use crate::conformance::accuracy::AccuracyModel;
use crate::conformance::trace::Channel;
use crate::env::Setpoint;

use super::Nameplate;

/// Control function under test.
///
/// Each mode is a curve from one input quantity to one output quantity;
/// the evaluator stays the same and only the channels, bases and
/// stimulus differ.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlMode {
    /// Voltage to reactive power.
    VoltVar,
    /// Voltage to active power.
    VoltWatt,
    /// Active power to reactive power.
    WattVar,
    /// Frequency to active power.
    FreqWatt,
    /// Commanded limit to active power.
    ActivePowerLimit,
}

impl ControlMode {
    /// Measured channel carrying the curve input; `None` when the input is
    /// a commanded value rather than a measurement.
    pub fn input_channel(self) -> Option<Channel> {
        match self {
            ControlMode::VoltVar | ControlMode::VoltWatt => Some(Channel::Voltage),
            ControlMode::WattVar => Some(Channel::ActivePower),
            ControlMode::FreqWatt => Some(Channel::Frequency),
            ControlMode::ActivePowerLimit => None,
        }
    }

    /// Channel carrying the controlled response.
    pub fn output_channel(self) -> Channel {
        match self {
            ControlMode::VoltVar | ControlMode::WattVar => Channel::ReactivePower,
            ControlMode::VoltWatt | ControlMode::FreqWatt | ControlMode::ActivePowerLimit => {
                Channel::ActivePower
            }
        }
    }

    /// Channels a step evaluation needs in every sample.
    pub fn channels(self) -> Vec<Channel> {
        let mut channels = Vec::with_capacity(2);
        if let Some(input) = self.input_channel() {
            channels.push(input);
        }
        channels.push(self.output_channel());
        channels
    }

    /// Physical value of 1.0 pu on the curve input axis.
    pub fn x_base(self, nameplate: &Nameplate) -> f64 {
        match self {
            ControlMode::VoltVar | ControlMode::VoltWatt => nameplate.v_nom,
            ControlMode::FreqWatt => nameplate.f_nom,
            ControlMode::WattVar | ControlMode::ActivePowerLimit => nameplate.p_rated,
        }
    }

    /// Physical value of 1.0 pu on the curve output axis.
    pub fn y_base(self, nameplate: &Nameplate) -> f64 {
        match self.output_channel() {
            Channel::ReactivePower => nameplate.s_rated,
            _ => nameplate.p_rated,
        }
    }

    /// Input range the EUT accepts, from the nameplate.
    pub fn x_domain(self, nameplate: &Nameplate) -> (f64, f64) {
        match self {
            ControlMode::VoltVar | ControlMode::VoltWatt => (nameplate.v_min, nameplate.v_max),
            ControlMode::FreqWatt => (nameplate.f_min, nameplate.f_max),
            ControlMode::WattVar | ControlMode::ActivePowerLimit => (0.0, nameplate.p_rated),
        }
    }

    /// Setpoint that drives the curve input to `x`.
    pub fn setpoint(self, x: f64) -> Setpoint {
        match self {
            ControlMode::VoltVar | ControlMode::VoltWatt => Setpoint::Voltage(x),
            ControlMode::FreqWatt => Setpoint::Frequency(x),
            ControlMode::WattVar => Setpoint::ActivePowerAvailable(x),
            ControlMode::ActivePowerLimit => Setpoint::ActivePowerLimit(x),
        }
    }

    /// Accuracy of the curve input; zero for a commanded input.
    pub fn x_accuracy(self, accuracy: &AccuracyModel) -> f64 {
        self.input_channel()
            .map_or(0.0, |channel| accuracy.for_channel(channel))
    }

    pub fn y_accuracy(self, accuracy: &AccuracyModel) -> f64 {
        accuracy.for_channel(self.output_channel())
    }

    pub fn name(self) -> &'static str {
        match self {
            ControlMode::VoltVar => "volt-var",
            ControlMode::VoltWatt => "volt-watt",
            ControlMode::WattVar => "watt-var",
            ControlMode::FreqWatt => "freq-watt",
            ControlMode::ActivePowerLimit => "active-power-limit",
        }
    }
}

impl fmt::Display for ControlMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
