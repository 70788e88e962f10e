use rand::{SeedableRng, rngs::StdRng};

use crate::conformance::curve::{PiecewiseCurve, TargetFunction};
use crate::conformance::trace::{Channel, Sample};
use crate::env::Setpoint;
use crate::error::{ConformanceError, Result};

use super::types::{DeviceUnderTest, gaussian_noise};
use super::{ControlMode, Nameplate};

/// Fraction of a step still outstanding after one response time.
const RESIDUAL_AT_RESPONSE_TIME: f64 = 0.1;

/// Conditions at the EUT terminals, set by the grid simulator.
#[derive(Debug, Clone, Copy)]
struct Terminal {
    voltage: f64,
    frequency: f64,
    p_available: f64,
    p_limit: f64,
}

/// Exponential approach from `from` (at `since`) toward `to`.
#[derive(Debug, Clone, Copy)]
struct Response {
    since: f64,
    from: f64,
    to: f64,
}

/// A first-order stand-in for a grid-support inverter.
///
/// The output follows `gain * curve(x) + offset` and covers 90% of every
/// step in exactly `response_time` seconds. Active-power outputs never
/// exceed the available power or the commanded limit. Measurements of the
/// controlled output carry seeded Gaussian noise.
///
/// # Power Convention (Generator)
/// - Positive active power: export to the grid
/// - Positive reactive power: injection (capacitive)
#[derive(Debug, Clone)]
pub struct SimulatedEut {
    nameplate: Nameplate,
    mode: ControlMode,
    curve: PiecewiseCurve,
    response_time: f64,
    gain: f64,
    offset: f64,
    noise_std: f64,
    rng: StdRng,
    terminal: Terminal,
    response: Response,
}

impl SimulatedEut {
    /// Creates an EUT at rest at nominal conditions.
    ///
    /// # Arguments
    ///
    /// * `nameplate` - Rated values
    /// * `mode` - Enabled control function
    /// * `curve` - Characteristic in physical units
    /// * `response_time` - Time to cover 90% of a step (s, 0 = instantaneous)
    /// * `seed` - Seed for measurement noise
    pub fn new(
        nameplate: Nameplate,
        mode: ControlMode,
        curve: PiecewiseCurve,
        response_time: f64,
        seed: u64,
    ) -> Self {
        let terminal = Terminal {
            voltage: nameplate.v_nom,
            frequency: nameplate.f_nom,
            p_available: nameplate.p_rated,
            p_limit: nameplate.p_rated,
        };
        let mut eut = Self {
            nameplate,
            mode,
            curve,
            response_time: response_time.max(0.0),
            gain: 1.0,
            offset: 0.0,
            noise_std: 0.0,
            rng: StdRng::seed_from_u64(seed),
            terminal,
            response: Response {
                since: 0.0,
                from: 0.0,
                to: 0.0,
            },
        };
        eut.settle(0.0);
        eut
    }

    /// Adds a calibration error: the device settles at `gain * curve(x) + offset`.
    pub fn with_calibration(mut self, gain: f64, offset: f64) -> Self {
        self.gain = gain;
        self.offset = offset;
        let since = self.response.since;
        self.settle(since);
        self
    }

    /// Sets the standard deviation of the output measurement noise (physical units).
    pub fn with_noise(mut self, noise_std: f64) -> Self {
        self.noise_std = noise_std.max(0.0);
        self
    }

    pub fn mode(&self) -> ControlMode {
        self.mode
    }

    /// Applies a terminal condition at time `now`; the output starts moving from
    /// wherever it currently is.
    pub fn apply(&mut self, setpoint: Setpoint, now: f64) {
        let current = self.output_at(now);
        match setpoint {
            Setpoint::Voltage(v) => self.terminal.voltage = v,
            Setpoint::Frequency(f) => self.terminal.frequency = f,
            Setpoint::ActivePowerAvailable(p) => self.terminal.p_available = p,
            Setpoint::ActivePowerLimit(p) => self.terminal.p_limit = p,
        }
        self.response = Response {
            since: now,
            from: current,
            to: self.commanded(),
        };
    }

    /// Noise-free controlled output at time `t`.
    pub fn output_at(&self, t: f64) -> f64 {
        let Response { since, from, to } = self.response;
        if t <= since {
            return from;
        }
        if self.response_time <= 0.0 {
            return to;
        }
        let residual = RESIDUAL_AT_RESPONSE_TIME.powf((t - since) / self.response_time);
        to + (from - to) * residual
    }

    /// Reads `channels` at time `t`.
    pub fn measure(&mut self, t: f64, channels: &[Channel]) -> Sample {
        let output = self.mode.output_channel();
        let mut sample = Sample::new(t);
        for &channel in channels {
            let value = match channel {
                Channel::Voltage => self.terminal.voltage,
                Channel::Frequency => self.terminal.frequency,
                c if c == output => self.output_at(t) + gaussian_noise(&mut self.rng, self.noise_std),
                Channel::ActivePower => self.terminal.p_available.min(self.terminal.p_limit),
                Channel::ReactivePower => 0.0,
            };
            sample.set(channel, value);
        }
        sample
    }

    fn input(&self) -> f64 {
        match self.mode {
            ControlMode::VoltVar | ControlMode::VoltWatt => self.terminal.voltage,
            ControlMode::WattVar => self.terminal.p_available,
            ControlMode::FreqWatt => self.terminal.frequency,
            ControlMode::ActivePowerLimit => self.terminal.p_limit,
        }
    }

    fn commanded(&self) -> f64 {
        let y = self.gain * self.curve.y_of_x(self.input()) + self.offset;
        match self.mode.output_channel() {
            Channel::ActivePower => y.min(self.terminal.p_available.min(self.terminal.p_limit)),
            _ => y,
        }
    }

    /// Puts the output at rest on its commanded value.
    fn settle(&mut self, now: f64) {
        let to = self.commanded();
        self.response = Response {
            since: now,
            from: to,
            to,
        };
    }
}

impl DeviceUnderTest for SimulatedEut {
    fn nameplate(&self) -> &Nameplate {
        &self.nameplate
    }

    fn set_control_mode(&mut self, mode: ControlMode, curve: PiecewiseCurve) -> Result<()> {
        self.mode = mode;
        self.set_curve(curve)
    }

    fn set_curve(&mut self, curve: PiecewiseCurve) -> Result<()> {
        self.curve = curve;
        let since = self.response.since;
        self.settle(since);
        Ok(())
    }

    fn set_response_time(&mut self, olrt: f64) -> Result<()> {
        if !olrt.is_finite() || olrt < 0.0 {
            return Err(ConformanceError::Environment(format!(
                "response time must be a non-negative number of seconds, got {olrt}"
            )));
        }
        self.response_time = olrt;
        Ok(())
    }

    fn set_active_power_limit(&mut self, watts: f64) -> Result<()> {
        if !watts.is_finite() || watts < 0.0 {
            return Err(ConformanceError::Environment(format!(
                "active power limit must be a non-negative number of watts, got {watts}"
            )));
        }
        self.terminal.p_limit = watts;
        let since = self.response.since;
        self.settle(since);
        Ok(())
    }
}
