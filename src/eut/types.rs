//! Common traits and helpers for devices under test.

use rand::{Rng, rngs::StdRng};

use crate::conformance::curve::PiecewiseCurve;
use crate::error::Result;

use super::{ControlMode, Nameplate};

/// Configuration surface of an EUT.
///
/// The evaluator never touches this; the procedure layer uses it to
/// enable a control function before stepping the grid.
pub trait DeviceUnderTest {
    /// Rated values of the device.
    fn nameplate(&self) -> &Nameplate;

    /// Enables `mode` with `curve` (physical units) as its characteristic.
    ///
    /// # Errors
    ///
    /// Adapters report a rejected configuration as `Environment`.
    fn set_control_mode(&mut self, mode: ControlMode, curve: PiecewiseCurve) -> Result<()>;

    /// Replaces the characteristic of the enabled function.
    ///
    /// # Errors
    ///
    /// Adapters report a rejected configuration as `Environment`.
    fn set_curve(&mut self, curve: PiecewiseCurve) -> Result<()>;

    /// Sets the open-loop response time of the enabled function (s).
    ///
    /// # Errors
    ///
    /// Adapters report a rejected configuration as `Environment`.
    fn set_response_time(&mut self, olrt: f64) -> Result<()>;

    /// Commands an active power limit (W).
    ///
    /// # Errors
    ///
    /// Adapters report a rejected configuration as `Environment`.
    fn set_active_power_limit(&mut self, watts: f64) -> Result<()>;
}

/// Gaussian noise via the Box-Muller transform.
///
/// # Arguments
///
/// * `rng` - Random number generator
/// * `std_dev` - Standard deviation of the noise
///
/// # Returns
///
/// Random value from a Gaussian distribution with mean 0 and the given
/// standard deviation; exactly `0.0` when `std_dev <= 0`.
pub fn gaussian_noise(rng: &mut StdRng, std_dev: f64) -> f64 {
    if std_dev <= 0.0 {
        return 0.0;
    }

    let u1: f64 = rng.random::<f64>().clamp(1e-12, 1.0);
    let u2: f64 = rng.random::<f64>();
    let z0 = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
    z0 * std_dev
}
