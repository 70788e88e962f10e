//! Equipment under test: nameplate, control modes, and a simulated device.

/// Grid-support control functions.
pub mod mode;
/// Rated values.
pub mod nameplate;
/// First-order simulated inverter.
pub mod simulated;
pub mod types;

pub use mode::ControlMode;
pub use nameplate::{Category, Nameplate};
pub use simulated::SimulatedEut;
pub use types::DeviceUnderTest;
