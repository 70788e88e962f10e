/// A virtual clock measured in seconds.
///
/// Simulated benches advance it instead of blocking, so a twenty-second
/// observation window costs no wall time.
///
/// # Examples
///
/// ```
/// use der_conformance::env::clock::VirtualClock;
///
/// let mut clock = VirtualClock::new(0.0);
/// clock.advance(0.05);
/// clock.advance(0.05);
/// assert!((clock.now() - 0.1).abs() < 1e-12);
/// ```
#[derive(Debug, Clone)]
pub struct VirtualClock {
    /// Current time in seconds
    now: f64,
}

impl VirtualClock {
    /// Creates a clock reading `start` seconds.
    pub fn new(start: f64) -> Self {
        Self { now: start }
    }

    /// Moves time forward by `duration` seconds.
    ///
    /// Negative and non-finite durations are ignored; time never runs
    /// backwards on this clock.
    pub fn advance(&mut self, duration: f64) {
        if duration.is_finite() && duration > 0.0 {
            self.now += duration;
        }
    }

    /// Current time in seconds.
    pub fn now(&self) -> f64 {
        self.now
    }
}

impl Default for VirtualClock {
    fn default() -> Self {
        Self::new(0.0)
    }
}
