//! Waiting for an output to come to rest before a step.

use crate::conformance::tolerance::{Sidedness, ToleranceBand};
use crate::conformance::trace::Channel;
use crate::env::Environment;
use crate::error::{ConformanceError, Result};

/// How a settling wait ended.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Settling {
    /// The last reading sat inside the band.
    pub settled: bool,
    /// The wait stopped on the consecutive-sample rule before `max_duration`.
    pub exited_early: bool,
    pub samples: usize,
    /// Time spent waiting (s).
    pub elapsed: f64,
    pub last_value: Option<f64>,
}

/// Samples `channel` every `cadence` seconds for up to `max_duration`.
///
/// With `early_exit = Some(n)` the wait ends as soon as `n` consecutive
/// readings sit inside `band`, however little time has passed. That rule
/// is a heuristic: it can cut a wait shorter than the nominal duration a
/// procedure asks for, so it stays off unless configured. `Some(0)`
/// counts as off.
///
/// # Errors
///
/// `ToleranceComputation` for a non-positive cadence, `MissingChannel`
/// when a reading lacks `channel`, and any environment fault.
pub fn await_settling<E>(
    env: &mut E,
    channel: Channel,
    band: &ToleranceBand,
    max_duration: f64,
    cadence: f64,
    early_exit: Option<usize>,
) -> Result<Settling>
where
    E: Environment + ?Sized,
{
    if !cadence.is_finite() || cadence <= 0.0 {
        return Err(ConformanceError::ToleranceComputation {
            quantity: "settling cadence",
            value: cadence,
        });
    }
    let early_exit = early_exit.filter(|&n| n > 0);
    let start = env.time_now();
    let mut outcome = Settling {
        settled: false,
        exited_early: false,
        samples: 0,
        elapsed: 0.0,
        last_value: None,
    };
    let mut in_band = 0usize;

    while env.time_now() - start < max_duration {
        env.sleep(cadence);
        let sample = env.sample(&[channel])?;
        let value = sample.get(channel).ok_or(ConformanceError::MissingChannel {
            channel,
            index: outcome.samples,
        })?;
        outcome.samples += 1;
        outcome.last_value = Some(value);
        outcome.settled = band.accepts(value, Sidedness::Both);
        in_band = if outcome.settled { in_band + 1 } else { 0 };

        if early_exit.is_some_and(|n| in_band >= n) {
            outcome.exited_early = env.time_now() - start < max_duration;
            break;
        }
    }

    outcome.elapsed = env.time_now() - start;
    Ok(outcome)
}
