//! Time-indexed multi-channel measurement traces.

use std::cmp::Ordering;
use std::fmt;
use std::ops::RangeInclusive;

use crate::error::{ConformanceError, Result};

/// A measured physical quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Channel {
    Voltage,
    Frequency,
    ActivePower,
    ReactivePower,
}

impl Channel {
    /// Number of channels a sample can carry.
    pub const COUNT: usize = 4;

    pub const ALL: [Channel; Channel::COUNT] = [
        Channel::Voltage,
        Channel::Frequency,
        Channel::ActivePower,
        Channel::ReactivePower,
    ];

    fn index(self) -> usize {
        match self {
            Channel::Voltage => 0,
            Channel::Frequency => 1,
            Channel::ActivePower => 2,
            Channel::ReactivePower => 3,
        }
    }

    /// Column-friendly name.
    pub fn name(self) -> &'static str {
        match self {
            Channel::Voltage => "voltage",
            Channel::Frequency => "frequency",
            Channel::ActivePower => "active_power",
            Channel::ReactivePower => "reactive_power",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One timestamped reading of some subset of channels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    /// Timestamp in seconds.
    pub time: f64,
    values: [Option<f64>; Channel::COUNT],
}

impl Sample {
    /// Creates an empty sample at `time`.
    pub fn new(time: f64) -> Self {
        Self {
            time,
            values: [None; Channel::COUNT],
        }
    }

    /// Returns the sample with `channel` set to `value`.
    pub fn with(mut self, channel: Channel, value: f64) -> Self {
        self.set(channel, value);
        self
    }

    pub fn set(&mut self, channel: Channel, value: f64) {
        self.values[channel.index()] = Some(value);
    }

    pub fn get(&self, channel: Channel) -> Option<f64> {
        self.values[channel.index()]
    }
}

/// Strictly time-ordered sequence of at least two samples.
///
/// Both invariants are checked on construction. Every windowing computation
/// downstream (landmark lookup, steady-state averaging) relies on them, so a
/// trace that exists is a trace that can be windowed.
#[derive(Debug, Clone, PartialEq)]
pub struct MeasurementTrace {
    samples: Vec<Sample>,
}

impl MeasurementTrace {
    /// Validates and wraps `samples`.
    ///
    /// # Errors
    ///
    /// * `InsufficientData` if fewer than two samples are given
    /// * `TimeRegression` if any timestamp does not strictly exceed its
    ///   predecessor (repeats included)
    pub fn new(samples: Vec<Sample>) -> Result<Self> {
        if samples.len() < 2 {
            return Err(ConformanceError::InsufficientData {
                samples: samples.len(),
            });
        }
        for (i, pair) in samples.windows(2).enumerate() {
            // NaN timestamps compare as None and are rejected too
            if pair[1].time.partial_cmp(&pair[0].time) != Some(Ordering::Greater) {
                return Err(ConformanceError::TimeRegression {
                    index: i + 1,
                    previous: pair[0].time,
                    current: pair[1].time,
                });
            }
        }
        Ok(Self { samples })
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Always `false`; a trace holds at least two samples.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn first(&self) -> &Sample {
        &self.samples[0]
    }

    pub fn last(&self) -> &Sample {
        &self.samples[self.samples.len() - 1]
    }

    pub fn start_time(&self) -> f64 {
        self.first().time
    }

    pub fn end_time(&self) -> f64 {
        self.last().time
    }

    /// Index of the sample whose timestamp is nearest `t`; ties go to the earlier one.
    pub fn nearest_index(&self, t: f64) -> usize {
        let after = self.samples.partition_point(|s| s.time < t);
        if after == 0 {
            return 0;
        }
        if after == self.samples.len() {
            return after - 1;
        }
        let before = after - 1;
        if t - self.samples[before].time <= self.samples[after].time - t {
            before
        } else {
            after
        }
    }

    /// Reads `channel` from sample `index`.
    ///
    /// # Errors
    ///
    /// Returns `MissingChannel` if that sample did not record the channel,
    /// or `InsufficientData` if `index` is past the end of the trace.
    pub fn value(&self, index: usize, channel: Channel) -> Result<f64> {
        let sample = self.samples.get(index).ok_or(ConformanceError::InsufficientData {
            samples: self.samples.len(),
        })?;
        sample
            .get(channel)
            .ok_or(ConformanceError::MissingChannel { channel, index })
    }

    /// Arithmetic mean of `channel` over the inclusive index range.
    ///
    /// # Errors
    ///
    /// Returns `MissingChannel` if any sample in the range lacks the channel,
    /// or `InsufficientData` if the range is empty.
    pub fn mean(&self, channel: Channel, range: RangeInclusive<usize>) -> Result<f64> {
        let (start, end) = (*range.start(), *range.end());
        if start > end || end >= self.samples.len() {
            return Err(ConformanceError::InsufficientData { samples: 0 });
        }
        let mut sum = 0.0;
        for index in start..=end {
            sum += self.value(index, channel)?;
        }
        Ok(sum / (end - start + 1) as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(t: f64, q: f64) -> Sample {
        Sample::new(t).with(Channel::ReactivePower, q)
    }

    #[test]
    fn rejects_short_trace() {
        let err = MeasurementTrace::new(vec![sample(0.0, 0.0)]).unwrap_err();
        assert_eq!(err, ConformanceError::InsufficientData { samples: 1 });
        assert!(MeasurementTrace::new(Vec::new()).is_err());
    }

    #[test]
    fn rejects_repeated_timestamp() {
        let err =
            MeasurementTrace::new(vec![sample(0.0, 0.0), sample(1.0, 0.0), sample(1.0, 0.0)])
                .unwrap_err();
        assert!(matches!(
            err,
            ConformanceError::TimeRegression { index: 2, .. }
        ));
        assert!(err.is_fatal());
    }

    #[test]
    fn rejects_decreasing_timestamp() {
        let err = MeasurementTrace::new(vec![sample(1.0, 0.0), sample(0.5, 0.0)]).unwrap_err();
        assert!(matches!(err, ConformanceError::TimeRegression { .. }));
    }

    #[test]
    fn nearest_index_picks_closest_sample() {
        let trace = MeasurementTrace::new((0..5).map(|i| sample(i as f64, 0.0)).collect()).unwrap();
        assert_eq!(trace.nearest_index(-3.0), 0);
        assert_eq!(trace.nearest_index(1.4), 1);
        assert_eq!(trace.nearest_index(1.6), 2);
        assert_eq!(trace.nearest_index(2.5), 2);
        assert_eq!(trace.nearest_index(40.0), 4);
    }

    #[test]
    fn mean_over_window() {
        let trace =
            MeasurementTrace::new((0..4).map(|i| sample(i as f64, i as f64)).collect()).unwrap();
        assert_eq!(trace.mean(Channel::ReactivePower, 1..=3).unwrap(), 2.0);
    }

    #[test]
    fn missing_channel_is_reported() {
        let trace = MeasurementTrace::new(vec![sample(0.0, 0.0), sample(1.0, 0.0)]).unwrap();
        let err = trace.value(1, Channel::Voltage).unwrap_err();
        assert_eq!(
            err,
            ConformanceError::MissingChannel {
                channel: Channel::Voltage,
                index: 1
            }
        );
    }

    #[test]
    fn index_past_the_end_is_an_error() {
        let trace = MeasurementTrace::new(vec![sample(0.0, 0.0), sample(1.0, 0.0)]).unwrap();
        let err = trace.value(2, Channel::ReactivePower).unwrap_err();
        assert_eq!(err, ConformanceError::InsufficientData { samples: 2 });
    }
}
