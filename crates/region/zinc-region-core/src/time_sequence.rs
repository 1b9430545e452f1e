use serde::{Deserialize, Serialize};

use crate::RegionError;

/// Strictly increasing sample times shared by time-varying nodal parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f64>", into = "Vec<f64>")]
pub struct TimeSequence {
    times: Vec<f64>,
}

/// Bracketing samples for a time: `time = (1 - xi) * t[index_one] + xi * t[index_two]`.
///
/// `in_range` is false when the time fell outside the sequence; the indices
/// are then clamped to the nearest end and `xi` is 0.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeInterpolation {
    pub index_one: usize,
    pub index_two: usize,
    pub xi: f64,
    pub in_range: bool,
}

impl TimeSequence {
    pub fn new(times: Vec<f64>) -> Result<Self, RegionError> {
        if times.is_empty() || times.iter().any(|t| !t.is_finite()) {
            return Err(RegionError::InvalidTimeSequence);
        }
        if times.windows(2).any(|w| w[1] <= w[0]) {
            return Err(RegionError::InvalidTimeSequence);
        }
        Ok(Self { times })
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    pub fn times(&self) -> &[f64] {
        &self.times
    }

    pub fn time(&self, index: usize) -> Option<f64> {
        self.times.get(index).copied()
    }

    pub fn first_time(&self) -> f64 {
        self.times[0]
    }

    pub fn last_time(&self) -> f64 {
        self.times[self.times.len() - 1]
    }

    /// Locate the samples bracketing `time`.
    pub fn interpolation_for_time(&self, time: f64) -> TimeInterpolation {
        let last = self.times.len() - 1;
        if time < self.first_time() || time.is_nan() {
            return TimeInterpolation {
                index_one: 0,
                index_two: 0,
                xi: 0.0,
                in_range: false,
            };
        }
        if time > self.last_time() {
            return TimeInterpolation {
                index_one: last,
                index_two: last,
                xi: 0.0,
                in_range: false,
            };
        }
        // first index whose time is >= the requested time
        let upper = self.times.partition_point(|t| *t < time);
        if upper == 0 || self.times[upper] == time {
            return TimeInterpolation {
                index_one: upper,
                index_two: upper,
                xi: 0.0,
                in_range: true,
            };
        }
        let lower = upper - 1;
        let xi = (time - self.times[lower]) / (self.times[upper] - self.times[lower]);
        TimeInterpolation {
            index_one: lower,
            index_two: upper,
            xi,
            in_range: true,
        }
    }

    /// Index of the sample lying within `tolerance` of `time`. Times just
    /// outside the sequence match the clamped end sample.
    pub fn index_for_time(&self, time: f64, tolerance: f64) -> Option<usize> {
        let found = self.interpolation_for_time(time);
        [found.index_one, found.index_two]
            .into_iter()
            .find(|&index| (self.times[index] - time).abs() <= tolerance)
    }
}

impl TryFrom<Vec<f64>> for TimeSequence {
    type Error = RegionError;

    fn try_from(times: Vec<f64>) -> Result<Self, Self::Error> {
        Self::new(times)
    }
}

impl From<TimeSequence> for Vec<f64> {
    fn from(sequence: TimeSequence) -> Self {
        sequence.times
    }
}
