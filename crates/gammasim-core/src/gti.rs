//! Good time intervals (GTIs).
//!
//! A GTI set is the union of the windows during which the instrument was
//! taking data. Intervals are stored sorted and merged, so the set is a
//! list of disjoint, increasing half-open ranges `[start, stop)`.
//!
//! Arrival times are sampled against the *active-time measure*: a uniform
//! draw is mapped onto the concatenated interval lengths, so gaps between
//! intervals carry zero probability.

use serde::{Deserialize, Serialize};

use crate::error::SamplingError;

/// One interval `[start, stop)` in absolute seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeInterval {
    /// Start time in seconds.
    pub start: f64,
    /// Stop time in seconds.
    pub stop: f64,
}

impl TimeInterval {
    /// Length of the interval in seconds.
    pub fn duration(&self) -> f64 {
        self.stop - self.start
    }

    /// Intersection with `[low, high)`, if it has positive length.
    fn clip(&self, low: f64, high: f64) -> Option<Self> {
        let start = self.start.max(low);
        let stop = self.stop.min(high);
        (stop > start).then_some(Self { start, stop })
    }
}

/// A non-empty, sorted, disjoint set of good time intervals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<TimeInterval>", into = "Vec<TimeInterval>")]
pub struct GoodTimeIntervals {
    intervals: Vec<TimeInterval>,
}

impl GoodTimeIntervals {
    /// Build a GTI set from possibly unsorted, overlapping intervals.
    ///
    /// Overlapping or touching intervals are merged.
    ///
    /// # Errors
    ///
    /// Returns [`SamplingError::EmptyGti`] if no interval is given, and
    /// [`SamplingError::InvalidGti`] if an interval is non-finite or has
    /// non-positive length.
    pub fn new(mut intervals: Vec<TimeInterval>) -> Result<Self, SamplingError> {
        if intervals.is_empty() {
            return Err(SamplingError::EmptyGti);
        }
        if let Some(bad) = intervals
            .iter()
            .find(|i| !(i.start.is_finite() && i.stop.is_finite() && i.stop > i.start))
        {
            return Err(SamplingError::InvalidGti {
                start: bad.start,
                stop: bad.stop,
            });
        }

        intervals.sort_by(|a, b| a.start.total_cmp(&b.start));

        let mut merged: Vec<TimeInterval> = Vec::with_capacity(intervals.len());
        for interval in intervals {
            match merged.last_mut() {
                Some(last) if interval.start <= last.stop => {
                    last.stop = last.stop.max(interval.stop);
                }
                _ => merged.push(interval),
            }
        }

        Ok(Self { intervals: merged })
    }

    /// Convenience constructor from `(start, stop)` pairs.
    ///
    /// # Errors
    ///
    /// Same as [`GoodTimeIntervals::new`].
    pub fn from_pairs(pairs: &[(f64, f64)]) -> Result<Self, SamplingError> {
        Self::new(
            pairs
                .iter()
                .map(|&(start, stop)| TimeInterval { start, stop })
                .collect(),
        )
    }

    /// The merged intervals in increasing order.
    pub fn intervals(&self) -> &[TimeInterval] {
        &self.intervals
    }

    /// Start of the first interval.
    pub fn start(&self) -> f64 {
        self.intervals.first().map_or(0.0, |i| i.start)
    }

    /// Stop of the last interval.
    pub fn stop(&self) -> f64 {
        self.intervals.last().map_or(0.0, |i| i.stop)
    }

    /// Total active time in seconds.
    pub fn time_sum(&self) -> f64 {
        self.intervals.iter().map(TimeInterval::duration).sum()
    }

    /// Whether `time` lies inside an interval (stop edges included).
    pub fn contains(&self, time: f64) -> bool {
        self.intervals
            .iter()
            .any(|i| time >= i.start && time <= i.stop)
    }

    /// The active parts of `[low, high)`.
    pub fn clip(&self, low: f64, high: f64) -> Vec<TimeInterval> {
        self.intervals
            .iter()
            .filter_map(|i| i.clip(low, high))
            .collect()
    }

    /// Active time inside `[low, high)`, in seconds.
    pub fn active_time(&self, low: f64, high: f64) -> f64 {
        self.clip(low, high).iter().map(TimeInterval::duration).sum()
    }

    /// Map a uniform draw `u` in `[0, 1)` to a time inside the active part
    /// of `[low, high)`.
    ///
    /// Returns `None` if `[low, high)` has no active time.
    pub fn sample(&self, low: f64, high: f64, u: f64) -> Option<f64> {
        let active = self.clip(low, high);
        let total: f64 = active.iter().map(TimeInterval::duration).sum();
        if total.is_nan() || total <= 0.0 {
            return None;
        }

        let mut remaining = u * total;
        let last_index = active.len().saturating_sub(1);
        for (index, interval) in active.iter().enumerate() {
            let duration = interval.duration();
            if remaining < duration || index == last_index {
                return Some(interval.start + remaining.min(duration));
            }
            remaining -= duration;
        }
        None
    }

    /// Union of two GTI sets.
    pub fn union(&self, other: &Self) -> Self {
        let mut intervals = self.intervals.clone();
        intervals.extend_from_slice(&other.intervals);
        // Both inputs are valid and non-empty, so the merge cannot fail.
        Self::new(intervals).unwrap_or_else(|_| self.clone())
    }
}

impl TryFrom<Vec<TimeInterval>> for GoodTimeIntervals {
    type Error = SamplingError;

    fn try_from(intervals: Vec<TimeInterval>) -> Result<Self, Self::Error> {
        Self::new(intervals)
    }
}

impl From<GoodTimeIntervals> for Vec<TimeInterval> {
    fn from(gti: GoodTimeIntervals) -> Self {
        gti.intervals
    }
}
