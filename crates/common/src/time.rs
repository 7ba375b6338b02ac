//! Rational time values and time ranges.
//!
//! All presentation arithmetic in the engine runs on `RationalTime`: a
//! value measured in units of `1/rate` seconds. Operations preserve the
//! left-hand rate and rescale the right-hand side when rates differ, so a
//! 24 fps timeline can reference 30 fps media without losing the frame
//! grid. Mapping a playback time onto a discrete source frame always goes
//! through [`RationalTime::floor`] so frame selection is deterministic.

use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, Sub};

use serde::{Deserialize, Serialize};

/// A point in time (or a duration) expressed as `value / rate` seconds.
///
/// Two times compare equal when they denote the same instant, regardless
/// of rate: `RationalTime::new(24.0, 24.0) == RationalTime::new(1.0, 1.0)`.
#[derive(Copy, Clone, Debug, Serialize, Deserialize)]
pub struct RationalTime {
    /// Count of `1/rate`-second units.
    pub value: f64,
    /// Units per second.
    pub rate: f64,
}

impl RationalTime {
    pub const fn new(value: f64, rate: f64) -> Self {
        Self { value, rate }
    }

    /// The same instant expressed in units of another rate.
    pub fn rescaled_to(self, rate: f64) -> Self {
        Self {
            value: self.value * rate / self.rate,
            rate,
        }
    }

    /// This time as seconds.
    pub fn to_seconds(self) -> f64 {
        self.value / self.rate
    }

    /// Round down to a whole unit, keeping the rate.
    pub fn floor(self) -> Self {
        Self {
            value: self.value.floor(),
            rate: self.rate,
        }
    }

    /// One frame at this time's rate.
    pub fn unit(self) -> Self {
        Self {
            value: 1.0,
            rate: self.rate,
        }
    }
}

impl Add for RationalTime {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self {
            value: self.value + rhs.rescaled_to(self.rate).value,
            rate: self.rate,
        }
    }
}

impl Sub for RationalTime {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self {
            value: self.value - rhs.rescaled_to(self.rate).value,
            rate: self.rate,
        }
    }
}

impl PartialEq for RationalTime {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for RationalTime {}

impl PartialOrd for RationalTime {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for RationalTime {
    fn cmp(&self, other: &Self) -> Ordering {
        self.to_seconds().total_cmp(&other.to_seconds())
    }
}

impl fmt::Display for RationalTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.value, self.rate)
    }
}

/// A half-open span of time: `[start, start + duration)`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: RationalTime,
    pub duration: RationalTime,
}

impl TimeRange {
    /// Create a range from a start and a non-negative duration.
    ///
    /// # Panics
    ///
    /// Panics if `duration.value` is negative.
    pub fn new(start: RationalTime, duration: RationalTime) -> Self {
        assert!(duration.value >= 0.0, "duration must be >= 0");
        Self { start, duration }
    }

    /// Range covering `[start, end)`.
    pub fn from_start_end_time(start: RationalTime, end: RationalTime) -> Self {
        Self::new(start, end - start)
    }

    /// Range whose last contained frame is `end`.
    pub fn from_start_end_time_inclusive(start: RationalTime, end: RationalTime) -> Self {
        Self::new(start, end - start + start.unit())
    }

    /// The first time past the end of the range.
    pub fn end_time_exclusive(&self) -> RationalTime {
        self.start + self.duration
    }

    /// The last frame time contained in the range.
    ///
    /// For an empty range this is the start time.
    pub fn end_time_inclusive(&self) -> RationalTime {
        if self.duration.value > 0.0 {
            self.end_time_exclusive() - self.duration.unit()
        } else {
            self.start
        }
    }

    /// Whether `time` falls inside the half-open span.
    pub fn contains(&self, time: RationalTime) -> bool {
        time >= self.start && time < self.end_time_exclusive()
    }

    /// Whether two half-open spans overlap.
    pub fn intersects(&self, other: &TimeRange) -> bool {
        self.start < other.end_time_exclusive() && other.start < self.end_time_exclusive()
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end_time_exclusive())
    }
}

/// Wrap a time into a range: times before the start map to the last frame,
/// times past the last frame map to the start. Idempotent for times already
/// inside the range.
pub fn loop_time(time: RationalTime, range: &TimeRange) -> RationalTime {
    if time < range.start {
        range.end_time_inclusive()
    } else if time > range.end_time_inclusive() {
        range.start
    } else {
        time
    }
}

/// Coalesce a set of frame times into inclusive ranges of consecutive frames.
///
/// Input order does not matter; duplicates merge. Two frames belong to the
/// same range when they are at most one unit apart.
pub fn to_ranges(mut frames: Vec<RationalTime>) -> Vec<TimeRange> {
    let mut out = Vec::new();
    if frames.is_empty() {
        return out;
    }
    frames.sort();
    let mut first = frames[0];
    let mut last = frames[0];
    for &frame in &frames[1..] {
        if (frame - last).value > 1.0 {
            out.push(TimeRange::from_start_end_time_inclusive(first, last));
            first = frame;
        }
        last = frame;
    }
    out.push(TimeRange::from_start_end_time_inclusive(first, last));
    out
}

/// Expand ranges back into the frame times they cover, stepping one unit at
/// a time. Inverse of [`to_ranges`] for coalesced input.
pub fn enumerate_frames(ranges: &[TimeRange]) -> Vec<RationalTime> {
    let mut out = Vec::new();
    for range in ranges {
        let mut time = range.start;
        let end = range.end_time_inclusive();
        while time <= end {
            out.push(time);
            time = time + time.unit();
        }
    }
    out
}

// ── Tests ────────────────────────────────────────────────────────────
