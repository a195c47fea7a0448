//! Timestamp and UTC-offset value types.
//!
//! All PAL time values are signed 64-bit counts of 100-nanosecond ticks.
//! Wall-clock timestamps are counted from the protocol epoch (40 years plus
//! 10 leap days after the Unix epoch); monotonic timestamps carry no epoch
//! meaning and are only valid for interval arithmetic within one process.

use std::fmt;
use std::time::Duration;

/// 100-nanosecond ticks per second.
pub const TICKS_PER_SECOND: i64 = 10_000_000;

/// 100-nanosecond ticks per millisecond.
pub const TICKS_PER_MILLISECOND: i64 = TICKS_PER_SECOND / 1_000;

/// 100-nanosecond ticks per microsecond.
pub const TICKS_PER_MICROSECOND: i64 = TICKS_PER_SECOND / 1_000_000;

/// Seconds between the Unix epoch and the protocol epoch:
/// 40 years plus 10 leap days.
pub const EPOCH_OFFSET_SECONDS: i64 = ((365 * 40) + 10) * 86_400;

/// Protocol-epoch offset expressed in ticks.
pub const EPOCH_OFFSET_TICKS: i64 = EPOCH_OFFSET_SECONDS * TICKS_PER_SECOND;

/// A point in time, in 100-nanosecond ticks.
///
/// Wall-clock values (from [`ClockProvider::now`]) may jump backwards on
/// clock adjustment and must not be used for ordering. Monotonic values
/// (from [`ClockProvider::now_monotonic`]) are non-decreasing within one
/// process.
///
/// [`ClockProvider::now`]: crate::ports::ClockProvider::now
/// [`ClockProvider::now_monotonic`]: crate::ports::ClockProvider::now_monotonic
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(i64);

impl Timestamp {
    /// Create a timestamp from a raw tick count.
    #[inline]
    #[must_use]
    pub const fn from_ticks(ticks: i64) -> Self {
        Self(ticks)
    }

    /// Build a wall-clock timestamp from Unix seconds and a sub-second
    /// nanosecond remainder, shifted to the protocol epoch.
    #[must_use]
    pub fn from_unix_parts(secs: i64, subsec_nanos: u32) -> Self {
        let shifted = secs.saturating_add(EPOCH_OFFSET_SECONDS);
        Self(
            shifted
                .saturating_mul(TICKS_PER_SECOND)
                .saturating_add(i64::from(subsec_nanos) / 100),
        )
    }

    /// Raw tick count.
    #[inline]
    #[must_use]
    pub const fn ticks(self) -> i64 {
        self.0
    }

    /// Whole seconds since the timestamp's epoch.
    #[inline]
    #[must_use]
    pub const fn as_seconds(self) -> i64 {
        self.0 / TICKS_PER_SECOND
    }

    /// Add a duration, saturating at the numeric range.
    #[must_use]
    pub fn saturating_add(self, d: Duration) -> Self {
        let ticks = i64::try_from(d.as_nanos() / 100).unwrap_or(i64::MAX);
        Self(self.0.saturating_add(ticks))
    }

    /// Signed tick difference `self - earlier`.
    #[must_use]
    pub fn ticks_since(self, earlier: Timestamp) -> i64 {
        self.0.saturating_sub(earlier.0)
    }

    /// Shift by a local-time offset (e.g. to render local wall time).
    #[must_use]
    pub fn with_offset(self, offset: UtcOffset) -> Self {
        Self(self.0.saturating_add(offset.ticks()))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ticks", self.0)
    }
}

/// Signed offset of local time from UTC, in 100-nanosecond ticks.
///
/// Recomputed on every query so DST transitions are reflected; never cache
/// this across protocol sessions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct UtcOffset(i64);

impl UtcOffset {
    /// Offset from a raw tick count.
    #[inline]
    #[must_use]
    pub const fn from_ticks(ticks: i64) -> Self {
        Self(ticks)
    }

    /// Offset from whole seconds.
    #[inline]
    #[must_use]
    pub const fn from_seconds(secs: i64) -> Self {
        Self(secs * TICKS_PER_SECOND)
    }

    /// Raw tick count.
    #[inline]
    #[must_use]
    pub const fn ticks(self) -> i64 {
        self.0
    }

    /// Whole seconds.
    #[inline]
    #[must_use]
    pub const fn as_seconds(self) -> i64 {
        self.0 / TICKS_PER_SECOND
    }
}

impl fmt::Display for UtcOffset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let secs = self.as_seconds();
        let (sign, secs) = if secs < 0 { ('-', -secs) } else { ('+', secs) };
        write!(f, "UTC{}{:02}:{:02}", sign, secs / 3600, (secs % 3600) / 60)
    }
}
