//! POSIX clock backend.

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::domain::{PalConfig, Timestamp, UtcOffset, TICKS_PER_SECOND};
use crate::ports::ClockProvider;

// Raw monotonic clock where the target has one: immune to NTP slewing.
#[cfg(any(target_os = "linux", target_os = "android"))]
const MONOTONIC_CLOCK: libc::clockid_t = libc::CLOCK_MONOTONIC_RAW;
#[cfg(not(any(target_os = "linux", target_os = "android")))]
const MONOTONIC_CLOCK: libc::clockid_t = libc::CLOCK_MONOTONIC;

/// Clock provider over the POSIX time facilities.
///
/// Wall time comes from the system clock shifted to the protocol epoch;
/// monotonic time from `clock_gettime` with a process-wide floor so the
/// non-decreasing guarantee survives a degraded backend; the local UTC
/// offset is rederived from the OS timezone database on every call.
#[derive(Debug, Default)]
pub struct PosixClock {
    monotonic_floor: AtomicI64,
}

impl PosixClock {
    /// Construct the clock backend.
    #[must_use]
    pub fn new(_config: &PalConfig) -> Self {
        Self {
            monotonic_floor: AtomicI64::new(0),
        }
    }

    /// Local-time offset from UTC in effect at the given Unix instant.
    ///
    /// Breaks the instant down as UTC, reinterprets the broken-down fields
    /// as local time with DST auto-detection, and diffs the two absolute
    /// times. Degrades to a zero offset if the timezone database is
    /// unavailable.
    #[must_use]
    pub fn utc_offset_at(&self, unix_secs: i64) -> UtcOffset {
        let raw = unix_secs as libc::time_t;
        let mut fields: libc::tm = unsafe { std::mem::zeroed() };
        if unsafe { libc::gmtime_r(&raw, &mut fields) }.is_null() {
            tracing::warn!("[pal] gmtime_r failed, reporting zero UTC offset");
            return UtcOffset::default();
        }
        // Ask mktime to look the DST rule up in the timezone database.
        fields.tm_isdst = -1;
        let reinterpreted = unsafe { libc::mktime(&mut fields) };
        if reinterpreted == -1 {
            tracing::warn!("[pal] mktime failed, reporting zero UTC offset");
            return UtcOffset::default();
        }
        UtcOffset::from_seconds(unix_secs - reinterpreted as i64)
    }
}

impl ClockProvider for PosixClock {
    fn now(&self) -> Timestamp {
        // A clock set before 1970 degrades to the epoch origin; time must
        // always be obtainable.
        let since_unix = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        Timestamp::from_unix_parts(since_unix.as_secs() as i64, since_unix.subsec_nanos())
    }

    fn now_monotonic(&self) -> Timestamp {
        let mut ts = libc::timespec {
            tv_sec: 0,
            tv_nsec: 0,
        };
        let ticks = if unsafe { libc::clock_gettime(MONOTONIC_CLOCK, &mut ts) } == 0 {
            (ts.tv_sec as i64) * TICKS_PER_SECOND + (ts.tv_nsec as i64) / 100
        } else {
            // Degraded backend: hold the last observed value rather than
            // propagate an error.
            tracing::warn!("[pal] clock_gettime failed, holding monotonic floor");
            self.monotonic_floor.load(Ordering::Acquire)
        };
        let previous = self.monotonic_floor.fetch_max(ticks, Ordering::AcqRel);
        Timestamp::from_ticks(previous.max(ticks))
    }

    fn local_utc_offset(&self) -> UtcOffset {
        let now = unsafe { libc::time(std::ptr::null_mut()) };
        self.utc_offset_at(now as i64)
    }

    fn sleep_ms(&self, ms: u64) {
        std::thread::sleep(Duration::from_millis(ms));
    }
}
