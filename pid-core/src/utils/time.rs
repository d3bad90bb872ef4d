//! Monotonic time sources for the controller.
//!
//! The controller only ever needs "how long since the previous step", so a
//! clock is anything that can report a non-decreasing `Duration` measured from
//! an origin fixed for that clock. `MonotonicClock` wraps `std::time::Instant`;
//! `ManualClock` is driven by hand for deterministic tests and simulations.

use core::{cell::Cell, time::Duration};

/// Elapsed time substituted when a step reports zero or negative elapsed time.
pub const FLOOR_SECS: f64 = 0.001;

/// A source of monotonically non-decreasing time.
pub trait Clock {
    /// Time since this clock's origin.
    fn now(&self) -> Duration;
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now(&self) -> Duration {
        (**self).now()
    }
}

/// Seconds between two clock readings, floored to [`FLOOR_SECS`].
///
/// Returns `(seconds, floored)`. A `later` reading that is equal to or earlier
/// than `earlier` yields the floor instead of zero or a negative span.
pub fn elapsed_secs(
    earlier: Duration,
    later: Duration,
) -> (f64, bool) {
    match later.checked_sub(earlier) {
        Some(span) if !span.is_zero() => (span.as_secs_f64(), false),
        _ => (FLOOR_SECS, true),
    }
}

/// Process-wide monotonic clock backed by `std::time::Instant`.
#[cfg(feature = "std")]
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: std::time::Instant,
}

#[cfg(feature = "std")]
impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: std::time::Instant::now(),
        }
    }
}

#[cfg(feature = "std")]
impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "std")]
impl Clock for MonotonicClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// Hand-driven clock.
///
/// Shared by reference (`&ManualClock` is itself a `Clock`), so a test can
/// hand the controller a borrow and keep advancing time from outside.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Cell<Duration>,
}

impl ManualClock {
    /// Start at the given reading.
    pub fn starting_at(now: Duration) -> Self {
        Self {
            now: Cell::new(now),
        }
    }

    pub fn advance(
        &self,
        by: Duration,
    ) {
        self.now.set(self.now.get() + by);
    }

    /// Advance by fractional seconds. Non-positive or non-finite values are ignored.
    pub fn advance_secs(
        &self,
        secs: f64,
    ) {
        if secs.is_finite() && secs > 0.0 {
            self.advance(Duration::from_secs_f64(secs));
        }
    }

    /// Jump to an absolute reading. May move backwards.
    pub fn set(
        &self,
        now: Duration,
    ) {
        self.now.set(now);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        self.now.get()
    }
}
