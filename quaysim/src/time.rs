//! Simulation time.
//!
//! This module provides most notably:
//!
//! * [`MonotonicTime`]: a monotonic timestamp based on the [TAI] time
//!   standard, used as the kernel's notion of "current time",
//! * [`Deadline`]: a trait abstracting over time-absolute and time-relative
//!   deadlines.
//!
//! [TAI]: https://en.wikipedia.org/wiki/International_Atomic_Time
//!
//! Delays and durations are plain [`std::time::Duration`] values; simulation
//! time never moves backward, which the scheduler enforces at dispatch time.

use std::time::Duration;

pub use tai_time::MonotonicTime;

/// Trait abstracting over time-absolute and time-relative deadlines.
///
/// This trait is implemented by [`std::time::Duration`] and
/// [`MonotonicTime`].
pub trait Deadline {
    /// Make this deadline into an absolute timestamp, using the provided
    /// current time as a reference.
    fn into_time(self, now: MonotonicTime) -> MonotonicTime;
}

impl Deadline for Duration {
    #[inline(always)]
    fn into_time(self, now: MonotonicTime) -> MonotonicTime {
        now + self
    }
}

impl Deadline for MonotonicTime {
    #[inline(always)]
    fn into_time(self, _: MonotonicTime) -> MonotonicTime {
        self
    }
}
