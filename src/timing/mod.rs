//     ______   __  __     __         ______     ______
//    /\  == \ /\ \/\ \   /\ \       /\  ___\   /\  ___\
//    \ \  _-/ \ \ \_\ \  \ \ \____  \ \___  \  \ \  __\
//     \ \_\    \ \_____\  \ \_____\  \/\_____\  \ \_____\
//      \/_/     \/_____/   \/_____/   \/_____/   \/_____/
//
// Author: Colin MacRitchie / Ripple Group
//! Monotonic Clock Sources
//!
//! The guard never arms a timer; it reads a clock only on its sample path. This
//! module provides the clock it reads, abstracted behind a small object-safe
//! trait so the guard can run against the platform clock in production and a
//! manually driven clock in tests.
//!
//! # Requirements
//!
//! - Readings are microseconds on a monotonic timeline and never regress
//! - Resolution fine enough to separate sub-millisecond step costs
//! - Reads are non-blocking and side-effect free
//!
//! # Sources
//!
//! - **Linux**: `clock_gettime(CLOCK_MONOTONIC)`, clamped against regression
//! - **Instant**: `std::time::Instant` relative to a process-wide epoch (all platforms)
//! - **Manual**: explicitly advanced time for deterministic tests
//!
//! # Example
//!
//! ```rust
//! use pulse_guard::timing::create_clock;
//!
//! let clock = create_clock();
//! let start = clock.now_us();
//!
//! let mut sum = 0u64;
//! for i in 0..1000 {
//!     sum = sum.wrapping_add(i);
//! }
//! std::hint::black_box(sum);
//!
//! let end = clock.now_us();
//! assert!(end >= start);
//! println!("{} took {} us", clock.source_name(), end - start);
//! ```

use std::fmt;
use std::time::Instant;
use thiserror::Error;

mod fallback;
#[cfg(target_os = "linux")]
mod linux;
mod manual;

pub use fallback::InstantClock;
#[cfg(target_os = "linux")]
pub use linux::LinuxClock;
pub use manual::ManualClock;

/// Errors that can occur while initialising a clock source
#[derive(Debug, Error)]
pub enum TimingError {
    /// Platform is not supported by this clock source
    #[error("Platform not supported: {0}")]
    PlatformNotSupported(String),

    /// System call failed
    #[error("System call failed: {0}")]
    SystemCallFailed(#[from] std::io::Error),
}

/// Source of monotonic microsecond timestamps
///
/// Implementations must never return a value smaller than one they returned
/// before. The trait is object-safe so `create_clock` can pick a source at
/// runtime.
pub trait MonotonicClock {
    /// Returns the current time in microseconds
    fn now_us(&self) -> u64;

    /// Returns the name of the clock source
    ///
    /// Useful for debugging and logging which source a guard runs on.
    fn source_name(&self) -> &'static str;
}

impl<T: MonotonicClock + ?Sized> MonotonicClock for Box<T> {
    #[inline]
    fn now_us(&self) -> u64 {
        (**self).now_us()
    }

    fn source_name(&self) -> &'static str {
        (**self).source_name()
    }
}

impl<T: MonotonicClock + ?Sized> MonotonicClock for &T {
    #[inline]
    fn now_us(&self) -> u64 {
        (**self).now_us()
    }

    fn source_name(&self) -> &'static str {
        (**self).source_name()
    }
}

/// Creates the most precise monotonic clock available on this platform
///
/// Falls back to [`InstantClock`] when the platform source cannot be
/// initialised.
///
/// # Example
///
/// ```rust
/// use pulse_guard::timing::create_clock;
///
/// let clock = create_clock();
/// println!("Using clock: {}", clock.source_name());
/// ```
#[must_use]
pub fn create_clock() -> Box<dyn MonotonicClock + Send> {
    #[cfg(target_os = "linux")]
    {
        match LinuxClock::new() {
            Ok(clock) => Box::new(clock),
            Err(_err) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(error = %_err, "CLOCK_MONOTONIC unavailable, using Instant clock");
                Box::new(InstantClock::new())
            },
        }
    }

    #[cfg(not(target_os = "linux"))]
    {
        Box::new(InstantClock::new())
    }
}

/// Information about a clock source, gathered by [`probe_clock`]
#[derive(Debug, Clone)]
pub struct ClockInfo {
    /// Source name
    pub source: &'static str,
    /// Median cost of a single read in nanoseconds
    pub overhead_ns: u64,
    /// Smallest non-zero step observed between readings, in microseconds
    pub resolution_us: u64,
}

impl fmt::Display for ClockInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Clock[{}: overhead={}ns, resolution={}us]",
            self.source, self.overhead_ns, self.resolution_us
        )
    }
}

/// Measures read overhead and observable resolution of a clock
///
/// Overhead is the median of back-to-back read pairs timed with `Instant`.
/// Resolution is the smallest non-zero difference seen while spinning; a
/// clock that never advanced during the probe reports 0.
#[must_use]
pub fn probe_clock(clock: &dyn MonotonicClock) -> ClockInfo {
    const SAMPLES: usize = 1000;
    const SPIN_LIMIT: usize = 100_000;

    // Warm up
    for _ in 0..100 {
        std::hint::black_box(clock.now_us());
    }

    let mut overheads = Vec::with_capacity(SAMPLES);
    for _ in 0..SAMPLES {
        let before = Instant::now();
        std::hint::black_box(clock.now_us());
        #[allow(clippy::cast_possible_truncation)]
        overheads.push(before.elapsed().as_nanos() as u64);
    }
    overheads.sort_unstable();

    let mut resolution_us = 0;
    let mut previous = clock.now_us();
    for _ in 0..SPIN_LIMIT {
        let current = clock.now_us();
        if current > previous {
            let step = current - previous;
            if resolution_us == 0 || step < resolution_us {
                resolution_us = step;
            }
            if resolution_us == 1 {
                break;
            }
        }
        previous = current;
    }

    ClockInfo {
        source: clock.source_name(),
        overhead_ns: median_of_sorted(&overheads),
        resolution_us,
    }
}

/// Calculates the median of a sorted slice
fn median_of_sorted(values: &[u64]) -> u64 {
    let len = values.len();
    if len == 0 {
        return 0;
    }

    if len % 2 == 0 {
        (values[len / 2 - 1] + values[len / 2]) / 2
    } else {
        values[len / 2]
    }
}
