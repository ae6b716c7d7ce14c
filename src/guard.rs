#![forbid(unsafe_code)]

//     ______   __  __     __         ______     ______
//    /\  == \ /\ \/\ \   /\ \       /\  ___\   /\  ___\
//    \ \  _-/ \ \ \_\ \  \ \ \____  \ \___  \  \ \  __\
//     \ \_\    \ \_____\  \ \_____\  \/\_____\  \ \_____\
//      \/_/     \/_____/   \/_____/   \/_____/   \/_____/
//
// Author: Colin MacRitchie / Ripple Group
//! Self-Clocking Timeout Guard
//!
//! A `TimeoutGuard` bounds the duration of a CPU-bound computation without a
//! watchdog thread or timer. The computation polls the guard at natural loop
//! boundaries and stops once `poll` returns `true`.
//!
//! # Hot Path
//!
//! Most polls are a counter increment and a compare. Only every `stride`-th
//! poll reads the clock; that sample updates the per-poll cost statistics and
//! picks the next stride so that the deadline is detected within roughly
//! `min(10ms, 5% of timeout)`.
//!
//! # States
//!
//! ```text
//! ARMED --(sample sees now >= deadline)--> TRIPPED
//! ```
//!
//! An armed guard answers `false`, a tripped guard answers `true` forever.
//! There is no reset; each bounded computation gets a fresh guard.
//!
//! # Ownership
//!
//! One guard per computation thread. Every mutating operation takes
//! `&mut self`, so a guard cannot be polled from two threads at once.
//!
//! # Example
//!
//! ```rust
//! use pulse_guard::create_timeout_guard;
//!
//! let mut guard = create_timeout_guard(50);
//! let mut iterations = 0u64;
//!
//! while !guard.poll() {
//!     iterations += 1;
//!     std::hint::black_box(iterations);
//! }
//!
//! let record = guard.debug_snapshot();
//! assert!(record.timeout_flag);
//! assert!(record.detected_at_us >= record.deadline_us);
//! ```

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

#[cfg(feature = "tracing")]
use tracing::{debug, trace, warn};

use crate::snapshot::DebugRecord;
use crate::stats::StepStats;
use crate::stride::{self, MIN_STRIDE};
use crate::timing::{MonotonicClock, create_clock};

/// Longest accepted timeout (~49.7 days)
pub const MAX_TIMEOUT_MS: u64 = u32::MAX as u64;

/// Result type for guard operations
pub type GuardResult<T> = Result<T, GuardError>;

/// Errors reported by guard construction and the operation entry point
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GuardError {
    /// Timeout outside `1..=MAX_TIMEOUT_MS`
    #[error("Timeout must be between 1 and {max_ms} ms, got {timeout_ms} ms")]
    InvalidTimeout {
        /// Requested timeout
        timeout_ms: u64,
        /// Largest accepted timeout
        max_ms: u64,
    },

    /// Operation discriminator not understood by the guard
    #[error("Unsupported guard operation: {0:?}")]
    UnsupportedOperation(String),
}

/// Operations reachable through [`TimeoutGuard::call`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GuardOp {
    /// [`TimeoutGuard::poll`]
    Poll,
    /// [`TimeoutGuard::debug_snapshot`]
    DebugSnapshot,
}

impl FromStr for GuardOp {
    type Err = GuardError;

    fn from_str(op: &str) -> Result<Self, Self::Err> {
        match op {
            "poll" => Ok(Self::Poll),
            "debug" | "snapshot" | "debug_snapshot" => Ok(Self::DebugSnapshot),
            other => Err(GuardError::UnsupportedOperation(other.to_owned())),
        }
    }
}

impl fmt::Display for GuardOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Poll => f.write_str("poll"),
            Self::DebugSnapshot => f.write_str("debug"),
        }
    }
}

/// Result of a dispatched [`GuardOp`]
#[derive(Debug, Clone, PartialEq)]
pub enum GuardReply {
    /// Answer of `poll`; `true` means stop
    Poll(bool),
    /// Answer of `debug_snapshot`
    Snapshot(Box<DebugRecord>),
}

impl GuardReply {
    /// The stop signal, if this reply came from `poll`
    #[must_use]
    pub const fn should_stop(&self) -> Option<bool> {
        match self {
            Self::Poll(stop) => Some(*stop),
            Self::Snapshot(_) => None,
        }
    }

    /// The record, if this reply came from `debug_snapshot`
    #[must_use]
    pub fn into_snapshot(self) -> Option<DebugRecord> {
        match self {
            Self::Poll(_) => None,
            Self::Snapshot(record) => Some(*record),
        }
    }
}

/// Cooperative deadline guard for a single computation
///
/// See the [module documentation](self) for the polling model.
#[derive(Debug)]
pub struct TimeoutGuard<C: MonotonicClock = Box<dyn MonotonicClock + Send>> {
    clock: C,

    timeout_ms: u64,
    start_us: u64,
    deadline_us: u64,
    target_overshoot_us: u64,

    last_sample_us: u64,
    steps_since_sample: u64,
    stride: u32,
    stats: StepStats,

    timed_out: bool,
    detected_at_us: u64, /* 0 until tripped */

    check_count: u64,
    sample_count: u64,
    panic_count: u64,
    stride_shrink_count: u64,
    stride_min: u32,
    stride_max: u32,
    burn_max: f64,
}

/// Creates a guard on the platform clock
///
/// Never fails: timeouts outside `1..=MAX_TIMEOUT_MS` are clamped into range.
/// Use [`TimeoutGuard::try_new`] to reject them instead.
#[must_use]
pub fn create_timeout_guard(timeout_ms: u64) -> TimeoutGuard {
    TimeoutGuard::with_clock(timeout_ms, create_clock())
}

impl TimeoutGuard {
    /// Creates a guard on the platform clock
    ///
    /// # Errors
    ///
    /// Returns `GuardError::InvalidTimeout` for `timeout_ms == 0` or
    /// `timeout_ms > MAX_TIMEOUT_MS`.
    pub fn try_new(timeout_ms: u64) -> GuardResult<Self> {
        Self::try_with_clock(timeout_ms, create_clock())
    }
}

impl<C: MonotonicClock> TimeoutGuard<C> {
    /// Creates a guard reading `clock`
    ///
    /// # Errors
    ///
    /// Returns `GuardError::InvalidTimeout` for `timeout_ms == 0` or
    /// `timeout_ms > MAX_TIMEOUT_MS`.
    pub fn try_with_clock(timeout_ms: u64, clock: C) -> GuardResult<Self> {
        if !(1..=MAX_TIMEOUT_MS).contains(&timeout_ms) {
            return Err(GuardError::InvalidTimeout {
                timeout_ms,
                max_ms: MAX_TIMEOUT_MS,
            });
        }

        Ok(Self::armed(timeout_ms, clock))
    }

    /// Creates a guard reading `clock`, clamping the timeout into range
    #[must_use]
    pub fn with_clock(timeout_ms: u64, clock: C) -> Self {
        let clamped = timeout_ms.clamp(1, MAX_TIMEOUT_MS);

        #[cfg(feature = "tracing")]
        if clamped != timeout_ms {
            warn!(
                requested_ms = timeout_ms,
                clamped_ms = clamped,
                "Timeout out of range, clamped"
            );
        }

        Self::armed(clamped, clock)
    }

    fn armed(timeout_ms: u64, clock: C) -> Self {
        let start_us = clock.now_us();

        Self {
            clock,
            timeout_ms,
            start_us,
            deadline_us: start_us.saturating_add(timeout_ms * 1_000),
            target_overshoot_us: stride::target_overshoot_us(timeout_ms),
            last_sample_us: start_us,
            steps_since_sample: 0,
            stride: MIN_STRIDE,
            stats: StepStats::new(),
            timed_out: false,
            detected_at_us: 0,
            check_count: 0,
            sample_count: 0,
            panic_count: 0,
            stride_shrink_count: 0,
            stride_min: u32::MAX,
            stride_max: MIN_STRIDE,
            burn_max: 0.0,
        }
    }

    /// Records one unit of progress and reports whether to stop
    ///
    /// Returns `true` once the deadline has passed, and on every call after.
    #[inline]
    pub fn poll(&mut self) -> bool {
        self.steps_since_sample += 1;
        self.check_count += 1;

        if self.steps_since_sample < u64::from(self.stride) {
            return false;
        }

        self.sample()
    }

    #[inline(never)]
    fn sample(&mut self) -> bool {
        if self.timed_out {
            return true;
        }

        let now = self.clock.now_us();
        self.sample_count += 1;

        if now >= self.deadline_us {
            self.trip(now);
            return true;
        }

        let remaining_us = i64::try_from(self.deadline_us - now).unwrap_or(i64::MAX);
        let elapsed_us = now.saturating_sub(self.last_sample_us);

        self.stats
            .observe(elapsed_us as f64 / self.steps_since_sample as f64);

        let burn = stride::burn_ratio(elapsed_us, remaining_us);
        self.burn_max = self.burn_max.max(burn);

        let panic = stride::is_panic(burn);
        if panic {
            self.panic_count += 1;

            #[cfg(feature = "tracing")]
            trace!(
                burn,
                remaining_us,
                elapsed_us,
                steps = self.steps_since_sample,
                "Timeout guard entering panic mode"
            );
        }

        let new_stride = stride::next_stride(
            remaining_us,
            self.target_overshoot_us,
            self.stats.effective_step(),
            panic,
        );

        self.stride_min = self.stride_min.min(new_stride);
        self.stride_max = self.stride_max.max(new_stride);
        if new_stride < self.stride {
            self.stride_shrink_count += 1;
        }

        self.last_sample_us = now;
        self.steps_since_sample = 0;
        self.stride = new_stride;

        false
    }

    fn trip(&mut self, now: u64) {
        self.timed_out = true;
        if self.detected_at_us == 0 {
            self.detected_at_us = now;
        }

        #[cfg(feature = "tracing")]
        debug!(
            timeout_ms = self.timeout_ms,
            deadline_us = self.deadline_us,
            detected_at_us = self.detected_at_us,
            overshoot_us = now - self.deadline_us,
            target_overshoot_us = self.target_overshoot_us,
            checks = self.check_count,
            samples = self.sample_count,
            "Timeout guard tripped"
        );
    }

    /// Captures the guard's state together with a fresh clock reading
    ///
    /// Does not modify the guard.
    #[must_use]
    pub fn debug_snapshot(&self) -> DebugRecord {
        let now_us = self.clock.now_us();

        DebugRecord {
            timeout_flag: self.timed_out,
            start_us: self.start_us,
            now_us,
            deadline_us: self.deadline_us,
            detected_at_us: self.detected_at_us,
            overshoot_us: now_us.saturating_sub(self.deadline_us),
            target_overshoot_us: self.target_overshoot_us,
            check_count: self.check_count,
            sample_count: self.sample_count,
            panic_count: self.panic_count,
            stride_final: self.stride,
            // Before the first sample this reads as the current stride
            stride_min: self.stride_min.min(self.stride),
            stride_max: self.stride_max,
            stride_shrink_count: self.stride_shrink_count,
            mean_step_us: self.stats.mean(),
            var_step_us: self.stats.var(),
            p95_proxy_us: self.stats.p95_proxy(),
            decayed_max_us: self.stats.decayed_max(),
            effective_step_us: self.stats.effective_step(),
            burn_max: self.burn_max,
        }
    }

    /// Runs `op` parsed from its name
    ///
    /// # Errors
    ///
    /// Returns `GuardError::UnsupportedOperation` if `op` does not name an
    /// operation.
    pub fn call(&mut self, op: &str) -> GuardResult<GuardReply> {
        let op: GuardOp = op.parse()?;
        Ok(self.dispatch(op))
    }

    /// Runs `op`
    pub fn dispatch(&mut self, op: GuardOp) -> GuardReply {
        match op {
            GuardOp::Poll => GuardReply::Poll(self.poll()),
            GuardOp::DebugSnapshot => GuardReply::Snapshot(Box::new(self.debug_snapshot())),
        }
    }

    /// Whether the guard has tripped
    #[inline]
    #[must_use]
    pub const fn is_timed_out(&self) -> bool {
        self.timed_out
    }

    /// Requested timeout after clamping
    #[inline]
    #[must_use]
    pub const fn timeout_ms(&self) -> u64 {
        self.timeout_ms
    }

    /// Construction time (us)
    #[inline]
    #[must_use]
    pub const fn start_us(&self) -> u64 {
        self.start_us
    }

    /// Deadline (us)
    #[inline]
    #[must_use]
    pub const fn deadline_us(&self) -> u64 {
        self.deadline_us
    }

    /// Overshoot target (us)
    #[inline]
    #[must_use]
    pub const fn target_overshoot_us(&self) -> u64 {
        self.target_overshoot_us
    }

    /// Clock the guard reads
    #[inline]
    #[must_use]
    pub const fn clock(&self) -> &C {
        &self.clock
    }
}
