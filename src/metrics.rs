//     ______   __  __     __         ______     ______
//    /\  == \ /\ \/\ \   /\ \       /\  ___\   /\  ___\
//    \ \  _-/ \ \ \_\ \  \ \ \____  \ \___  \  \ \  __\
//     \ \_\    \ \_____\  \ \_____\  \/\_____\  \ \_____\
//      \/_/     \/_____/   \/_____/   \/_____/   \/_____/
//
// Author: Colin MacRitchie / Ripple Group
//! Aggregated guard statistics
//!
//! Collects `DebugRecord`s from finished guards so detection quality can be
//! judged across many runs: how often guards read the clock, how often they
//! trip, and how far past the deadline they land. Guards never write here;
//! callers observe a snapshot once a computation is done.

#![forbid(unsafe_code)]

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

#[cfg(feature = "metrics")]
use metrics::{counter, gauge, histogram};

#[cfg(feature = "tracing")]
use tracing::debug;

use crate::snapshot::DebugRecord;

/// Aggregate over observed guard snapshots
#[derive(Debug)]
pub struct GuardMetrics {
    /// Number of snapshots observed
    pub guards_observed: AtomicU64,

    /// Observed guards that had tripped
    pub guards_tripped: AtomicU64,

    /// Total polls across observed guards
    pub total_checks: AtomicU64,

    /// Total clock reads across observed guards
    pub total_samples: AtomicU64,

    /// Total panic-mode entries
    pub total_panics: AtomicU64,

    /// Total stride shrinks
    pub total_stride_shrinks: AtomicU64,

    /// Sum of detection lag of tripped guards (us)
    pub overshoot_sum_us: AtomicU64,

    /// Largest detection lag seen (us)
    pub overshoot_max_us: AtomicU64,

    /// Tripped guards whose lag stayed within their target
    pub within_target: AtomicU64,

    /// Creation time for rate calculation
    start_time: Instant,
}

impl GuardMetrics {
    /// Create an empty aggregate
    #[must_use]
    pub fn new() -> Self {
        Self {
            guards_observed: AtomicU64::new(0),
            guards_tripped: AtomicU64::new(0),
            total_checks: AtomicU64::new(0),
            total_samples: AtomicU64::new(0),
            total_panics: AtomicU64::new(0),
            total_stride_shrinks: AtomicU64::new(0),
            overshoot_sum_us: AtomicU64::new(0),
            overshoot_max_us: AtomicU64::new(0),
            within_target: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    /// Fold one guard snapshot into the aggregate
    pub fn observe(&self, record: &DebugRecord) {
        self.guards_observed.fetch_add(1, Ordering::Relaxed);
        self.total_checks.fetch_add(record.check_count, Ordering::Relaxed);
        self.total_samples.fetch_add(record.sample_count, Ordering::Relaxed);
        self.total_panics.fetch_add(record.panic_count, Ordering::Relaxed);
        self.total_stride_shrinks
            .fetch_add(record.stride_shrink_count, Ordering::Relaxed);

        #[cfg(feature = "metrics")]
        {
            counter!("pulse_guard_observed_total").increment(1);
            counter!("pulse_guard_checks_total").increment(record.check_count);
            counter!("pulse_guard_samples_total").increment(record.sample_count);
            counter!("pulse_guard_panics_total").increment(record.panic_count);
            gauge!("pulse_guard_last_stride").set(f64::from(record.stride_final));
        }

        if let Some(lag) = record.detection_lag_us() {
            self.record_trip(lag, record.target_overshoot_us);
        }
    }

    fn record_trip(&self, lag_us: u64, target_us: u64) {
        self.guards_tripped.fetch_add(1, Ordering::Relaxed);
        self.overshoot_sum_us.fetch_add(lag_us, Ordering::Relaxed);
        self.overshoot_max_us.fetch_max(lag_us, Ordering::Relaxed);
        if lag_us <= target_us {
            self.within_target.fetch_add(1, Ordering::Relaxed);
        }

        #[cfg(feature = "tracing")]
        debug!(lag_us = lag_us, target_us = target_us, "Guard trip observed");

        #[cfg(feature = "metrics")]
        {
            counter!("pulse_guard_trips_total").increment(1);
            histogram!("pulse_guard_overshoot_microseconds").record(lag_us as f64);
        }
    }

    /// Get snapshot of current values
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            guards_observed: self.guards_observed.load(Ordering::Relaxed),
            guards_tripped: self.guards_tripped.load(Ordering::Relaxed),
            total_checks: self.total_checks.load(Ordering::Relaxed),
            total_samples: self.total_samples.load(Ordering::Relaxed),
            total_panics: self.total_panics.load(Ordering::Relaxed),
            total_stride_shrinks: self.total_stride_shrinks.load(Ordering::Relaxed),
            overshoot_sum_us: self.overshoot_sum_us.load(Ordering::Relaxed),
            overshoot_max_us: self.overshoot_max_us.load(Ordering::Relaxed),
            within_target: self.within_target.load(Ordering::Relaxed),
            uptime_seconds: self.start_time.elapsed().as_secs_f64(),
        }
    }

    /// Calculate derived metrics
    #[must_use]
    pub fn derived_metrics(&self) -> DerivedMetrics {
        let snapshot = self.snapshot();
        let ratio = |num: u64, den: u64| {
            if den > 0 { num as f64 / den as f64 } else { 0.0 }
        };

        DerivedMetrics {
            sample_rate: ratio(snapshot.total_samples, snapshot.total_checks),
            trip_rate: ratio(snapshot.guards_tripped, snapshot.guards_observed),
            panic_rate: ratio(snapshot.total_panics, snapshot.total_samples),
            mean_overshoot_us: ratio(snapshot.overshoot_sum_us, snapshot.guards_tripped),
            within_target_rate: ratio(snapshot.within_target, snapshot.guards_tripped),
        }
    }
}

impl Default for GuardMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time snapshot of aggregated values
#[derive(Debug, Clone, PartialEq)]
pub struct MetricsSnapshot {
    /// Snapshots observed
    pub guards_observed: u64,
    /// Tripped guards observed
    pub guards_tripped: u64,
    /// Total polls
    pub total_checks: u64,
    /// Total clock reads
    pub total_samples: u64,
    /// Total panic-mode entries
    pub total_panics: u64,
    /// Total stride shrinks
    pub total_stride_shrinks: u64,
    /// Sum of detection lag (us)
    pub overshoot_sum_us: u64,
    /// Largest detection lag (us)
    pub overshoot_max_us: u64,
    /// Tripped guards within their overshoot target
    pub within_target: u64,
    /// Seconds since the aggregate was created
    pub uptime_seconds: f64,
}

/// Rates calculated from the aggregate
#[derive(Debug, Clone, PartialEq)]
pub struct DerivedMetrics {
    /// Clock reads per poll
    pub sample_rate: f64,
    /// Tripped guards per observed guard
    pub trip_rate: f64,
    /// Panic-mode entries per clock read
    pub panic_rate: f64,
    /// Mean detection lag of tripped guards (us)
    pub mean_overshoot_us: f64,
    /// Fraction of tripped guards within their overshoot target
    pub within_target_rate: f64,
}

/// Process-wide aggregate (when the metrics feature is enabled)
#[cfg(feature = "metrics")]
static GLOBAL_METRICS: std::sync::LazyLock<GuardMetrics> = std::sync::LazyLock::new(GuardMetrics::new);

/// Get the process-wide aggregate
#[cfg(feature = "metrics")]
#[must_use]
pub fn global_metrics() -> &'static GuardMetrics {
    &GLOBAL_METRICS
}

/// Register the guard series with zero values
#[cfg(feature = "metrics")]
pub fn init_metrics() {
    #[cfg(feature = "tracing")]
    tracing::info!("Initializing pulse-guard metrics");

    counter!("pulse_guard_observed_total").absolute(0);
    counter!("pulse_guard_checks_total").absolute(0);
    counter!("pulse_guard_samples_total").absolute(0);
    counter!("pulse_guard_panics_total").absolute(0);
    counter!("pulse_guard_trips_total").absolute(0);
    gauge!("pulse_guard_last_stride").set(0.0);
}
