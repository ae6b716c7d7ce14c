#![forbid(unsafe_code)]

//     ______   __  __     __         ______     ______
//    /\  == \ /\ \/\ \   /\ \       /\  ___\   /\  ___\
//    \ \  _-/ \ \ \_\ \  \ \ \____  \ \___  \  \ \  __\
//     \ \_\    \ \_____\  \ \_____\  \/\_____\  \ \_____\
//      \/_/     \/_____/   \/_____/   \/_____/   \/_____/
//
// Author: Colin MacRitchie / Ripple Group
//! Per-poll cost statistics
//!
//! Tracks the cost of a single poll as a noisy signal: an exponentially
//! weighted mean and variance give a p95 estimate, and a geometrically decaying
//! maximum keeps a recent expensive step visible after the mean has recovered.
//!
//! All values are in microseconds.

/// EWMA/EWVAR smoothing factor
pub const EWMA_ALPHA: f64 = 0.05;

/// Upper bound on the variance estimate
pub const VAR_CAP: f64 = 1e18;

/// Per-sample decay of the running maximum
pub const MAX_DECAY: f64 = 0.98;

/// One-sided z-score of the 95th percentile
pub const Z_95: f64 = 1.64485;

/// Floor of the effective step cost
pub const MIN_STEP_US: f64 = 1.0;

/// Cold-start value for mean, variance and decayed max
pub const PRIOR_STEP_US: f64 = 10.0;

/// Running statistics over observed per-poll cost
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepStats {
    mean: f64,
    var: f64,
    decayed_max: f64,
}

impl StepStats {
    /// Creates statistics seeded with the conservative prior
    #[must_use]
    pub const fn new() -> Self {
        Self {
            mean: PRIOR_STEP_US,
            var: PRIOR_STEP_US,
            decayed_max: PRIOR_STEP_US,
        }
    }

    /// Folds one per-poll cost sample into the estimates
    #[inline]
    pub fn observe(&mut self, x: f64) {
        let delta = x - self.mean;
        self.mean += EWMA_ALPHA * delta;
        self.var = ((1.0 - EWMA_ALPHA) * self.var + EWMA_ALPHA * delta * delta).min(VAR_CAP);
        self.decayed_max = x.max(self.decayed_max * MAX_DECAY).max(MIN_STEP_US);
    }

    /// Smoothed mean cost per poll
    #[inline]
    #[must_use]
    pub const fn mean(&self) -> f64 {
        self.mean
    }

    /// Smoothed variance of the cost per poll
    #[inline]
    #[must_use]
    pub const fn var(&self) -> f64 {
        self.var
    }

    /// Decayed running maximum, never below one microsecond
    #[inline]
    #[must_use]
    pub const fn decayed_max(&self) -> f64 {
        self.decayed_max
    }

    /// `mean + z95 * stddev`
    #[inline]
    #[must_use]
    pub fn p95_proxy(&self) -> f64 {
        self.mean + Z_95 * self.var.max(0.0).sqrt()
    }

    /// Cost per poll the stride controller plans with
    ///
    /// The p95 proxy hedged by the decayed max, never below one microsecond.
    #[inline]
    #[must_use]
    pub fn effective_step(&self) -> f64 {
        self.p95_proxy().max(self.decayed_max).max(MIN_STEP_US)
    }
}

impl Default for StepStats {
    fn default() -> Self {
        Self::new()
    }
}
