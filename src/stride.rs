#![forbid(unsafe_code)]

//     ______   __  __     __         ______     ______
//    /\  == \ /\ \/\ \   /\ \       /\  ___\   /\  ___\
//    \ \  _-/ \ \ \_\ \  \ \ \____  \ \___  \  \ \  __\
//     \ \_\    \ \_____\  \ \_____\  \/\_____\  \ \_____\
//      \/_/     \/_____/   \/_____/   \/_____/   \/_____/
//
// Author: Colin MacRitchie / Ripple Group
//! Stride Controller
//!
//! Decides how many polls the guard may answer without reading the clock.
//!
//! # Model
//!
//! The remaining slack, minus the overshoot target, is divided by twice a
//! conservative estimate of the cost of one poll:
//!
//! ```text
//! budget   = max(remaining - target_overshoot, target_overshoot)
//! k_base   = floor(budget / (2 * effective_step))
//! k_time   = floor(10ms   / (2 * effective_step))
//! stride   = clamp(min(k_base, k_time), 1, 2^20)
//! ```
//!
//! `k_time` caps staleness at roughly ten milliseconds no matter how cheap
//! polls look. When a single sampling window consumed more than a third of
//! the time that was left (the burn ratio), the model is not trusted and the
//! stride collapses to one.
//!
//! All durations are in microseconds.

/// Smallest stride; sample on every poll
pub const MIN_STRIDE: u32 = 1;

/// Largest stride
pub const MAX_STRIDE: u32 = 1 << 20;

/// Cap on the overshoot target
pub const MAX_OVERSHOOT_US: u64 = 10_000;

/// Overshoot target per millisecond of timeout (5%)
pub const OVERSHOOT_US_PER_MS: u64 = 50;

/// Divisor applied on top of the effective step
pub const SAFETY_FACTOR: f64 = 2.0;

/// Longest stretch the stride may cover at the estimated step cost
pub const CEILING_WINDOW_US: f64 = 10_000.0;

/// Burn ratio above which the controller panics
pub const PANIC_BURN: f64 = 0.33;

/// Overshoot the guard aims for: `min(10ms, 5% of timeout)`
///
/// ```rust
/// use pulse_guard::stride::target_overshoot_us;
///
/// assert_eq!(target_overshoot_us(100), 5_000);
/// assert_eq!(target_overshoot_us(500), 10_000);
/// ```
#[inline]
#[must_use]
pub const fn target_overshoot_us(timeout_ms: u64) -> u64 {
    let target = timeout_ms.saturating_mul(OVERSHOOT_US_PER_MS);
    if target < MAX_OVERSHOOT_US {
        target
    } else {
        MAX_OVERSHOOT_US
    }
}

/// Fraction of the remaining time consumed by the last sampling window
///
/// Returns 1.0 when nothing remains.
#[inline]
#[must_use]
pub fn burn_ratio(elapsed_us: u64, remaining_us: i64) -> f64 {
    if remaining_us > 0 {
        elapsed_us as f64 / remaining_us as f64
    } else {
        1.0
    }
}

/// Whether a burn ratio calls for panic mode
#[inline]
#[must_use]
pub fn is_panic(burn: f64) -> bool {
    burn > PANIC_BURN
}

/// Number of polls to skip before the next clock read
#[must_use]
pub fn next_stride(
    remaining_us: i64,
    target_overshoot_us: u64,
    effective_step_us: f64,
    panic: bool,
) -> u32 {
    if panic {
        return MIN_STRIDE;
    }

    let target = target_overshoot_us as f64;
    let budget = (remaining_us as f64 - target).max(target);
    let per_poll = SAFETY_FACTOR * effective_step_us;

    let k_base = (budget / per_poll).floor();
    let k_time = (CEILING_WINDOW_US / per_poll).floor();

    // NaN or negative inputs clamp to the minimum
    let k = k_base.min(k_time);
    if k.is_nan() || k < f64::from(MIN_STRIDE) {
        MIN_STRIDE
    } else if k > f64::from(MAX_STRIDE) {
        MAX_STRIDE
    } else {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let stride = k as u32;
        stride
    }
}
