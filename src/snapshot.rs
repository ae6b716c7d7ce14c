#![forbid(unsafe_code)]

//     ______   __  __     __         ______     ______
//    /\  == \ /\ \/\ \   /\ \       /\  ___\   /\  ___\
//    \ \  _-/ \ \ \_\ \  \ \ \____  \ \___  \  \ \  __\
//     \ \_\    \ \_____\  \ \_____\  \/\_____\  \ \_____\
//      \/_/     \/_____/   \/_____/   \/_____/   \/_____/
//
// Author: Colin MacRitchie / Ripple Group
// Introspection record for tests and diagnostics
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Point-in-time view of a guard's state
///
/// Produced by `TimeoutGuard::debug_snapshot`. All timestamps and durations are
/// microseconds on the guard's clock.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DebugRecord {
    /// Guard has tripped
    pub timeout_flag: bool,
    /// Construction time
    pub start_us: u64,
    /// Clock reading taken for this snapshot
    pub now_us: u64,
    /// Deadline
    pub deadline_us: u64,
    /// First time the guard reported a timeout, 0 if it has not
    pub detected_at_us: u64,
    /// `max(0, now_us - deadline_us)`
    pub overshoot_us: u64,
    /// Overshoot the controller aims for
    pub target_overshoot_us: u64,
    /// Polls
    pub check_count: u64,
    /// Clock reads taken by polls
    pub sample_count: u64,
    /// Samples that entered panic mode
    pub panic_count: u64,
    /// Current stride
    pub stride_final: u32,
    /// Smallest stride chosen so far
    pub stride_min: u32,
    /// Largest stride chosen so far
    pub stride_max: u32,
    /// Times a sample shrank the stride
    pub stride_shrink_count: u64,
    /// Smoothed cost per poll
    pub mean_step_us: f64,
    /// Smoothed variance of the cost per poll
    pub var_step_us: f64,
    /// `mean + 1.64485 * sqrt(var)`
    pub p95_proxy_us: f64,
    /// Decayed running maximum of the cost per poll
    pub decayed_max_us: f64,
    /// `max(p95_proxy, decayed_max, 1.0)`
    pub effective_step_us: f64,
    /// Highest burn ratio seen
    pub burn_max: f64,
}

impl DebugRecord {
    /// Fraction of polls that read the clock
    #[must_use]
    pub fn sample_ratio(&self) -> f64 {
        if self.check_count == 0 {
            0.0
        } else {
            self.sample_count as f64 / self.check_count as f64
        }
    }

    /// Whether the guard has tripped
    #[must_use]
    pub const fn is_tripped(&self) -> bool {
        self.timeout_flag
    }

    /// Lag between deadline and detection, if the guard has tripped
    #[must_use]
    pub const fn detection_lag_us(&self) -> Option<u64> {
        if self.detected_at_us == 0 {
            None
        } else {
            Some(self.detected_at_us.saturating_sub(self.deadline_us))
        }
    }

    /// Whether detection landed within the overshoot target
    ///
    /// `false` for a guard that has not tripped.
    #[must_use]
    pub const fn overshoot_within_target(&self) -> bool {
        match self.detection_lag_us() {
            Some(lag) => lag <= self.target_overshoot_us,
            None => false,
        }
    }
}

impl fmt::Display for DebugRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Guard[{}: elapsed={}us, deadline_in={}us, checks={}, samples={}, panics={}, \
             stride={} ({}..={}), step={:.3}us, burn_max={:.3}]",
            if self.timeout_flag { "tripped" } else { "armed" },
            self.now_us.saturating_sub(self.start_us),
            self.deadline_us as i128 - self.now_us as i128,
            self.check_count,
            self.sample_count,
            self.panic_count,
            self.stride_final,
            self.stride_min,
            self.stride_max,
            self.effective_step_us,
            self.burn_max,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> DebugRecord {
        DebugRecord {
            timeout_flag: false,
            start_us: 1_000,
            now_us: 51_000,
            deadline_us: 101_000,
            detected_at_us: 0,
            overshoot_us: 0,
            target_overshoot_us: 5_000,
            check_count: 400,
            sample_count: 4,
            panic_count: 0,
            stride_final: 120,
            stride_min: 1,
            stride_max: 130,
            stride_shrink_count: 1,
            mean_step_us: 9.0,
            var_step_us: 4.0,
            p95_proxy_us: 9.0 + 1.64485 * 2.0,
            decayed_max_us: 11.0,
            effective_step_us: 12.2897,
            burn_max: 0.01,
        }
    }

    #[test]
    fn test_sample_ratio() {
        assert_eq!(record().sample_ratio(), 0.01);

        let empty = DebugRecord {
            check_count: 0,
            sample_count: 0,
            ..record()
        };
        assert_eq!(empty.sample_ratio(), 0.0);
    }

    #[test]
    fn test_detection_lag() {
        let armed = record();
        assert_eq!(armed.detection_lag_us(), None);
        assert!(!armed.overshoot_within_target());

        let tripped = DebugRecord {
            timeout_flag: true,
            detected_at_us: 104_000,
            ..record()
        };
        assert!(tripped.is_tripped());
        assert_eq!(tripped.detection_lag_us(), Some(3_000));
        assert!(tripped.overshoot_within_target());

        let late = DebugRecord {
            detected_at_us: 120_000,
            ..tripped
        };
        assert!(!late.overshoot_within_target());
    }

    #[test]
    fn test_display() {
        let text = record().to_string();

        assert!(text.starts_with("Guard[armed"));
        assert!(text.contains("elapsed=50000us"));
        assert!(text.contains("deadline_in=50000us"));
        assert!(text.contains("stride=120 (1..=130)"));
    }
}
