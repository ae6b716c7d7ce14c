#![forbid(unsafe_code)]

//     ______   __  __     __         ______     ______
//    /\  == \ /\ \/\ \   /\ \       /\  ___\   /\  ___\
//    \ \  _-/ \ \ \_\ \  \ \ \____  \ \___  \  \ \  __\
//     \ \_\    \ \_____\  \ \_____\  \/\_____\  \ \_____\
//      \/_/     \/_____/   \/_____/   \/_____/   \/_____/
//
// Author: Colin MacRitchie / Ripple Group
// Manually driven clock for deterministic tests
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use super::MonotonicClock;

/// Clock whose time only moves when told to
///
/// Clones share the same time, so a test can hand one clone to a guard and
/// keep another to advance it.
///
/// ```rust
/// use pulse_guard::timing::{ManualClock, MonotonicClock};
///
/// let clock = ManualClock::new(1_000);
/// let handle = clock.clone();
///
/// handle.advance(250);
/// assert_eq!(clock.now_us(), 1_250);
/// ```
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now_us: Arc<AtomicU64>,
}

impl ManualClock {
    /// Creates a clock reading `start_us`
    #[must_use]
    pub fn new(start_us: u64) -> Self {
        Self {
            now_us: Arc::new(AtomicU64::new(start_us)),
        }
    }

    /// Moves time forward by `delta_us`
    #[inline]
    pub fn advance(&self, delta_us: u64) {
        self.now_us.fetch_add(delta_us, Ordering::Relaxed);
    }

    /// Moves time to `now_us`; earlier values are ignored
    #[inline]
    pub fn set(&self, now_us: u64) {
        self.now_us.fetch_max(now_us, Ordering::Relaxed);
    }
}

impl MonotonicClock for ManualClock {
    #[inline]
    fn now_us(&self) -> u64 {
        self.now_us.load(Ordering::Relaxed)
    }

    fn source_name(&self) -> &'static str {
        "Manual"
    }
}
