#![forbid(unsafe_code)]

//     ______   __  __     __         ______     ______
//    /\  == \ /\ \/\ \   /\ \       /\  ___\   /\  ___\
//    \ \  _-/ \ \ \_\ \  \ \ \____  \ \___  \  \ \  __\
//     \ \_\    \ \_____\  \ \_____\  \/\_____\  \ \_____\
//      \/_/     \/_____/   \/_____/   \/_____/   \/_____/
//
// Author: Colin MacRitchie / Ripple Group
// Portable clock using std::time::Instant
use std::sync::OnceLock;
use std::time::Instant;

use super::MonotonicClock;

/// Process-wide origin so every `InstantClock` shares one timeline
static EPOCH: OnceLock<Instant> = OnceLock::new();

/// Offset added to every reading so timestamps are never zero
const EPOCH_OFFSET_US: u64 = 1;

/// Portable clock built on `std::time::Instant`
///
/// `Instant` is monotonic on every supported platform. Readings are
/// microseconds since the first `InstantClock` was created in this process.
#[derive(Debug, Clone, Copy)]
pub struct InstantClock {
    epoch: Instant,
}

impl InstantClock {
    /// Creates a clock on the process-wide timeline
    #[must_use]
    pub fn new() -> Self {
        Self {
            epoch: *EPOCH.get_or_init(Instant::now),
        }
    }
}

impl MonotonicClock for InstantClock {
    #[inline]
    fn now_us(&self) -> u64 {
        #[allow(clippy::cast_possible_truncation)]
        let micros = self.epoch.elapsed().as_micros() as u64;
        micros.saturating_add(EPOCH_OFFSET_US)
    }

    fn source_name(&self) -> &'static str {
        "Instant"
    }
}

impl Default for InstantClock {
    fn default() -> Self {
        Self::new()
    }
}
