#![allow(unsafe_code)] // clock_gettime requires unsafe

//     ______   __  __     __         ______     ______
//    /\  == \ /\ \/\ \   /\ \       /\  ___\   /\  ___\
//    \ \  _-/ \ \ \_\ \  \ \ \____  \ \___  \  \ \  __\
//     \ \_\    \ \_____\  \ \_____\  \/\_____\  \ \_____\
//      \/_/     \/_____/   \/_____/   \/_____/   \/_____/
//
// Author: Colin MacRitchie / Ripple Group
// Linux monotonic clock via clock_gettime
use libc::{CLOCK_MONOTONIC, clock_gettime, timespec};
use std::cell::Cell;

use super::{MonotonicClock, TimingError};

/// `CLOCK_MONOTONIC` clock with microsecond readings
#[derive(Debug)]
pub struct LinuxClock {
    // Last reading (us), regression clamp
    last_us: Cell<u64>,
}

impl LinuxClock {
    /// Creates the clock, verifying that `clock_gettime` works
    ///
    /// # Errors
    ///
    /// Returns `TimingError::SystemCallFailed` if the first read fails.
    pub fn new() -> Result<Self, TimingError> {
        let initial = Self::read_raw_us()?;

        Ok(Self {
            last_us: Cell::new(initial),
        })
    }

    #[inline]
    fn read_raw_us() -> Result<u64, TimingError> {
        let mut ts = timespec {
            tv_sec: 0,
            tv_nsec: 0,
        };

        // SAFETY: Valid timespec and clock ID
        let ret = unsafe { clock_gettime(CLOCK_MONOTONIC, &mut ts) };

        if ret == 0 {
            let secs_us = (ts.tv_sec as u64).saturating_mul(1_000_000);
            Ok(secs_us.saturating_add(ts.tv_nsec as u64 / 1_000))
        } else {
            Err(TimingError::SystemCallFailed(std::io::Error::last_os_error()))
        }
    }
}

impl MonotonicClock for LinuxClock {
    #[inline]
    fn now_us(&self) -> u64 {
        let last = self.last_us.get();
        // A failed read after construction repeats the last reading
        let now = Self::read_raw_us().map_or(last, |raw| raw.max(last));
        self.last_us.set(now);
        now
    }

    fn source_name(&self) -> &'static str {
        "Linux (CLOCK_MONOTONIC)"
    }
}
