//! Pulse-Guard: Self-Clocking Timeout Guard for CPU-Bound Loops
//!
//! Bounds the duration of a single-threaded computation without a watchdog
//! thread, timer, or signal. The computation polls a guard at its natural loop
//! boundaries; the guard answers `true` once the deadline has passed.
//!
//! # Features
//!
//! - **Adaptive sampling**: the clock is read only every `stride` polls; the
//!   stride is re-planned from observed per-poll cost at every sample
//! - **Tail hedge**: a decayed maximum keeps a recent slow step in the plan
//! - **Panic mode**: a sampling window that ate a third of the remaining time
//!   drops the stride to one
//! - **Introspection**: `debug_snapshot` exposes every statistic for testing
//!
//! # Performance
//!
//! - Fast path: two increments and a compare, no clock read, no allocation
//! - Detection lag target: `min(10ms, 5% of timeout)`
//! - No background resources; dropping the guard is the only teardown
//!
//! # Example
//!
//! ```rust
//! use pulse_guard::create_timeout_guard;
//!
//! let mut guard = create_timeout_guard(20);
//! let mut best = 0u64;
//!
//! for candidate in 0u64.. {
//!     if guard.poll() {
//!         break;
//!     }
//!     best = best.max(candidate.wrapping_mul(2654435761) % 1_000_003);
//! }
//!
//! assert!(guard.is_timed_out());
//! # std::hint::black_box(best);
//! ```
//!
//! # Cargo Features
//!
//! - `tracing`: events on trip, panic mode and timeout clamping
//! - `metrics`: publish aggregated guard statistics through the `metrics` facade
//! - `serde`: serialize `DebugRecord`

#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(missing_docs)]
#![warn(rust_2018_idioms)]

//     ______   __  __     __         ______     ______
//    /\  == \ /\ \/\ \   /\ \       /\  ___\   /\  ___\
//    \ \  _-/ \ \ \_\ \  \ \ \____  \ \___  \  \ \  __\
//     \ \_\    \ \_____\  \ \_____\  \/\_____\  \ \_____\
//      \/_/     \/_____/   \/_____/   \/_____/   \/_____/
//
// Author: Colin MacRitchie / Ripple Group
/// Timeout guard and its operation entry point
pub mod guard;
/// Aggregation of guard snapshots
pub mod metrics;
/// Introspection record
pub mod snapshot;
/// Per-poll cost statistics
pub mod stats;
/// Stride planning and panic detection
pub mod stride;
/// Monotonic clock sources
pub mod timing;

// Public API exports
pub use guard::{
    GuardError, GuardOp, GuardReply, GuardResult, MAX_TIMEOUT_MS, TimeoutGuard,
    create_timeout_guard,
};
pub use metrics::{DerivedMetrics, GuardMetrics, MetricsSnapshot};
pub use snapshot::DebugRecord;
pub use timing::{MonotonicClock, TimingError, create_clock};
