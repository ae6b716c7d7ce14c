//! Scenario tests for TimeoutGuard on the system clock

use std::thread;
use std::time::{Duration, Instant};

use pulse_guard::{GuardError, GuardMetrics, TimeoutGuard, create_timeout_guard};

/// Polls until the guard reads the clock again, giving up after `limit` polls
fn poll_until_sample(guard: &mut TimeoutGuard, limit: usize) -> bool {
    let samples = guard.debug_snapshot().sample_count;
    for _ in 0..limit {
        let stop = guard.poll();
        if stop || guard.debug_snapshot().sample_count > samples {
            return stop;
        }
    }
    panic!("no sample within {limit} polls");
}

/// Small unit of CPU work standing in for one search step
fn step(state: &mut u64) {
    for i in 0..64u64 {
        *state = state.wrapping_mul(6364136223846793005).wrapping_add(i);
    }
    std::hint::black_box(*state);
}

#[test]
fn test_target_overshoot_values() {
    assert_eq!(create_timeout_guard(100).debug_snapshot().target_overshoot_us, 5_000);
    assert_eq!(create_timeout_guard(500).debug_snapshot().target_overshoot_us, 10_000);
}

#[test]
fn test_deadline_offset() {
    for timeout_ms in [1, 10, 250, 2_000] {
        let record = create_timeout_guard(timeout_ms).debug_snapshot();
        assert_eq!(record.deadline_us - record.start_us, timeout_ms * 1_000);
    }
}

#[test]
fn test_short_timeout_trips_after_sleep() {
    let mut guard = create_timeout_guard(10);

    // Either answer is fine this close to a 10ms deadline
    let _ = guard.poll();

    thread::sleep(Duration::from_millis(20));

    let tripped = (0..1_000).any(|_| guard.poll());
    assert!(tripped, "guard did not trip within 1000 polls");

    let record = guard.debug_snapshot();
    assert!(record.timeout_flag);
    assert!(record.detected_at_us > 0);
    assert!(record.detected_at_us >= record.deadline_us);

    for _ in 0..1_000 {
        assert!(guard.poll());
    }
    assert_eq!(guard.debug_snapshot().detected_at_us, record.detected_at_us);
}

#[test]
fn test_rapid_polls_sample_sparsely() {
    let mut guard = create_timeout_guard(1_000);

    for _ in 0..50 {
        assert!(!guard.poll());
    }

    let record = guard.debug_snapshot();
    assert_eq!(record.check_count, 50);
    assert!(
        record.sample_ratio() < 0.5,
        "sampled {} of {} polls",
        record.sample_count,
        record.check_count
    );
}

#[test]
fn test_slow_step_captured_by_decayed_max() {
    let mut guard = create_timeout_guard(10_000);

    for _ in 0..10_000 {
        assert!(!guard.poll());
    }

    thread::sleep(Duration::from_millis(20));
    assert!(!poll_until_sample(&mut guard, 10_000_000));

    let record = guard.debug_snapshot();
    assert!(
        record.decayed_max_us > record.mean_step_us,
        "decayed max {} not above mean {}",
        record.decayed_max_us,
        record.mean_step_us
    );
    assert!(record.stride_shrink_count >= 1);
}

#[test]
fn test_long_window_triggers_panic_mode() {
    let mut guard = create_timeout_guard(200);
    assert!(!guard.poll());

    thread::sleep(Duration::from_millis(100));

    if !poll_until_sample(&mut guard, 10_000_000) {
        let record = guard.debug_snapshot();
        assert!(record.panic_count >= 1);
        assert_eq!(record.stride_final, 1);
        assert!(record.burn_max > 0.33);
    }
}

#[test]
fn test_busy_loop_detects_deadline() {
    let timeout_ms = 30;
    let mut guard = create_timeout_guard(timeout_ms);
    let started = Instant::now();
    let mut state = 1u64;

    while !guard.poll() {
        step(&mut state);
    }

    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_millis(timeout_ms));

    let record = guard.debug_snapshot();
    assert!(record.timeout_flag);
    assert!(record.sample_ratio() < 0.5);
    // Loose bound; the target is 1.5ms but CI schedulers are noisy
    assert!(record.detection_lag_us().unwrap_or(u64::MAX) < 200_000);
}

#[test]
fn test_aggregate_over_many_guards() {
    let metrics = GuardMetrics::new();

    for _ in 0..10 {
        let mut guard = create_timeout_guard(15);
        let mut state = 7u64;
        while !guard.poll() {
            step(&mut state);
        }
        metrics.observe(&guard.debug_snapshot());
    }

    let snapshot = metrics.snapshot();
    assert_eq!(snapshot.guards_observed, 10);
    assert_eq!(snapshot.guards_tripped, 10);
    assert!(snapshot.total_checks >= snapshot.total_samples);

    let derived = metrics.derived_metrics();
    assert_eq!(derived.trip_rate, 1.0);
    assert!(derived.sample_rate < 0.5);
    assert!(derived.mean_overshoot_us >= 0.0);
}

#[test]
fn test_guards_on_separate_threads() {
    let handles: Vec<_> = [10u64, 20, 40, 80]
        .into_iter()
        .map(|timeout_ms| {
            let mut guard = create_timeout_guard(timeout_ms);
            thread::spawn(move || {
                let mut state = timeout_ms;
                while !guard.poll() {
                    step(&mut state);
                }
                (timeout_ms, guard.debug_snapshot())
            })
        })
        .collect();

    for handle in handles {
        let (timeout_ms, record) = handle.join().expect("worker panicked");
        assert!(record.timeout_flag);
        assert_eq!(record.deadline_us - record.start_us, timeout_ms * 1_000);
        assert!(record.detected_at_us >= record.deadline_us);
    }
}

#[test]
fn test_entry_point_rejects_unknown_operation() {
    let mut guard = create_timeout_guard(100);

    assert_eq!(guard.call("poll").map(|reply| reply.should_stop()), Ok(Some(false)));

    let err = guard.call("extend").unwrap_err();
    assert_eq!(err, GuardError::UnsupportedOperation("extend".to_owned()));
    assert!(err.to_string().contains("extend"));
}

#[test]
fn test_try_new_policy() {
    assert!(matches!(
        TimeoutGuard::try_new(0),
        Err(GuardError::InvalidTimeout { timeout_ms: 0, .. })
    ));
    assert!(TimeoutGuard::try_new(1).is_ok());

    // The factory clamps instead of failing
    let record = create_timeout_guard(0).debug_snapshot();
    assert_eq!(record.deadline_us - record.start_us, 1_000);
}
