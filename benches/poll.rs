/**
 *     ______   __  __     __         ______     ______
 *    /\  == \ /\ \/\ \   /\ \       /\  ___\   /\  ___\
 *    \ \  _-/ \ \ \_\ \  \ \ \____  \ \___  \  \ \  __\
 *     \ \_\    \ \_____\  \ \_____\  \/\_____\  \ \_____\
 *      \/_/     \/_____/   \/_____/   \/_____/   \/_____/
 *
 * Author: Colin MacRitchie / Ripple Group
 */
/* Benchmarks for timeout guard operations */
use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use pulse_guard::timing::{ManualClock, MonotonicClock, create_clock};
use pulse_guard::{TimeoutGuard, create_timeout_guard};

fn bench_guard_creation(c: &mut Criterion) {
    let mut group = c.benchmark_group("timeout_guard/creation");

    group.bench_function("system_clock", |b| {
        b.iter(|| black_box(create_timeout_guard(black_box(1_000))));
    });

    group.bench_function("manual_clock", |b| {
        let clock = ManualClock::new(1);
        b.iter(|| black_box(TimeoutGuard::with_clock(black_box(1_000), clock.clone())));
    });

    group.finish();
}

fn bench_clock_read(c: &mut Criterion) {
    let clock = create_clock();

    c.bench_function("timeout_guard/clock/now_us", |b| {
        b.iter(|| black_box(clock.now_us()));
    });
}

fn bench_poll_fast_path(c: &mut Criterion) {
    /* Long timeout on a frozen clock keeps the stride large */
    let clock = ManualClock::new(1);
    let mut guard = TimeoutGuard::with_clock(60_000, clock);

    c.bench_function("timeout_guard/poll/fast_path", |b| {
        b.iter(|| black_box(guard.poll()));
    });
}

fn bench_poll_system_clock(c: &mut Criterion) {
    let mut group = c.benchmark_group("timeout_guard/poll/system_clock");

    for batch in &[100u64, 10_000, 1_000_000] {
        group.bench_with_input(BenchmarkId::new("batch", batch), batch, |b, &batch| {
            b.iter(|| {
                let mut guard = create_timeout_guard(60_000);
                for _ in 0..batch {
                    if guard.poll() {
                        break;
                    }
                }
                black_box(guard.debug_snapshot().sample_count)
            });
        });
    }

    group.finish();
}

fn bench_poll_sample_path(c: &mut Criterion) {
    /* Every poll lands on the sample path once the guard has tripped */
    let clock = ManualClock::new(1);
    let mut guard = TimeoutGuard::with_clock(1, clock.clone());
    clock.advance(2_000);
    while !guard.poll() {}

    c.bench_function("timeout_guard/poll/tripped", |b| {
        b.iter(|| black_box(guard.poll()));
    });

    c.bench_function("timeout_guard/poll/first_sample", |b| {
        b.iter(|| {
            let mut guard = TimeoutGuard::with_clock(1_000, ManualClock::new(1));
            black_box(guard.poll())
        });
    });
}

fn bench_debug_snapshot(c: &mut Criterion) {
    let mut guard = create_timeout_guard(60_000);
    for _ in 0..10_000 {
        guard.poll();
    }

    c.bench_function("timeout_guard/debug_snapshot", |b| {
        b.iter(|| black_box(guard.debug_snapshot()));
    });
}

fn bench_call_dispatch(c: &mut Criterion) {
    let mut group = c.benchmark_group("timeout_guard/call");
    let mut guard = TimeoutGuard::with_clock(60_000, ManualClock::new(1));

    for op in &["poll", "debug_snapshot", "extend"] {
        group.bench_with_input(BenchmarkId::from_parameter(op), op, |b, op| {
            b.iter(|| black_box(guard.call(black_box(op)).is_ok()));
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_guard_creation,
    bench_clock_read,
    bench_poll_fast_path,
    bench_poll_system_clock,
    bench_poll_sample_path,
    bench_debug_snapshot,
    bench_call_dispatch
);

criterion_main!(benches);
