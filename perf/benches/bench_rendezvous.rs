use criterion::{Criterion, Throughput, black_box, criterion_group, criterion_main};
use lockstep_sync::{Rendezvous, StepClock};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

fn bench_solo_crossing(c: &mut Criterion) {
    let rv = Rendezvous::<()>::new("solo", 1);

    let mut group = c.benchmark_group("rendezvous");
    group.throughput(Throughput::Elements(1));

    group.bench_function("cross (threshold 1)", |b| {
        b.iter(|| black_box(rv.wait()));
    });
}

/// Round trip of `parties` threads through one rendezvous. The measuring
/// thread is one of the parties; the others loop until aborted.
fn bench_wave(c: &mut Criterion, parties: usize) {
    let rv = Arc::new(Rendezvous::<u64>::new("wave", parties));
    let clock = Arc::new(StepClock::new());

    let peers: Vec<_> = (1..parties)
        .map(|_| {
            let rv = Arc::clone(&rv);
            let clock = Arc::clone(&clock);
            thread::spawn(move || while rv.wait_with(|_| clock.now()).is_ok() {})
        })
        .collect();

    let mut group = c.benchmark_group("rendezvous");
    group.throughput(Throughput::Elements(1));

    group.bench_function(format!("wave ({parties} threads)"), |b| {
        b.iter_custom(|iters| {
            let start = Instant::now();
            for _ in 0..iters {
                let crossing = rv.wait_with(|_| clock.advance());
                black_box(crossing.map(|c| c.payload).unwrap_or_default());
            }
            start.elapsed()
        });
    });
    drop(group);

    rv.abort();
    for peer in peers {
        let _ = peer.join();
    }
}

fn bench_waves(c: &mut Criterion) {
    bench_wave(c, 2);
    bench_wave(c, 5);
}

fn bench_clock(c: &mut Criterion) {
    let clock = StepClock::new();

    let mut group = c.benchmark_group("clock");
    group.throughput(Throughput::Elements(1));
    group.bench_function("advance", |b| b.iter(|| black_box(clock.advance())));
    group.bench_function("now", |b| b.iter(|| black_box(clock.now())));
}

criterion_group! {
    name = benches;
    config = Criterion::default().measurement_time(Duration::from_secs(3));
    targets = bench_solo_crossing, bench_waves, bench_clock
}
criterion_main!(benches);
