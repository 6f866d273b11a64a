//! Benchmarks for stream send and receive paths
//!
//! Run with: cargo bench --bench stream

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::time::Duration;
use streamer_core::{Stream, StreamConfig};

/// Benchmark sends that always find a free slot
fn bench_send_free_slot(c: &mut Criterion) {
    let mut group = c.benchmark_group("Send");

    group.bench_function("send + recv", |b| {
        let stream = Stream::new(1024);
        let rx = stream.receiver();

        b.iter(|| {
            stream.send(black_box(42u64));
            black_box(rx.try_recv().unwrap())
        })
    });

    group.bench_function("send_blocking + recv", |b| {
        let stream = Stream::new(1024);
        let rx = stream.receiver();

        b.iter(|| {
            stream.send_blocking(black_box(42u64));
            black_box(rx.try_recv().unwrap())
        })
    });

    group.bench_function("try_send full", |b| {
        let stream = Stream::new(1);
        stream.send(0u64);

        b.iter(|| black_box(stream.try_send(black_box(1)).is_err()))
    });

    group.finish();
}

/// Benchmark drop-oldest sends into a full buffer
fn bench_send_evicting(c: &mut Criterion) {
    let mut group = c.benchmark_group("Send Evicting");

    for capacity in [1usize, 16, 256].iter() {
        group.bench_with_input(
            BenchmarkId::new("capacity", capacity),
            capacity,
            |b, &capacity| {
                let config =
                    StreamConfig::new(capacity).with_poll_interval(Duration::from_micros(1));
                let stream = Stream::with_config(config).unwrap();
                for i in 0..capacity as u64 {
                    stream.send(i);
                }

                b.iter(|| stream.send(black_box(7u64)))
            },
        );
    }

    group.finish();
}

/// Benchmark the stop/start cycle
fn bench_restart(c: &mut Criterion) {
    let mut group = c.benchmark_group("Lifecycle");

    group.bench_function("start", |b| {
        let stream = Stream::<u64>::new(64);
        b.iter(|| stream.start(black_box(64)))
    });

    group.bench_function("stop + start", |b| {
        let stream = Stream::<u64>::new(64);
        b.iter(|| {
            black_box(stream.stop());
            stream.start(64);
        })
    });

    group.finish();
}

criterion_group!(benches, bench_send_free_slot, bench_send_evicting, bench_restart);
criterion_main!(benches);
