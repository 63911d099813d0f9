use criterion::{black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use foundation_sync::{duplex, BoundedQueue, Envelope, Event, Semaphore};
use foundation_tasks::{PoolConfig, WorkerPool};
use foundation_workload::compute;
use std::sync::Arc;
use std::thread;

/// Benchmark the workload itself at a few sizes.
fn bench_compute(c: &mut Criterion) {
    let mut group = c.benchmark_group("compute");
    for size in [1_000i64, 10_000, 50_000] {
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            b.iter(|| compute(black_box(size)));
        });
    }
    group.finish();
}

/// Benchmark uncontended permit acquire/release.
fn bench_semaphore_uncontended(c: &mut Criterion) {
    let semaphore = Semaphore::new(1);
    c.bench_function("semaphore_permit_uncontended", |b| {
        b.iter(|| {
            let permit = semaphore.permit();
            black_box(&permit);
        });
    });
}

/// Benchmark a single permit bouncing between four threads.
fn bench_semaphore_handoff(c: &mut Criterion) {
    c.bench_function("semaphore_handoff_4_threads", |b| {
        b.iter_batched(
            || Arc::new(Semaphore::new(1)),
            |semaphore| {
                let workers: Vec<_> = (0..4)
                    .map(|_| {
                        let semaphore = Arc::clone(&semaphore);
                        thread::spawn(move || {
                            for _ in 0..100 {
                                let _permit = semaphore.permit();
                            }
                        })
                    })
                    .collect();
                for worker in workers {
                    worker.join().unwrap();
                }
            },
            BatchSize::SmallInput,
        );
    });
}

/// Benchmark waking many waiters with one event.
fn bench_event_broadcast(c: &mut Criterion) {
    c.bench_function("event_set_10_waiters", |b| {
        b.iter_batched(
            || Arc::new(Event::new()),
            |event| {
                let waiters: Vec<_> = (0..10)
                    .map(|_| {
                        let event = Arc::clone(&event);
                        thread::spawn(move || event.wait())
                    })
                    .collect();
                event.set();
                for waiter in waiters {
                    waiter.join().unwrap();
                }
            },
            BatchSize::SmallInput,
        );
    });
}

/// Benchmark producer/consumer throughput through a bounded queue.
fn bench_queue_throughput(c: &mut Criterion) {
    c.bench_function("queue_bounded_1000_items_2_consumers", |b| {
        b.iter(|| {
            let queue: BoundedQueue<Envelope<u64>> = BoundedQueue::bounded(16);
            let consumers: Vec<_> = (0..2)
                .map(|_| {
                    let queue = queue.clone();
                    thread::spawn(move || {
                        let mut sum = 0u64;
                        queue.drain_until_stop(|item| sum += item).unwrap();
                        sum
                    })
                })
                .collect();
            for item in 0..1_000u64 {
                queue.put_item(item);
            }
            queue.put_stop(2);
            queue.join();
            let total: u64 = consumers.into_iter().map(|c| c.join().unwrap()).sum();
            black_box(total)
        });
    });
}

/// Benchmark request/reply round trips over an in-process duplex channel.
fn bench_duplex_round_trip(c: &mut Criterion) {
    c.bench_function("duplex_round_trip_100", |b| {
        b.iter(|| {
            let (mut client, server) = duplex::<u64, u64>(4);
            let echo = thread::spawn(move || {
                while let Ok(value) = server.receive() {
                    if server.send(value + 1).is_err() {
                        break;
                    }
                }
            });
            for value in 0..100u64 {
                client.send(value).unwrap();
                black_box(client.receive().unwrap());
            }
            client.close();
            echo.join().unwrap();
        });
    });
}

/// Compare a pool map over several sizes with running them inline.
fn bench_pool_vs_sequential(c: &mut Criterion) {
    let sizes: Vec<i64> = vec![20_000; 8];
    let mut group = c.benchmark_group("pool_vs_sequential");
    group.sample_size(10);

    group.bench_function("sequential", |b| {
        b.iter(|| {
            sizes
                .iter()
                .map(|size| compute(*size).unwrap())
                .collect::<Vec<_>>()
        });
    });

    let pool = WorkerPool::new(PoolConfig::new(4).name("bench-pool")).unwrap();
    group.bench_function("pool_4_workers", |b| {
        b.iter(|| pool.map(sizes.clone(), compute).unwrap());
    });
    pool.shutdown();

    group.finish();
}

criterion_group!(
    benches,
    bench_compute,
    bench_semaphore_uncontended,
    bench_semaphore_handoff,
    bench_event_broadcast,
    bench_queue_throughput,
    bench_duplex_round_trip,
    bench_pool_vs_sequential,
);
criterion_main!(benches);
