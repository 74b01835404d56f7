//! Pipeline demo: a feeder, a pool of workers and a collector.
//!
//! Jobs flow through a `BoundedBlockingQueue`, results come back on one SPSC ring per
//! worker, and two `CountdownLatch`es gate the start and signal completion.
//!
//! ```text
//! RUST_LOG=velocityx_sync=trace cargo run --example pipeline --features tracing
//! ```

use std::sync::Arc;
use std::thread;

use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use velocityx_sync::metrics::MetricsCollector;
use velocityx_sync::{spsc_ring_buffer, BoundedBlockingQueue, CountdownLatch};

const WORKERS: usize = 3;
const JOBS: u64 = 1_000;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("velocityx_sync=debug,pipeline=info"));

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(true)
                .with_thread_names(true)
                .with_timer(fmt::time::uptime()),
        )
        .with(filter)
        .init();
}

fn main() {
    init_tracing();

    let start = Arc::new(CountdownLatch::new(1));
    let done = Arc::new(CountdownLatch::new(WORKERS));
    let jobs = Arc::new(BoundedBlockingQueue::<Option<u64>>::new(16));

    let mut results = Vec::with_capacity(WORKERS);
    let mut handles = Vec::with_capacity(WORKERS);
    for id in 0..WORKERS {
        let (mut tx, rx) = spsc_ring_buffer::<u64>(64);
        results.push(rx);

        let start = Arc::clone(&start);
        let done = Arc::clone(&done);
        let jobs = Arc::clone(&jobs);
        let handle = thread::Builder::new()
            .name(format!("worker-{id}"))
            .spawn(move || {
                start.wait();
                let mut processed = 0u64;
                while let Some(n) = jobs.take() {
                    let mut value = n * 2;
                    while let Err(back) = tx.write(value) {
                        value = back;
                        thread::yield_now();
                    }
                    processed += 1;
                }
                info!(id, processed, "worker finished");
                done.count_down();
            })
            .expect("failed to spawn worker");
        handles.push(handle);
    }

    let feeder = {
        let jobs = Arc::clone(&jobs);
        thread::spawn(move || {
            for n in 0..JOBS {
                jobs.put(Some(n));
            }
            for _ in 0..WORKERS {
                jobs.put(None);
            }
        })
    };

    start.count_down();

    let mut total = 0u64;
    let mut received = 0u64;
    while received < JOBS {
        let mut idle = true;
        for rx in results.iter_mut() {
            while let Some(value) = rx.read() {
                total += value;
                received += 1;
                idle = false;
            }
        }
        if idle {
            thread::yield_now();
        }
    }

    done.wait();
    feeder.join().expect("feeder panicked");
    for handle in handles {
        handle.join().expect("worker panicked");
    }

    let metrics = jobs.metrics();
    info!(
        received,
        total,
        contended = metrics.contended_operations,
        max_wait = ?metrics.max_wait_time(),
        "pipeline complete"
    );
}
