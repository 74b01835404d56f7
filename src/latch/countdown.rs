//! Countdown Latch
//!
//! A counter guarded by a mutex. Every [`count_down`](CountdownLatch::count_down)
//! decrements it; the call that brings it to zero wakes every thread parked in
//! [`wait`](CountdownLatch::wait) with a single `notify_all`. Once zero, the latch stays
//! open forever.
//!
//! Calling `count_down` on an open latch is a caller error. It leaves the count at zero,
//! does not affect waiters, and is logged at `warn` level when the `tracing` feature is on.

use core::fmt;
use std::time::Instant;

use crate::metrics::{AtomicMetrics, MetricsCollector, PerformanceMetrics};
use crate::sync::{Condvar, Mutex};
use crate::trace::{debug, trace, warn};

/// A one-shot barrier that opens after `count` calls to `count_down`
///
/// # Examples
///
/// ```rust
/// use std::sync::Arc;
/// use std::thread;
/// use velocityx_sync::latch::CountdownLatch;
///
/// let latch = Arc::new(CountdownLatch::new(3));
///
/// let workers: Vec<_> = (0..3)
///     .map(|_| {
///         let latch = Arc::clone(&latch);
///         thread::spawn(move || latch.count_down())
///     })
///     .collect();
///
/// latch.wait();
/// assert_eq!(latch.count(), 0);
///
/// for worker in workers {
///     worker.join().unwrap();
/// }
/// ```
pub struct CountdownLatch {
    count: Mutex<usize>,
    released: Condvar,
    metrics: AtomicMetrics,
}

impl CountdownLatch {
    /// Create a latch that opens after `count` calls to `count_down`
    ///
    /// A latch created with `0` is already open.
    pub fn new(count: usize) -> Self {
        debug!(count, "countdown latch created");
        Self {
            count: Mutex::new(count),
            released: Condvar::new(),
            metrics: AtomicMetrics::default(),
        }
    }

    /// Decrement the count, releasing all waiters when it reaches zero
    pub fn count_down(&self) {
        let mut count = self.count.lock();
        if *count == 0 {
            drop(count);
            warn!("count_down called on an open latch");
            self.metrics.record_rejection();
            return;
        }

        *count -= 1;
        if *count == 0 {
            self.released.notify_all();
            drop(count);
            debug!("countdown latch released");
        } else {
            drop(count);
        }
        self.metrics.record_success();
    }

    /// Block until the count reaches zero
    ///
    /// Returns immediately if the latch is already open. There is no timeout.
    pub fn wait(&self) {
        let mut count = self.count.lock();
        if *count > 0 {
            let started = Instant::now();
            while *count > 0 {
                trace!(remaining = *count, "waiting on countdown latch");
                count = self.released.wait(count);
            }
            drop(count);
            self.metrics.record_contention(started.elapsed());
        }
    }

    /// Snapshot of the remaining count
    pub fn count(&self) -> usize {
        *self.count.lock()
    }

    /// Whether the count has reached zero
    pub fn is_released(&self) -> bool {
        self.count() == 0
    }
}

impl MetricsCollector for CountdownLatch {
    fn metrics(&self) -> PerformanceMetrics {
        self.metrics.snapshot()
    }

    fn reset_metrics(&self) {
        self.metrics.reset();
    }

    fn set_metrics_enabled(&self, enabled: bool) {
        self.metrics.set_enabled(enabled);
    }

    fn is_metrics_enabled(&self) -> bool {
        self.metrics.enabled()
    }
}

impl fmt::Debug for CountdownLatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut d = f.debug_struct("CountdownLatch");
        match self.count.try_lock() {
            Some(count) => d.field("count", &*count),
            None => d.field("count", &format_args!("<locked>")),
        };
        d.finish()
    }
}
