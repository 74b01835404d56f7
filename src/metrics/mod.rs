//! Performance Metrics Module
//!
//! Operation counters for the blocking primitives. Counters are relaxed atomics bumped
//! while the structure's own lock is held or right after it is released, so they never
//! add a synchronization point of their own.
//!
//! Compiled out entirely when the `metrics` feature is disabled: [`AtomicMetrics`]
//! becomes a zero-sized no-op and [`MetricsCollector::metrics`] returns zeros.

use core::time::Duration;

/// Snapshot of the counters recorded by a blocking primitive
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PerformanceMetrics {
    /// Total number of operations recorded
    pub total_operations: u64,
    /// Operations that completed (item inserted or removed, latch decremented)
    pub successful_operations: u64,
    /// Non-blocking operations rejected because the structure was full or empty
    pub rejected_operations: u64,
    /// Operations that had to block at least once before completing
    pub contended_operations: u64,
    /// Total time spent blocked, in nanoseconds
    pub total_wait_time_ns: u64,
    /// Longest single blocking period, in nanoseconds
    pub max_wait_time_ns: u64,
}

impl PerformanceMetrics {
    /// Calculate success rate as percentage
    pub fn success_rate(&self) -> f64 {
        if self.total_operations == 0 {
            0.0
        } else {
            (self.successful_operations as f64 / self.total_operations as f64) * 100.0
        }
    }

    /// Calculate contention rate as percentage
    pub fn contention_rate(&self) -> f64 {
        if self.total_operations == 0 {
            0.0
        } else {
            (self.contended_operations as f64 / self.total_operations as f64) * 100.0
        }
    }

    /// Average blocking time across contended operations
    pub fn avg_wait_time(&self) -> Duration {
        if self.contended_operations == 0 {
            Duration::ZERO
        } else {
            Duration::from_nanos(self.total_wait_time_ns / self.contended_operations)
        }
    }

    /// Longest single blocking period
    pub fn max_wait_time(&self) -> Duration {
        Duration::from_nanos(self.max_wait_time_ns)
    }
}

/// Trait for data structures that support performance metrics
pub trait MetricsCollector {
    /// Get current performance metrics
    fn metrics(&self) -> PerformanceMetrics;

    /// Reset all metrics
    fn reset_metrics(&self);

    /// Enable or disable metrics collection
    fn set_metrics_enabled(&self, enabled: bool);

    /// Check if metrics collection is enabled
    fn is_metrics_enabled(&self) -> bool;
}

#[cfg(feature = "metrics")]
pub(crate) use self::enabled::AtomicMetrics;

#[cfg(not(feature = "metrics"))]
pub(crate) use self::disabled::AtomicMetrics;

#[cfg(feature = "metrics")]
mod enabled {
    use super::PerformanceMetrics;
    use core::sync::atomic::{AtomicBool, AtomicU64, Ordering};
    use core::time::Duration;

    /// Internal atomic metrics collection
    #[derive(Debug)]
    pub(crate) struct AtomicMetrics {
        enabled: AtomicBool,
        total_operations: AtomicU64,
        successful_operations: AtomicU64,
        rejected_operations: AtomicU64,
        contended_operations: AtomicU64,
        total_wait_time_ns: AtomicU64,
        max_wait_time_ns: AtomicU64,
    }

    impl Default for AtomicMetrics {
        fn default() -> Self {
            Self {
                enabled: AtomicBool::new(true),
                total_operations: AtomicU64::new(0),
                successful_operations: AtomicU64::new(0),
                rejected_operations: AtomicU64::new(0),
                contended_operations: AtomicU64::new(0),
                total_wait_time_ns: AtomicU64::new(0),
                max_wait_time_ns: AtomicU64::new(0),
            }
        }
    }

    impl AtomicMetrics {
        #[inline]
        fn is_enabled(&self) -> bool {
            self.enabled.load(Ordering::Relaxed)
        }

        /// Record a completed operation
        pub(crate) fn record_success(&self) {
            if !self.is_enabled() {
                return;
            }
            self.total_operations.fetch_add(1, Ordering::Relaxed);
            self.successful_operations.fetch_add(1, Ordering::Relaxed);
        }

        /// Record a non-blocking call that found the structure full or empty
        pub(crate) fn record_rejection(&self) {
            if !self.is_enabled() {
                return;
            }
            self.total_operations.fetch_add(1, Ordering::Relaxed);
            self.rejected_operations.fetch_add(1, Ordering::Relaxed);
        }

        /// Record that a call blocked for `waited` before it could proceed
        pub(crate) fn record_contention(&self, waited: Duration) {
            if !self.is_enabled() {
                return;
            }
            let waited_ns = u64::try_from(waited.as_nanos()).unwrap_or(u64::MAX);

            self.contended_operations.fetch_add(1, Ordering::Relaxed);
            self.total_wait_time_ns.fetch_add(waited_ns, Ordering::Relaxed);
            self.max_wait_time_ns.fetch_max(waited_ns, Ordering::Relaxed);
        }

        /// Get current metrics snapshot
        pub(crate) fn snapshot(&self) -> PerformanceMetrics {
            PerformanceMetrics {
                total_operations: self.total_operations.load(Ordering::Relaxed),
                successful_operations: self.successful_operations.load(Ordering::Relaxed),
                rejected_operations: self.rejected_operations.load(Ordering::Relaxed),
                contended_operations: self.contended_operations.load(Ordering::Relaxed),
                total_wait_time_ns: self.total_wait_time_ns.load(Ordering::Relaxed),
                max_wait_time_ns: self.max_wait_time_ns.load(Ordering::Relaxed),
            }
        }

        /// Reset all metrics
        pub(crate) fn reset(&self) {
            self.total_operations.store(0, Ordering::Relaxed);
            self.successful_operations.store(0, Ordering::Relaxed);
            self.rejected_operations.store(0, Ordering::Relaxed);
            self.contended_operations.store(0, Ordering::Relaxed);
            self.total_wait_time_ns.store(0, Ordering::Relaxed);
            self.max_wait_time_ns.store(0, Ordering::Relaxed);
        }

        pub(crate) fn set_enabled(&self, enabled: bool) {
            self.enabled.store(enabled, Ordering::Relaxed);
        }

        pub(crate) fn enabled(&self) -> bool {
            self.is_enabled()
        }
    }
}

#[cfg(not(feature = "metrics"))]
mod disabled {
    use super::PerformanceMetrics;
    use core::time::Duration;

    #[derive(Debug, Default)]
    pub(crate) struct AtomicMetrics;

    impl AtomicMetrics {
        #[inline(always)]
        pub(crate) fn record_success(&self) {}
        #[inline(always)]
        pub(crate) fn record_rejection(&self) {}
        #[inline(always)]
        pub(crate) fn record_contention(&self, _waited: Duration) {}
        pub(crate) fn snapshot(&self) -> PerformanceMetrics {
            PerformanceMetrics::default()
        }
        pub(crate) fn reset(&self) {}
        pub(crate) fn set_enabled(&self, _enabled: bool) {}
        pub(crate) fn enabled(&self) -> bool {
            false
        }
    }
}
