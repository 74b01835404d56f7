//! # VelocityX Sync
//!
//! Thread coordination primitives for handing work between producer and consumer threads.
//!
//! ## Features
//!
//! - **Bounded Blocking Queue**: Fixed-capacity FIFO guarded by one mutex and two condition variables
//! - **SPSC Ring Buffer**: Lock-free single-producer, single-consumer circular buffer
//! - **Countdown Latch**: One-shot barrier releasing every waiter once a counter reaches zero
//!
//! ## Quick Start
//!
//! ```rust
//! use velocityx_sync::queue::{spsc_ring_buffer, BoundedBlockingQueue};
//! use velocityx_sync::latch::CountdownLatch;
//!
//! let queue = BoundedBlockingQueue::new(3);
//! assert!(queue.try_add(1));
//! assert_eq!(queue.take(), 1);
//!
//! let (mut tx, mut rx) = spsc_ring_buffer::<u32>(4);
//! assert!(tx.write(7).is_ok());
//! assert_eq!(rx.read(), Some(7));
//!
//! let latch = CountdownLatch::new(1);
//! latch.count_down();
//! latch.wait();
//! assert_eq!(latch.count(), 0);
//! ```
//!
//! ## Scheduling Models
//!
//! [`BoundedBlockingQueue`](queue::BoundedBlockingQueue) and
//! [`CountdownLatch`](latch::CountdownLatch) block: `put`, `take` and `wait` may suspend the
//! calling thread indefinitely. There are no timeouts; a caller that needs bounded waiting
//! builds it outside these types.
//!
//! The [SPSC ring buffer](queue::spsc) never blocks. `write` and `read` report full/empty
//! immediately and callers poll.
//!
//! ## Feature flags
//!
//! - `metrics` (default): operation counters through [`metrics::MetricsCollector`]
//! - `tracing`: structured events through the `tracing` crate

#![warn(missing_docs, missing_debug_implementations, rust_2018_idioms)]

pub mod latch;
pub mod metrics;
pub mod queue;

mod sync;
mod trace;

pub use crate::latch::CountdownLatch;
pub use crate::queue::{spsc_ring_buffer, BoundedBlockingQueue, SpscRingBuffer};

/// Common utilities and helper types
pub mod util {
    /// Advance a ring index by one slot, wrapping to zero at `len`.
    ///
    /// `index` must already be in `[0, len)`.
    #[inline]
    pub const fn wrapping_increment(index: usize, len: usize) -> usize {
        let next = index + 1;
        if next == len {
            0
        } else {
            next
        }
    }

    /// Distance from `from` forward to `to` on a ring of `len` slots.
    #[inline]
    pub const fn ring_distance(from: usize, to: usize, len: usize) -> usize {
        if to >= from {
            to - from
        } else {
            len - from + to
        }
    }

    /// Reserve exactly `capacity` elements, reporting failure instead of aborting.
    pub(crate) fn try_alloc<T>(capacity: usize) -> crate::Result<Vec<T>> {
        let mut storage = Vec::new();
        storage
            .try_reserve_exact(capacity)
            .map_err(|_| crate::Error::AllocationFailed { capacity })?;
        Ok(storage)
    }
}

/// Error types for VelocityX Sync construction
///
/// A full or empty container is never an error; those outcomes are reported through
/// `bool`/`Option` returns.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// Requested capacity is below the structure's minimum
    #[error("capacity {requested} is below the minimum of {minimum}")]
    InvalidCapacity {
        /// Capacity passed by the caller
        requested: usize,
        /// Smallest capacity the structure accepts
        minimum: usize,
    },
    /// Backing storage could not be allocated
    #[error("failed to allocate storage for {capacity} slots")]
    AllocationFailed {
        /// Number of slots requested
        capacity: usize,
    },
}

/// Result type for VelocityX Sync operations
pub type Result<T> = core::result::Result<T, Error>;
