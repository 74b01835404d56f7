//! Queue implementations
//!
//! Two bounded FIFOs with different scheduling models.
//!
//! ## Available Queues
//!
//! - [`BoundedBlockingQueue`]: any number of producers and consumers, blocking `put`/`take`
//! - [`SpscRingBuffer`]: exactly one producer and one consumer, lock-free and non-blocking
//!
//! ## Choosing a Queue
//!
//! - **Backpressure**: `BoundedBlockingQueue::put` parks the producer until space frees up
//! - **Latency**: the SPSC ring never takes a lock; each side touches one shared index
//! - **Fan-in/fan-out**: only the blocking queue accepts several producers or consumers
//!
//! ## Performance Characteristics
//!
//! | Queue Type | Insert | Remove | Memory | Waiting |
//! |------------|--------|--------|--------|---------|
//! | Blocking | O(1) | O(1) | Fixed | Condition variables |
//! | SPSC Ring | O(1) | O(1) | Fixed, `size - 1` usable | Caller polls |
//!
//! ## Examples
//!
//! ```rust
//! use velocityx_sync::queue::{spsc_ring_buffer, BoundedBlockingQueue};
//!
//! let work = BoundedBlockingQueue::new(16);
//! work.put("job");
//! assert_eq!(work.take(), "job");
//!
//! let (mut tx, mut rx) = spsc_ring_buffer(8);
//! assert!(tx.write(1u64).is_ok());
//! assert_eq!(rx.read(), Some(1));
//! ```

pub mod blocking;
pub mod spsc;

pub use self::blocking::BoundedBlockingQueue;
pub use self::spsc::{spsc_ring_buffer, Consumer, Producer, SpscRingBuffer};


#[cfg(all(test, not(loom)))]
mod proptests;
