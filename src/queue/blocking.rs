//! Bounded Blocking Queue
//!
//! A fixed-capacity FIFO for backpressured work distribution between any number of
//! producer and consumer threads.
//!
//! ## Locking Model
//!
//! ```text
//!                 +-----------------------------+
//!  put / try_add  |  Mutex<QueueState<T>>       |  take / try_take
//!  ------------>  |  slots, take_index,         |  ------------->
//!   waits on      |  put_index, count           |   waits on
//!   `not_full`    +-----------------------------+   `not_empty`
//! ```
//!
//! One mutex serializes every state transition. Takers park on `not_empty`, putters on
//! `not_full`, and each insert or removal wakes exactly one waiter of the opposite kind.
//! Waits re-check their predicate in a loop, so spurious wakeups are harmless.
//!
//! There is no timeout: a `put` on a queue that never drains, or a `take` on one that is
//! never filled, waits forever. Bounded waiting is the caller's responsibility.

use core::fmt;
use std::time::Instant;

use crate::metrics::{AtomicMetrics, MetricsCollector, PerformanceMetrics};
use crate::sync::{Condvar, Mutex, MutexGuard};
use crate::trace::{debug, trace};
use crate::util::{ring_distance, try_alloc, wrapping_increment};
use crate::{Error, Result};

/// Smallest capacity a [`BoundedBlockingQueue`] accepts.
pub const MIN_QUEUE_CAPACITY: usize = 1;

/// A bounded FIFO queue whose `put` blocks while full and whose `take` blocks while empty.
///
/// `try_add` is the only way to observe "full" without waiting.
///
/// # Examples
///
/// ```rust
/// use velocityx_sync::queue::BoundedBlockingQueue;
///
/// let queue = BoundedBlockingQueue::new(3);
/// assert!(queue.try_add(1));
/// assert!(queue.try_add(2));
/// assert!(queue.try_add(3));
/// assert!(!queue.try_add(4));
///
/// assert_eq!(queue.take(), 1);
/// assert!(queue.try_add(4));
/// ```
///
/// Handing work between threads:
///
/// ```rust
/// use std::sync::Arc;
/// use std::thread;
/// use velocityx_sync::queue::BoundedBlockingQueue;
///
/// let queue = Arc::new(BoundedBlockingQueue::new(2));
///
/// let producer = thread::spawn({
///     let queue = Arc::clone(&queue);
///     move || {
///         for i in 0..100 {
///             queue.put(i);
///         }
///     }
/// });
///
/// let sum: u32 = (0..100).map(|_| queue.take()).sum();
/// producer.join().unwrap();
/// assert_eq!(sum, 4950);
/// ```
pub struct BoundedBlockingQueue<T> {
    state: Mutex<QueueState<T>>,
    not_empty: Condvar,
    not_full: Condvar,
    capacity: usize,
    metrics: AtomicMetrics,
}

/// Ring storage and cursors. Only reachable through the queue's mutex.
struct QueueState<T> {
    slots: Box<[Option<T>]>,
    take_index: usize,
    put_index: usize,
    count: usize,
}

impl<T> QueueState<T> {
    #[inline]
    fn len(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    fn is_full(&self) -> bool {
        self.count == self.slots.len()
    }

    #[inline]
    fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Whether `index` lies in the occupied range starting at `take_index`.
    fn is_occupied(&self, index: usize) -> bool {
        index < self.len() && ring_distance(self.take_index, index, self.len()) < self.count
    }

    /// Physical slot of the element `offset` places behind the head.
    #[inline]
    fn physical(&self, offset: usize) -> usize {
        (self.take_index + offset) % self.len()
    }

    fn vacate(&mut self, index: usize) -> T {
        match self.slots[index].take() {
            Some(value) => value,
            None => unreachable!("slot {index} lies in the occupied range but holds no value"),
        }
    }

    fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        (0..self.count).filter_map(move |offset| self.slots[self.physical(offset)].as_ref())
    }
}

/// Proof that the queue's mutex is held.
///
/// Every state mutation goes through this type, so the maintenance primitive
/// [`Locked::remove_at`] cannot be reached without the lock.
struct Locked<'a, T> {
    queue: &'a BoundedBlockingQueue<T>,
    state: MutexGuard<'a, QueueState<T>>,
}

impl<'a, T> Locked<'a, T> {
    /// Insert at `put_index` and wake one taker. The queue must not be full.
    fn enqueue(&mut self, item: T) {
        debug_assert!(!self.state.is_full());
        let state = &mut *self.state;

        state.slots[state.put_index] = Some(item);
        state.put_index = wrapping_increment(state.put_index, state.slots.len());
        state.count += 1;

        self.queue.not_empty.notify_one();
    }

    /// Remove from `take_index` and wake one putter. The queue must not be empty.
    fn dequeue(&mut self) -> T {
        let item = self.pop_head();
        self.queue.not_full.notify_one();
        item
    }

    /// Remove from `take_index` without waking anyone.
    fn pop_head(&mut self) -> T {
        debug_assert!(!self.state.is_empty());
        let state = &mut *self.state;

        let take_index = state.take_index;
        let item = state.vacate(take_index);
        state.take_index = wrapping_increment(take_index, state.slots.len());
        state.count -= 1;
        item
    }

    /// Remove the element at physical slot `index`, which must be occupied.
    ///
    /// Elements between `index` and `put_index` shift back one slot, keeping their
    /// relative order, and `put_index` retreats onto the vacated trailing slot.
    fn remove_at(&mut self, index: usize) -> T {
        debug_assert!(
            self.state.is_occupied(index),
            "remove_at({index}) on a slot outside the occupied range"
        );
        let state = &mut *self.state;
        let len = state.slots.len();

        let removed = state.vacate(index);
        if index == state.take_index {
            state.take_index = wrapping_increment(index, len);
        } else {
            let mut i = index;
            loop {
                let next = wrapping_increment(i, len);
                if next == state.put_index {
                    state.put_index = i;
                    break;
                }
                state.slots[i] = state.slots[next].take();
                i = next;
            }
        }
        state.count -= 1;

        self.queue.not_full.notify_one();
        removed
    }

    /// Park on `not_full` until a slot frees up.
    fn wait_while_full(self) -> Self {
        let Locked { queue, mut state } = self;
        if state.is_full() {
            let started = Instant::now();
            while state.is_full() {
                trace!(capacity = queue.capacity, "put blocked: queue full");
                state = queue.not_full.wait(state);
            }
            queue.metrics.record_contention(started.elapsed());
        }
        Locked { queue, state }
    }

    /// Park on `not_empty` until an item arrives.
    fn wait_while_empty(self) -> Self {
        let Locked { queue, mut state } = self;
        if state.is_empty() {
            let started = Instant::now();
            while state.is_empty() {
                trace!("take blocked: queue empty");
                state = queue.not_empty.wait(state);
            }
            queue.metrics.record_contention(started.elapsed());
        }
        Locked { queue, state }
    }
}

impl<T> BoundedBlockingQueue<T> {
    /// Create a queue holding at most `capacity` items
    ///
    /// # Panics
    ///
    /// Panics if capacity is 0 or the backing storage cannot be allocated.
    /// Use [`try_new`](Self::try_new) to handle either case.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity >= MIN_QUEUE_CAPACITY, "Capacity must be greater than 0");
        match Self::try_new(capacity) {
            Ok(queue) => queue,
            Err(err) => panic!("{err}"),
        }
    }

    /// Create a queue holding at most `capacity` items, reporting bad input
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidCapacity`] if `capacity` is 0
    /// - [`Error::AllocationFailed`] if `capacity` slots cannot be reserved
    pub fn try_new(capacity: usize) -> Result<Self> {
        if capacity < MIN_QUEUE_CAPACITY {
            return Err(Error::InvalidCapacity {
                requested: capacity,
                minimum: MIN_QUEUE_CAPACITY,
            });
        }

        let mut slots = try_alloc::<Option<T>>(capacity)?;
        slots.resize_with(capacity, || None);
        debug!(capacity, "bounded blocking queue created");

        Ok(Self {
            state: Mutex::new(QueueState {
                slots: slots.into_boxed_slice(),
                take_index: 0,
                put_index: 0,
                count: 0,
            }),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
            capacity,
            metrics: AtomicMetrics::default(),
        })
    }

    #[inline]
    fn lock(&self) -> Locked<'_, T> {
        Locked {
            queue: self,
            state: self.state.lock(),
        }
    }

    /// Insert `item` if there is room, without blocking
    ///
    /// Returns `false` when the queue is full; the item is dropped in that case.
    /// Use [`try_put`](Self::try_put) to get a rejected item back.
    pub fn try_add(&self, item: T) -> bool {
        self.try_put(item).is_ok()
    }

    /// Insert `item` if there is room, without blocking
    ///
    /// # Errors
    ///
    /// Returns `Err(item)` when the queue is full.
    pub fn try_put(&self, item: T) -> core::result::Result<(), T> {
        let mut locked = self.lock();
        if locked.state.is_full() {
            drop(locked);
            self.metrics.record_rejection();
            return Err(item);
        }
        locked.enqueue(item);
        drop(locked);

        self.metrics.record_success();
        Ok(())
    }

    /// Insert `item`, blocking while the queue is full
    pub fn put(&self, item: T) {
        let mut locked = self.lock().wait_while_full();
        locked.enqueue(item);
        drop(locked);

        self.metrics.record_success();
    }

    /// Remove the head item, blocking while the queue is empty
    pub fn take(&self) -> T {
        let mut locked = self.lock().wait_while_empty();
        let item = locked.dequeue();
        drop(locked);

        self.metrics.record_success();
        item
    }

    /// Remove the head item if there is one, without blocking
    pub fn try_take(&self) -> Option<T> {
        let mut locked = self.lock();
        if locked.state.is_empty() {
            drop(locked);
            self.metrics.record_rejection();
            return None;
        }
        let item = locked.dequeue();
        drop(locked);

        self.metrics.record_success();
        Some(item)
    }

    /// Run `f` on the head item, under the lock, without removing it
    pub fn peek_with<R>(&self, f: impl FnOnce(&T) -> R) -> Option<R> {
        let locked = self.lock();
        let state = &*locked.state;
        if state.is_empty() {
            None
        } else {
            state.slots[state.take_index].as_ref().map(f)
        }
    }

    /// Remove every item for which `keep` returns `false`
    ///
    /// The remaining items keep their order. Returns the number removed; one blocked
    /// putter is woken per removed item.
    pub fn retain(&self, mut keep: impl FnMut(&T) -> bool) -> usize {
        let mut locked = self.lock();
        let mut removed = Vec::new();
        let mut offset = 0;

        while offset < locked.state.count {
            let index = locked.state.physical(offset);
            let keep_it = locked.state.slots[index].as_ref().map_or(true, &mut keep);
            if keep_it {
                offset += 1;
            } else {
                // Later items shift into `offset`, so it is revisited.
                removed.push(locked.remove_at(index));
            }
        }
        drop(locked);

        // Dropped outside the lock.
        removed.len()
    }

    /// Remove every item, appending them in FIFO order to `out`
    ///
    /// Wakes every blocked putter. Returns the number of items moved.
    pub fn drain_into(&self, out: &mut Vec<T>) -> usize {
        let mut locked = self.lock();
        let drained = locked.state.count;

        out.reserve(drained);
        while !locked.state.is_empty() {
            out.push(locked.pop_head());
        }
        if drained > 0 {
            self.not_full.notify_all();
        }
        drained
    }

    /// Drop every queued item and wake every blocked putter
    ///
    /// Items are dropped after the lock is released, so their `Drop` may use the queue.
    pub fn clear(&self) {
        let mut cleared = Vec::new();
        self.drain_into(&mut cleared);
    }

    /// Number of items currently queued
    pub fn len(&self) -> usize {
        self.lock().state.count
    }

    /// Whether the queue currently holds no items
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the queue is currently full
    pub fn is_full(&self) -> bool {
        self.lock().state.is_full()
    }

    /// Maximum number of items the queue holds
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of items that can be inserted before `put` would block
    pub fn remaining_capacity(&self) -> usize {
        self.capacity - self.len()
    }
}

impl<T: PartialEq> BoundedBlockingQueue<T> {
    /// Remove the first item equal to `item`
    ///
    /// Returns `true` if an item was removed. Order of the remaining items is preserved.
    pub fn remove(&self, item: &T) -> bool {
        let mut locked = self.lock();
        let found = (0..locked.state.count)
            .map(|offset| locked.state.physical(offset))
            .find(|&index| locked.state.slots[index].as_ref() == Some(item));

        match found {
            Some(index) => {
                let removed = locked.remove_at(index);
                drop(locked);
                drop(removed);
                true
            }
            None => false,
        }
    }

    /// Whether an item equal to `item` is queued
    pub fn contains(&self, item: &T) -> bool {
        let locked = self.lock();
        let found = locked.state.iter().any(|queued| queued == item);
        found
    }
}

impl<T> MetricsCollector for BoundedBlockingQueue<T> {
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

impl<T> fmt::Debug for BoundedBlockingQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut d = f.debug_struct("BoundedBlockingQueue");
        d.field("capacity", &self.capacity);
        // Formatting from inside `peek_with` or `retain` finds the lock held.
        match self.state.try_lock() {
            Some(state) => d.field("len", &state.count),
            None => d.field("len", &format_args!("<locked>")),
        };
        d.finish()
    }
}

#[cfg(all(test, not(loom)))]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn contents<T: Clone>(queue: &BoundedBlockingQueue<T>) -> Vec<T> {
        queue.lock().state.iter().cloned().collect()
    }

    #[test]
    fn test_try_add_rejects_when_full() {
        let queue = BoundedBlockingQueue::new(3);

        assert!(queue.try_add(1));
        assert!(queue.try_add(2));
        assert!(queue.try_add(3));
        assert!(queue.is_full());
        assert!(!queue.try_add(4));

        assert_eq!(queue.take(), 1);
        assert!(queue.try_add(4));
        assert_eq!(contents(&queue), vec![2, 3, 4]);
    }

    #[test]
    fn test_try_put_returns_rejected_item() {
        let queue = BoundedBlockingQueue::new(1);
        assert_eq!(queue.try_put("a"), Ok(()));
        assert_eq!(queue.try_put("b"), Err("b"));
        assert_eq!(queue.try_take(), Some("a"));
        assert_eq!(queue.try_take(), None);
    }

    #[test]
    fn test_fifo_across_wraparound() {
        let queue = BoundedBlockingQueue::new(3);
        for round in 0..10 {
            queue.put(round * 2);
            queue.put(round * 2 + 1);
            assert_eq!(queue.take(), round * 2);
            assert_eq!(queue.take(), round * 2 + 1);
        }
        assert!(queue.is_empty());
    }

    #[test]
    fn test_capacity_zero_rejected() {
        assert_eq!(
            BoundedBlockingQueue::<u8>::try_new(0).unwrap_err(),
            Error::InvalidCapacity {
                requested: 0,
                minimum: 1
            }
        );
    }

    #[test]
    #[should_panic(expected = "Capacity must be greater than 0")]
    fn test_new_panics_on_zero_capacity() {
        let _ = BoundedBlockingQueue::<u8>::new(0);
    }

    #[test]
    fn test_allocation_failure_reported() {
        let err = BoundedBlockingQueue::<u64>::try_new(usize::MAX).unwrap_err();
        assert_eq!(err, Error::AllocationFailed { capacity: usize::MAX });
    }

    #[test]
    fn test_remove_at_middle_closes_gap() {
        let queue = BoundedBlockingQueue::new(3);
        queue.put(1);
        queue.put(2);
        queue.put(3);

        let mut locked = queue.lock();
        assert_eq!(locked.state.take_index, 0);
        assert_eq!(locked.remove_at(1), 2);
        assert_eq!(locked.state.count, 2);
        assert_eq!(locked.state.put_index, 2);
        assert!(locked.state.slots[2].is_none());
        drop(locked);

        assert_eq!(contents(&queue), vec![1, 3]);
    }

    #[test]
    fn test_remove_at_head_advances_take_index() {
        let queue = BoundedBlockingQueue::new(3);
        queue.put(1);
        queue.put(2);

        let mut locked = queue.lock();
        assert_eq!(locked.remove_at(0), 1);
        assert_eq!(locked.state.take_index, 1);
        assert_eq!(locked.state.put_index, 2);
        drop(locked);

        assert_eq!(queue.take(), 2);
    }

    #[test]
    fn test_remove_at_shifts_across_wrap() {
        let queue = BoundedBlockingQueue::new(4);
        for i in 1..=4 {
            queue.put(i);
        }
        assert_eq!(queue.take(), 1);
        assert_eq!(queue.take(), 2);
        queue.put(5);
        queue.put(6);

        // slots: [5, 6, 3, 4], take_index = 2, put_index = 2
        let mut locked = queue.lock();
        assert_eq!(locked.remove_at(3), 4);
        assert_eq!(locked.state.put_index, 1);
        drop(locked);

        assert_eq!(contents(&queue), vec![3, 5, 6]);
        assert!(queue.try_add(7));
        assert_eq!(contents(&queue), vec![3, 5, 6, 7]);
    }

    #[test]
    fn test_remove_first_match() {
        let queue = BoundedBlockingQueue::new(5);
        for item in [1, 2, 3, 2, 4] {
            queue.put(item);
        }
        assert!(queue.remove(&2));
        assert_eq!(contents(&queue), vec![1, 3, 2, 4]);
        assert!(!queue.remove(&9));
        assert!(queue.contains(&2));
        assert!(!queue.contains(&9));
    }

    #[test]
    fn test_retain_keeps_order() {
        let queue = BoundedBlockingQueue::new(6);
        for i in 0..6 {
            queue.put(i);
        }
        assert_eq!(queue.take(), 0);
        queue.put(6);

        assert_eq!(queue.retain(|item| item % 2 == 0), 3);
        assert_eq!(contents(&queue), vec![2, 4, 6]);
        assert_eq!(queue.remaining_capacity(), 3);
    }

    #[test]
    fn test_peek_and_drain() {
        let queue = BoundedBlockingQueue::new(4);
        assert_eq!(queue.peek_with(|item: &i32| *item), None);
        queue.put(10);
        queue.put(20);
        assert_eq!(queue.peek_with(|item| *item), Some(10));
        assert_eq!(queue.len(), 2);

        let mut out = vec![0];
        assert_eq!(queue.drain_into(&mut out), 2);
        assert_eq!(out, vec![0, 10, 20]);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_debug_while_lock_is_held() {
        let queue = BoundedBlockingQueue::new(4);
        queue.put(1);
        queue.put(2);
        assert_eq!(
            format!("{queue:?}"),
            "BoundedBlockingQueue { capacity: 4, len: 2 }"
        );

        let inside = queue.peek_with(|_| format!("{queue:?}"));
        assert_eq!(
            inside.as_deref(),
            Some("BoundedBlockingQueue { capacity: 4, len: <locked> }")
        );
        assert_eq!(queue.retain(|_| !format!("{queue:?}").is_empty()), 0);
    }

    #[test]
    fn test_drop_releases_remaining_items() {
        static DROP_COUNT: AtomicUsize = AtomicUsize::new(0);

        struct DropCounter;

        impl Drop for DropCounter {
            fn drop(&mut self) {
                DROP_COUNT.fetch_add(1, Ordering::Relaxed);
            }
        }

        let queue = BoundedBlockingQueue::new(8);
        for _ in 0..6 {
            queue.put(DropCounter);
        }
        drop(queue.take());
        drop(queue.take());
        assert_eq!(DROP_COUNT.load(Ordering::Relaxed), 2);

        queue.clear();
        assert_eq!(DROP_COUNT.load(Ordering::Relaxed), 6);

        queue.put(DropCounter);
        queue.put(DropCounter);
        drop(queue);
        assert_eq!(DROP_COUNT.load(Ordering::Relaxed), 8);
    }

    #[cfg(feature = "metrics")]
    #[test]
    fn test_metrics_count_successes_and_rejections() {
        let queue = BoundedBlockingQueue::new(1);
        assert!(queue.try_add(1));
        assert!(!queue.try_add(2));
        assert_eq!(queue.take(), 1);
        assert_eq!(queue.try_take(), None);

        let metrics = queue.metrics();
        assert_eq!(metrics.total_operations, 4);
        assert_eq!(metrics.successful_operations, 2);
        assert_eq!(metrics.rejected_operations, 2);
        assert_eq!(metrics.contended_operations, 0);

        queue.reset_metrics();
        queue.set_metrics_enabled(false);
        assert!(queue.try_add(3));
        assert_eq!(queue.metrics().total_operations, 0);
        assert!(!queue.is_metrics_enabled());
    }
}
