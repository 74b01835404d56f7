//! Single-Producer, Single-Consumer (SPSC) Ring Buffer
//!
//! A fixed-size, lock-free circular buffer for low-latency hand-off between exactly one
//! writer thread and exactly one reader thread. No operation ever blocks; `write` and
//! `read` report full/empty immediately and callers poll.
//!
//! ## Memory Ordering Model
//!
//! ```text
//! Producer (write)                   Consumer (read)
//! ----------------                   ---------------
//! load write_index (Relaxed)         load read_index  (Relaxed)
//! load read_index  (Acquire)  <---   store read_index (Release)   after moving out
//! construct slot
//! store write_index (Release) --->   load write_index (Acquire)   before moving out
//! ```
//!
//! Each side owns one index and is the only writer of it, so it reads its own index
//! relaxed. The other side's index is read with `Acquire`, pairing with that side's
//! `Release` publication. A slot is therefore fully constructed before the consumer can
//! see it, and fully vacated before the producer can reuse it.
//!
//! ## Layout
//!
//! A ring of `size` slots holds at most `size - 1` values. One slot always stays empty
//! so that `read_index == write_index` means empty and `write_index + 1 == read_index`
//! means full, with no shared counter. Both indices sit on their own cache line.
//!
//! ## Single Producer, Single Consumer
//!
//! The write side must only ever be driven by one thread and the read side by one
//! thread. [`SpscRingBuffer::split`] hands out one [`Producer`] and one [`Consumer`];
//! both take `&mut self` for mutating calls and neither is `Sync`, so safe code cannot
//! break this rule.

use core::cell::Cell;
use core::fmt;
use core::marker::PhantomData;
use core::mem::{self, MaybeUninit};
use core::ptr;

use crossbeam_utils::CachePadded;

use crate::sync::{Arc, AtomicUsize, Ordering, UnsafeCell};
use crate::trace::debug;
use crate::util::{ring_distance, try_alloc, wrapping_increment};
use crate::{Error, Result};

/// Smallest slot count an [`SpscRingBuffer`] accepts (usable capacity 1).
pub const MIN_RING_SIZE: usize = 2;

/// Create a ring buffer of `size` slots and split it into its two endpoints.
///
/// # Panics
///
/// Panics if `size < 2` or the storage cannot be allocated.
///
/// # Examples
///
/// ```rust
/// use velocityx_sync::queue::spsc_ring_buffer;
///
/// let (mut tx, mut rx) = spsc_ring_buffer::<char>(4);
/// assert_eq!(tx.capacity(), 3);
///
/// assert!(tx.write('a').is_ok());
/// assert!(tx.write('b').is_ok());
/// assert!(tx.write('c').is_ok());
/// assert_eq!(tx.write('d'), Err('d'));
///
/// assert_eq!(rx.read(), Some('a'));
/// assert!(tx.write('d').is_ok());
/// ```
pub fn spsc_ring_buffer<T>(size: usize) -> (Producer<T>, Consumer<T>) {
    SpscRingBuffer::new(size).split()
}

/// A lock-free SPSC ring buffer
///
/// Owns the storage and both indices. Observers are available here; writing and reading
/// go through the endpoints returned by [`split`](Self::split).
#[repr(C)]
pub struct SpscRingBuffer<T> {
    // Mutated only by the consumer.
    read_index: CachePadded<AtomicUsize>,
    // Mutated only by the producer.
    write_index: CachePadded<AtomicUsize>,
    slots: Box<[UnsafeCell<MaybeUninit<T>>]>,
    size: usize,
}

// Safety: values move from the producer thread to the consumer thread (`T: Send`).
// Slots in [read_index, write_index) belong to the consumer, every other slot to the
// producer, and ownership of a slot changes hands only through a Release/Acquire pair.
unsafe impl<T: Send> Send for SpscRingBuffer<T> {}
unsafe impl<T: Send> Sync for SpscRingBuffer<T> {}

impl<T> SpscRingBuffer<T> {
    /// Create a ring buffer with `size` slots (capacity `size - 1`)
    ///
    /// # Panics
    ///
    /// Panics if `size < 2` or the storage cannot be allocated.
    pub fn new(size: usize) -> Self {
        assert!(size >= MIN_RING_SIZE, "Ring buffer size must be at least 2");
        match Self::try_new(size) {
            Ok(ring) => ring,
            Err(err) => panic!("{err}"),
        }
    }

    /// Create a ring buffer with `size` slots, reporting bad input
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidCapacity`] if `size < 2`
    /// - [`Error::AllocationFailed`] if the storage cannot be reserved
    pub fn try_new(size: usize) -> Result<Self> {
        if size < MIN_RING_SIZE {
            return Err(Error::InvalidCapacity {
                requested: size,
                minimum: MIN_RING_SIZE,
            });
        }

        let mut slots = try_alloc::<UnsafeCell<MaybeUninit<T>>>(size)?;
        slots.extend((0..size).map(|_| UnsafeCell::new(MaybeUninit::uninit())));
        debug!(size, capacity = size - 1, "spsc ring buffer created");

        Ok(Self {
            read_index: CachePadded::new(AtomicUsize::new(0)),
            write_index: CachePadded::new(AtomicUsize::new(0)),
            slots: slots.into_boxed_slice(),
            size,
        })
    }

    /// Split into the producer and consumer endpoints
    pub fn split(self) -> (Producer<T>, Consumer<T>) {
        let ring = Arc::new(self);
        (
            Producer {
                ring: Arc::clone(&ring),
                _not_sync: PhantomData,
            },
            Consumer {
                ring,
                _not_sync: PhantomData,
            },
        )
    }

    /// Whether the buffer held no values at the moment of the call
    pub fn is_empty(&self) -> bool {
        self.read_index.load(Ordering::Acquire) == self.write_index.load(Ordering::Acquire)
    }

    /// Whether the buffer was full at the moment of the call
    pub fn is_full(&self) -> bool {
        let next = wrapping_increment(self.write_index.load(Ordering::Acquire), self.size);
        next == self.read_index.load(Ordering::Acquire)
    }

    /// Approximate number of values in the buffer
    ///
    /// Exact when neither side is mid-operation; otherwise a snapshot good only for
    /// heuristics such as backoff decisions. Never exceeds `size - 1`.
    pub fn size_guess(&self) -> usize {
        let write = self.write_index.load(Ordering::Acquire);
        let read = self.read_index.load(Ordering::Acquire);
        ring_distance(read, write, self.size)
    }

    /// Maximum number of values the buffer holds (`size - 1`)
    #[inline]
    pub fn capacity(&self) -> usize {
        self.size - 1
    }

    /// The write slot and its successor, or `None` if the buffer is full.
    #[inline]
    fn claim_write_slot(&self) -> Option<(usize, usize)> {
        let current = self.write_index.load(Ordering::Relaxed);
        let next = wrapping_increment(current, self.size);
        if next == self.read_index.load(Ordering::Acquire) {
            None
        } else {
            Some((current, next))
        }
    }

    /// The read slot, or `None` if the buffer is empty.
    #[inline]
    fn claim_read_slot(&self) -> Option<usize> {
        let current = self.read_index.load(Ordering::Relaxed);
        if current == self.write_index.load(Ordering::Acquire) {
            None
        } else {
            Some(current)
        }
    }

    /// Construct `value` in the claimed write slot and publish it.
    ///
    /// # Safety
    ///
    /// Producer only; `(current, next)` must come from `claim_write_slot`.
    #[inline]
    unsafe fn publish(&self, current: usize, next: usize, value: T) {
        // Safety: the slot lies outside [read_index, write_index), so the consumer does
        // not touch it and it holds no live value.
        self.slots[current].with_mut(|slot| unsafe { ptr::write(slot, MaybeUninit::new(value)) });
        self.write_index.store(next, Ordering::Release);
    }

    /// Hand slot `current` back to the producer.
    #[inline]
    fn release(&self, current: usize) {
        self.read_index
            .store(wrapping_increment(current, self.size), Ordering::Release);
    }
}

impl<T> Drop for SpscRingBuffer<T> {
    fn drop(&mut self) {
        if !mem::needs_drop::<T>() {
            return;
        }

        let mut index = self.read_index.load(Ordering::Acquire);
        let end = self.write_index.load(Ordering::Acquire);
        while index != end {
            // Safety: every slot in [read_index, write_index) holds a live value and
            // no endpoint remains to observe it.
            self.slots[index].with_mut(|slot| unsafe { ptr::drop_in_place((*slot).as_mut_ptr()) });
            index = wrapping_increment(index, self.size);
        }
    }
}

impl<T> fmt::Debug for SpscRingBuffer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpscRingBuffer")
            .field("capacity", &self.capacity())
            .field("size_guess", &self.size_guess())
            .finish()
    }
}

/// The write side of an [`SpscRingBuffer`]
///
/// `Send` but not `Sync`: move it to the one producer thread.
pub struct Producer<T> {
    ring: Arc<SpscRingBuffer<T>>,
    _not_sync: PhantomData<Cell<()>>,
}

impl<T> Producer<T> {
    /// Append `value` if there is room
    ///
    /// # Errors
    ///
    /// Returns `Err(value)` when the buffer is full, handing the value back.
    #[inline]
    pub fn write(&mut self, value: T) -> core::result::Result<(), T> {
        match self.ring.claim_write_slot() {
            Some((current, next)) => {
                // Safety: `&mut self` on the only producer; the slot was just claimed.
                unsafe { self.ring.publish(current, next, value) };
                Ok(())
            }
            None => Err(value),
        }
    }

    /// Construct a value in place with `make` if there is room
    ///
    /// `make` runs only after a free slot is found. Returns `false` when the buffer is
    /// full, in which case `make` is never called.
    #[inline]
    pub fn write_with(&mut self, make: impl FnOnce() -> T) -> bool {
        match self.ring.claim_write_slot() {
            Some((current, next)) => {
                let value = make();
                // Safety: `&mut self` on the only producer; the slot was just claimed.
                unsafe { self.ring.publish(current, next, value) };
                true
            }
            None => false,
        }
    }

    /// Whether the buffer was empty at the moment of the call
    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    /// Whether the buffer was full at the moment of the call
    pub fn is_full(&self) -> bool {
        self.ring.is_full()
    }

    /// Approximate number of values in the buffer
    pub fn size_guess(&self) -> usize {
        self.ring.size_guess()
    }

    /// Maximum number of values the buffer holds
    #[inline]
    pub fn capacity(&self) -> usize {
        self.ring.capacity()
    }
}

impl<T> fmt::Debug for Producer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Producer").field("ring", &self.ring).finish()
    }
}

/// The read side of an [`SpscRingBuffer`]
///
/// `Send` but not `Sync`: move it to the one consumer thread.
pub struct Consumer<T> {
    ring: Arc<SpscRingBuffer<T>>,
    _not_sync: PhantomData<Cell<()>>,
}

impl<T> Consumer<T> {
    /// Remove and return the oldest value, or `None` if the buffer is empty
    #[inline]
    pub fn read(&mut self) -> Option<T> {
        let current = self.ring.claim_read_slot()?;
        // Safety: the Acquire load in `claim_read_slot` observed the producer's
        // publication of `current`; moving out leaves the slot logically uninitialized.
        let value = self.ring.slots[current]
            .with(|slot| unsafe { ptr::read(slot).assume_init() });
        self.ring.release(current);
        Some(value)
    }

    /// Borrow the oldest value without removing it
    ///
    /// The borrow must end before [`pop_front`](Self::pop_front) or
    /// [`read`](Self::read), which the borrow checker enforces.
    #[inline]
    pub fn front(&self) -> Option<&T> {
        let current = self.ring.claim_read_slot()?;
        // Safety: slot `current` is published and stays live until this consumer
        // releases it, which requires `&mut self`.
        let value = self.ring.slots[current].with(|slot| unsafe { &*(*slot).as_ptr() });
        Some(value)
    }

    /// Drop the oldest value
    ///
    /// The buffer must not be empty; check with [`front`](Self::front) first. Calling
    /// this on an empty buffer trips a debug assertion and is otherwise a no-op.
    #[inline]
    pub fn pop_front(&mut self) {
        let current = self.ring.claim_read_slot();
        debug_assert!(current.is_some(), "pop_front on an empty ring buffer");

        if let Some(current) = current {
            // Safety: as in `read`; the value is dropped in place instead of moved out.
            self.ring.slots[current]
                .with_mut(|slot| unsafe { ptr::drop_in_place((*slot).as_mut_ptr()) });
            self.ring.release(current);
        }
    }

    /// Whether the buffer was empty at the moment of the call
    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    /// Whether the buffer was full at the moment of the call
    pub fn is_full(&self) -> bool {
        self.ring.is_full()
    }

    /// Approximate number of values in the buffer
    pub fn size_guess(&self) -> usize {
        self.ring.size_guess()
    }

    /// Maximum number of values the buffer holds
    #[inline]
    pub fn capacity(&self) -> usize {
        self.ring.capacity()
    }
}

impl<T> fmt::Debug for Consumer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Consumer").field("ring", &self.ring).finish()
    }
}
