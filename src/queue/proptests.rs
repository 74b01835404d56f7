//! Property-based tests for queues using proptest
//!
//! Each queue is driven by a random operation sequence alongside a `VecDeque` model;
//! after every step the two must agree.

use crate::queue::{spsc_ring_buffer, BoundedBlockingQueue};
use proptest::prelude::*;
use std::collections::VecDeque;

#[derive(Debug, Clone)]
enum QueueOp {
    TryAdd(u16),
    TryTake,
    Remove(u16),
    RetainEven,
}

fn queue_op() -> impl Strategy<Value = QueueOp> {
    prop_oneof![
        4 => any::<u16>().prop_map(|v| QueueOp::TryAdd(v % 32)),
        3 => Just(QueueOp::TryTake),
        2 => any::<u16>().prop_map(|v| QueueOp::Remove(v % 32)),
        1 => Just(QueueOp::RetainEven),
    ]
}

#[derive(Debug, Clone)]
enum RingOp {
    Write(u32),
    Read,
    PopFront,
}

fn ring_op() -> impl Strategy<Value = RingOp> {
    prop_oneof![
        any::<u32>().prop_map(RingOp::Write),
        Just(RingOp::Read),
        Just(RingOp::PopFront),
    ]
}

/// Property: the blocking queue behaves like a bounded VecDeque
#[cfg(test)]
mod bounded_blocking_queue_properties {
    use super::*;

    proptest! {
        #[test]
        fn test_matches_model(
            capacity in 1usize..8,
            operations in prop::collection::vec(queue_op(), 1..200)
        ) {
            let queue = BoundedBlockingQueue::new(capacity);
            let mut model: VecDeque<u16> = VecDeque::new();

            for op in operations {
                match op {
                    QueueOp::TryAdd(value) => {
                        let accepted = queue.try_add(value);
                        prop_assert_eq!(accepted, model.len() < capacity);
                        if accepted {
                            model.push_back(value);
                        }
                    }
                    QueueOp::TryTake => {
                        prop_assert_eq!(queue.try_take(), model.pop_front());
                    }
                    QueueOp::Remove(value) => {
                        let position = model.iter().position(|&queued| queued == value);
                        prop_assert_eq!(queue.remove(&value), position.is_some());
                        if let Some(position) = position {
                            model.remove(position);
                        }
                    }
                    QueueOp::RetainEven => {
                        let before = model.len();
                        model.retain(|queued| queued % 2 == 0);
                        let removed = queue.retain(|queued| queued % 2 == 0);
                        prop_assert_eq!(removed, before - model.len());
                    }
                }

                prop_assert_eq!(queue.len(), model.len());
                prop_assert!(queue.len() <= capacity);
                prop_assert_eq!(queue.is_full(), model.len() == capacity);
                prop_assert_eq!(queue.peek_with(|head| *head), model.front().copied());
            }

            let mut drained = Vec::new();
            queue.drain_into(&mut drained);
            prop_assert_eq!(drained, model.into_iter().collect::<Vec<_>>());
        }

        #[test]
        fn test_try_add_fails_exactly_at_capacity(
            capacity in 1usize..64,
            values in prop::collection::vec(any::<i32>(), 1..128)
        ) {
            let queue = BoundedBlockingQueue::new(capacity);
            for (i, &value) in values.iter().enumerate() {
                prop_assert_eq!(queue.try_add(value), i < capacity);
            }
            for &value in values.iter().take(capacity) {
                prop_assert_eq!(queue.take(), value);
            }
            prop_assert!(queue.is_empty());
        }
    }
}

/// Property: the SPSC ring behaves like a VecDeque bounded at `size - 1`
#[cfg(test)]
mod spsc_ring_buffer_properties {
    use super::*;

    proptest! {
        #[test]
        fn test_matches_model(
            size in 2usize..10,
            operations in prop::collection::vec(ring_op(), 1..300)
        ) {
            let (mut tx, mut rx) = spsc_ring_buffer::<u32>(size);
            let mut model: VecDeque<u32> = VecDeque::new();
            prop_assert_eq!(tx.capacity(), size - 1);

            for op in operations {
                match op {
                    RingOp::Write(value) => {
                        let written = tx.write(value).is_ok();
                        prop_assert_eq!(written, model.len() < size - 1);
                        if written {
                            model.push_back(value);
                        }
                    }
                    RingOp::Read => {
                        prop_assert_eq!(rx.read(), model.pop_front());
                    }
                    RingOp::PopFront => {
                        prop_assert_eq!(rx.front().copied(), model.front().copied());
                        if model.pop_front().is_some() {
                            rx.pop_front();
                        }
                    }
                }

                prop_assert_eq!(rx.size_guess(), model.len());
                prop_assert_eq!(tx.is_empty(), model.is_empty());
                prop_assert_eq!(tx.is_full(), model.len() == size - 1);
                prop_assert_eq!(rx.capacity(), size - 1);
            }
        }
    }
}
