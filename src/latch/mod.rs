//! Latch implementations
//!
//! One-shot barriers that gate waiting threads until a condition is met.
//!
//! ## Available Latches
//!
//! - [`CountdownLatch`]: releases every waiter once `count_down` has been called `N` times
//!
//! Latches cannot be reset. Create a new one per phase.

pub mod countdown;

pub use self::countdown::CountdownLatch;
