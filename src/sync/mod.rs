//! Synchronization for threads.
//!
//! The kernel itself has no blocking primitives; the only way to wait is
//! [`crate::delay`].

pub mod delay_lock;

pub use delay_lock::{DelayLock, DelayLockGuard};
