//! Cooperative lock that waits by delaying.

use core::cell::UnsafeCell;
use core::ops::{Deref, DerefMut};
use portable_atomic::{AtomicBool, Ordering};

/// Mutual exclusion between threads for peripherals shared by busy-wait
/// drivers.
///
/// A contended [`lock`](Self::lock) sleeps for `retry_ticks` with
/// [`crate::delay`] and tries again. There is no wait queue, no ownership
/// tracking and no priority inheritance: a low-priority holder can be starved
/// by a higher-priority waiter under the strict-priority policy. Not
/// reentrant, and never usable from interrupt handlers or the idle thread.
pub struct DelayLock<T> {
    locked: AtomicBool,
    retry_ticks: u32,
    value: UnsafeCell<T>,
}

// Safety: access to `value` is serialized by `locked`.
unsafe impl<T: Send> Sync for DelayLock<T> {}

impl<T> DelayLock<T> {
    /// Lock that retries every tick.
    pub const fn new(value: T) -> Self {
        Self::with_retry_ticks(value, 1)
    }

    pub const fn with_retry_ticks(value: T, retry_ticks: u32) -> Self {
        Self {
            locked: AtomicBool::new(false),
            retry_ticks,
            value: UnsafeCell::new(value),
        }
    }

    pub fn try_lock(&self) -> Option<DelayLockGuard<'_, T>> {
        self.locked
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .ok()
            .map(|_| DelayLockGuard { lock: self })
    }

    /// Acquire the lock, calling `backoff(retry_ticks)` between attempts.
    pub fn lock_with(&self, mut backoff: impl FnMut(u32)) -> DelayLockGuard<'_, T> {
        loop {
            if let Some(guard) = self.try_lock() {
                return guard;
            }
            backoff(self.retry_ticks);
        }
    }

    /// Acquire the lock, delaying the calling thread while it is held.
    pub fn lock(&self) -> DelayLockGuard<'_, T> {
        self.lock_with(crate::delay)
    }

    pub fn is_locked(&self) -> bool {
        self.locked.load(Ordering::Relaxed)
    }

    pub fn get_mut(&mut self) -> &mut T {
        self.value.get_mut()
    }

    pub fn into_inner(self) -> T {
        self.value.into_inner()
    }
}

/// Exclusive access to a [`DelayLock`]'s value; unlocks on drop.
pub struct DelayLockGuard<'a, T> {
    lock: &'a DelayLock<T>,
}

impl<T> Deref for DelayLockGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        // Safety: the guard holds the lock.
        unsafe { &*self.lock.value.get() }
    }
}

impl<T> DerefMut for DelayLockGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        // Safety: the guard holds the lock.
        unsafe { &mut *self.lock.value.get() }
    }
}

impl<T> Drop for DelayLockGuard<'_, T> {
    fn drop(&mut self) {
        self.lock.locked.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::cell::RefCell;
    use std::vec::Vec;

    #[test]
    fn test_try_lock_excludes() {
        let lock = DelayLock::new(0u32);
        let guard = lock.try_lock().unwrap();
        assert!(lock.is_locked());
        assert!(lock.try_lock().is_none());
        drop(guard);
        assert!(!lock.is_locked());
        assert!(lock.try_lock().is_some());
    }

    #[test]
    fn test_contention_backs_off_until_released() {
        let lock = DelayLock::with_retry_ticks(5u32, 3);
        let holder = RefCell::new(lock.try_lock());
        let mut waits = Vec::new();

        let mut guard = lock.lock_with(|ticks| {
            waits.push(ticks);
            // Second attempt still fails; the holder lets go on the second wait.
            if waits.len() == 2 {
                holder.borrow_mut().take();
            }
        });
        *guard += 1;
        drop(guard);

        assert_eq!(waits, [3, 3]);
        assert_eq!(*lock.try_lock().unwrap(), 6);
    }

    #[test]
    fn test_uncontended_never_backs_off() {
        let mut lock = DelayLock::new([0u8; 4]);
        lock.lock_with(|_| panic!("no contention expected"))[2] = 9;
        assert_eq!(lock.get_mut()[2], 9);
        assert_eq!(lock.into_inner(), [0, 0, 9, 0]);
    }

    #[test]
    fn test_lock_with_threads() {
        let lock = DelayLock::new(0u32);
        std::thread::scope(|scope| {
            for _ in 0..4 {
                scope.spawn(|| {
                    for _ in 0..100 {
                        *lock.lock_with(|_| std::thread::yield_now()) += 1;
                    }
                });
            }
        });
        assert_eq!(lock.into_inner(), 400);
    }
}
