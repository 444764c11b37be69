//! First-come-first-served spin lock.
//!
//! Each `lock` call draws a ticket and waits until that ticket is served.
//! Waiters are admitted strictly in arrival order, so a thread that locks in
//! a tight loop cannot overtake a waiter that arrived before it.

use std::cell::UnsafeCell;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Busy-wait iterations before a waiter starts yielding its time slice.
const SPIN_LIMIT: u32 = 64;

pub struct TicketMutex<T> {
    next_ticket: AtomicUsize,
    now_serving: AtomicUsize,
    value: UnsafeCell<T>,
}

// SAFETY: access to `value` is serialized by the ticket protocol; at most one
// guard exists at a time, so sharing the mutex only requires `T: Send`.
unsafe impl<T: Send> Send for TicketMutex<T> {}
unsafe impl<T: Send> Sync for TicketMutex<T> {}

impl<T> TicketMutex<T> {
    pub const fn new(value: T) -> Self {
        Self {
            next_ticket: AtomicUsize::new(0),
            now_serving: AtomicUsize::new(0),
            value: UnsafeCell::new(value),
        }
    }

    /// Acquire the lock, waiting behind every earlier caller.
    pub fn lock(&self) -> TicketMutexGuard<'_, T> {
        let ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed);

        let mut spins = 0u32;
        while self.now_serving.load(Ordering::Acquire) != ticket {
            if spins < SPIN_LIMIT {
                spins += 1;
                std::hint::spin_loop();
            } else {
                std::thread::yield_now();
            }
        }

        TicketMutexGuard { mutex: self }
    }

    pub fn get_mut(&mut self) -> &mut T {
        self.value.get_mut()
    }

    pub fn into_inner(self) -> T {
        self.value.into_inner()
    }
}

impl<T: Default> Default for TicketMutex<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T> fmt::Debug for TicketMutex<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TicketMutex")
            .field("next_ticket", &self.next_ticket.load(Ordering::Relaxed))
            .field("now_serving", &self.now_serving.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

/// Grants access to the protected value until dropped.
pub struct TicketMutexGuard<'a, T> {
    mutex: &'a TicketMutex<T>,
}

impl<T> Deref for TicketMutexGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: the guard holds the currently served ticket.
        unsafe { &*self.mutex.value.get() }
    }
}

impl<T> DerefMut for TicketMutexGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: the guard holds the currently served ticket.
        unsafe { &mut *self.mutex.value.get() }
    }
}

impl<T> Drop for TicketMutexGuard<'_, T> {
    fn drop(&mut self) {
        self.mutex.now_serving.fetch_add(1, Ordering::Release);
    }
}
