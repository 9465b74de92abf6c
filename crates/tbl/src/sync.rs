//! Lock backend selection.
//!
//! Queues and handler cells share one `Mutex` type. With the default
//! `parking_lot` feature it wraps `parking_lot::Mutex`; enabling `spin` swaps
//! in `spin::Mutex` for hosts where parking a worker thread is undesirable.
//! Neither backend poisons, so a panicking step never wedges a queue.

#[cfg(not(any(feature = "parking_lot", feature = "spin")))]
compile_error!("enable either the `parking_lot` or the `spin` feature of `tbl`");

use core::fmt;

pub use std::sync::Arc;

#[cfg(feature = "spin")]
pub type MutexGuard<'a, T> = spin::MutexGuard<'a, T>;
#[cfg(not(feature = "spin"))]
pub type MutexGuard<'a, T> = parking_lot::MutexGuard<'a, T>;

/// Backend-agnostic mutex.
pub struct Mutex<T> {
    #[cfg(feature = "spin")]
    inner: spin::Mutex<T>,
    #[cfg(not(feature = "spin"))]
    inner: parking_lot::Mutex<T>,
}

impl<T> Mutex<T> {
    pub fn new(value: T) -> Self {
        Self {
            #[cfg(feature = "spin")]
            inner: spin::Mutex::new(value),
            #[cfg(not(feature = "spin"))]
            inner: parking_lot::Mutex::new(value),
        }
    }

    /// Acquires the lock, blocking (or spinning) until it is available.
    pub fn lock(&self) -> MutexGuard<'_, T> {
        self.inner.lock()
    }
}

impl<T: Default> Default for Mutex<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T> fmt::Debug for Mutex<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mutex").finish_non_exhaustive()
    }
}
