//! Lock abstraction standing in for the kernel's interrupt mask.
//!
//! On a hosted build the critical section is a `parking_lot::Mutex`; with the
//! `lock-free` feature it is a `spin::Mutex`, which is what a bare-metal port
//! without an OS would reach for. Both are non-reentrant: code holding the
//! guard must not call back into the engine.

#[cfg(not(any(feature = "std", feature = "lock-free")))]
compile_error!("enable either the `std` or the `lock-free` feature to select a lock backend");

#[cfg(feature = "lock-free")]
pub type MutexGuard<'a, T> = spin::MutexGuard<'a, T>;
#[cfg(all(feature = "std", not(feature = "lock-free")))]
pub type MutexGuard<'a, T> = parking_lot::MutexGuard<'a, T>;

/// Platform-agnostic mutex wrapper.
pub struct Mutex<T> {
    #[cfg(feature = "lock-free")]
    inner: spin::Mutex<T>,
    #[cfg(all(feature = "std", not(feature = "lock-free")))]
    inner: parking_lot::Mutex<T>,
}

impl<T> Mutex<T> {
    /// Creates a new mutex protecting the given value.
    pub fn new(value: T) -> Self {
        Self {
            #[cfg(feature = "lock-free")]
            inner: spin::Mutex::new(value),
            #[cfg(all(feature = "std", not(feature = "lock-free")))]
            inner: parking_lot::Mutex::new(value),
        }
    }

    /// Enters the critical section, spinning or parking until it is free.
    pub fn lock(&self) -> MutexGuard<'_, T> {
        self.inner.lock()
    }

    /// Enters the critical section only if nobody else holds it.
    pub fn try_lock(&self) -> Option<MutexGuard<'_, T>> {
        self.inner.try_lock()
    }
}

impl<T: Default> Default for Mutex<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}
