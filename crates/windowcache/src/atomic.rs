//! Mutex-guarded cell with atomic get/set/mutate

use parking_lot::Mutex;

/// A value protected by a single mutual-exclusion domain.
///
/// Every access goes through the lock: `get` snapshots, `set` replaces,
/// and `mutate` applies a closure to the value as one indivisible step.
/// No two operations on the same cell may interleave.
pub struct Atomic<T> {
    inner: Mutex<T>,
}

impl<T> Atomic<T> {
    /// Wrap a value in an atomic cell
    pub fn new(value: T) -> Self {
        Self {
            inner: Mutex::new(value),
        }
    }

    /// Get a consistent snapshot of the value
    pub fn get(&self) -> T
    where
        T: Clone,
    {
        self.inner.lock().clone()
    }

    /// Atomically replace the value
    pub fn set(&self, value: T) {
        *self.inner.lock() = value;
    }

    /// Atomically read-modify-write the value in place
    ///
    /// The closure runs under the cell's lock; its return value is passed
    /// through so callers can extract data from the same critical section.
    pub fn mutate<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        f(&mut self.inner.lock())
    }
}

impl<T: Default> Default for Atomic<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_get_set() {
        let cell = Atomic::new(1);

        assert_eq!(cell.get(), 1);
        cell.set(2);
        assert_eq!(cell.get(), 2);
    }

    #[test]
    fn test_mutate_returns_closure_value() {
        let cell = Atomic::new(vec![1, 2, 3]);

        let popped = cell.mutate(|v| v.pop());

        assert_eq!(popped, Some(3));
        assert_eq!(cell.get(), vec![1, 2]);
    }

    #[test]
    fn test_concurrent_mutate() {
        let cell = Arc::new(Atomic::new(0u64));
        let mut handles = Vec::new();

        for _ in 0..8 {
            let cell = Arc::clone(&cell);
            handles.push(thread::spawn(move || {
                for _ in 0..1000 {
                    cell.mutate(|n| *n += 1);
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(cell.get(), 8000);
    }
}
