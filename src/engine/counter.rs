//! Live-worker counter used for termination bookkeeping.

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Mutex-protected count of live workers in one conveyor.
///
/// Each operation is one lock, one arithmetic step, one unlock. The value only tells `stop`/`kill`
/// how many acknowledgments to wait for; it is never used to gate anything else.
#[derive(Debug, Default)]
pub struct Counter {
    value: Mutex<usize>,
}

impl Counter {
    pub fn new() -> Self {
        Self::default()
    }

    fn guard(&self) -> MutexGuard<'_, usize> {
        // The guarded section is a single add/sub; a poisoned lock still holds a valid count.
        self.value.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add one and return the new value (doubles as the 1-based worker id).
    pub fn increment(&self) -> usize {
        let mut v = self.guard();
        *v += 1;
        *v
    }

    /// Subtract one (saturating at zero) and return the new value.
    pub fn decrement(&self) -> usize {
        let mut v = self.guard();
        *v = v.saturating_sub(1);
        *v
    }

    pub fn read(&self) -> usize {
        *self.guard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn increments_are_sequential() {
        let c = Counter::new();
        assert_eq!(c.increment(), 1);
        assert_eq!(c.increment(), 2);
        assert_eq!(c.decrement(), 1);
        assert_eq!(c.read(), 1);
    }

    #[test]
    fn decrement_saturates() {
        let c = Counter::new();
        assert_eq!(c.decrement(), 0);
    }

    #[test]
    fn concurrent_updates_balance() {
        let c = Arc::new(Counter::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let c = Arc::clone(&c);
                thread::spawn(move || {
                    for _ in 0..1000 {
                        c.increment();
                        c.decrement();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(c.read(), 0);
    }
}
