//! Per-identity save serialization.
//!
//! # Invariants
//! - Two saves for the same key never run concurrently.
//! - Saves for different keys do not block each other.
//! - A slot lives only while some caller holds or waits on it.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use uuid::Uuid;

/// Keyed mutual exclusion around store writes.
#[derive(Debug, Default)]
pub struct SaveLocks {
    slots: Mutex<HashMap<Uuid, Arc<Mutex<()>>>>,
}

impl SaveLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `action` while holding the lock for `key`.
    pub fn with_lock<T>(&self, key: Uuid, action: impl FnOnce() -> T) -> T {
        let slot = {
            let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(slots.entry(key).or_default())
        };
        let result = {
            let _guard = slot.lock().unwrap_or_else(PoisonError::into_inner);
            action()
        };

        // clones are taken and released under the map lock
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        drop(slot);
        if slots.get(&key).is_some_and(|entry| Arc::strong_count(entry) == 1) {
            slots.remove(&key);
        }
        result
    }

    #[cfg(test)]
    fn slot_count(&self) -> usize {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

#[cfg(test)]
mod tests {
    use super::SaveLocks;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;
    use uuid::Uuid;

    #[test]
    fn same_key_saves_never_overlap() {
        let locks = Arc::new(SaveLocks::new());
        let active = Arc::new(AtomicUsize::new(0));
        let key = Uuid::new_v4();

        let handles = (0..8)
            .map(|_| {
                let locks = Arc::clone(&locks);
                let active = Arc::clone(&active);
                thread::spawn(move || {
                    locks.with_lock(key, || {
                        let running = active.fetch_add(1, Ordering::SeqCst);
                        assert_eq!(running, 0);
                        thread::yield_now();
                        active.fetch_sub(1, Ordering::SeqCst);
                    })
                })
            })
            .collect::<Vec<_>>();

        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(locks.slot_count(), 0);
    }

    #[test]
    fn released_slots_are_dropped() {
        let locks = SaveLocks::new();
        for _ in 0..16 {
            let saved = locks.with_lock(Uuid::new_v4(), || 1);
            assert_eq!(saved, 1);
        }
        assert_eq!(locks.slot_count(), 0);

        let key = Uuid::new_v4();
        locks.with_lock(key, || {
            locks.with_lock(Uuid::new_v4(), || ());
            assert_eq!(locks.slot_count(), 1);
        });
        assert_eq!(locks.slot_count(), 0);
    }
}
