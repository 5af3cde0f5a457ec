//! Per-key miss coalescing.
//!
//! A caller that misses the cache takes the key's slot before running its
//! producer; concurrent callers for the same key wait on the slot and then
//! re-check the cache instead of producing again.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Default)]
pub struct SingleFlight {
    slots: DashMap<String, Arc<Mutex<()>>>,
}

impl SingleFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait until no other caller holds `key`, then hold it.
    ///
    /// Cancelling the wait releases the slot like dropping the guard does.
    pub async fn acquire(&self, key: &str) -> FlightGuard<'_> {
        let slot = Arc::clone(self.slots.entry(key.to_string()).or_default().value());
        let release = SlotRelease {
            flights: self,
            key: key.to_string(),
        };
        let guard = slot.lock_owned().await;
        FlightGuard {
            _guard: guard,
            _release: release,
        }
    }

    /// Number of keys currently held or waited on.
    pub fn in_flight(&self) -> usize {
        self.slots.len()
    }
}

/// Holds a key's slot. Fields drop in order: the lock first, then the slot.
pub struct FlightGuard<'a> {
    _guard: OwnedMutexGuard<()>,
    _release: SlotRelease<'a>,
}

struct SlotRelease<'a> {
    flights: &'a SingleFlight,
    key: String,
}

impl Drop for SlotRelease<'_> {
    fn drop(&mut self) {
        // Only the map's own handle left means nobody holds or waits.
        self.flights
            .slots
            .remove_if(&self.key, |_, slot| Arc::strong_count(slot) == 1);
    }
}
