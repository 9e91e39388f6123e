//! Per-key async locks.
//!
//! The fixed-window check is read, decide, then write. `KeyLocks` serializes that
//! sequence for a single key while leaving distinct keys fully independent. Each slot
//! counts the tasks holding or waiting on it and is dropped when the last one leaves,
//! including waiters that are cancelled before they get the lock. The table only grows
//! with in-flight keys.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::OwnedMutexGuard;

#[derive(Debug, Default)]
struct Slot {
    mutex: Arc<tokio::sync::Mutex<()>>,
    users: usize,
}

#[derive(Debug, Default)]
pub(crate) struct KeyLocks {
    slots: Mutex<HashMap<String, Slot>>,
}

/// Held for the duration of one key's read-increment-write.
///
/// Field order matters: the mutex is released before the slot is unregistered.
pub(crate) struct KeyGuard<'a> {
    _guard: OwnedMutexGuard<()>,
    _registration: Registration<'a>,
}

/// One task's claim on a slot, from registration until it leaves (done or cancelled).
struct Registration<'a> {
    locks: &'a KeyLocks,
    key: String,
}

impl KeyLocks {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `key`.
    pub(crate) async fn lock(&self, key: &str) -> KeyGuard<'_> {
        let mutex = {
            let mut slots = self.slots();
            let slot = slots.entry(key.to_string()).or_default();
            slot.users += 1;
            slot.mutex.clone()
        };
        let registration = Registration { locks: self, key: key.to_string() };
        let guard = mutex.lock_owned().await;
        KeyGuard { _guard: guard, _registration: registration }
    }

    /// Number of keys currently locked or awaited.
    #[cfg(test)]
    pub(crate) fn active(&self) -> usize {
        self.slots().len()
    }

    fn slots(&self) -> MutexGuard<'_, HashMap<String, Slot>> {
        self.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Drop for Registration<'_> {
    fn drop(&mut self) {
        let mut slots = self.locks.slots();
        let Some(slot) = slots.get_mut(&self.key) else { return };
        slot.users = slot.users.saturating_sub(1);
        if slot.users == 0 {
            slots.remove(&self.key);
        }
    }
}
