//! Non-blocking per-container locks.
//!
//! A container identifier is either free or held by exactly one guard.
//! Acquisition never waits: contention is reported immediately as
//! [`BerthError::Busy`]. Guards are owned values so they can travel into a
//! spawned task and be released there.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;

use berth_common::error::{BerthError, Result};
use berth_common::types::ContainerId;

/// Set of container identifiers currently held by a mutating operation.
#[derive(Debug, Default)]
pub struct LockTable {
    held: Mutex<HashSet<ContainerId>>,
}

impl LockTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Takes the lock for `id` without waiting.
    ///
    /// # Errors
    ///
    /// Returns [`BerthError::Busy`] if another guard holds `id`.
    pub fn try_acquire(self: &Arc<Self>, id: &ContainerId) -> Result<LockGuard> {
        if !self.held.lock().insert(id.clone()) {
            tracing::debug!(id = %id, "lock contended");
            return Err(BerthError::Busy { id: id.to_string() });
        }
        tracing::trace!(id = %id, "lock acquired");
        Ok(LockGuard {
            table: Arc::clone(self),
            id: id.clone(),
        })
    }

    /// Returns whether `id` is currently held.
    #[must_use]
    pub fn is_held(&self, id: &ContainerId) -> bool {
        self.held.lock().contains(id)
    }

    /// Number of identifiers currently held.
    #[must_use]
    pub fn held_count(&self) -> usize {
        self.held.lock().len()
    }
}

/// Ownership of one container's lock; released on drop.
#[derive(Debug)]
pub struct LockGuard {
    table: Arc<LockTable>,
    id: ContainerId,
}

impl LockGuard {
    /// Identifier this guard holds.
    #[must_use]
    pub const fn id(&self) -> &ContainerId {
        &self.id
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        let _ = self.table.held.lock().remove(&self.id);
        tracing::trace!(id = %self.id, "lock released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_acquire_on_same_id_is_busy() {
        let table = LockTable::new();
        let id = ContainerId::new("c-1");
        let _guard = table.try_acquire(&id).expect("first acquire");
        let err = table.try_acquire(&id).unwrap_err();
        assert!(matches!(err, BerthError::Busy { .. }));
    }

    #[test]
    fn different_ids_do_not_contend() {
        let table = LockTable::new();
        let _a = table.try_acquire(&ContainerId::new("a")).expect("a");
        let _b = table.try_acquire(&ContainerId::new("b")).expect("b");
        assert_eq!(table.held_count(), 2);
    }

    #[test]
    fn drop_releases_the_lock() {
        let table = LockTable::new();
        let id = ContainerId::new("c-2");
        {
            let guard = table.try_acquire(&id).expect("acquire");
            assert_eq!(guard.id(), &id);
            assert!(table.is_held(&id));
        }
        assert!(!table.is_held(&id));
        assert!(table.try_acquire(&id).is_ok());
    }

    #[test]
    fn guard_released_from_another_thread() {
        let table = LockTable::new();
        let id = ContainerId::new("c-3");
        let guard = table.try_acquire(&id).expect("acquire");
        std::thread::spawn(move || drop(guard)).join().expect("thread");
        assert!(!table.is_held(&id));
    }
}
