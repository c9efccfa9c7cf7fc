use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use rocket::tokio::sync::{OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock};

use crate::model::common::election::ElectionId;

/// One reader/writer lock per election.
///
/// Operations that rely on the election staying in its current state
/// (registering a candidate, recording a ballot, publishing results) hold the
/// read side; status changes hold the write side. So once a close has been
/// committed no ballot can be accepted, and a ballot accepted just before the
/// close is always visible to it.
///
/// Only locks that are held or awaited stay in the map.
#[derive(Default)]
pub struct ElectionLocks {
    locks: Mutex<HashMap<ElectionId, Arc<RwLock<()>>>>,
}

impl ElectionLocks {
    fn lock_for(&self, election_id: ElectionId) -> Arc<RwLock<()>> {
        // Poisoning cannot leave the map half-updated.
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        // Guards and waiters own a clone, and clones are only made under the
        // map mutex, so a lock only the map refers to is idle.
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        locks.entry(election_id).or_default().clone()
    }

    #[cfg(test)]
    fn tracked(&self) -> usize {
        self.locks.lock().unwrap().len()
    }

    /// Hold the election in its current state.
    pub async fn read(&self, election_id: ElectionId) -> OwnedRwLockReadGuard<()> {
        self.lock_for(election_id).read_owned().await
    }

    /// Exclusive access, for changing the election's state.
    pub async fn write(&self, election_id: ElectionId) -> OwnedRwLockWriteGuard<()> {
        self.lock_for(election_id).write_owned().await
    }
}
