// In-memory lease store with the same atomicity contract as the filesystem
// store. Used to exercise the coordination logic under simulated time.

use std::collections::BTreeMap;
use std::io;
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

use pushgate_common::types::LeaseScope;

use super::clock::Clock;
use super::owner::OwnerRecord;
use super::store::LeaseStore;

#[derive(Debug, Clone)]
struct Artifact {
    modified_at: SystemTime,
    owner: Option<OwnerRecord>,
}

/// Shared map of artifacts guarded by one mutex. `try_create` is an atomic
/// insert-if-absent, so exactly one of several racing creators wins.
pub struct MemoryLeaseStore {
    clock: Arc<dyn Clock + Send + Sync>,
    artifacts: Mutex<BTreeMap<LeaseScope, Artifact>>,
    fail_owner_writes: bool,
}

impl MemoryLeaseStore {
    /// Artifacts are stamped with `clock.now()` at creation.
    pub fn new(clock: Arc<dyn Clock + Send + Sync>) -> Self {
        Self { clock, artifacts: Mutex::new(BTreeMap::new()), fail_owner_writes: false }
    }

    /// Make every owner sidecar write fail.
    pub fn with_failing_owner_writes(mut self) -> Self {
        self.fail_owner_writes = true;
        self
    }

    /// Plant an artifact with an explicit modification time, as if another
    /// process had created it then.
    pub fn insert_at(&self, scope: LeaseScope, modified_at: SystemTime) {
        self.lock().insert(scope, Artifact { modified_at, owner: None });
    }

    pub fn contains(&self, scope: &LeaseScope) -> bool {
        self.lock().contains_key(scope)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<LeaseScope, Artifact>> {
        self.artifacts.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl LeaseStore for MemoryLeaseStore {
    fn try_create(&self, scope: &LeaseScope) -> io::Result<bool> {
        let mut artifacts = self.lock();
        if artifacts.contains_key(scope) {
            return Ok(false);
        }
        artifacts.insert(scope.clone(), Artifact { modified_at: self.clock.now(), owner: None });
        Ok(true)
    }

    fn modified_at(&self, scope: &LeaseScope) -> io::Result<Option<SystemTime>> {
        Ok(self.lock().get(scope).map(|artifact| artifact.modified_at))
    }

    fn remove(&self, scope: &LeaseScope) -> io::Result<()> {
        self.lock().remove(scope);
        Ok(())
    }

    fn write_owner(&self, scope: &LeaseScope, owner: &OwnerRecord) -> io::Result<()> {
        if self.fail_owner_writes {
            return Err(io::Error::new(io::ErrorKind::PermissionDenied, "sidecar write refused"));
        }
        match self.lock().get_mut(scope) {
            Some(artifact) => {
                artifact.owner = Some(owner.clone());
                Ok(())
            }
            None => Err(io::Error::new(io::ErrorKind::NotFound, "no artifact for sidecar")),
        }
    }

    fn read_owner(&self, scope: &LeaseScope) -> io::Result<Option<OwnerRecord>> {
        Ok(self.lock().get(scope).and_then(|artifact| artifact.owner.clone()))
    }

    fn list(&self) -> io::Result<Vec<LeaseScope>> {
        Ok(self.lock().keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lease::clock::ManualClock;
    use std::time::Duration;

    #[test]
    fn create_stamps_current_time() {
        let clock = Arc::new(ManualClock::at_epoch_secs(500));
        let store = MemoryLeaseStore::new(clock.clone());

        assert!(store.try_create(&LeaseScope::Global).unwrap());
        assert!(!store.try_create(&LeaseScope::Global).unwrap());
        assert_eq!(
            store.modified_at(&LeaseScope::Global).unwrap(),
            Some(SystemTime::UNIX_EPOCH + Duration::from_secs(500))
        );
    }

    #[test]
    fn sidecar_requires_artifact() {
        let clock = Arc::new(ManualClock::at_epoch_secs(0));
        let store = MemoryLeaseStore::new(clock.clone());
        let owner = OwnerRecord::current(LeaseScope::Global, clock.now());

        assert!(store.write_owner(&LeaseScope::Global, &owner).is_err());
        store.try_create(&LeaseScope::Global).unwrap();
        store.write_owner(&LeaseScope::Global, &owner).unwrap();
        assert_eq!(store.read_owner(&LeaseScope::Global).unwrap(), Some(owner));
    }

    #[test]
    fn list_orders_global_first() {
        let clock = Arc::new(ManualClock::at_epoch_secs(0));
        let store = MemoryLeaseStore::new(clock);
        store.try_create(&LeaseScope::reference("refs/heads/z")).unwrap();
        store.try_create(&LeaseScope::Global).unwrap();

        assert_eq!(
            store.list().unwrap(),
            vec![LeaseScope::Global, LeaseScope::reference("refs/heads/z")]
        );
    }
}
