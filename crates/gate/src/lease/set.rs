// Scoped ownership of a group of leases.

use pushgate_common::types::LeaseScope;

use super::clock::Clock;
use super::manager::LeaseManager;
use super::store::LeaseStore;

/// Leases held by this process, released in reverse acquisition order when
/// the set is released or dropped.
///
/// [`persist`](Self::persist) hands the leases off instead: they stay in the
/// store until another process releases them or their TTL runs out.
#[must_use = "dropping a LeaseSet releases its leases immediately"]
pub struct LeaseSet<'a, S: LeaseStore, C: Clock> {
    manager: &'a LeaseManager<S, C>,
    scopes: Vec<LeaseScope>,
}

impl<'a, S: LeaseStore, C: Clock> LeaseSet<'a, S, C> {
    pub(crate) fn empty(manager: &'a LeaseManager<S, C>) -> Self {
        Self { manager, scopes: Vec::new() }
    }

    pub(crate) fn push(&mut self, scope: LeaseScope) {
        self.scopes.push(scope);
    }

    pub fn scopes(&self) -> &[LeaseScope] {
        &self.scopes
    }

    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.scopes.len()
    }

    pub fn release(mut self) {
        self.release_all();
    }

    /// Stop managing the leases without releasing them.
    pub fn persist(mut self) -> Vec<LeaseScope> {
        std::mem::take(&mut self.scopes)
    }

    fn release_all(&mut self) {
        while let Some(scope) = self.scopes.pop() {
            self.manager.release(&scope);
        }
    }
}

impl<S: LeaseStore, C: Clock> Drop for LeaseSet<'_, S, C> {
    fn drop(&mut self) {
        self.release_all();
    }
}

impl<S: LeaseStore, C: Clock> std::fmt::Debug for LeaseSet<'_, S, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LeaseSet").field("scopes", &self.scopes).finish()
    }
}
