// Lease acquisition, reclaim and release against a `LeaseStore`.

use std::io;
use std::time::{Duration, SystemTime};

use pushgate_common::types::LeaseScope;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::clock::{Clock, SystemClock};
use super::owner::OwnerRecord;
use super::set::LeaseSet;
use super::store::LeaseStore;

#[derive(Debug, Error)]
pub enum LeaseError {
    #[error("lease {scope} is held by another writer")]
    Busy { scope: LeaseScope },

    #[error("lease store failed for {scope}: {source}")]
    Store {
        scope: LeaseScope,
        #[source]
        source: io::Error,
    },
}

impl LeaseError {
    pub fn scope(&self) -> &LeaseScope {
        match self {
            Self::Busy { scope } | Self::Store { scope, .. } => scope,
        }
    }

    fn store(scope: &LeaseScope, source: io::Error) -> Self {
        Self::Store { scope: scope.clone(), source }
    }
}

/// Exponential backoff between acquisition attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    pub base: Duration,
    pub cap: Duration,
}

impl Default for Backoff {
    fn default() -> Self {
        Self { base: Duration::from_secs(1), cap: Duration::from_secs(30) }
    }
}

impl Backoff {
    /// Delay after the failed attempt with 0-based index `attempt`:
    /// `min(base * 2^attempt, cap)`.
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.base.checked_mul(factor).map_or(self.cap, |delay| delay.min(self.cap))
    }
}

/// Diagnostic view of one lease artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaseStatus {
    pub scope: LeaseScope,
    pub age: Duration,
    pub live: bool,
    pub owner: Option<OwnerRecord>,
}

/// Acquires and releases leases. Holds no state of its own: everything
/// lives in the store, shared with other processes.
#[derive(Debug, Clone)]
pub struct LeaseManager<S, C = SystemClock> {
    store: S,
    clock: C,
    backoff: Backoff,
}

impl<S: LeaseStore> LeaseManager<S, SystemClock> {
    pub fn new(store: S) -> Self {
        Self::with_clock(store, SystemClock)
    }
}

impl<S: LeaseStore, C: Clock> LeaseManager<S, C> {
    pub fn with_clock(store: S, clock: C) -> Self {
        Self { store, clock, backoff: Backoff::default() }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Age of the artifact for `scope`, `None` when absent. A modification
    /// time in the future counts as age zero.
    pub fn age(&self, scope: &LeaseScope) -> Result<Option<Duration>, LeaseError> {
        let modified = self.store.modified_at(scope).map_err(|e| LeaseError::store(scope, e))?;
        Ok(modified.map(|at| age_at(self.clock.now(), at)))
    }

    /// Time until the current lease on `scope` expires, zero when there is
    /// none or it is already stale.
    pub fn remaining(&self, scope: &LeaseScope, ttl: Duration) -> Duration {
        match self.age(scope) {
            Ok(Some(age)) => ttl.saturating_sub(age),
            Ok(None) => Duration::ZERO,
            Err(_) => ttl,
        }
    }

    /// One acquisition attempt.
    ///
    /// A live artifact means busy. A stale one is removed best-effort and
    /// the atomic create decides the winner. Store failures other than a
    /// lost create race are errors, not busy.
    pub fn try_acquire(&self, scope: &LeaseScope, ttl: Duration) -> Result<bool, LeaseError> {
        if let Some(age) = self.age(scope)? {
            if age < ttl {
                debug!(%scope, age_secs = age.as_secs(), "lease is live");
                return Ok(false);
            }

            info!(%scope, age_secs = age.as_secs(), ttl_secs = ttl.as_secs(), "reclaiming stale lease");
            if let Err(error) = self.store.remove(scope) {
                warn!(%scope, %error, "failed to remove stale lease, attempting create anyway");
            }
        }

        let created = self.store.try_create(scope).map_err(|e| LeaseError::store(scope, e))?;
        if !created {
            debug!(%scope, "lost lease create race");
            return Ok(false);
        }

        let owner = OwnerRecord::current(scope.clone(), self.clock.now());
        if let Err(error) = self.store.write_owner(scope, &owner) {
            warn!(%scope, %error, "failed to write lease owner record");
        }
        info!(%scope, lease_id = %owner.lease_id, "lease acquired");
        Ok(true)
    }

    /// Up to `max_attempts` calls to [`try_acquire`](Self::try_acquire),
    /// sleeping with exponential backoff between them. No sleep follows the
    /// final attempt. Zero attempts is treated as one.
    pub fn acquire_with_retry(
        &self,
        scope: &LeaseScope,
        ttl: Duration,
        max_attempts: u32,
    ) -> Result<(), LeaseError> {
        let attempts = max_attempts.max(1);
        for attempt in 0..attempts {
            if self.try_acquire(scope, ttl)? {
                return Ok(());
            }

            if attempt + 1 < attempts {
                let delay = self.backoff.delay(attempt);
                debug!(%scope, attempt = attempt + 1, delay_ms = delay.as_millis() as u64, "lease busy, backing off");
                self.clock.sleep(delay);
            }
        }

        warn!(%scope, attempts, "gave up acquiring lease");
        Err(LeaseError::Busy { scope: scope.clone() })
    }

    /// Acquire every scope in the given order, all or nothing. On failure
    /// the scopes already obtained are released before returning.
    pub fn acquire_all(
        &self,
        scopes: &[LeaseScope],
        ttl: Duration,
        max_attempts: u32,
    ) -> Result<LeaseSet<'_, S, C>, LeaseError> {
        let mut held = LeaseSet::empty(self);
        for scope in scopes {
            if let Err(error) = self.acquire_with_retry(scope, ttl, max_attempts) {
                if !held.is_empty() {
                    info!(failed = %scope, held = held.len(), "rolling back partially acquired leases");
                }
                held.release();
                return Err(error);
            }
            held.push(scope.clone());
        }
        Ok(held)
    }

    /// Best-effort release. Failures are logged; an unreleased lease
    /// expires through its TTL.
    pub fn release(&self, scope: &LeaseScope) {
        match self.store.remove(scope) {
            Ok(()) => info!(%scope, "lease released"),
            Err(error) => warn!(%scope, %error, "failed to release lease, it will expire via TTL"),
        }
    }

    /// Every artifact in the store with its age and owner sidecar.
    pub fn inspect(&self, ttl: Duration) -> io::Result<Vec<LeaseStatus>> {
        let now = self.clock.now();
        let mut statuses = Vec::new();
        for scope in self.store.list()? {
            // Released between list and stat.
            let Some(modified) = self.store.modified_at(&scope)? else {
                continue;
            };
            let age = age_at(now, modified);
            let owner = self.store.read_owner(&scope).unwrap_or_else(|error| {
                warn!(%scope, %error, "unreadable lease owner record");
                None
            });
            statuses.push(LeaseStatus { scope, age, live: age < ttl, owner });
        }
        Ok(statuses)
    }
}

fn age_at(now: SystemTime, modified: SystemTime) -> Duration {
    now.duration_since(modified).unwrap_or(Duration::ZERO)
}
