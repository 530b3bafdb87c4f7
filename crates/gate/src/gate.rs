// Push gate: validate first, then lease, all or nothing.
//
// Validation happens before any lease is taken and is not repeated
// afterwards. Another writer can land between the two; the window is
// accepted.

use std::collections::BTreeSet;

use pushgate_common::types::{is_tag_reference, LeaseScope, PolicyDecision, UpdateTuple};
use tracing::{debug, info, warn};

use crate::config::GateConfig;
use crate::error::GateError;
use crate::git::RepoState;
use crate::lease::{Clock, LeaseError, LeaseManager, LeaseSet, LeaseStore, SystemClock};
use crate::policy;

pub struct PushGate<R, S, C = SystemClock> {
    repo: R,
    leases: LeaseManager<S, C>,
    config: GateConfig,
}

impl<R: RepoState, S: LeaseStore, C: Clock> PushGate<R, S, C> {
    pub fn new(repo: R, leases: LeaseManager<S, C>, config: GateConfig) -> Self {
        Self { repo, leases, config }
    }

    pub fn leases(&self) -> &LeaseManager<S, C> {
        &self.leases
    }

    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    /// Scopes a push of `updates` must hold, in acquisition order: global
    /// first, then each distinct remote reference in lexical order.
    pub fn lease_scopes(&self, updates: &[UpdateTuple]) -> Vec<LeaseScope> {
        let mut scopes = Vec::new();
        if self.config.enable_global_lease {
            scopes.push(LeaseScope::Global);
        }
        if self.config.enable_per_reference_lease {
            let references: BTreeSet<&str> =
                updates.iter().map(|update| update.remote_ref.as_str()).collect();
            scopes.extend(references.into_iter().map(LeaseScope::reference));
        }
        scopes
    }

    /// Decide whether the push may proceed.
    ///
    /// `Ok` carries the held leases; dropping the set releases them. Any
    /// `Err` leaves nothing held.
    pub fn evaluate(&self, updates: &[UpdateTuple]) -> Result<LeaseSet<'_, S, C>, GateError> {
        if updates.is_empty() {
            debug!("no updates, nothing to gate");
            return Ok(LeaseSet::empty(&self.leases));
        }

        self.refresh(updates)?;

        let decisions = policy::validate(&self.repo, updates)
            .map_err(|e| GateError::repo_state("could not read repository state", e))?;
        for (update, decision) in updates.iter().zip(&decisions) {
            if let PolicyDecision::Deny(reason) = decision {
                warn!(reference = %update.remote_ref, reason = reason.code(), "push rejected by policy");
                return Err(GateError::PolicyViolation {
                    reference: update.remote_ref.clone(),
                    reason: *reason,
                });
            }
        }

        let scopes = self.lease_scopes(updates);
        let ttl = self.config.ttl();
        match self.leases.acquire_all(&scopes, ttl, self.config.max_retry_attempts) {
            Ok(held) => {
                info!(updates = updates.len(), leases = held.len(), "push may proceed");
                Ok(held)
            }
            Err(LeaseError::Busy { scope }) => {
                let retry_after = self.leases.remaining(&scope, ttl);
                warn!(%scope, retry_after_secs = retry_after.as_secs(), "push rejected, lease busy");
                Err(GateError::ResourceBusy { scope, retry_after })
            }
            Err(error @ LeaseError::Store { .. }) => {
                warn!(scope = %error.scope(), %error, "push rejected, lease store failed");
                Err(GateError::lease_store(error))
            }
        }
    }

    /// Fetch the remote references whose ancestry will be checked.
    fn refresh(&self, updates: &[UpdateTuple]) -> Result<(), GateError> {
        if !self.config.fetch_before_validate {
            return Ok(());
        }

        let references: BTreeSet<&str> = updates
            .iter()
            .filter(|update| !update.creates_reference() && !update.deletes_reference())
            .map(|update| update.remote_ref.as_str())
            .filter(|reference| !is_tag_reference(reference))
            .collect();
        let references: Vec<&str> = references.into_iter().collect();

        self.repo
            .refresh(&references)
            .map_err(|e| GateError::repo_state("could not refresh remote state", e))
    }
}
