// Gate error taxonomy. Every variant is fail-closed: the push does not
// proceed.

use std::time::Duration;

use pushgate_common::types::{DenyReason, LeaseScope};
use thiserror::Error;

use crate::git::RepoStateError;
use crate::lease::LeaseError;

#[derive(Debug, Error)]
pub enum GateError {
    /// User-correctable: the update breaks repository history guarantees.
    #[error("{reference}: {reason}")]
    PolicyViolation { reference: String, reason: DenyReason },

    /// Transient: another writer holds the lease.
    #[error("{scope} is locked by another push; retry in about {}s", .retry_after.as_secs().max(1))]
    ResourceBusy { scope: LeaseScope, retry_after: Duration },

    /// Remote-state read or lease store access failed.
    #[error("{context}: {source}")]
    Infrastructure {
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl GateError {
    pub const fn code(&self) -> &'static str {
        match self {
            Self::PolicyViolation { reason, .. } => reason.code(),
            Self::ResourceBusy { .. } => "RESOURCE_BUSY",
            Self::Infrastructure { .. } => "INFRASTRUCTURE",
        }
    }

    /// Worth retrying later without changing the push.
    pub const fn retryable(&self) -> bool {
        !matches!(self, Self::PolicyViolation { .. })
    }

    pub(crate) fn repo_state(context: &str, source: RepoStateError) -> Self {
        Self::Infrastructure { context: context.to_string(), source: Box::new(source) }
    }

    pub(crate) fn lease_store(source: LeaseError) -> Self {
        let context = format!("lease store unavailable for {}", source.scope());
        Self::Infrastructure { context, source: Box::new(source) }
    }
}
