// Integrity policy: fast-forward-only branches, immutable tags.
//
// Validation reads the repository through the supplied predicates only and
// never retries; the caller refreshes remote state once beforehand.

use pushgate_common::types::{is_tag_reference, CommitId, DenyReason, PolicyDecision, UpdateTuple};
use tracing::{debug, info};

use crate::git::{RepoState, RepoStateError};

/// Decide a single update.
///
/// - an existing tag can be neither moved nor deleted; creating one is fine
/// - a reference absent on the remote may be created
/// - deleting a branch is not a fast-forward
/// - otherwise the remote commit must be an ancestor of the local one
pub fn decide<E>(
    update: &UpdateTuple,
    is_ancestor: impl FnOnce(&CommitId, &CommitId) -> Result<bool, E>,
    is_tag: impl Fn(&str) -> bool,
) -> Result<PolicyDecision, E> {
    if is_tag(&update.remote_ref) && !update.creates_reference() {
        return Ok(PolicyDecision::Deny(DenyReason::ImmutableTagViolation));
    }
    if update.creates_reference() {
        return Ok(PolicyDecision::Allow);
    }
    if update.deletes_reference() {
        return Ok(PolicyDecision::Deny(DenyReason::NonFastForward));
    }

    if is_ancestor(&update.remote_commit, &update.local_commit)? {
        Ok(PolicyDecision::Allow)
    } else {
        Ok(PolicyDecision::Deny(DenyReason::NonFastForward))
    }
}

/// Decide every update against `repo`, in input order.
pub fn validate<R: RepoState>(
    repo: &R,
    updates: &[UpdateTuple],
) -> Result<Vec<PolicyDecision>, RepoStateError> {
    updates
        .iter()
        .map(|update| {
            let decision =
                decide(update, |a, b| repo.is_ancestor(a, b), is_tag_reference)?;
            match decision {
                PolicyDecision::Allow => debug!(
                    reference = %update.remote_ref,
                    local = %update.local_commit,
                    remote = %update.remote_commit,
                    "update allowed"
                ),
                PolicyDecision::Deny(reason) => info!(
                    reference = %update.remote_ref,
                    local = %update.local_commit,
                    remote = %update.remote_commit,
                    reason = reason.code(),
                    "update denied"
                ),
            }
            Ok(decision)
        })
        .collect()
}
