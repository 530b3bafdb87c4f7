// Core domain types shared across all pushgate crates.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Prefix that marks a reference as a tag.
pub const TAG_REF_PREFIX: &str = "refs/tags/";

/// A commit identifier as reported by git (hex object name).
///
/// An id made only of `0` characters is git's "absent" marker: the remote
/// side has no such reference yet, or the local side is deleting it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommitId(String);

impl CommitId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The all-zero id of the given width (40 for SHA-1, 64 for SHA-256).
    pub fn zero(width: usize) -> Self {
        Self("0".repeat(width))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        !self.0.is_empty() && self.0.bytes().all(|b| b == b'0')
    }
}

impl fmt::Display for CommitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// True when `reference` names a tag (`refs/tags/...`).
pub fn is_tag_reference(reference: &str) -> bool {
    reference.starts_with(TAG_REF_PREFIX)
}

/// One reference the caller wants to move, as reported by the push pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateTuple {
    pub local_ref: String,
    pub local_commit: CommitId,
    pub remote_ref: String,
    pub remote_commit: CommitId,
}

impl UpdateTuple {
    pub fn new(
        local_ref: impl Into<String>,
        local_commit: impl Into<String>,
        remote_ref: impl Into<String>,
        remote_commit: impl Into<String>,
    ) -> Self {
        Self {
            local_ref: local_ref.into(),
            local_commit: CommitId::new(local_commit),
            remote_ref: remote_ref.into(),
            remote_commit: CommitId::new(remote_commit),
        }
    }

    /// The remote reference does not exist yet.
    pub fn creates_reference(&self) -> bool {
        self.remote_commit.is_zero()
    }

    /// The push removes the remote reference.
    pub fn deletes_reference(&self) -> bool {
        self.local_commit.is_zero()
    }
}

/// Unit of exclusion: the whole repository or a single reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", content = "name", rename_all = "snake_case")]
pub enum LeaseScope {
    Global,
    Reference(String),
}

impl LeaseScope {
    pub fn reference(name: impl Into<String>) -> Self {
        Self::Reference(name.into())
    }
}

impl fmt::Display for LeaseScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Global => f.write_str("global"),
            Self::Reference(name) => write!(f, "ref:{name}"),
        }
    }
}

/// Why a reference update was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenyReason {
    NonFastForward,
    ImmutableTagViolation,
}

impl DenyReason {
    pub const fn code(self) -> &'static str {
        match self {
            Self::NonFastForward => "NON_FAST_FORWARD",
            Self::ImmutableTagViolation => "IMMUTABLE_TAG",
        }
    }

    pub const fn describe(self) -> &'static str {
        match self {
            Self::NonFastForward => "update is not a fast-forward of the remote reference",
            Self::ImmutableTagViolation => "tag already exists on the remote and cannot be moved",
        }
    }
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.describe())
    }
}

/// Per-update verdict of the integrity validator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", content = "reason", rename_all = "snake_case")]
pub enum PolicyDecision {
    Allow,
    Deny(DenyReason),
}

impl PolicyDecision {
    pub fn is_allow(&self) -> bool {
        matches!(self, Self::Allow)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_commit_is_absent() {
        assert!(CommitId::zero(40).is_zero());
        assert!(CommitId::zero(64).is_zero());
        assert!(CommitId::new("0000000").is_zero());
        assert!(!CommitId::new("0000a00").is_zero());
        assert!(!CommitId::new("").is_zero());
    }

    #[test]
    fn tag_references_are_detected_by_prefix() {
        assert!(is_tag_reference("refs/tags/v1"));
        assert!(is_tag_reference("refs/tags/release/2024"));
        assert!(!is_tag_reference("refs/heads/tags/v1"));
        assert!(!is_tag_reference("v1"));
    }

    #[test]
    fn update_tuple_creation_and_deletion() {
        let create = UpdateTuple::new("refs/heads/a", "c1", "refs/heads/a", "0".repeat(40));
        assert!(create.creates_reference());
        assert!(!create.deletes_reference());

        let delete = UpdateTuple::new("(delete)", "0".repeat(40), "refs/heads/a", "c1");
        assert!(delete.deletes_reference());
        assert!(!delete.creates_reference());
    }

    #[test]
    fn scopes_order_global_first() {
        let mut scopes = vec![
            LeaseScope::reference("refs/heads/b"),
            LeaseScope::Global,
            LeaseScope::reference("refs/heads/a"),
        ];
        scopes.sort();
        assert_eq!(
            scopes,
            vec![
                LeaseScope::Global,
                LeaseScope::reference("refs/heads/a"),
                LeaseScope::reference("refs/heads/b"),
            ]
        );
    }

    #[test]
    fn scope_display() {
        assert_eq!(LeaseScope::Global.to_string(), "global");
        assert_eq!(LeaseScope::reference("refs/heads/main").to_string(), "ref:refs/heads/main");
    }

    #[test]
    fn scope_serializes_with_kind_tag() {
        let json = serde_json::to_value(LeaseScope::reference("refs/heads/main")).unwrap();
        assert_eq!(json["kind"], "reference");
        assert_eq!(json["name"], "refs/heads/main");

        let global: LeaseScope = serde_json::from_str(r#"{"kind":"global"}"#).unwrap();
        assert_eq!(global, LeaseScope::Global);
    }

    #[test]
    fn deny_reason_codes() {
        assert_eq!(DenyReason::NonFastForward.code(), "NON_FAST_FORWARD");
        assert_eq!(DenyReason::ImmutableTagViolation.code(), "IMMUTABLE_TAG");
        assert!(PolicyDecision::Allow.is_allow());
        assert!(!PolicyDecision::Deny(DenyReason::NonFastForward).is_allow());
    }
}
