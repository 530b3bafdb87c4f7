// Lease storage: the shared area where lease artifacts live.
//
// Layout under the lock store root:
//   locks/global                      global lease
//   locks/refs/<escaped-ref-name>     one lease per reference
//   <artifact>/owner.json             optional owner sidecar
//
// Artifacts are directories because `mkdir` is the create-if-absent
// primitive most consistently atomic across network filesystems.

use std::fs;
use std::io;
use std::path::PathBuf;
use std::time::SystemTime;

use pushgate_common::types::LeaseScope;
use sha2::{Digest, Sha256};
use tracing::debug;

use super::owner::OwnerRecord;

const LOCKS_DIR: &str = "locks";
const GLOBAL_NAME: &str = "global";
const REFS_DIR: &str = "refs";
const OWNER_FILE: &str = "owner.json";

/// Longest escaped name used as-is. Anything longer is shortened to a
/// prefix plus a digest so it stays below NAME_MAX.
const MAX_ESCAPED_LEN: usize = 200;
const DIGEST_PREFIX_LEN: usize = 120;
/// Separates the prefix from the digest. `escape_reference` never emits
/// `%7E` for a short name, so digest names cannot collide with them.
const DIGEST_MARKER: &str = "%7E";

/// Storage primitives the lease manager is built on. Pure storage, no
/// liveness logic.
pub trait LeaseStore {
    /// Atomically create the artifact for `scope`.
    ///
    /// Returns `Ok(false)` when an artifact already exists, including when a
    /// concurrent creator won the race.
    fn try_create(&self, scope: &LeaseScope) -> io::Result<bool>;

    /// Last-modified instant of the artifact, `None` when absent.
    fn modified_at(&self, scope: &LeaseScope) -> io::Result<Option<SystemTime>>;

    /// Remove the artifact and its sidecar. Removing an absent artifact
    /// succeeds.
    fn remove(&self, scope: &LeaseScope) -> io::Result<()>;

    fn write_owner(&self, scope: &LeaseScope, owner: &OwnerRecord) -> io::Result<()>;

    fn read_owner(&self, scope: &LeaseScope) -> io::Result<Option<OwnerRecord>>;

    /// Every scope that currently has an artifact, global first.
    fn list(&self) -> io::Result<Vec<LeaseScope>>;
}

impl<S: LeaseStore + ?Sized> LeaseStore for &S {
    fn try_create(&self, scope: &LeaseScope) -> io::Result<bool> {
        (**self).try_create(scope)
    }

    fn modified_at(&self, scope: &LeaseScope) -> io::Result<Option<SystemTime>> {
        (**self).modified_at(scope)
    }

    fn remove(&self, scope: &LeaseScope) -> io::Result<()> {
        (**self).remove(scope)
    }

    fn write_owner(&self, scope: &LeaseScope, owner: &OwnerRecord) -> io::Result<()> {
        (**self).write_owner(scope, owner)
    }

    fn read_owner(&self, scope: &LeaseScope) -> io::Result<Option<OwnerRecord>> {
        (**self).read_owner(scope)
    }

    fn list(&self) -> io::Result<Vec<LeaseScope>> {
        (**self).list()
    }
}

// ── Filesystem store ───────────────────────────────────────────────

/// Lease store on a (possibly network-mounted) filesystem.
#[derive(Debug, Clone)]
pub struct FsLeaseStore {
    root: PathBuf,
}

impl FsLeaseStore {
    /// `root` is the lock store root; artifacts go under `root/locks`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Deterministic artifact path for a scope.
    pub fn lease_path(&self, scope: &LeaseScope) -> PathBuf {
        let locks = self.root.join(LOCKS_DIR);
        match scope {
            LeaseScope::Global => locks.join(GLOBAL_NAME),
            LeaseScope::Reference(name) => locks.join(REFS_DIR).join(escape_reference(name)),
        }
    }

    fn owner_path(&self, scope: &LeaseScope) -> PathBuf {
        self.lease_path(scope).join(OWNER_FILE)
    }
}

impl LeaseStore for FsLeaseStore {
    fn try_create(&self, scope: &LeaseScope) -> io::Result<bool> {
        let path = self.lease_path(scope);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        match fs::create_dir(&path) {
            Ok(()) => Ok(true),
            Err(error) if error.kind() == io::ErrorKind::AlreadyExists => Ok(false),
            Err(error) => Err(error),
        }
    }

    fn modified_at(&self, scope: &LeaseScope) -> io::Result<Option<SystemTime>> {
        match fs::metadata(self.lease_path(scope)) {
            Ok(metadata) => metadata.modified().map(Some),
            Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(error) => Err(error),
        }
    }

    fn remove(&self, scope: &LeaseScope) -> io::Result<()> {
        let path = self.lease_path(scope);
        let result = if path.is_dir() { fs::remove_dir_all(&path) } else { fs::remove_file(&path) };
        match result {
            Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(()),
            other => other,
        }
    }

    fn write_owner(&self, scope: &LeaseScope, owner: &OwnerRecord) -> io::Result<()> {
        let contents = serde_json::to_vec_pretty(owner).map_err(io::Error::other)?;
        fs::write(self.owner_path(scope), contents)
    }

    fn read_owner(&self, scope: &LeaseScope) -> io::Result<Option<OwnerRecord>> {
        match fs::read(self.owner_path(scope)) {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|error| io::Error::new(io::ErrorKind::InvalidData, error)),
            Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(error) => Err(error),
        }
    }

    fn list(&self) -> io::Result<Vec<LeaseScope>> {
        let mut scopes = Vec::new();
        if self.lease_path(&LeaseScope::Global).exists() {
            scopes.push(LeaseScope::Global);
        }

        let refs_dir = self.root.join(LOCKS_DIR).join(REFS_DIR);
        let entries = match fs::read_dir(&refs_dir) {
            Ok(entries) => entries,
            Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(scopes),
            Err(error) => return Err(error),
        };

        let mut references = Vec::new();
        for entry in entries {
            let entry = entry?;
            let file_name = entry.file_name();
            let Some(file_name) = file_name.to_str() else { continue };
            if is_digest_name(file_name) {
                if let Some(name) = self.digest_entry_reference(file_name) {
                    references.push(name);
                }
            } else if let Some(name) = unescape_reference(file_name) {
                references.push(name);
            }
        }
        references.sort();
        scopes.extend(references.into_iter().map(LeaseScope::Reference));

        Ok(scopes)
    }
}

impl FsLeaseStore {
    /// A digest name cannot be reversed; the owner sidecar names the
    /// reference. Entries whose sidecar is missing or does not map back to
    /// the same artifact are left out.
    fn digest_entry_reference(&self, file_name: &str) -> Option<String> {
        let sidecar = self.root.join(LOCKS_DIR).join(REFS_DIR).join(file_name).join(OWNER_FILE);
        let owner = match fs::read(&sidecar) {
            Ok(bytes) => serde_json::from_slice::<OwnerRecord>(&bytes).ok(),
            Err(_) => None,
        };
        match owner.map(|owner| owner.scope) {
            Some(LeaseScope::Reference(name)) if escape_reference(&name) == file_name => Some(name),
            _ => {
                debug!(artifact = file_name, "lease artifact without a usable owner record");
                None
            }
        }
    }
}

// ── Reference name escaping ────────────────────────────────────────

/// Map a reference name to a single path component.
///
/// `%` and path separators are percent-escaped, so distinct reference names
/// always map to distinct artifacts. Names that would collapse to `.` or
/// `..` have their dots escaped as well. An escaped name longer than
/// [`MAX_ESCAPED_LEN`] becomes an escaped prefix followed by the SHA-256 of
/// the full reference name.
pub fn escape_reference(name: &str) -> String {
    let mut escaped = String::with_capacity(name.len());
    let mut prefix_len = 0;
    for ch in name.chars() {
        match ch {
            '%' => escaped.push_str("%25"),
            '/' => escaped.push_str("%2F"),
            '\\' => escaped.push_str("%5C"),
            _ => escaped.push(ch),
        }
        if escaped.len() <= DIGEST_PREFIX_LEN {
            prefix_len = escaped.len();
        }
    }

    if escaped.len() > MAX_ESCAPED_LEN {
        escaped.truncate(prefix_len);
        escaped.push_str(DIGEST_MARKER);
        escaped.push_str(&sha256_hex(name.as_bytes()));
        return escaped;
    }

    if escaped.is_empty() || escaped == "." || escaped == ".." {
        escaped = escaped.replace('.', "%2E");
        if escaped.is_empty() {
            escaped.push_str("%00");
        }
    }
    escaped
}

fn is_digest_name(escaped: &str) -> bool {
    escaped.contains(DIGEST_MARKER)
}

fn sha256_hex(bytes: &[u8]) -> String {
    Sha256::digest(bytes).iter().map(|byte| format!("{byte:02x}")).collect()
}

/// Inverse of [`escape_reference`]. `None` for names it could not produce,
/// including digest names, which are not reversible.
pub fn unescape_reference(escaped: &str) -> Option<String> {
    if escaped == "%00" {
        return Some(String::new());
    }

    let bytes = escaped.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut index = 0;
    while index < bytes.len() {
        if bytes[index] == b'%' {
            let hex = escaped.get(index + 1..index + 3)?;
            let byte = u8::from_str_radix(hex, 16).ok()?;
            if !matches!(byte, b'%' | b'/' | b'\\' | b'.') {
                return None;
            }
            out.push(byte);
            index += 3;
        } else {
            out.push(bytes[index]);
            index += 1;
        }
    }
    String::from_utf8(out).ok()
}
