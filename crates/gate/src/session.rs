// Push session: leases persisted by the pre-push hook for the `push`
// wrapper to release once the transfer has finished.
//
// The wrapper creates an empty session file and exports its path through
// `PUSHGATE_SESSION`. The hook appends every lease it persists. Each entry
// carries its lock root, since only the hook sees the push URL.

use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use pushgate_common::types::LeaseScope;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

pub const SESSION_ENV: &str = "PUSHGATE_SESSION";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeldLease {
    pub lock_root: PathBuf,
    pub scope: LeaseScope,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionFile {
    pub session_id: Uuid,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub leases: Vec<HeldLease>,
}

impl SessionFile {
    /// Write a fresh, empty session file under `dir`.
    pub fn create(dir: &Path) -> io::Result<(PathBuf, Self)> {
        std::fs::create_dir_all(dir)?;
        let session = Self { session_id: Uuid::new_v4(), created_at: Utc::now(), leases: Vec::new() };
        let path = dir.join(format!("pushgate-session-{}.json", session.session_id));
        session.save(&path)?;
        debug!(path = %path.display(), "created push session");
        Ok((path, session))
    }

    pub fn load(path: &Path) -> io::Result<Self> {
        let contents = std::fs::read(path)?;
        serde_json::from_slice(&contents).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }

    /// Write through a temporary file and rename, so a reader never sees a
    /// half-written session.
    pub fn save(&self, path: &Path) -> io::Result<()> {
        let contents = serde_json::to_vec_pretty(self)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, contents)?;
        std::fs::rename(&tmp, path)
    }

    /// Append `scopes` held under `lock_root` to the session at `path`.
    pub fn record(path: &Path, lock_root: &Path, scopes: &[LeaseScope]) -> io::Result<()> {
        let mut session = Self::load(path)?;
        for scope in scopes {
            let lease = HeldLease { lock_root: lock_root.to_path_buf(), scope: scope.clone() };
            if !session.leases.contains(&lease) {
                session.leases.push(lease);
            }
        }
        session.save(path)?;
        debug!(path = %path.display(), recorded = scopes.len(), "recorded leases in session");
        Ok(())
    }

    /// Leases grouped by lock root, each group in release order (the
    /// reverse of acquisition).
    pub fn release_plan(&self) -> Vec<(PathBuf, Vec<LeaseScope>)> {
        let mut plan: Vec<(PathBuf, Vec<LeaseScope>)> = Vec::new();
        for lease in self.leases.iter().rev() {
            match plan.iter_mut().find(|(root, _)| *root == lease.lock_root) {
                Some((_, scopes)) => scopes.push(lease.scope.clone()),
                None => plan.push((lease.lock_root.clone(), vec![lease.scope.clone()])),
            }
        }
        plan
    }

    pub fn remove(path: &Path) -> io::Result<()> {
        match std::fs::remove_file(path) {
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            other => other,
        }
    }
}
