// Owner sidecar written next to a lease artifact. Diagnostic only: the
// lease manager never reads it to decide liveness or ownership.

use std::time::SystemTime;

use chrono::{DateTime, TimeZone, Utc};
use pushgate_common::types::LeaseScope;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerRecord {
    /// Token identifying this particular acquisition.
    pub lease_id: Uuid,
    pub scope: LeaseScope,
    pub user: String,
    pub host: String,
    pub pid: u32,
    /// Creation instant, seconds since the Unix epoch.
    pub created_epoch: i64,
}

impl OwnerRecord {
    /// Describe the current process as the owner of `scope`.
    pub fn current(scope: LeaseScope, now: SystemTime) -> Self {
        Self {
            lease_id: Uuid::new_v4(),
            scope,
            user: current_user(),
            host: hostname(),
            pid: std::process::id(),
            created_epoch: DateTime::<Utc>::from(now).timestamp(),
        }
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(self.created_epoch, 0).single()
    }

    /// `user@host (pid N)`.
    pub fn describe(&self) -> String {
        format!("{}@{} (pid {})", self.user, self.host, self.pid)
    }
}

fn current_user() -> String {
    std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "unknown".into())
}

fn hostname() -> String {
    std::env::var("HOSTNAME")
        .or_else(|_| std::env::var("HOST"))
        .or_else(|_| std::env::var("COMPUTERNAME"))
        .ok()
        .or_else(|| {
            std::fs::read_to_string("/etc/hostname")
                .ok()
                .map(|name| name.trim().to_string())
                .filter(|name| !name.is_empty())
        })
        .unwrap_or_else(|| "unknown".into())
}
