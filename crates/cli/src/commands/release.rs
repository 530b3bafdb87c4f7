// `pushgate release`: explicit, best-effort lease release.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{ArgGroup, Args};
use pushgate_common::types::LeaseScope;
use pushgate_gate::lease::{FsLeaseStore, LeaseManager};
use pushgate_gate::session::{HeldLease, SessionFile};
use serde::Serialize;
use tracing::warn;

use super::{load_config, GateOptions};
use crate::exit_code::ExitCode;
use crate::output::{self, OutputFormat};

#[derive(Debug, Args)]
#[command(group(
    ArgGroup::new("target")
        .required(true)
        .multiple(true)
        .args(["global", "references", "session"])
))]
pub struct ReleaseArgs {
    /// Release the repository-wide lease
    #[arg(long)]
    global: bool,

    /// Release the lease on a reference (repeatable)
    #[arg(long = "ref", value_name = "REFERENCE")]
    references: Vec<String>,

    /// Release every lease recorded in a push session file, then delete it
    #[arg(long, value_name = "FILE")]
    session: Option<PathBuf>,

    /// Force JSON output.
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Serialize)]
pub struct ReleaseReport {
    pub released: Vec<HeldLease>,
}

pub fn run(args: ReleaseArgs, options: &GateOptions) -> anyhow::Result<std::process::ExitCode> {
    let format = OutputFormat::detect(args.json);
    let mut released = Vec::new();

    let mut scopes = Vec::new();
    if args.global {
        scopes.push(LeaseScope::Global);
    }
    scopes.extend(args.references.iter().map(LeaseScope::reference));

    if !scopes.is_empty() {
        let config = load_config(options, None, None)?;
        let manager = LeaseManager::new(FsLeaseStore::new(&config.lock_root));
        for scope in scopes {
            manager.release(&scope);
            released.push(HeldLease { lock_root: config.lock_root.clone(), scope });
        }
    }

    if let Some(session) = &args.session {
        released.extend(release_session(session)?);
    }

    output::print_output(format, &ReleaseReport { released }, format_human)?;
    Ok(ExitCode::Success.into())
}

/// Release every lease recorded in `path`, newest first, then remove the
/// file.
pub fn release_session(path: &Path) -> anyhow::Result<Vec<HeldLease>> {
    let session = SessionFile::load(path)
        .with_context(|| format!("failed to read push session {}", path.display()))?;

    let mut released = Vec::new();
    for (lock_root, scopes) in session.release_plan() {
        let manager = LeaseManager::new(FsLeaseStore::new(&lock_root));
        for scope in scopes {
            manager.release(&scope);
            released.push(HeldLease { lock_root: lock_root.clone(), scope });
        }
    }

    if let Err(error) = SessionFile::remove(path) {
        warn!(path = %path.display(), %error, "failed to remove push session file");
    }
    Ok(released)
}

fn format_human(report: &ReleaseReport) -> String {
    if report.released.is_empty() {
        return "Nothing to release.".to_string();
    }
    let mut lines = vec![format!("Released {} lease(s):", report.released.len())];
    for lease in &report.released {
        lines.push(format!("  {}  ({})", lease.scope, lease.lock_root.display()));
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pushgate_gate::lease::LeaseStore;
    use tempfile::TempDir;

    #[test]
    fn release_session_removes_recorded_artifacts_and_file() {
        let locks = TempDir::new().unwrap();
        let sessions = TempDir::new().unwrap();
        let store = FsLeaseStore::new(locks.path());
        let main = LeaseScope::reference("refs/heads/main");
        assert!(store.try_create(&LeaseScope::Global).unwrap());
        assert!(store.try_create(&main).unwrap());

        let (path, _) = SessionFile::create(sessions.path()).unwrap();
        SessionFile::record(&path, locks.path(), &[LeaseScope::Global, main.clone()]).unwrap();

        let released = release_session(&path).unwrap();
        let scopes: Vec<_> = released.iter().map(|lease| lease.scope.clone()).collect();
        assert_eq!(scopes, vec![main, LeaseScope::Global]);
        assert!(store.list().unwrap().is_empty());
        assert!(!path.exists());
    }

    #[test]
    fn missing_session_is_an_error() {
        let dir = TempDir::new().unwrap();
        assert!(release_session(&dir.path().join("absent.json")).is_err());
    }

    #[test]
    fn human_report_lists_scopes() {
        let report = ReleaseReport {
            released: vec![HeldLease { lock_root: "/srv/repo.git".into(), scope: LeaseScope::Global }],
        };
        assert_eq!(format_human(&report), "Released 1 lease(s):\n  global  (/srv/repo.git)");
        assert_eq!(format_human(&ReleaseReport { released: vec![] }), "Nothing to release.");
    }
}
