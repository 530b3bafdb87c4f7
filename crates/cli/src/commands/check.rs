// `pushgate check`: pre-push hook entry point.
//
// git runs the hook as `pre-push <remote> <url>` with one update per stdin
// line. Exit 0 lets the push continue.

use std::io;
use std::path::PathBuf;

use anyhow::Context;
use clap::Args;
use pushgate_common::update::read_updates;
use pushgate_gate::gate::PushGate;
use pushgate_gate::git::GitRepoState;
use pushgate_gate::lease::{FsLeaseStore, LeaseManager};
use pushgate_gate::session::{SessionFile, SESSION_ENV};
use tracing::{debug, info};

use super::{load_config, GateOptions};
use crate::exit_code::ExitCode;
use crate::output;

#[derive(Debug, Args)]
pub struct CheckArgs {
    /// Name of the remote being pushed to
    remote: Option<String>,

    /// URL of the remote being pushed to
    url: Option<String>,
}

pub fn run(args: CheckArgs, options: &GateOptions) -> anyhow::Result<std::process::ExitCode> {
    let config = load_config(options, args.remote.as_deref(), args.url.as_deref())?;

    let parsed = read_updates(io::stdin().lock()).context("failed to read push updates")?;
    for skipped in &parsed.skipped {
        output::print_warning(&format!(
            "ignoring input line {}: {}",
            skipped.line_number, skipped.reason
        ));
    }

    let lock_root = config.lock_root.clone();
    let repo = GitRepoState::new(options.repo_root(), Some(config.remote.clone()));
    let leases = LeaseManager::new(FsLeaseStore::new(&lock_root));
    let gate = PushGate::new(repo, leases, config);

    let held = gate.evaluate(&parsed.updates)?;

    match std::env::var_os(SESSION_ENV) {
        Some(session) if !held.is_empty() => {
            let session = PathBuf::from(session);
            // Recorded before persisting: if recording fails the set drops
            // and the leases are released.
            SessionFile::record(&session, &lock_root, held.scopes())
                .with_context(|| format!("failed to record leases in {}", session.display()))?;
            let scopes = held.persist();
            info!(leases = scopes.len(), session = %session.display(), "leases handed to push session");
        }
        _ => {
            debug!(leases = held.len(), "no push session, leases end with the hook");
            held.release();
        }
    }

    Ok(ExitCode::Success.into())
}
