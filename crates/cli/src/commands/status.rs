// `pushgate status`: list lease artifacts with age, liveness and owner.

use std::path::PathBuf;

use anyhow::Context;
use clap::Args;
use pushgate_common::types::LeaseScope;
use pushgate_gate::lease::{FsLeaseStore, LeaseManager, LeaseStatus, OwnerRecord};
use serde::Serialize;

use super::{load_config, GateOptions};
use crate::exit_code::ExitCode;
use crate::output::{self, OutputFormat};

#[derive(Debug, Args)]
pub struct StatusArgs {
    /// Force JSON output.
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub lock_root: PathBuf,
    pub ttl_secs: u64,
    pub leases: Vec<LeaseEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LeaseEntry {
    pub scope: LeaseScope,
    pub age_secs: u64,
    pub live: bool,
    pub expires_in_secs: u64,
    pub owner: Option<OwnerRecord>,
}

impl LeaseEntry {
    fn from_status(status: LeaseStatus, ttl_secs: u64) -> Self {
        let age_secs = status.age.as_secs();
        Self {
            scope: status.scope,
            age_secs,
            live: status.live,
            expires_in_secs: ttl_secs.saturating_sub(age_secs),
            owner: status.owner,
        }
    }
}

pub fn run(args: StatusArgs, options: &GateOptions) -> anyhow::Result<std::process::ExitCode> {
    let format = OutputFormat::detect(args.json);
    let config = load_config(options, None, None)?;

    let manager = LeaseManager::new(FsLeaseStore::new(&config.lock_root));
    let statuses = manager
        .inspect(config.ttl())
        .with_context(|| format!("failed to list leases under {}", config.lock_root.display()))?;

    let report = StatusReport {
        lock_root: config.lock_root.clone(),
        ttl_secs: config.ttl_secs,
        leases: statuses
            .into_iter()
            .map(|status| LeaseEntry::from_status(status, config.ttl_secs))
            .collect(),
    };
    output::print_output(format, &report, format_human)?;
    Ok(ExitCode::Success.into())
}

fn format_human(report: &StatusReport) -> String {
    let mut lines =
        vec![format!("Lock root: {} (ttl {}s)", report.lock_root.display(), report.ttl_secs)];
    if report.leases.is_empty() {
        lines.push("  No leases held.".into());
        return lines.join("\n");
    }

    let width = report.leases.iter().map(|l| l.scope.to_string().len()).max().unwrap_or(0);
    for lease in &report.leases {
        let state = if lease.live {
            format!("live, expires in {}s", lease.expires_in_secs)
        } else {
            "stale".to_string()
        };
        let owner = match &lease.owner {
            Some(owner) => match owner.created_at() {
                Some(at) => format!("{} since {}", owner.describe(), at.format("%Y-%m-%d %H:%M:%S UTC")),
                None => owner.describe(),
            },
            None => "unknown owner".to_string(),
        };
        lines.push(format!(
            "  {:<width$}  {:>6}s  {state}  {owner}",
            lease.scope.to_string(),
            lease.age_secs,
        ));
    }
    lines.join("\n")
}
