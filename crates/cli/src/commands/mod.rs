// CLI subcommand dispatch and the flags every subcommand shares.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Subcommand};
use pushgate_gate::config::{
    lock_root_from_url, ConfigLayer, GateConfig, DEFAULT_REMOTE, ENV_GLOBAL_LEASE, ENV_LOCK_ROOT,
    ENV_MAX_ATTEMPTS, ENV_REF_LEASE, ENV_TTL_SECS,
};
use pushgate_gate::git::GitRepoState;
use tracing::debug;

pub mod check;
pub mod push;
pub mod release;
pub mod status;

#[derive(Subcommand)]
pub enum Command {
    /// Gate a push; run from git's pre-push hook
    Check(check::CheckArgs),
    /// Run `git push` holding the gate's leases until the transfer ends
    Push(push::PushArgs),
    /// Release leases explicitly
    Release(release::ReleaseArgs),
    /// List lease artifacts and their owners
    Status(status::StatusArgs),
}

/// Overrides accepted by every subcommand. They win over config files and
/// `PUSHGATE_*` variables.
#[derive(Debug, Clone, Default, Args)]
pub struct GateOptions {
    /// Repository whose configuration applies [default: current directory]
    #[arg(long, global = true, value_name = "PATH")]
    pub repo: Option<PathBuf>,

    /// Shared directory holding the lease artifacts
    #[arg(long, global = true, value_name = "PATH")]
    pub lock_root: Option<PathBuf>,

    /// Seconds after which a lease is considered stale
    #[arg(long, global = true, value_name = "SECS")]
    pub ttl: Option<u64>,

    /// Acquisition attempts per lease before giving up
    #[arg(long, global = true, value_name = "N")]
    pub max_attempts: Option<u32>,

    /// Do not take the repository-wide lease
    #[arg(long, global = true)]
    pub no_global_lease: bool,

    /// Do not take per-reference leases
    #[arg(long, global = true)]
    pub no_ref_lease: bool,
}

impl GateOptions {
    pub fn repo_root(&self) -> PathBuf {
        self.repo.clone().unwrap_or_else(|| PathBuf::from("."))
    }

    pub fn overrides(&self) -> ConfigLayer {
        ConfigLayer {
            ttl_secs: self.ttl,
            max_retry_attempts: self.max_attempts,
            lock_root: self.lock_root.clone(),
            global_lease: self.no_global_lease.then_some(false),
            ref_lease: self.no_ref_lease.then_some(false),
            ..ConfigLayer::default()
        }
    }

    /// The same overrides as `PUSHGATE_*` variables, for a hook running in
    /// a child process.
    pub fn env_overrides(&self) -> Vec<(&'static str, String)> {
        let mut vars = Vec::new();
        if let Some(ttl) = self.ttl {
            vars.push((ENV_TTL_SECS, ttl.to_string()));
        }
        if let Some(attempts) = self.max_attempts {
            vars.push((ENV_MAX_ATTEMPTS, attempts.to_string()));
        }
        if let Some(root) = &self.lock_root {
            vars.push((ENV_LOCK_ROOT, root.display().to_string()));
        }
        if self.no_global_lease {
            vars.push((ENV_GLOBAL_LEASE, "false".to_string()));
        }
        if self.no_ref_lease {
            vars.push((ENV_REF_LEASE, "false".to_string()));
        }
        vars
    }
}

/// Resolve configuration for this invocation.
///
/// `remote` and `push_url` come from git when running as a hook. Otherwise,
/// without a configured lock root, the remote's push URL is asked from git
/// and used when it is a local path.
pub fn load_config(
    options: &GateOptions,
    remote: Option<&str>,
    push_url: Option<&str>,
) -> anyhow::Result<GateConfig> {
    let repo_root = options.repo_root();
    let mut layer = ConfigLayer::discover(&repo_root)
        .with_context(|| format!("failed to read configuration for {}", repo_root.display()))?
        .merge(options.overrides());
    if let Some(remote) = remote {
        layer.remote = Some(remote.to_string());
    }

    let url = match push_url {
        Some(url) => Some(url.to_string()),
        None if layer.lock_root.is_none() => {
            let remote = layer.remote.clone().unwrap_or_else(|| DEFAULT_REMOTE.to_string());
            GitRepoState::new(&repo_root, Some(remote)).push_url().unwrap_or_else(|error| {
                debug!(%error, "could not look up remote push url");
                None
            })
        }
        None => None,
    };

    let config = layer.resolve(url.as_deref().and_then(lock_root_from_url))?;
    debug!(lock_root = %config.lock_root.display(), ttl_secs = config.ttl_secs, "configuration resolved");
    Ok(config)
}

pub fn run(cmd: Command, options: &GateOptions) -> anyhow::Result<std::process::ExitCode> {
    match cmd {
        Command::Check(args) => check::run(args, options),
        Command::Push(args) => push::run(args, options),
        Command::Release(args) => release::run(args, options),
        Command::Status(args) => status::run(args, options),
    }
}
