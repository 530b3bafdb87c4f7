// `pushgate push`: run `git push` inside a push session.
//
// The pre-push hook (`pushgate check`) records the leases it takes in the
// session instead of dropping them, so they cover the transfer itself. They
// are released here once git exits, fails or is interrupted.

use std::path::Path;
use std::process::ExitStatus;

use anyhow::Context;
use clap::Args;
use pushgate_gate::session::{SessionFile, SESSION_ENV};
use tracing::{debug, info, warn};

use super::release::release_session;
use super::GateOptions;
use crate::exit_code::ExitCode;

#[derive(Debug, Args)]
pub struct PushArgs {
    /// Arguments passed through to `git push`
    #[arg(trailing_var_arg = true, allow_hyphen_values = true, value_name = "GIT_PUSH_ARGS")]
    pub git_args: Vec<String>,
}

pub fn run(args: PushArgs, options: &GateOptions) -> anyhow::Result<std::process::ExitCode> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;
    runtime.block_on(push(args, options))
}

async fn push(args: PushArgs, options: &GateOptions) -> anyhow::Result<std::process::ExitCode> {
    let (session, _) = SessionFile::create(&std::env::temp_dir())
        .context("failed to create push session")?;

    let outcome = run_git_push(&args, options, &session).await;

    // Every exit path ends here, including a failed spawn and Ctrl-C.
    match release_session(&session) {
        Ok(released) => debug!(leases = released.len(), "push session closed"),
        Err(error) => warn!(error = %format!("{error:#}"), "failed to release push session"),
    }
    outcome
}

async fn run_git_push(
    args: &PushArgs,
    options: &GateOptions,
    session: &Path,
) -> anyhow::Result<std::process::ExitCode> {
    let mut command = tokio::process::Command::new("git");
    command
        .arg("push")
        .args(&args.git_args)
        .current_dir(options.repo_root())
        .env(SESSION_ENV, session)
        .envs(options.env_overrides())
        .kill_on_drop(true);

    info!(args = ?args.git_args, "running git push");
    let mut child = command.spawn().context("failed to run git push")?;

    tokio::select! {
        status = child.wait() => {
            let status = status.context("failed waiting for git push")?;
            Ok(mirror_status(status))
        }
        signal = tokio::signal::ctrl_c() => {
            signal.context("failed to listen for Ctrl-C")?;
            warn!("interrupted, stopping git push");
            if let Err(error) = child.kill().await {
                warn!(%error, "failed to stop git push");
            }
            Ok(ExitCode::Interrupted.into())
        }
    }
}

/// Exit code of the wrapped git process; killed by a signal counts as
/// interrupted.
fn mirror_status(status: ExitStatus) -> std::process::ExitCode {
    match status.code() {
        Some(code) => std::process::ExitCode::from(u8::try_from(code).unwrap_or(1)),
        None => ExitCode::Interrupted.into(),
    }
}
