use std::path::PathBuf;

use pushgate_common::types::CommitId;
use thiserror::Error;
use tracing::debug;

use super::executor::{CommandExecutor, CommandResult, ProcessCommandExecutor};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RepoStateError {
    #[error("failed to run `{command}`: {message}")]
    SpawnFailed { command: String, message: String },

    #[error("`{command}` failed with code {code:?}: {stderr}")]
    CommandFailed { command: String, code: Option<i32>, stderr: String },
}

/// Read access to the repository state the integrity policy is checked
/// against. Failures are infrastructure problems, never policy verdicts.
pub trait RepoState {
    /// Bring the local view of the given remote references up to date.
    fn refresh(&self, references: &[&str]) -> Result<(), RepoStateError>;

    /// Whether `ancestor` is reachable from `descendant`.
    fn is_ancestor(&self, ancestor: &CommitId, descendant: &CommitId)
        -> Result<bool, RepoStateError>;

    /// Commit a name resolves to, `None` when it does not resolve.
    fn resolve_reference(&self, name: &str) -> Result<Option<CommitId>, RepoStateError>;
}

impl<R: RepoState + ?Sized> RepoState for &R {
    fn refresh(&self, references: &[&str]) -> Result<(), RepoStateError> {
        (**self).refresh(references)
    }

    fn is_ancestor(
        &self,
        ancestor: &CommitId,
        descendant: &CommitId,
    ) -> Result<bool, RepoStateError> {
        (**self).is_ancestor(ancestor, descendant)
    }

    fn resolve_reference(&self, name: &str) -> Result<Option<CommitId>, RepoStateError> {
        (**self).resolve_reference(name)
    }
}

/// [`RepoState`] backed by the `git` binary.
#[derive(Debug, Clone)]
pub struct GitRepoState<E = ProcessCommandExecutor> {
    repo_path: PathBuf,
    remote: Option<String>,
    executor: E,
}

impl GitRepoState<ProcessCommandExecutor> {
    pub fn new(repo_path: impl Into<PathBuf>, remote: Option<String>) -> Self {
        Self::with_executor(repo_path, remote, ProcessCommandExecutor)
    }
}

impl<E: CommandExecutor> GitRepoState<E> {
    pub fn with_executor(repo_path: impl Into<PathBuf>, remote: Option<String>, executor: E) -> Self {
        Self { repo_path: repo_path.into(), remote, executor }
    }

    /// URL the configured remote pushes to, `None` without a remote.
    pub fn push_url(&self) -> Result<Option<String>, RepoStateError> {
        let Some(remote) = self.remote.as_deref() else {
            return Ok(None);
        };
        let args = vec![
            "remote".to_string(),
            "get-url".to_string(),
            "--push".to_string(),
            remote.to_string(),
        ];
        let result = self.run(&args)?;
        if !result.success {
            return Err(command_failed(&args, &result));
        }
        let url = result.stdout.trim();
        Ok((!url.is_empty()).then(|| url.to_string()))
    }

    fn run(&self, args: &[String]) -> Result<CommandResult, RepoStateError> {
        self.executor.execute("git", args, &self.repo_path).map_err(|error| {
            RepoStateError::SpawnFailed {
                command: format!("git {}", args.join(" ")),
                message: error.to_string(),
            }
        })
    }
}

fn command_failed(args: &[String], result: &CommandResult) -> RepoStateError {
    RepoStateError::CommandFailed {
        command: format!("git {}", args.join(" ")),
        code: result.code,
        stderr: result.diagnostic().to_string(),
    }
}

impl<E: CommandExecutor> RepoState for GitRepoState<E> {
    fn refresh(&self, references: &[&str]) -> Result<(), RepoStateError> {
        let Some(remote) = self.remote.as_deref() else {
            debug!("no remote configured, skipping refresh");
            return Ok(());
        };
        if references.is_empty() {
            return Ok(());
        }

        let mut args = vec!["fetch".to_string(), "--quiet".to_string(), "--no-tags".to_string()];
        args.push(remote.to_string());
        args.extend(references.iter().map(|reference| reference.to_string()));

        let result = self.run(&args)?;
        if !result.success {
            return Err(command_failed(&args, &result));
        }
        debug!(remote, count = references.len(), "refreshed remote references");
        Ok(())
    }

    fn is_ancestor(
        &self,
        ancestor: &CommitId,
        descendant: &CommitId,
    ) -> Result<bool, RepoStateError> {
        // A commit we do not have cannot be an ancestor of a local commit.
        if self.resolve_reference(ancestor.as_str())?.is_none() {
            debug!(%ancestor, "ancestor candidate not present locally");
            return Ok(false);
        }

        let args = vec![
            "merge-base".to_string(),
            "--is-ancestor".to_string(),
            ancestor.to_string(),
            descendant.to_string(),
        ];
        let result = self.run(&args)?;
        match (result.success, result.code) {
            (true, _) => Ok(true),
            (false, Some(1)) => Ok(false),
            _ => Err(command_failed(&args, &result)),
        }
    }

    fn resolve_reference(&self, name: &str) -> Result<Option<CommitId>, RepoStateError> {
        let args = vec![
            "rev-parse".to_string(),
            "--verify".to_string(),
            "--quiet".to_string(),
            format!("{name}^{{commit}}"),
        ];
        let result = self.run(&args)?;
        match (result.success, result.code) {
            (true, _) => Ok(Some(CommitId::new(result.stdout.trim()))),
            (false, Some(1)) if result.stdout.trim().is_empty() => Ok(None),
            _ => Err(command_failed(&args, &result)),
        }
    }
}
