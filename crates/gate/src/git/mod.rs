// Repository state queries backed by the git command line.

pub mod executor;
pub mod repo_state;

pub use executor::{CommandExecutor, CommandResult, ProcessCommandExecutor};
pub use repo_state::{GitRepoState, RepoState, RepoStateError};
