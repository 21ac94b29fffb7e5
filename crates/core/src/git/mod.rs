//! Repository adapter boundary.
//!
//! The engine never talks to git directly. Everything it needs from the
//! backend goes through [`RepositoryAdapter`]; [`GitCli`] is the real
//! implementation.

pub mod client;

pub use client::GitCli;

use crate::conflict::ConflictSides;
use crate::errors::BackendError;
use crate::models::{CommitRef, MergeStrategy, ReplayMode, RepoStatus, StepResult};

/// Raw contents of an interactive rebase's plan files.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RebaseTodoFiles {
    /// Entries already executed, oldest first. The last one is where the
    /// rebase currently stands.
    pub done: String,
    /// Entries still to run.
    pub todo: String,
}

/// Operations the engine consumes from the version-control backend.
///
/// Every method is a blocking call. Methods take `&self` because the
/// state they touch lives in the repository, not in the adapter.
pub trait RepositoryAdapter {
    /// Commits reachable from `rev`, newest first.
    fn list_commits(&self, rev: &str, limit: usize) -> Result<Vec<CommitRef>, BackendError>;

    /// Full id of the commit HEAD points at.
    fn head(&self) -> Result<String, BackendError>;

    /// Checked-out branch name; `None` when HEAD is detached.
    fn current_branch(&self) -> Result<Option<String>, BackendError>;

    fn status(&self) -> Result<RepoStatus, BackendError>;

    /// Replay `commits`, in order, onto HEAD.
    fn replay(&self, commits: &[CommitRef], mode: ReplayMode) -> Result<StepResult, BackendError>;

    fn continue_replay(&self, mode: ReplayMode) -> Result<StepResult, BackendError>;

    /// Roll back the in-flight replay with the backend's own abort.
    fn abort_replay(&self, mode: ReplayMode) -> Result<(), BackendError>;

    fn skip_current_step(&self, mode: ReplayMode) -> Result<StepResult, BackendError>;

    /// Record the stopped step as an empty commit, then carry on.
    fn commit_empty(&self, mode: ReplayMode) -> Result<StepResult, BackendError>;

    fn reset_hard(&self, id: &str) -> Result<(), BackendError>;

    fn stash_push(&self, label: &str) -> Result<(), BackendError>;

    fn stash_pop(&self) -> Result<(), BackendError>;

    fn stash_count(&self) -> Result<usize, BackendError>;

    /// Message of the newest stash entry, if there is one.
    fn stash_top_message(&self) -> Result<Option<String>, BackendError>;

    /// Settle a textual conflict with a whole-file strategy and stage it.
    fn resolve_file_with_strategy(&self, path: &str, strategy: MergeStrategy) -> Result<(), BackendError>;

    /// Stage one path as-is. Callers that must refuse unresolved content go
    /// through the conflict gate.
    fn stage_file(&self, path: &str) -> Result<(), BackendError>;

    fn stage_all(&self) -> Result<(), BackendError>;

    /// Remove a path from the index and worktree.
    fn remove_file(&self, path: &str) -> Result<(), BackendError>;

    fn conflict_sides(&self, path: &str) -> Result<ConflictSides, BackendError>;

    /// Worktree bytes of `path`; `None` if it does not exist.
    fn read_file(&self, path: &str) -> Result<Option<Vec<u8>>, BackendError>;

    fn write_file(&self, path: &str, content: &[u8]) -> Result<(), BackendError>;

    /// `None` when no interactive rebase is active.
    fn read_rebase_todo(&self) -> Result<Option<RebaseTodoFiles>, BackendError>;

    fn write_rebase_todo(&self, todo: &str) -> Result<(), BackendError>;

    /// The engine's saved operation, as last written by
    /// [`write_operation_state`](Self::write_operation_state).
    fn read_operation_state(&self) -> Result<Option<String>, BackendError>;

    /// Save the engine's in-flight operation next to the repository so a
    /// later process can pick it up. `None` clears it.
    fn write_operation_state(&self, state: Option<&str>) -> Result<(), BackendError>;
}
