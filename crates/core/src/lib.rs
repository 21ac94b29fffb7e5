//! graft core library.
//!
//! This crate provides the engine behind copying commits and pasting them
//! onto another branch: the copy buffer, the transplant state machine with
//! its autostash and conflict gate, hunk-level conflict resolution, rebase
//! TODO projection, and the repository adapter that talks to git.

pub mod autostash;
pub mod config;
pub mod conflict;
pub mod copy_buffer;
pub mod errors;
pub mod git;
pub mod models;
pub mod todo;
pub mod transplant;
pub mod views;

// Re-exports for convenience.
pub use autostash::{AutostashCoordinator, GuardedOutcome};
pub use config::GraftConfig;
pub use conflict::{ConflictGate, HunkSession, StatusCache};
pub use copy_buffer::{CopyBuffer, Notifier};
pub use errors::{CoreError, TransplantError};
pub use git::{GitCli, RepositoryAdapter};
pub use models::{CommitRef, ReplayMode, RepoStatus, StepResult};
pub use todo::RebaseTodoProjector;
pub use transplant::{Decision, Outcome, PendingDecision, Step, TransplantSnapshot, Transplanter};
pub use views::{CommitListView, SubCommitsView, SupportsCommitCopy, SupportsCommitPaste};
