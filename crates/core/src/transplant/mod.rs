//! Transplant orchestration.
//!
//! A transplant replays copied commits onto the current branch. The engine
//! runs until it needs the user, then hands back a [`PendingDecision`]; the
//! caller answers with [`Transplanter::resume`]. Between those calls the
//! engine holds no thread or callback, only its state.

pub mod engine;

pub use engine::Transplanter;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::conflict::ConflictedFile;
use crate::models::{CommitRef, ReplayMode};

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Where the current transplant stands.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationStatus {
    #[default]
    Idle,
    AwaitingConfirmation,
    Running,
    NoOpPending,
    Conflicted,
    Completed,
    Aborted,
    Cancelled,
}

impl OperationStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Aborted | Self::Cancelled)
    }
}

impl std::fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::AwaitingConfirmation => "awaiting confirmation",
            Self::Running => "running",
            Self::NoOpPending => "empty commit pending",
            Self::Conflicted => "conflicted",
            Self::Completed => "completed",
            Self::Aborted => "aborted",
            Self::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// Decisions
// ---------------------------------------------------------------------------

/// An answer to a [`PendingDecision`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Confirm,
    Decline,
    /// Drop the commit that would be empty.
    Skip,
    /// Record the empty commit and carry on.
    CreateEmpty,
    /// Stop the whole operation at an empty commit.
    Cancel,
    /// Conflicts are resolved; carry on.
    Continue,
    /// Roll the operation back.
    Abort,
}

impl Decision {
    /// Menu text for the choice.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Confirm => "Yes",
            Self::Decline => "No",
            Self::Skip => "Skip this cherry-pick",
            Self::CreateEmpty => "Create empty commit and continue",
            Self::Cancel => "Cancel",
            Self::Continue => "Continue",
            Self::Abort => "Abort",
        }
    }
}

impl std::fmt::Display for Decision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Confirm => "confirm",
            Self::Decline => "decline",
            Self::Skip => "skip",
            Self::CreateEmpty => "create-empty",
            Self::Cancel => "cancel",
            Self::Continue => "continue",
            Self::Abort => "abort",
        };
        f.write_str(s)
    }
}

/// The point at which the engine is waiting for the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum PendingDecision {
    /// "Are you sure you want to paste N commits?"
    ConfirmPaste { count: usize },
    /// The worktree is dirty and must be stashed first.
    ConfirmAutostash { dirty_files: usize },
    /// The step would create an empty commit. `commit` is unknown only for
    /// a replay adopted from outside the engine.
    EmptyCommit { commit: Option<CommitRef> },
    /// The step stopped on conflicts.
    Conflicts { files: Vec<ConflictedFile> },
    /// Conflicts are gone but tracked changes are unstaged.
    StageRemaining { paths: Vec<String> },
    /// Abort is destructive and always confirmed.
    ConfirmAbort,
}

const YES_NO: &[Decision] = &[Decision::Confirm, Decision::Decline];
const EMPTY_COMMIT: &[Decision] = &[Decision::Skip, Decision::CreateEmpty, Decision::Cancel];
const CONFLICTS: &[Decision] = &[Decision::Continue, Decision::Abort];

impl PendingDecision {
    /// The exact set of answers this point accepts.
    pub fn choices(&self) -> &'static [Decision] {
        match self {
            Self::EmptyCommit { .. } => EMPTY_COMMIT,
            Self::Conflicts { .. } => CONFLICTS,
            Self::ConfirmPaste { .. }
            | Self::ConfirmAutostash { .. }
            | Self::StageRemaining { .. }
            | Self::ConfirmAbort => YES_NO,
        }
    }

    pub fn accepts(&self, decision: Decision) -> bool {
        self.choices().contains(&decision)
    }

    pub fn status(&self) -> OperationStatus {
        match self {
            Self::ConfirmPaste { .. } | Self::ConfirmAutostash { .. } => OperationStatus::AwaitingConfirmation,
            Self::EmptyCommit { .. } => OperationStatus::NoOpPending,
            Self::Conflicts { .. } | Self::StageRemaining { .. } | Self::ConfirmAbort => OperationStatus::Conflicted,
        }
    }

    pub fn prompt(&self) -> String {
        match self {
            Self::ConfirmPaste { count } if *count == 1 => {
                "Are you sure you want to paste 1 commit onto this branch?".to_string()
            }
            Self::ConfirmPaste { count } => {
                format!("Are you sure you want to paste {} commits onto this branch?", count)
            }
            Self::ConfirmAutostash { dirty_files } => format!(
                "You have {} uncommitted change(s). Stash all changes and continue?",
                dirty_files
            ),
            Self::EmptyCommit { commit: Some(c) } => format!(
                "Cherry-picking {} ({}) would create an empty commit.",
                c.short_id(),
                c.subject
            ),
            Self::EmptyCommit { commit: None } => {
                "The current step would create an empty commit.".to_string()
            }
            Self::Conflicts { files } => format!(
                "Conflicts! {} file(s) need resolving. Continue once all are resolved, or abort.",
                files.len()
            ),
            Self::StageRemaining { paths } => format!(
                "{} file(s) have unstaged changes. Stage them and continue?",
                paths.len()
            ),
            Self::ConfirmAbort => "Are you sure you want to abort? Changes from this operation will be discarded.".to_string(),
        }
    }
}

impl std::fmt::Display for PendingDecision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::ConfirmPaste { .. } => "confirming paste",
            Self::ConfirmAutostash { .. } => "confirming autostash",
            Self::EmptyCommit { .. } => "deciding on an empty commit",
            Self::Conflicts { .. } => "resolving conflicts",
            Self::StageRemaining { .. } => "confirming staging",
            Self::ConfirmAbort => "confirming abort",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// What a finished transplant did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransplantReport {
    pub id: Uuid,
    pub mode: ReplayMode,
    /// Commits replayed with content.
    pub applied: Vec<CommitRef>,
    /// Commits dropped because they were empty.
    pub skipped: Vec<CommitRef>,
    /// Commits recorded as empty commits.
    pub emptied: Vec<CommitRef>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl TransplantReport {
    pub fn new(mode: ReplayMode) -> Self {
        Self {
            id: Uuid::new_v4(),
            mode,
            applied: Vec::new(),
            skipped: Vec::new(),
            emptied: Vec::new(),
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    /// Commits that ended up in history, content or not.
    pub fn created(&self) -> usize {
        self.applied.len() + self.emptied.len()
    }
}

/// Terminal result of a transplant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum Outcome {
    Completed { report: TransplantReport },
    Aborted { report: TransplantReport },
    Cancelled { report: TransplantReport },
    /// A confirmation was declined before anything ran.
    Declined,
    /// Commits were handed to an active rebase's TODO list.
    Queued { count: usize },
}

impl Outcome {
    pub fn report(&self) -> Option<&TransplantReport> {
        match self {
            Self::Completed { report } | Self::Aborted { report } | Self::Cancelled { report } => Some(report),
            Self::Declined | Self::Queued { .. } => None,
        }
    }

    pub fn status(&self) -> OperationStatus {
        match self {
            Self::Completed { .. } | Self::Queued { .. } => OperationStatus::Completed,
            Self::Aborted { .. } => OperationStatus::Aborted,
            Self::Cancelled { .. } => OperationStatus::Cancelled,
            Self::Declined => OperationStatus::Idle,
        }
    }
}

/// What `paste` or `resume` returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Suspended(PendingDecision),
    Finished(Outcome),
}

impl Step {
    pub fn pending(&self) -> Option<&PendingDecision> {
        match self {
            Self::Suspended(pending) => Some(pending),
            Self::Finished(_) => None,
        }
    }

    pub fn outcome(&self) -> Option<&Outcome> {
        match self {
            Self::Finished(outcome) => Some(outcome),
            Self::Suspended(_) => None,
        }
    }
}

/// Immutable view of the engine, replaced wholesale on every transition.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransplantSnapshot {
    pub status: OperationStatus,
    pub mode: Option<ReplayMode>,
    /// Commits not yet replayed, in replay order.
    pub remaining: Vec<CommitRef>,
    pub applied: Vec<CommitRef>,
    pub pending: Option<PendingDecision>,
    pub conflicts: Vec<ConflictedFile>,
    pub stash_held: bool,
    /// Commit to select after the operation, the branch tip once finished.
    pub select_commit: Option<String>,
}
