//! Error types for the graft core library.
//!
//! Each subsystem has its own error type derived with `thiserror`, and a
//! top-level [`CoreError`] enum unifies them all for callers that want a
//! single error type.

use thiserror::Error;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Unified error type for the entire core library.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error(transparent)]
    Transplant(#[from] TransplantError),

    #[error(transparent)]
    Conflict(#[from] ConflictError),

    #[error(transparent)]
    Todo(#[from] TodoError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

// ---------------------------------------------------------------------------
// Backend errors
// ---------------------------------------------------------------------------

/// Errors from the repository adapter (git CLI and `git2` reads).
#[derive(Debug, Error)]
pub enum BackendError {
    /// The `git` binary was not found on `$PATH`.
    #[error("git binary not found: {0}")]
    BinaryNotFound(String),

    /// A `git` command exited with a non-zero status and left no replay
    /// in progress.
    #[error("`{command}` failed (exit {exit_code}): {stderr}")]
    CommandFailed {
        command: String,
        exit_code: i32,
        stderr: String,
    },

    /// The repository path does not exist or is not a git repo.
    #[error("git repository not found at '{0}'")]
    RepositoryNotFound(String),

    /// A revision could not be resolved.
    #[error("git ref not found: {0}")]
    RefNotFound(String),

    /// The repository has no commits yet.
    #[error("repository has no HEAD commit")]
    UnbornHead,

    /// A file git or graft writes as text held invalid UTF-8.
    #[error("'{0}' is not valid UTF-8")]
    InvalidEncoding(String),

    /// A `git2` library error.
    #[error("git2 error: {0}")]
    Git2Error(#[from] git2::Error),

    /// Generic I/O wrapper.
    #[error("git I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Transplant errors
// ---------------------------------------------------------------------------

/// Errors surfaced at the orchestrator boundary.
#[derive(Debug, Error)]
pub enum TransplantError {
    /// A confirmation prompt was answered negatively.
    #[error("declined by user")]
    UserDeclined,

    /// Staging or continuing was attempted while textual conflicts remain.
    #[error("unresolved conflicts remain in: {}", .paths.join(", "))]
    ConflictStillPresent { paths: Vec<String> },

    /// The backend failed for a reason other than conflicts.
    #[error("backend invocation failed: {0}")]
    BackendInvocationFailed(#[from] BackendError),

    /// Paste was requested with nothing copied.
    #[error("no commits have been copied")]
    EmptyCopyBuffer,

    /// Another operation is already in flight for this repository.
    #[error("a {kind} is already in progress")]
    OperationInFlight { kind: String },

    /// Merge commits are only replayed by cherry-pick (`-m 1`). A rebase
    /// plan cannot pick them.
    #[error("{id} is a merge commit and can only be pasted with cherry-pick")]
    MergeCommitUnsupported { id: String },

    /// `resume` was called while nothing was pending.
    #[error("no decision is pending")]
    NoPendingDecision,

    /// The decision is not one of the choices offered.
    #[error("'{decision}' is not a valid answer while {pending}")]
    InvalidDecision { decision: String, pending: String },

    /// Conflict session / file handling error.
    #[error(transparent)]
    Conflict(#[from] ConflictError),

    /// Rebase TODO editing error.
    #[error(transparent)]
    Todo(#[from] TodoError),
}

impl TransplantError {
    /// Whether this error is the clean "user said no" case.
    pub fn is_declined(&self) -> bool {
        matches!(self, Self::UserDeclined)
    }
}

// ---------------------------------------------------------------------------
// Conflict errors
// ---------------------------------------------------------------------------

/// Errors from conflict parsing and hunk resolution.
#[derive(Debug, Error)]
pub enum ConflictError {
    /// The path is not among the currently conflicted files.
    #[error("'{0}' is not conflicted")]
    NotConflicted(String),

    /// A textual operation was attempted on a structural conflict, or
    /// the other way round.
    #[error("'{path}' has status {code}, which does not support this resolution")]
    WrongKind { path: String, code: String },

    /// The conflicted file no longer contains any hunks.
    #[error("'{0}' has no conflict hunks")]
    NoHunks(String),

    /// A marker block was opened but never closed.
    #[error("unterminated conflict marker starting at line {line}")]
    UnterminatedMarker { line: usize },

    /// Undo was requested with no resolution to revert.
    #[error("nothing to undo")]
    NothingToUndo,

    /// Hunk sessions need UTF-8 text; other content is only resolved with
    /// whole-file strategies.
    #[error("'{0}' is not UTF-8 text; resolve it with a whole-file strategy")]
    NotText(String),

    /// The hunk under the cursor is already resolved.
    #[error("hunk {0} is already resolved")]
    AlreadyResolved(usize),
}

// ---------------------------------------------------------------------------
// Rebase TODO errors
// ---------------------------------------------------------------------------

/// Errors from reading or editing an interactive rebase TODO list.
#[derive(Debug, Error)]
pub enum TodoError {
    /// No interactive rebase is active.
    #[error("no interactive rebase in progress")]
    NoRebaseInProgress,

    /// No pending TODO entry matches the given commit id.
    #[error("no pending rebase entry for commit {0}")]
    EntryNotFound(String),

    /// The entry cannot move further in that direction.
    #[error("rebase entry for {0} cannot move further")]
    CannotMove(String),

    /// The action may not replace the entry's current command.
    #[error("'{action}' cannot be set on the entry for {id}")]
    ActionNotAllowed { id: String, action: String },

    /// A line could not be parsed.
    #[error("unparseable rebase TODO line {line}: '{text}'")]
    ParseError { line: usize, text: String },
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

/// Errors from configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file not found.
    #[error("configuration file not found: {0}")]
    FileNotFound(String),

    /// TOML parse error.
    #[error("configuration parse error: {0}")]
    ParseError(String),

    /// A config value is invalid.
    #[error("invalid configuration value for '{field}': {detail}")]
    InvalidValue { field: String, detail: String },

    /// Generic I/O error reading the config file.
    #[error("configuration I/O error: {0}")]
    IoError(#[from] std::io::Error),
}
