//! Domain model types shared by the adapter, the conflict gate and the
//! transplant engine.

use serde::{Deserialize, Serialize};

use crate::conflict::ConflictedFile;

// ---------------------------------------------------------------------------
// Commits
// ---------------------------------------------------------------------------

/// An immutable reference to a commit as listed by the repository adapter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CommitRef {
    pub id: String,
    pub subject: String,
    pub is_merge: bool,
}

impl CommitRef {
    pub fn new(id: impl Into<String>, subject: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            subject: subject.into(),
            is_merge: false,
        }
    }

    /// Abbreviated id for display.
    pub fn short_id(&self) -> &str {
        let end = self.id.len().min(8);
        self.id.get(..end).unwrap_or(&self.id)
    }

    /// Whether `other` names this commit. Abbreviated hashes match by
    /// prefix in either direction.
    pub fn matches(&self, other: &str) -> bool {
        ids_match(&self.id, other)
    }
}

/// Prefix comparison of two possibly abbreviated commit ids.
pub fn ids_match(a: &str, b: &str) -> bool {
    if a.is_empty() || b.is_empty() {
        return false;
    }
    a.starts_with(b) || b.starts_with(a)
}

// ---------------------------------------------------------------------------
// Replay
// ---------------------------------------------------------------------------

/// How commits are replayed onto the current branch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplayMode {
    #[default]
    CherryPick,
    Rebase,
}

impl std::fmt::Display for ReplayMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CherryPick => write!(f, "cherry-pick"),
            Self::Rebase => write!(f, "rebase"),
        }
    }
}

/// Normalized result of one backend replay invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepResult {
    Success,
    NoOpWouldBeEmpty,
    Conflicted(Vec<ConflictedFile>),
}

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// One changed path as shown in the files view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    pub path: String,
    /// Two-letter porcelain-style status (`M `, ` M`, `??`, `UU`, ...).
    pub short_status: String,
    pub conflicted: bool,
}

impl FileEntry {
    pub fn new(path: impl Into<String>, short_status: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            short_status: short_status.into(),
            conflicted: false,
        }
    }
}

/// Raw repository status as reported by the adapter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoStatus {
    /// Tracked changes exist in the index or worktree.
    pub dirty: bool,
    pub files: Vec<FileEntry>,
    pub conflicted: Vec<ConflictedFile>,
    pub rebase_in_progress: bool,
    pub cherry_pick_in_progress: bool,
    /// The index differs from HEAD (ignoring conflict entries).
    pub has_staged_changes: bool,
    /// Tracked worktree files differ from the index.
    pub has_unstaged_changes: bool,
}

impl RepoStatus {
    pub fn replay_in_progress(&self) -> bool {
        self.rebase_in_progress || self.cherry_pick_in_progress
    }

    /// The mode of the replay the backend is in the middle of, if any.
    pub fn replay_mode(&self) -> Option<ReplayMode> {
        if self.rebase_in_progress {
            Some(ReplayMode::Rebase)
        } else if self.cherry_pick_in_progress {
            Some(ReplayMode::CherryPick)
        } else {
            None
        }
    }

    pub fn conflicted_paths(&self) -> Vec<String> {
        self.conflicted.iter().map(|c| c.path.clone()).collect()
    }

    /// Tracked paths with unstaged worktree changes.
    pub fn unstaged_paths(&self) -> Vec<String> {
        self.files
            .iter()
            .filter(|f| !f.conflicted && f.short_status.len() == 2)
            .filter(|f| matches!(f.short_status.as_bytes()[1], b'M' | b'D' | b'T' | b'R'))
            .map(|f| f.path.clone())
            .collect()
    }

    pub fn dirty_file_count(&self) -> usize {
        self.files
            .iter()
            .filter(|f| f.short_status != "??")
            .count()
    }
}

// ---------------------------------------------------------------------------
// Resolution choices
// ---------------------------------------------------------------------------

/// Whole-file merge strategy for a textual conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeStrategy {
    /// Use current changes.
    Ours,
    /// Use incoming changes.
    Theirs,
    /// Use both, current first.
    Union,
}

impl MergeStrategy {
    /// The matching `git merge-file` flag.
    pub fn merge_file_flag(&self) -> &'static str {
        match self {
            Self::Ours => "--ours",
            Self::Theirs => "--theirs",
            Self::Union => "--union",
        }
    }
}

impl std::fmt::Display for MergeStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ours => write!(f, "use current changes"),
            Self::Theirs => write!(f, "use incoming changes"),
            Self::Union => write!(f, "use both"),
        }
    }
}

/// Binary decision for an add/delete conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StructuralChoice {
    Keep,
    Delete,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_match_prefix_both_ways() {
        assert!(ids_match("abc123def", "abc123"));
        assert!(ids_match("abc1", "abc123def"));
        assert!(!ids_match("abc123", "abd"));
        assert!(!ids_match("", "abc"));
    }

    #[test]
    fn test_short_id() {
        let c = CommitRef::new("0123456789abcdef", "subject");
        assert_eq!(c.short_id(), "01234567");
        let c = CommitRef::new("abc", "subject");
        assert_eq!(c.short_id(), "abc");
    }

    #[test]
    fn test_unstaged_paths_ignores_untracked_and_conflicts() {
        let mut conflicted = FileEntry::new("c.txt", "UU");
        conflicted.conflicted = true;
        let status = RepoStatus {
            files: vec![
                FileEntry::new("a.txt", " M"),
                FileEntry::new("b.txt", "M "),
                FileEntry::new("new.txt", "??"),
                conflicted,
            ],
            ..Default::default()
        };
        assert_eq!(status.unstaged_paths(), vec!["a.txt".to_string()]);
        assert_eq!(status.dirty_file_count(), 3);
    }

    #[test]
    fn test_replay_mode_prefers_rebase() {
        let status = RepoStatus {
            rebase_in_progress: true,
            cherry_pick_in_progress: true,
            ..Default::default()
        };
        assert_eq!(status.replay_mode(), Some(ReplayMode::Rebase));
        assert!(RepoStatus::default().replay_mode().is_none());
    }
}
