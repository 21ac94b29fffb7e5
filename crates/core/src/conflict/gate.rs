//! The conflict gate.
//!
//! Translates raw backend status into the decision the user acts on, and
//! guards every staging and resolution action so nothing with unresolved
//! markers reaches the index.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use super::detector::{ConflictedFile, StatusCode};
use super::markers::{contains_conflict_markers, ConflictDocument};
use super::merger::Merger;
use super::session::HunkSession;
use crate::errors::{ConflictError, TransplantError};
use crate::git::RepositoryAdapter;
use crate::models::{FileEntry, MergeStrategy, RepoStatus, StructuralChoice};

/// What the last replay step left behind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateVerdict {
    NoConflict,
    NoOpCommit,
    ConflictedFiles(Vec<ConflictedFile>),
}

/// Conflict-aware staging and resolution over a repository adapter.
#[derive(Debug, Clone, Default)]
pub struct ConflictGate {
    auto_stage_resolved: bool,
}

impl ConflictGate {
    pub fn new(auto_stage_resolved: bool) -> Self {
        Self { auto_stage_resolved }
    }

    /// Classify a status freshly read after a backend step.
    ///
    /// A replay that stopped with nothing conflicted and nothing staged
    /// would produce an empty commit.
    pub fn classify(status: &RepoStatus) -> GateVerdict {
        if !status.conflicted.is_empty() {
            GateVerdict::ConflictedFiles(status.conflicted.clone())
        } else if status.replay_in_progress() && !status.has_staged_changes {
            GateVerdict::NoOpCommit
        } else {
            GateVerdict::NoConflict
        }
    }

    /// Refuse "continue" while any conflicted path remains unresolved.
    pub fn check_continue(status: &RepoStatus) -> Result<(), TransplantError> {
        if status.conflicted.is_empty() {
            Ok(())
        } else {
            Err(TransplantError::ConflictStillPresent {
                paths: status.conflicted_paths(),
            })
        }
    }

    /// Stage `paths`, which may name directories. Nothing is staged if any
    /// covered file still holds conflict markers.
    #[instrument(skip(self, adapter))]
    pub fn stage_paths<A: RepositoryAdapter + ?Sized>(
        &self,
        adapter: &A,
        paths: &[String],
    ) -> Result<(), TransplantError> {
        let status = adapter.status()?;
        let covered: Vec<&FileEntry> = status
            .files
            .iter()
            .filter(|f| paths.iter().any(|p| covers(p, &f.path)))
            .collect();

        let mut unresolved = Vec::new();
        for file in &covered {
            let code = status
                .conflicted
                .iter()
                .find(|c| c.path == file.path)
                .map(|c| c.code);
            if matches!(code, Some(c) if c.is_structural()) {
                unresolved.push(file.path.clone());
                continue;
            }
            if let Some(content) = adapter.read_file(&file.path)? {
                if contains_conflict_markers(&String::from_utf8_lossy(&content)) {
                    unresolved.push(file.path.clone());
                }
            }
        }
        if !unresolved.is_empty() {
            warn!(?unresolved, "refusing to stage unresolved conflicts");
            return Err(TransplantError::ConflictStillPresent { paths: unresolved });
        }

        for file in covered {
            adapter.stage_file(&file.path)?;
        }
        info!(count = paths.len(), "staged paths");
        Ok(())
    }

    /// Apply a whole-file strategy to a textual conflict.
    #[instrument(skip(self, adapter))]
    pub fn resolve_with_strategy<A: RepositoryAdapter + ?Sized>(
        &self,
        adapter: &A,
        path: &str,
        strategy: MergeStrategy,
    ) -> Result<(), TransplantError> {
        self.find_textual(adapter, path)?;
        adapter.resolve_file_with_strategy(path, strategy)?;
        info!(path, %strategy, "resolved file with strategy");
        Ok(())
    }

    /// The content `resolve_with_strategy` would produce, for display.
    /// Nothing is written.
    pub fn preview_strategy<A: RepositoryAdapter + ?Sized>(
        &self,
        adapter: &A,
        path: &str,
        strategy: MergeStrategy,
    ) -> Result<String, TransplantError> {
        self.find_textual(adapter, path)?;
        let sides = adapter.conflict_sides(path)?;
        let text = |side: &Option<Vec<u8>>| String::from_utf8_lossy(side.as_deref().unwrap_or_default()).into_owned();
        Ok(Merger::merge_with_strategy(
            &text(&sides.base),
            &text(&sides.ours),
            &text(&sides.theirs),
            strategy,
        ))
    }

    /// Keep or delete a path left by an add/delete conflict.
    #[instrument(skip(self, adapter))]
    pub fn resolve_structural<A: RepositoryAdapter + ?Sized>(
        &self,
        adapter: &A,
        path: &str,
        choice: StructuralChoice,
    ) -> Result<(), TransplantError> {
        let file = self.find_conflict(adapter, path)?;
        let stage = match file.code.surviving_stage() {
            Some(stage) => stage,
            None => {
                return Err(ConflictError::WrongKind {
                    path: path.to_string(),
                    code: file.code.to_string(),
                }
                .into())
            }
        };
        match choice {
            StructuralChoice::Keep => {
                let sides = adapter.conflict_sides(path)?;
                let content = sides.stage(stage).unwrap_or_default();
                adapter.write_file(path, content)?;
                adapter.stage_file(path)?;
            }
            StructuralChoice::Delete => adapter.remove_file(path)?,
        }
        info!(path, code = %file.code, ?choice, "resolved structural conflict");
        Ok(())
    }

    /// Start a hunk session on a textual conflict's worktree content.
    pub fn open_session<A: RepositoryAdapter + ?Sized>(
        &self,
        adapter: &A,
        path: &str,
    ) -> Result<HunkSession, TransplantError> {
        self.find_textual(adapter, path)?;
        let bytes = adapter
            .read_file(path)?
            .ok_or_else(|| ConflictError::NoHunks(path.to_string()))?;
        let content = String::from_utf8(bytes).map_err(|_| ConflictError::NotText(path.to_string()))?;
        Ok(HunkSession::open(path, &content)?)
    }

    /// Write the session's document back. Returns `true` if the file was
    /// also staged.
    pub fn save_session<A: RepositoryAdapter + ?Sized>(
        &self,
        adapter: &A,
        session: &HunkSession,
    ) -> Result<bool, TransplantError> {
        adapter.write_file(session.path(), session.content().as_bytes())?;
        if session.is_resolved() && self.auto_stage_resolved {
            adapter.stage_file(session.path())?;
            debug!(path = session.path(), "auto-staged resolved file");
            return Ok(true);
        }
        Ok(false)
    }

    /// Conflicted files with textual hunks loaded from the worktree.
    pub fn load_conflicts<A: RepositoryAdapter + ?Sized>(
        &self,
        adapter: &A,
    ) -> Result<Vec<ConflictedFile>, TransplantError> {
        let mut files = adapter.status()?.conflicted;
        for file in files.iter_mut().filter(|f| f.code.is_textual()) {
            let content = adapter.read_file(&file.path)?;
            if let Some(text) = content.as_deref().and_then(|b| std::str::from_utf8(b).ok()) {
                file.hunks = ConflictDocument::parse(text).ok().map(|d| d.into_hunks());
            }
        }
        Ok(files)
    }

    fn find_conflict<A: RepositoryAdapter + ?Sized>(
        &self,
        adapter: &A,
        path: &str,
    ) -> Result<ConflictedFile, TransplantError> {
        adapter
            .status()?
            .conflicted
            .into_iter()
            .find(|c| c.path == path)
            .ok_or_else(|| ConflictError::NotConflicted(path.to_string()).into())
    }

    fn find_textual<A: RepositoryAdapter + ?Sized>(
        &self,
        adapter: &A,
        path: &str,
    ) -> Result<ConflictedFile, TransplantError> {
        let file = self.find_conflict(adapter, path)?;
        if !file.code.is_textual() {
            return Err(ConflictError::WrongKind {
                path: path.to_string(),
                code: file.code.to_string(),
            }
            .into());
        }
        Ok(file)
    }
}

/// Whether `target` (a file or directory path) covers `path`.
fn covers(target: &str, path: &str) -> bool {
    let target = target.trim_end_matches('/');
    target.is_empty() || target == "." || path == target || path.starts_with(&format!("{}/", target))
}

// ---------------------------------------------------------------------------
// Status cache
// ---------------------------------------------------------------------------

/// The files view's copy of repository status.
///
/// Display only: the transplant engine always reads fresh status from the
/// adapter. Unrelated refresh ticks mark it stale until the next explicit
/// re-sync.
#[derive(Debug, Clone, Default)]
pub struct StatusCache {
    status: Option<RepoStatus>,
    stale: bool,
}

impl StatusCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, status: RepoStatus) {
        self.status = Some(status);
        self.stale = false;
    }

    pub fn mark_stale(&mut self) {
        self.stale = true;
    }

    pub fn is_stale(&self) -> bool {
        self.stale || self.status.is_none()
    }

    pub fn status(&self) -> Option<&RepoStatus> {
        self.status.as_ref()
    }

    /// While anything is conflicted, only the conflicted files; otherwise
    /// every change.
    pub fn visible_files(&self) -> Vec<FileEntry> {
        let Some(status) = &self.status else {
            return Vec::new();
        };
        if status.conflicted.is_empty() {
            return status.files.clone();
        }
        status
            .conflicted
            .iter()
            .map(|c| {
                status
                    .files
                    .iter()
                    .find(|f| f.path == c.path)
                    .cloned()
                    .unwrap_or_else(|| conflicted_entry(&c.path, c.code))
            })
            .collect()
    }
}

fn conflicted_entry(path: &str, code: StatusCode) -> FileEntry {
    FileEntry {
        path: path.to_string(),
        short_status: code.to_string(),
        conflicted: true,
    }
}
