//! Commit list views and the copy/paste capabilities they expose.
//!
//! Views do not know about each other or about the engine's internals.
//! Each one implements only the capabilities it supports, and the copy
//! buffer is passed in by whoever owns it.

use crate::copy_buffer::CopyBuffer;
use crate::errors::TransplantError;
use crate::git::RepositoryAdapter;
use crate::models::{CommitRef, ReplayMode};
use crate::transplant::{Step, Transplanter};

/// A view whose commits can be copied.
pub trait SupportsCommitCopy {
    /// Copy the commit under the cursor. Returns the buffer's new count.
    fn copy_selected(&self, buffer: &mut CopyBuffer) -> usize;

    /// Copy the selected range bottom to top, so the oldest commit is
    /// replayed first and the pasted commits keep their on-screen order.
    fn copy_range(&self, buffer: &mut CopyBuffer) -> usize;
}

/// A view that can receive copied commits.
pub trait SupportsCommitPaste {
    fn paste<A: RepositoryAdapter>(
        &self,
        engine: &mut Transplanter<A>,
        buffer: &mut CopyBuffer,
    ) -> Result<Step, TransplantError>;
}

// ---------------------------------------------------------------------------
// Local commits
// ---------------------------------------------------------------------------

/// The current branch's commits, newest first as listed by the adapter.
#[derive(Debug, Clone, Default)]
pub struct CommitListView {
    commits: Vec<CommitRef>,
    selected: usize,
    range_anchor: Option<usize>,
    mode: ReplayMode,
}

impl CommitListView {
    pub fn new(commits: Vec<CommitRef>, mode: ReplayMode) -> Self {
        Self {
            commits,
            selected: 0,
            range_anchor: None,
            mode,
        }
    }

    /// Load the first `limit` commits of `rev`.
    pub fn load<A: RepositoryAdapter + ?Sized>(
        adapter: &A,
        rev: &str,
        limit: usize,
        mode: ReplayMode,
    ) -> Result<Self, TransplantError> {
        Ok(Self::new(adapter.list_commits(rev, limit)?, mode))
    }

    pub fn commits(&self) -> &[CommitRef] {
        &self.commits
    }

    pub fn selected(&self) -> Option<&CommitRef> {
        self.commits.get(self.selected)
    }

    pub fn select(&mut self, idx: usize) {
        if idx < self.commits.len() {
            self.selected = idx;
        }
    }

    /// Move the cursor onto the commit with `id`, if listed.
    pub fn select_id(&mut self, id: &str) -> bool {
        match self.commits.iter().position(|c| c.matches(id)) {
            Some(idx) => {
                self.selected = idx;
                true
            }
            None => false,
        }
    }

    /// Start or end a range selection at the cursor.
    pub fn toggle_range(&mut self) {
        self.range_anchor = match self.range_anchor {
            Some(_) => None,
            None => Some(self.selected),
        };
    }

    /// The selected range, top to bottom.
    pub fn range(&self) -> &[CommitRef] {
        if self.commits.is_empty() {
            return &[];
        }
        let anchor = self.range_anchor.unwrap_or(self.selected);
        let (lo, hi) = if anchor <= self.selected {
            (anchor, self.selected)
        } else {
            (self.selected, anchor)
        };
        &self.commits[lo..=hi.min(self.commits.len() - 1)]
    }

    /// Replace the list after a refresh and put the cursor on `select`.
    pub fn refresh(&mut self, commits: Vec<CommitRef>, select: Option<&str>) {
        self.commits = commits;
        self.range_anchor = None;
        self.selected = 0;
        if let Some(id) = select {
            self.select_id(id);
        }
    }
}

impl SupportsCommitCopy for CommitListView {
    fn copy_selected(&self, buffer: &mut CopyBuffer) -> usize {
        match self.selected() {
            Some(commit) => buffer.add(commit.clone()),
            None => buffer.count(),
        }
    }

    fn copy_range(&self, buffer: &mut CopyBuffer) -> usize {
        buffer.add_range(self.range().iter().rev().cloned())
    }
}

impl SupportsCommitPaste for CommitListView {
    fn paste<A: RepositoryAdapter>(
        &self,
        engine: &mut Transplanter<A>,
        buffer: &mut CopyBuffer,
    ) -> Result<Step, TransplantError> {
        engine.paste(buffer, self.mode)
    }
}

// ---------------------------------------------------------------------------
// Another branch's commits
// ---------------------------------------------------------------------------

/// Commits of a branch other than the checked-out one. Copy only.
#[derive(Debug, Clone)]
pub struct SubCommitsView {
    inner: CommitListView,
    branch: String,
}

impl SubCommitsView {
    pub fn new(branch: impl Into<String>, commits: Vec<CommitRef>) -> Self {
        Self {
            inner: CommitListView::new(commits, ReplayMode::default()),
            branch: branch.into(),
        }
    }

    pub fn load<A: RepositoryAdapter + ?Sized>(
        adapter: &A,
        branch: &str,
        limit: usize,
    ) -> Result<Self, TransplantError> {
        Ok(Self::new(branch, adapter.list_commits(branch, limit)?))
    }

    pub fn branch(&self) -> &str {
        &self.branch
    }

    pub fn list(&self) -> &CommitListView {
        &self.inner
    }

    pub fn list_mut(&mut self) -> &mut CommitListView {
        &mut self.inner
    }
}

impl SupportsCommitCopy for SubCommitsView {
    fn copy_selected(&self, buffer: &mut CopyBuffer) -> usize {
        buffer.set_source_branch(Some(self.branch.clone()));
        self.inner.copy_selected(buffer)
    }

    fn copy_range(&self, buffer: &mut CopyBuffer) -> usize {
        buffer.set_source_branch(Some(self.branch.clone()));
        self.inner.copy_range(buffer)
    }
}
