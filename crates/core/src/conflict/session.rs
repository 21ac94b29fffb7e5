//! Interactive hunk selection for one textual conflict.

use tracing::debug;

use super::markers::{ConflictDocument, Hunk, Resolution};
use crate::errors::ConflictError;
use crate::models::MergeStrategy;

/// Which side of the hunk under the cursor is highlighted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Side {
    #[default]
    Ours,
    Theirs,
}

/// Cursor, selection and undo history over a conflicted file's hunks.
///
/// Every pick pushes the indices it resolved; `undo` reverts the last pick
/// and the rendered document returns to its exact prior bytes.
#[derive(Debug, Clone)]
pub struct HunkSession {
    path: String,
    document: ConflictDocument,
    cursor: usize,
    side: Side,
    history: Vec<Vec<usize>>,
}

impl HunkSession {
    pub fn open(path: impl Into<String>, content: &str) -> Result<Self, ConflictError> {
        let path = path.into();
        let document = ConflictDocument::parse(content)?;
        if document.hunks().is_empty() {
            return Err(ConflictError::NoHunks(path));
        }
        debug!(path = %path, hunks = document.hunks().len(), "opened hunk session");
        Ok(Self {
            path,
            document,
            cursor: 0,
            side: Side::Ours,
            history: Vec::new(),
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn hunks(&self) -> &[Hunk] {
        self.document.hunks()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn current(&self) -> Option<&Hunk> {
        self.document.hunks().get(self.cursor)
    }

    pub fn side(&self) -> Side {
        self.side
    }

    /// The document with every resolved hunk replaced by its choice.
    pub fn content(&self) -> String {
        self.document.render()
    }

    pub fn unresolved_count(&self) -> usize {
        self.hunks().iter().filter(|h| !h.is_resolved()).count()
    }

    pub fn is_resolved(&self) -> bool {
        self.unresolved_count() == 0
    }

    pub fn can_undo(&self) -> bool {
        !self.history.is_empty()
    }

    // -----------------------------------------------------------------------
    // Navigation
    // -----------------------------------------------------------------------

    pub fn select(&mut self, side: Side) {
        self.side = side;
    }

    /// Move to the next unresolved hunk; stays put when there is none.
    pub fn next_hunk(&mut self) -> bool {
        let found = (self.cursor + 1..self.hunks().len()).find(|&i| !self.hunks()[i].is_resolved());
        self.move_to(found)
    }

    pub fn prev_hunk(&mut self) -> bool {
        let found = (0..self.cursor).rev().find(|&i| !self.hunks()[i].is_resolved());
        self.move_to(found)
    }

    fn move_to(&mut self, target: Option<usize>) -> bool {
        match target {
            Some(idx) => {
                self.cursor = idx;
                self.side = Side::Ours;
                true
            }
            None => false,
        }
    }

    // -----------------------------------------------------------------------
    // Resolution
    // -----------------------------------------------------------------------

    /// Resolve the hunk under the cursor with the highlighted side.
    pub fn press_primary(&mut self) -> Result<(), ConflictError> {
        let resolution = match self.side {
            Side::Ours => Resolution::Ours,
            Side::Theirs => Resolution::Theirs,
        };
        self.pick(resolution)
    }

    /// Resolve the hunk under the cursor.
    pub fn pick(&mut self, resolution: Resolution) -> Result<(), ConflictError> {
        let idx = self.cursor;
        let hunk = self
            .document
            .hunks_mut()
            .get_mut(idx)
            .ok_or_else(|| ConflictError::NoHunks(self.path.clone()))?;
        if hunk.is_resolved() {
            return Err(ConflictError::AlreadyResolved(idx));
        }
        if resolution == Resolution::Unresolved {
            return Ok(());
        }
        hunk.resolution = resolution;
        self.history.push(vec![idx]);
        debug!(path = %self.path, hunk = idx, ?resolution, "resolved hunk");
        self.advance_after_pick();
        Ok(())
    }

    /// Resolve every remaining hunk with a whole-file strategy. One undo
    /// reverts the whole batch.
    pub fn resolve_all(&mut self, strategy: MergeStrategy) {
        let resolution = match strategy {
            MergeStrategy::Ours => Resolution::Ours,
            MergeStrategy::Theirs => Resolution::Theirs,
            MergeStrategy::Union => Resolution::Both,
        };
        let mut batch = Vec::new();
        for (idx, hunk) in self.document.hunks_mut().iter_mut().enumerate() {
            if !hunk.is_resolved() {
                hunk.resolution = resolution;
                batch.push(idx);
            }
        }
        if !batch.is_empty() {
            debug!(path = %self.path, count = batch.len(), %strategy, "resolved all hunks");
            self.history.push(batch);
        }
    }

    /// Revert the most recent pick.
    pub fn undo(&mut self) -> Result<(), ConflictError> {
        let batch = self.history.pop().ok_or(ConflictError::NothingToUndo)?;
        for &idx in &batch {
            if let Some(hunk) = self.document.hunks_mut().get_mut(idx) {
                hunk.resolution = Resolution::Unresolved;
            }
        }
        if let Some(&first) = batch.first() {
            self.cursor = first;
            self.side = Side::Ours;
        }
        debug!(path = %self.path, reverted = batch.len(), "undid hunk resolution");
        Ok(())
    }

    fn advance_after_pick(&mut self) {
        if !self.next_hunk() {
            self.prev_hunk();
        }
    }
}
