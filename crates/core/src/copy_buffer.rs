//! Process-wide set of commits marked for copying.

use serde::Serialize;
use tracing::debug;

use crate::models::CommitRef;

/// Receives the "N commit(s) copied" notice. `None` clears it.
pub trait Notifier {
    fn notify(&self, message: Option<String>);
}

/// Ordered, duplicate-free list of copied commits.
///
/// The order is the order commits were added, which is the order they will
/// be replayed in.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CopyBuffer {
    items: Vec<CommitRef>,
    source_branch: Option<String>,
}

impl CopyBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one commit unless it is already present. Returns the new count.
    pub fn add(&mut self, commit: CommitRef) -> usize {
        if !self.contains(&commit.id) {
            debug!(id = commit.short_id(), "copied commit");
            self.items.push(commit);
        }
        self.items.len()
    }

    /// Add commits in the order given, skipping ones already present.
    pub fn add_range<I>(&mut self, commits: I) -> usize
    where
        I: IntoIterator<Item = CommitRef>,
    {
        for commit in commits {
            self.add(commit);
        }
        self.items.len()
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.source_branch = None;
    }

    pub fn count(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[CommitRef] {
        &self.items
    }

    pub fn contains(&self, id: &str) -> bool {
        self.items.iter().any(|c| c.matches(id))
    }

    /// The first copied merge commit, if any.
    pub fn first_merge(&self) -> Option<&CommitRef> {
        self.items.iter().find(|c| c.is_merge)
    }

    /// Branch the commits were copied from, when they came from a
    /// sub-commits view.
    pub fn source_branch(&self) -> Option<&str> {
        self.source_branch.as_deref()
    }

    pub fn set_source_branch(&mut self, branch: Option<String>) {
        self.source_branch = branch;
    }

    /// Drop the given commits, keeping the rest in order.
    pub fn remove_all(&mut self, ids: &[String]) {
        self.items.retain(|c| !ids.iter().any(|id| c.matches(id)));
        if self.items.is_empty() {
            self.source_branch = None;
        }
    }

    /// Status-bar text for the current contents.
    pub fn notice(&self) -> Option<String> {
        match self.items.len() {
            0 => None,
            1 => Some("1 commit copied".to_string()),
            n => Some(format!("{} commits copied", n)),
        }
    }
}
