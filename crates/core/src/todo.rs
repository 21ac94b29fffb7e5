//! Interactive rebase TODO reading and editing.
//!
//! When commits are pasted while an interactive rebase is stopped, they are
//! not replayed directly. Instead they become `pick` lines placed right
//! after the current position so the rebase's own continue picks them up.

use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::copy_buffer::CopyBuffer;
use crate::errors::{TodoError, TransplantError};
use crate::git::{RebaseTodoFiles, RepositoryAdapter};
use crate::models::ids_match;

// ---------------------------------------------------------------------------
// Actions
// ---------------------------------------------------------------------------

/// A rebase TODO command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TodoAction {
    Pick,
    Reword,
    Edit,
    Squash,
    Fixup,
    Drop,
    Exec,
    Break,
    Label,
    Reset,
    Merge,
    UpdateRef,
}

impl TodoAction {
    /// Parse a full command name or its one-letter abbreviation.
    pub fn parse(word: &str) -> Option<Self> {
        let action = match word {
            "pick" | "p" => Self::Pick,
            "reword" | "r" => Self::Reword,
            "edit" | "e" => Self::Edit,
            "squash" | "s" => Self::Squash,
            "fixup" | "f" => Self::Fixup,
            "drop" | "d" => Self::Drop,
            "exec" | "x" => Self::Exec,
            "break" | "b" => Self::Break,
            "label" | "l" => Self::Label,
            "reset" | "t" => Self::Reset,
            "merge" | "m" => Self::Merge,
            "update-ref" | "u" => Self::UpdateRef,
            _ => return None,
        };
        Some(action)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pick => "pick",
            Self::Reword => "reword",
            Self::Edit => "edit",
            Self::Squash => "squash",
            Self::Fixup => "fixup",
            Self::Drop => "drop",
            Self::Exec => "exec",
            Self::Break => "break",
            Self::Label => "label",
            Self::Reset => "reset",
            Self::Merge => "merge",
            Self::UpdateRef => "update-ref",
        }
    }

    /// Whether the line's first argument names a commit.
    pub fn takes_commit(&self) -> bool {
        matches!(
            self,
            Self::Pick | Self::Reword | Self::Edit | Self::Squash | Self::Fixup | Self::Drop | Self::Merge
        )
    }

    /// Actions that may replace a `pick` from the editing menu.
    pub fn is_commit_action(&self) -> bool {
        matches!(
            self,
            Self::Pick | Self::Reword | Self::Edit | Self::Squash | Self::Fixup | Self::Drop
        )
    }
}

impl std::fmt::Display for TodoAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Lines
// ---------------------------------------------------------------------------

/// One parsed TODO line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TodoLine {
    pub action: TodoAction,
    /// Commit the line applies to, as written (often abbreviated).
    pub commit: Option<String>,
    /// Everything after the action word, verbatim.
    pub args: String,
}

impl TodoLine {
    pub fn pick(id: &str, subject: &str) -> Self {
        Self {
            action: TodoAction::Pick,
            commit: Some(id.to_string()),
            args: format!("{} {}", id, subject),
        }
    }

    pub fn render(&self) -> String {
        if self.args.is_empty() {
            self.action.as_str().to_string()
        } else {
            format!("{} {}", self.action, self.args)
        }
    }

    /// The rest of the line after the commit id, typically its subject.
    pub fn subject(&self) -> &str {
        match &self.commit {
            Some(commit) => self
                .args
                .split_once(commit.as_str())
                .map(|(_, rest)| rest.trim())
                .unwrap_or(""),
            None => self.args.trim(),
        }
    }

    fn matches(&self, id: &str) -> bool {
        self.commit.as_deref().is_some_and(|c| ids_match(c, id))
    }
}

struct LineParser {
    line: Regex,
    comment_char: char,
}

impl LineParser {
    fn new(comment_char: char) -> Result<Self, TodoError> {
        let line = Regex::new(r"^(\S+)(?:\s+(.*))?$").map_err(|e| TodoError::ParseError {
            line: 0,
            text: e.to_string(),
        })?;
        Ok(Self { line, comment_char })
    }

    fn parse_all(&self, text: &str) -> Result<Vec<TodoLine>, TodoError> {
        Ok(self.parse_with_layout(text)?.0)
    }

    /// Commands plus where they sat among the comment and blank lines.
    fn parse_with_layout(&self, text: &str) -> Result<(Vec<TodoLine>, Vec<Slot>), TodoError> {
        let mut lines = Vec::new();
        let mut layout = Vec::new();
        for (idx, raw) in text.lines().enumerate() {
            match self.parse(idx + 1, raw)? {
                Some(line) => {
                    lines.push(line);
                    layout.push(Slot::Entry);
                }
                None => layout.push(Slot::Text(raw.to_string())),
            }
        }
        Ok((lines, layout))
    }

    fn parse(&self, number: usize, raw: &str) -> Result<Option<TodoLine>, TodoError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.starts_with(self.comment_char) || trimmed == "noop" {
            return Ok(None);
        }
        let parse_error = || TodoError::ParseError {
            line: number,
            text: raw.to_string(),
        };
        let caps = self.line.captures(trimmed).ok_or_else(parse_error)?;
        let word = caps.get(1).map(|m| m.as_str()).unwrap_or("");
        let action = TodoAction::parse(word).ok_or_else(parse_error)?;
        let args = caps.get(2).map(|m| m.as_str().trim().to_string()).unwrap_or_default();

        let commit = if action.takes_commit() {
            // `fixup -C <hash>` and `merge -C <hash> <label>` carry a flag first.
            let mut words = args.split_whitespace();
            let mut first = words.next();
            if matches!(first, Some("-C") | Some("-c")) {
                first = words.next();
            }
            match (action, first) {
                (TodoAction::Merge, Some(_)) if !args.starts_with('-') => None,
                (_, Some(id)) => Some(id.to_string()),
                (_, None) => return Err(parse_error()),
            }
        } else {
            None
        };
        Ok(Some(TodoLine { action, commit, args }))
    }
}

// ---------------------------------------------------------------------------
// Rebase plan
// ---------------------------------------------------------------------------

/// One TODO entry as shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TodoEntry {
    pub action: TodoAction,
    pub commit: Option<String>,
    pub subject: String,
    /// Where the rebase currently stands ("YOU ARE HERE").
    pub cursor_here: bool,
}

/// A line of the pending file: the next command, or text kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Slot {
    Entry,
    Text(String),
}

/// The executed and pending halves of an active interactive rebase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RebaseTodo {
    done: Vec<TodoLine>,
    pending: Vec<TodoLine>,
    /// One slot per line of the pending file; commands fill the `Entry`
    /// slots in order.
    layout: Vec<Slot>,
    comment_char: char,
}

impl RebaseTodo {
    pub fn parse(files: &RebaseTodoFiles, comment_char: char) -> Result<Self, TodoError> {
        let parser = LineParser::new(comment_char)?;
        let (pending, layout) = parser.parse_with_layout(&files.todo)?;
        Ok(Self {
            done: parser.parse_all(&files.done)?,
            pending,
            layout,
            comment_char,
        })
    }

    pub fn done(&self) -> &[TodoLine] {
        &self.done
    }

    pub fn pending(&self) -> &[TodoLine] {
        &self.pending
    }

    /// The entry the rebase stopped at.
    pub fn current(&self) -> Option<&TodoLine> {
        self.done.last()
    }

    /// Done entries followed by pending ones; exactly one carries the
    /// cursor once anything has run.
    pub fn entries(&self) -> Vec<TodoEntry> {
        let last_done = self.done.len().checked_sub(1);
        self.done
            .iter()
            .chain(self.pending.iter())
            .enumerate()
            .map(|(idx, line)| TodoEntry {
                action: line.action,
                commit: line.commit.clone(),
                subject: line.subject().to_string(),
                cursor_here: Some(idx) == last_done,
            })
            .collect()
    }

    /// Pending lines in the backend's file format, with comments and
    /// blank lines where they were.
    pub fn render_pending(&self) -> String {
        let mut out = String::new();
        let mut entries = self.pending.iter();
        for slot in &self.layout {
            match slot {
                Slot::Entry => {
                    if let Some(line) = entries.next() {
                        out.push_str(&line.render());
                        out.push('\n');
                    }
                }
                Slot::Text(raw) => {
                    out.push_str(raw);
                    out.push('\n');
                }
            }
        }
        for line in entries {
            out.push_str(&line.render());
            out.push('\n');
        }
        out
    }

    fn position(&self, id: &str) -> Result<usize, TodoError> {
        self.pending
            .iter()
            .position(|l| l.matches(id))
            .ok_or_else(|| TodoError::EntryNotFound(id.to_string()))
    }

    fn insert_next(&mut self, lines: Vec<TodoLine>) {
        let slots = std::iter::repeat(Slot::Entry).take(lines.len());
        self.layout.splice(0..0, slots);
        self.pending.splice(0..0, lines);
    }

    fn swap(&mut self, id: &str, earlier: bool) -> Result<(), TodoError> {
        let idx = self.position(id)?;
        let other = if earlier {
            idx.checked_sub(1)
        } else {
            Some(idx + 1).filter(|&i| i < self.pending.len())
        };
        let other = other.ok_or_else(|| TodoError::CannotMove(id.to_string()))?;
        self.pending.swap(idx, other);
        Ok(())
    }
}

impl std::fmt::Display for RebaseTodo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for entry in self.entries() {
            let commit = entry.commit.as_deref().map(|c| c.get(..8).unwrap_or(c)).unwrap_or("");
            write!(f, "{} {} {}", entry.action, commit, entry.subject)?;
            if entry.cursor_here {
                write!(f, "  {} YOU ARE HERE", self.comment_char)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Projector
// ---------------------------------------------------------------------------

/// Reads and rewrites the pending half of an active rebase.
#[derive(Debug, Clone)]
pub struct RebaseTodoProjector {
    comment_char: char,
}

impl Default for RebaseTodoProjector {
    fn default() -> Self {
        Self { comment_char: '#' }
    }
}

impl RebaseTodoProjector {
    pub fn new(comment_char: char) -> Self {
        Self { comment_char }
    }

    pub fn load<A: RepositoryAdapter + ?Sized>(&self, adapter: &A) -> Result<RebaseTodo, TransplantError> {
        let files = adapter.read_rebase_todo()?.ok_or(TodoError::NoRebaseInProgress)?;
        Ok(RebaseTodo::parse(&files, self.comment_char)?)
    }

    /// Insert one `pick` per copied commit right after the current
    /// position, in buffer order. The buffer is cleared once the backend
    /// has accepted the new plan. Returns how many lines were queued.
    #[instrument(skip(self, adapter, buffer), fields(count = buffer.count()))]
    pub fn project<A: RepositoryAdapter + ?Sized>(
        &self,
        adapter: &A,
        buffer: &mut CopyBuffer,
    ) -> Result<usize, TransplantError> {
        if buffer.is_empty() {
            return Err(TransplantError::EmptyCopyBuffer);
        }
        if let Some(merge) = buffer.first_merge() {
            return Err(TransplantError::MergeCommitUnsupported {
                id: merge.short_id().to_string(),
            });
        }
        let mut todo = self.load(adapter)?;
        let picks: Vec<TodoLine> = buffer
            .items()
            .iter()
            .map(|c| TodoLine::pick(&c.id, &c.subject))
            .collect();
        let count = picks.len();
        todo.insert_next(picks);
        adapter.write_rebase_todo(&todo.render_pending())?;
        buffer.clear();
        info!(count, "queued copied commits in rebase todo");
        Ok(count)
    }

    /// Move a pending entry one place earlier in the plan.
    pub fn move_up<A: RepositoryAdapter + ?Sized>(&self, adapter: &A, id: &str) -> Result<RebaseTodo, TransplantError> {
        self.edit(adapter, |todo| todo.swap(id, true))
    }

    pub fn move_down<A: RepositoryAdapter + ?Sized>(&self, adapter: &A, id: &str) -> Result<RebaseTodo, TransplantError> {
        self.edit(adapter, |todo| todo.swap(id, false))
    }

    /// Change the command of a pending commit entry.
    pub fn set_action<A: RepositoryAdapter + ?Sized>(
        &self,
        adapter: &A,
        id: &str,
        action: TodoAction,
    ) -> Result<RebaseTodo, TransplantError> {
        self.edit(adapter, |todo| {
            let idx = todo.position(id)?;
            let line = &mut todo.pending[idx];
            if !action.is_commit_action() || !line.action.is_commit_action() {
                return Err(TodoError::ActionNotAllowed {
                    id: id.to_string(),
                    action: action.to_string(),
                });
            }
            line.action = action;
            Ok(())
        })
    }

    fn edit<A, F>(&self, adapter: &A, change: F) -> Result<RebaseTodo, TransplantError>
    where
        A: RepositoryAdapter + ?Sized,
        F: FnOnce(&mut RebaseTodo) -> Result<(), TodoError>,
    {
        let mut todo = self.load(adapter)?;
        change(&mut todo)?;
        adapter.write_rebase_todo(&todo.render_pending())?;
        debug!("rewrote pending rebase entries");
        Ok(todo)
    }
}
