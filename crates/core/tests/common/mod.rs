//! Scripted in-memory repository used by the orchestrator tests.
//!
//! Each commit can be scripted to replay cleanly, come out empty, or stop
//! on conflicts. The fake keeps just enough state (history, index, stash
//! list, rebase TODO) for the engine to observe the same transitions git
//! would produce.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use graft_core::conflict::{ConflictSides, ConflictedFile, Merger, StatusCode};
use graft_core::errors::BackendError;
use graft_core::git::{RebaseTodoFiles, RepositoryAdapter};
use graft_core::models::{CommitRef, FileEntry, MergeStrategy, ReplayMode, RepoStatus, StepResult};
use graft_core::Notifier;

/// How a commit behaves when replayed.
#[derive(Debug, Clone)]
pub enum Script {
    Clean,
    Empty,
    Conflict(Vec<(&'static str, StatusCode)>),
    /// Conflicts whose resolution leaves nothing to commit.
    EmptyAfterResolve(Vec<(&'static str, StatusCode)>),
}

#[derive(Debug, Default)]
pub struct FakeState {
    /// Commits on the checked-out branch, oldest first.
    pub history: Vec<CommitRef>,
    pub worktree: BTreeMap<String, String>,
    /// Tracked files with unstaged edits.
    pub unstaged: Vec<String>,
    pub staged: Vec<String>,
    pub conflicts: Vec<ConflictedFile>,
    pub sides: HashMap<String, ConflictSides>,
    pub in_progress: Option<ReplayMode>,
    pub stopped: Option<CommitRef>,
    pub resolves_empty: bool,
    pub stashes: Vec<(String, Vec<String>)>,
    pub scripts: HashMap<String, Script>,
    pub known: HashMap<String, CommitRef>,
    /// `(done, todo)` of an interactive rebase.
    pub rebase: Option<(Vec<String>, Vec<String>)>,
    rebase_base: usize,
    /// Transplant state saved by the engine.
    pub saved_operation: Option<String>,
    /// Operation name whose next invocation fails.
    pub fail_on: Option<&'static str>,
    pub calls: Vec<String>,
}

pub struct FakeRepo {
    pub state: RefCell<FakeState>,
}

pub fn commit(id: &str) -> CommitRef {
    CommitRef::new(id, format!("subject {}", id))
}

pub fn history_ids(repo: &FakeRepo) -> Vec<String> {
    repo.state.borrow().history.iter().map(|c| c.id.clone()).collect()
}

impl FakeRepo {
    /// A repository whose branch holds a single `base` commit.
    pub fn new() -> Self {
        let state = FakeState {
            history: vec![commit("base")],
            ..Default::default()
        };
        Self {
            state: RefCell::new(state),
        }
    }

    pub fn script(&self, id: &str, script: Script) {
        let mut s = self.state.borrow_mut();
        s.known.insert(id.to_string(), commit(id));
        s.scripts.insert(id.to_string(), script);
    }

    pub fn make_dirty(&self, path: &str) {
        let mut s = self.state.borrow_mut();
        s.unstaged.push(path.to_string());
        s.worktree.insert(path.to_string(), "local edit\n".into());
    }

    pub fn fail_next(&self, op: &'static str) {
        self.state.borrow_mut().fail_on = Some(op);
    }

    /// Put the repository in the middle of someone else's interactive
    /// rebase.
    pub fn start_external_rebase(&self, done: &[&str], todo: &[&str]) {
        let mut s = self.state.borrow_mut();
        s.in_progress = Some(ReplayMode::Rebase);
        s.rebase_base = s.history.len();
        s.rebase = Some((
            done.iter().map(|l| l.to_string()).collect(),
            todo.iter().map(|l| l.to_string()).collect(),
        ));
    }

    /// A stash entry left behind by someone else, newest on top.
    pub fn push_stash(&self, label: &str, path: &str) {
        self.state
            .borrow_mut()
            .stashes
            .push((label.to_string(), vec![path.to_string()]));
    }

    pub fn stash_len(&self) -> usize {
        self.state.borrow().stashes.len()
    }

    fn check_fail(&self, op: &'static str) -> Result<(), BackendError> {
        let mut s = self.state.borrow_mut();
        s.calls.push(op.to_string());
        if s.fail_on == Some(op) {
            s.fail_on = None;
            return Err(BackendError::CommandFailed {
                command: format!("git {}", op),
                exit_code: 128,
                stderr: format!("fatal: {} exploded", op),
            });
        }
        Ok(())
    }
}

impl FakeState {
    pub fn apply_one(&mut self, commit: &CommitRef, mode: ReplayMode) -> StepResult {
        self.known.insert(commit.id.clone(), commit.clone());
        let script = self.scripts.get(&commit.id).cloned().unwrap_or(Script::Clean);
        match script {
            Script::Clean => {
                self.history.push(commit.clone());
                StepResult::Success
            }
            Script::Empty => {
                self.in_progress = Some(mode);
                self.stopped = Some(commit.clone());
                StepResult::NoOpWouldBeEmpty
            }
            Script::Conflict(files) => self.stop_on_conflicts(commit, mode, &files, false),
            Script::EmptyAfterResolve(files) => self.stop_on_conflicts(commit, mode, &files, true),
        }
    }

    fn stop_on_conflicts(
        &mut self,
        commit: &CommitRef,
        mode: ReplayMode,
        files: &[(&'static str, StatusCode)],
        resolves_empty: bool,
    ) -> StepResult {
        self.in_progress = Some(mode);
        self.stopped = Some(commit.clone());
        self.resolves_empty = resolves_empty;
        self.conflicts = files
            .iter()
            .map(|(path, code)| ConflictedFile::new(*path, *code))
            .collect();
        for (path, code) in files {
            let stage = |present: bool, text: &str| present.then(|| text.as_bytes().to_vec());
            let (base, ours, theirs) = match code {
                StatusCode::UU => (true, true, true),
                StatusCode::AA => (false, true, true),
                StatusCode::DD => (true, false, false),
                StatusCode::AU => (false, true, false),
                StatusCode::UA => (false, false, true),
                StatusCode::UD => (true, true, false),
                StatusCode::DU => (true, false, true),
            };
            self.sides.insert(
                path.to_string(),
                ConflictSides {
                    base: stage(base, "base\n"),
                    ours: stage(ours, "ours\n"),
                    theirs: stage(theirs, &format!("theirs {}\n", commit.id)),
                },
            );
            if code.is_textual() {
                self.worktree.insert(
                    path.to_string(),
                    format!("<<<<<<< HEAD\nours\n=======\ntheirs {}\n>>>>>>> {}\n", commit.id, commit.id),
                );
            } else if ours {
                self.worktree.insert(path.to_string(), "ours\n".into());
            } else if theirs {
                self.worktree.insert(path.to_string(), format!("theirs {}\n", commit.id));
            }
        }
        StepResult::Conflicted(self.conflicts.clone())
    }

    fn commit_stopped(&mut self) {
        if let Some(commit) = self.stopped.take() {
            self.history.push(commit);
        }
        self.staged.clear();
        self.resolves_empty = false;
    }

    fn leave_stop(&mut self) -> StepResult {
        match self.in_progress {
            Some(ReplayMode::Rebase) => self.run_rebase(),
            _ => {
                self.in_progress = None;
                StepResult::Success
            }
        }
    }

    fn run_rebase(&mut self) -> StepResult {
        loop {
            let next = match self.rebase.as_mut() {
                Some((_, todo)) if !todo.is_empty() => todo.remove(0),
                _ => {
                    self.rebase = None;
                    self.in_progress = None;
                    return StepResult::Success;
                }
            };
            if let Some((done, _)) = self.rebase.as_mut() {
                done.push(next.clone());
            }
            let mut words = next.split_whitespace();
            if words.next() != Some("pick") {
                continue;
            }
            let id = words.next().unwrap_or_default().to_string();
            let commit = self.known.get(&id).cloned().unwrap_or_else(|| commit(&id));
            let result = self.apply_one(&commit, ReplayMode::Rebase);
            if result != StepResult::Success {
                return result;
            }
        }
    }

    fn status(&self) -> RepoStatus {
        let mut files: Vec<FileEntry> = Vec::new();
        files.extend(self.staged.iter().map(|p| FileEntry::new(p.clone(), "M ")));
        files.extend(self.unstaged.iter().map(|p| FileEntry::new(p.clone(), " M")));
        files.extend(self.conflicts.iter().map(|c| FileEntry {
            path: c.path.clone(),
            short_status: c.code.to_string(),
            conflicted: true,
        }));
        RepoStatus {
            dirty: !files.is_empty(),
            files,
            conflicted: self.conflicts.clone(),
            rebase_in_progress: self.in_progress == Some(ReplayMode::Rebase),
            cherry_pick_in_progress: self.in_progress == Some(ReplayMode::CherryPick),
            has_staged_changes: !self.staged.is_empty(),
            has_unstaged_changes: !self.unstaged.is_empty(),
        }
    }

    fn stage(&mut self, path: &str) {
        let was_conflicted = self.conflicts.iter().any(|c| c.path == path);
        self.conflicts.retain(|c| c.path != path);
        self.unstaged.retain(|p| p != path);
        if was_conflicted && self.resolves_empty {
            return;
        }
        if !self.staged.iter().any(|p| p == path) {
            self.staged.push(path.to_string());
        }
    }
}

impl RepositoryAdapter for FakeRepo {
    fn list_commits(&self, _rev: &str, limit: usize) -> Result<Vec<CommitRef>, BackendError> {
        Ok(self.state.borrow().history.iter().rev().take(limit).cloned().collect())
    }

    fn head(&self) -> Result<String, BackendError> {
        self.state
            .borrow()
            .history
            .last()
            .map(|c| c.id.clone())
            .ok_or(BackendError::UnbornHead)
    }

    fn current_branch(&self) -> Result<Option<String>, BackendError> {
        Ok(Some("main".into()))
    }

    fn status(&self) -> Result<RepoStatus, BackendError> {
        Ok(self.state.borrow().status())
    }

    fn replay(&self, commits: &[CommitRef], mode: ReplayMode) -> Result<StepResult, BackendError> {
        self.check_fail("replay")?;
        let mut s = self.state.borrow_mut();
        match mode {
            ReplayMode::CherryPick => {
                for commit in commits {
                    let result = s.apply_one(commit, mode);
                    if result != StepResult::Success {
                        return Ok(result);
                    }
                }
                Ok(StepResult::Success)
            }
            ReplayMode::Rebase => {
                for commit in commits {
                    s.known.insert(commit.id.clone(), commit.clone());
                }
                s.rebase_base = s.history.len();
                s.in_progress = Some(ReplayMode::Rebase);
                let todo = commits
                    .iter()
                    .map(|c| format!("pick {} {}", c.id, c.subject))
                    .collect();
                s.rebase = Some((Vec::new(), todo));
                Ok(s.run_rebase())
            }
        }
    }

    fn continue_replay(&self, _mode: ReplayMode) -> Result<StepResult, BackendError> {
        self.check_fail("continue")?;
        let mut s = self.state.borrow_mut();
        if !s.conflicts.is_empty() {
            return Ok(StepResult::Conflicted(s.conflicts.clone()));
        }
        if s.stopped.is_some() && s.staged.is_empty() {
            return Ok(StepResult::NoOpWouldBeEmpty);
        }
        s.commit_stopped();
        Ok(s.leave_stop())
    }

    fn abort_replay(&self, mode: ReplayMode) -> Result<(), BackendError> {
        self.check_fail("abort")?;
        let mut s = self.state.borrow_mut();
        s.conflicts.clear();
        s.staged.clear();
        s.stopped = None;
        s.in_progress = None;
        if mode == ReplayMode::Rebase {
            let base = s.rebase_base;
            s.history.truncate(base);
            s.rebase = None;
        }
        Ok(())
    }

    fn skip_current_step(&self, _mode: ReplayMode) -> Result<StepResult, BackendError> {
        self.check_fail("skip")?;
        let mut s = self.state.borrow_mut();
        s.stopped = None;
        s.staged.clear();
        s.conflicts.clear();
        Ok(s.leave_stop())
    }

    fn commit_empty(&self, _mode: ReplayMode) -> Result<StepResult, BackendError> {
        self.check_fail("commit-empty")?;
        let mut s = self.state.borrow_mut();
        s.commit_stopped();
        Ok(s.leave_stop())
    }

    fn reset_hard(&self, id: &str) -> Result<(), BackendError> {
        self.check_fail("reset")?;
        let mut s = self.state.borrow_mut();
        let pos = s
            .history
            .iter()
            .position(|c| c.id == id)
            .ok_or_else(|| BackendError::RefNotFound(id.to_string()))?;
        s.history.truncate(pos + 1);
        s.staged.clear();
        s.unstaged.clear();
        Ok(())
    }

    fn stash_push(&self, label: &str) -> Result<(), BackendError> {
        self.check_fail("stash-push")?;
        let mut s = self.state.borrow_mut();
        let mut files: Vec<String> = s.unstaged.drain(..).collect();
        files.append(&mut s.staged);
        if !files.is_empty() {
            s.stashes.push((label.to_string(), files));
        }
        Ok(())
    }

    fn stash_pop(&self) -> Result<(), BackendError> {
        self.check_fail("stash-pop")?;
        let mut s = self.state.borrow_mut();
        let (_, files) = s.stashes.pop().ok_or_else(|| BackendError::CommandFailed {
            command: "git stash pop".into(),
            exit_code: 1,
            stderr: "No stash entries found.".into(),
        })?;
        s.unstaged.extend(files);
        Ok(())
    }

    fn stash_count(&self) -> Result<usize, BackendError> {
        Ok(self.state.borrow().stashes.len())
    }

    fn stash_top_message(&self) -> Result<Option<String>, BackendError> {
        Ok(self.state.borrow().stashes.last().map(|(label, _)| label.clone()))
    }

    fn resolve_file_with_strategy(&self, path: &str, strategy: MergeStrategy) -> Result<(), BackendError> {
        let sides = self.conflict_sides(path)?;
        let text = |side: &Option<Vec<u8>>| String::from_utf8_lossy(side.as_deref().unwrap_or_default()).to_string();
        let merged = Merger::merge_with_strategy(&text(&sides.base), &text(&sides.ours), &text(&sides.theirs), strategy);
        self.write_file(path, merged.as_bytes())?;
        self.stage_file(path)
    }

    fn stage_file(&self, path: &str) -> Result<(), BackendError> {
        self.check_fail("add")?;
        self.state.borrow_mut().stage(path);
        Ok(())
    }

    fn stage_all(&self) -> Result<(), BackendError> {
        let mut s = self.state.borrow_mut();
        let paths: Vec<String> = s
            .conflicts
            .iter()
            .map(|c| c.path.clone())
            .chain(s.unstaged.iter().cloned())
            .collect();
        for path in paths {
            s.stage(&path);
        }
        Ok(())
    }

    fn remove_file(&self, path: &str) -> Result<(), BackendError> {
        let mut s = self.state.borrow_mut();
        s.worktree.remove(path);
        s.stage(path);
        Ok(())
    }

    fn conflict_sides(&self, path: &str) -> Result<ConflictSides, BackendError> {
        self.state
            .borrow()
            .sides
            .get(path)
            .cloned()
            .ok_or_else(|| BackendError::RefNotFound(path.to_string()))
    }

    fn read_file(&self, path: &str) -> Result<Option<Vec<u8>>, BackendError> {
        Ok(self.state.borrow().worktree.get(path).map(|s| s.clone().into_bytes()))
    }

    fn write_file(&self, path: &str, content: &[u8]) -> Result<(), BackendError> {
        let mut s = self.state.borrow_mut();
        s.worktree
            .insert(path.to_string(), String::from_utf8_lossy(content).to_string());
        if !s.conflicts.iter().any(|c| c.path == path) && !s.unstaged.iter().any(|p| p == path) {
            s.unstaged.push(path.to_string());
        }
        Ok(())
    }

    fn read_rebase_todo(&self) -> Result<Option<RebaseTodoFiles>, BackendError> {
        Ok(self.state.borrow().rebase.as_ref().map(|(done, todo)| RebaseTodoFiles {
            done: done.iter().map(|l| format!("{}\n", l)).collect(),
            todo: todo.iter().map(|l| format!("{}\n", l)).collect(),
        }))
    }

    fn write_rebase_todo(&self, todo: &str) -> Result<(), BackendError> {
        self.check_fail("write-todo")?;
        let mut s = self.state.borrow_mut();
        match s.rebase.as_mut() {
            Some((_, pending)) => {
                *pending = todo.lines().map(str::to_string).collect();
                Ok(())
            }
            None => Err(BackendError::RefNotFound("rebase-merge/git-rebase-todo".into())),
        }
    }

    fn read_operation_state(&self) -> Result<Option<String>, BackendError> {
        Ok(self.state.borrow().saved_operation.clone())
    }

    fn write_operation_state(&self, state: Option<&str>) -> Result<(), BackendError> {
        self.state.borrow_mut().saved_operation = state.map(str::to_string);
        Ok(())
    }
}

/// Collects every notice the engine sends.
#[derive(Clone, Default)]
pub struct RecordingNotifier {
    pub notices: Arc<Mutex<Vec<Option<String>>>>,
}

impl RecordingNotifier {
    pub fn last(&self) -> Option<Option<String>> {
        self.notices.lock().unwrap().last().cloned()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, message: Option<String>) {
        self.notices.lock().unwrap().push(message);
    }
}
