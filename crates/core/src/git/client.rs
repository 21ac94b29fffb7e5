//! Repository adapter backed by the `git` CLI and `git2`.
//!
//! Reads (status, history, index stages, the rebase plan) go through
//! `git2`. Anything that mutates the repository runs the real `git` binary
//! so hooks, sequencer state and stash bookkeeping behave exactly as they do
//! on the command line.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use git2::{ErrorCode, Repository, RepositoryState, Status, StatusOptions};
use tracing::{debug, info, instrument, warn};

use super::{RebaseTodoFiles, RepositoryAdapter};
use crate::conflict::{ConflictSides, ConflictedFile, StatusCode};
use crate::errors::BackendError;
use crate::models::{CommitRef, FileEntry, MergeStrategy, ReplayMode, RepoStatus, StepResult};

/// Captured result of one `git` invocation.
#[derive(Debug)]
struct GitOutput {
    command: String,
    success: bool,
    exit_code: i32,
    stdout: Vec<u8>,
    stderr: String,
}

impl GitOutput {
    fn into_error(self) -> BackendError {
        BackendError::CommandFailed {
            command: self.command,
            exit_code: self.exit_code,
            stderr: self.stderr.trim().to_string(),
        }
    }
}

/// The real [`RepositoryAdapter`].
#[derive(Debug, Clone)]
pub struct GitCli {
    repo_path: PathBuf,
    git_dir: PathBuf,
    binary: String,
}

impl GitCli {
    /// Open the repository containing `path`.
    pub fn open<P: AsRef<Path>>(path: P, binary: impl Into<String>) -> Result<Self, BackendError> {
        let path = path.as_ref();
        info!(path = %path.display(), "opening git repository");
        let repo = Repository::discover(path)
            .map_err(|_| BackendError::RepositoryNotFound(path.display().to_string()))?;
        let repo_path = repo
            .workdir()
            .ok_or_else(|| BackendError::RepositoryNotFound(format!("{} (bare)", path.display())))?
            .to_path_buf();
        Ok(Self {
            repo_path,
            git_dir: repo.path().to_path_buf(),
            binary: binary.into(),
        })
    }

    pub fn repo_path(&self) -> &Path {
        &self.repo_path
    }

    pub fn git_dir(&self) -> &Path {
        &self.git_dir
    }

    fn repo(&self) -> Result<Repository, BackendError> {
        Repository::open(&self.repo_path)
            .map_err(|_| BackendError::RepositoryNotFound(self.repo_path.display().to_string()))
    }

    fn rebase_todo_path(&self) -> PathBuf {
        self.git_dir.join("rebase-merge").join("git-rebase-todo")
    }

    fn operation_state_path(&self) -> PathBuf {
        self.git_dir.join("graft").join("transplant.json")
    }

    // -----------------------------------------------------------------------
    // Process plumbing
    // -----------------------------------------------------------------------

    fn run(&self, args: &[&str]) -> Result<GitOutput, BackendError> {
        self.run_with_env(args, &[])
    }

    fn run_with_env(&self, args: &[&str], env: &[(&str, &str)]) -> Result<GitOutput, BackendError> {
        let command = format!("git {}", args.join(" "));
        let mut cmd = Command::new(&self.binary);
        cmd.current_dir(&self.repo_path)
            .args(args)
            .env("GIT_EDITOR", "true")
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        for (key, value) in env {
            cmd.env(key, value);
        }

        debug!(cmd = %command, "running git command");
        let output = cmd.output().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                BackendError::BinaryNotFound(self.binary.clone())
            } else {
                BackendError::IoError(e)
            }
        })?;

        let result = GitOutput {
            command,
            success: output.status.success(),
            exit_code: output.status.code().unwrap_or(-1),
            stdout: output.stdout,
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        };
        if !result.success {
            debug!(exit_code = result.exit_code, stderr = %result.stderr.trim(), "git command exited non-zero");
        }
        Ok(result)
    }

    fn run_checked(&self, args: &[&str]) -> Result<GitOutput, BackendError> {
        let output = self.run(args)?;
        if output.success {
            Ok(output)
        } else {
            warn!(exit_code = output.exit_code, stderr = %output.stderr.trim(), "git command failed");
            Err(output.into_error())
        }
    }

    /// Normalize a replay command's outcome from the repository state it
    /// left behind, not from its exit code alone.
    fn step_result(&self, output: GitOutput) -> Result<StepResult, BackendError> {
        let status = self.status()?;
        if !status.conflicted.is_empty() {
            info!(count = status.conflicted.len(), "replay stopped on conflicts");
            return Ok(StepResult::Conflicted(status.conflicted));
        }
        if status.replay_in_progress() && !status.has_staged_changes {
            info!("replay stopped on an empty commit");
            return Ok(StepResult::NoOpWouldBeEmpty);
        }
        if output.success {
            Ok(StepResult::Success)
        } else {
            warn!(exit_code = output.exit_code, stderr = %output.stderr.trim(), "replay command failed");
            Err(output.into_error())
        }
    }

    fn cherry_pick_one(&self, commit: &CommitRef) -> Result<StepResult, BackendError> {
        let output = if commit.is_merge {
            self.run(&["cherry-pick", "-m", "1", &commit.id])?
        } else {
            self.run(&["cherry-pick", &commit.id])?
        };
        self.step_result(output)
    }

    /// Start an interactive rebase onto HEAD whose plan is exactly
    /// `commits`, in order.
    fn rebase_onto_head(&self, commits: &[CommitRef]) -> Result<StepResult, BackendError> {
        let mut plan = tempfile::NamedTempFile::new()?;
        for commit in commits {
            writeln!(plan, "pick {} {}", commit.id, commit.subject)?;
        }
        plan.flush()?;

        let editor = format!("cp '{}'", plan.path().display());
        let output = self.run_with_env(
            &["rebase", "-i", "--empty=ask", "HEAD"],
            &[("GIT_SEQUENCE_EDITOR", editor.as_str())],
        )?;
        self.step_result(output)
    }
}

// ---------------------------------------------------------------------------
// Status helpers
// ---------------------------------------------------------------------------

const STAGED: Status = Status::INDEX_NEW
    .union(Status::INDEX_MODIFIED)
    .union(Status::INDEX_DELETED)
    .union(Status::INDEX_RENAMED)
    .union(Status::INDEX_TYPECHANGE);

const UNSTAGED: Status = Status::WT_MODIFIED
    .union(Status::WT_DELETED)
    .union(Status::WT_RENAMED)
    .union(Status::WT_TYPECHANGE);

/// Two-letter porcelain status for a non-conflicted entry.
fn short_status(status: Status) -> String {
    if status == Status::WT_NEW {
        return "??".to_string();
    }
    let index = if status.contains(Status::INDEX_NEW) {
        'A'
    } else if status.contains(Status::INDEX_MODIFIED) {
        'M'
    } else if status.contains(Status::INDEX_DELETED) {
        'D'
    } else if status.contains(Status::INDEX_RENAMED) {
        'R'
    } else if status.contains(Status::INDEX_TYPECHANGE) {
        'T'
    } else {
        ' '
    };
    let worktree = if status.contains(Status::WT_MODIFIED) {
        'M'
    } else if status.contains(Status::WT_DELETED) {
        'D'
    } else if status.contains(Status::WT_TYPECHANGE) {
        'T'
    } else if status.contains(Status::WT_RENAMED) {
        'R'
    } else {
        ' '
    };
    format!("{}{}", index, worktree)
}

fn entry_path(entry: &git2::IndexEntry) -> String {
    String::from_utf8_lossy(&entry.path).to_string()
}

fn blob_content(repo: &Repository, entry: Option<git2::IndexEntry>) -> Result<Option<Vec<u8>>, BackendError> {
    match entry {
        Some(entry) => Ok(Some(repo.find_blob(entry.id)?.content().to_vec())),
        None => Ok(None),
    }
}

fn read_optional(path: &Path) -> Result<Option<Vec<u8>>, BackendError> {
    match std::fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Like [`read_optional`], for files that must be UTF-8.
fn read_text(path: &Path) -> Result<Option<String>, BackendError> {
    match read_optional(path)? {
        Some(bytes) => String::from_utf8(bytes)
            .map(Some)
            .map_err(|_| BackendError::InvalidEncoding(path.display().to_string())),
        None => Ok(None),
    }
}

impl RepositoryAdapter for GitCli {
    fn list_commits(&self, rev: &str, limit: usize) -> Result<Vec<CommitRef>, BackendError> {
        let repo = self.repo()?;
        let start = repo
            .revparse_single(rev)
            .and_then(|obj| obj.peel_to_commit())
            .map_err(|_| BackendError::RefNotFound(rev.to_string()))?;

        let mut revwalk = repo.revwalk()?;
        revwalk.push(start.id())?;
        revwalk.set_sorting(git2::Sort::TOPOLOGICAL | git2::Sort::TIME)?;

        let mut commits = Vec::new();
        for oid in revwalk.take(limit) {
            let commit = repo.find_commit(oid?)?;
            commits.push(CommitRef {
                id: commit.id().to_string(),
                subject: commit.summary().unwrap_or("").to_string(),
                is_merge: commit.parent_count() > 1,
            });
        }
        debug!(rev, count = commits.len(), "listed commits");
        Ok(commits)
    }

    fn head(&self) -> Result<String, BackendError> {
        let repo = self.repo()?;
        let head = match repo.head() {
            Ok(head) => head,
            Err(e) if e.code() == ErrorCode::UnbornBranch => return Err(BackendError::UnbornHead),
            Err(e) => return Err(e.into()),
        };
        let id = head.peel_to_commit()?.id().to_string();
        Ok(id)
    }

    fn current_branch(&self) -> Result<Option<String>, BackendError> {
        let repo = self.repo()?;
        let head = match repo.head() {
            Ok(head) => head,
            Err(e) if e.code() == ErrorCode::UnbornBranch => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        if head.is_branch() {
            Ok(head.shorthand().map(str::to_string))
        } else {
            Ok(None)
        }
    }

    fn status(&self) -> Result<RepoStatus, BackendError> {
        let repo = self.repo()?;
        let mut status = RepoStatus::default();

        match repo.state() {
            RepositoryState::CherryPick | RepositoryState::CherryPickSequence => {
                status.cherry_pick_in_progress = true
            }
            RepositoryState::Rebase
            | RepositoryState::RebaseInteractive
            | RepositoryState::RebaseMerge
            | RepositoryState::ApplyMailboxOrRebase => status.rebase_in_progress = true,
            _ => {}
        }

        let index = repo.index()?;
        if index.has_conflicts() {
            for conflict in index.conflicts()? {
                let conflict = conflict?;
                let path = [&conflict.our, &conflict.their, &conflict.ancestor]
                    .into_iter()
                    .flatten()
                    .next()
                    .map(entry_path);
                let code = StatusCode::from_stages(
                    conflict.ancestor.is_some(),
                    conflict.our.is_some(),
                    conflict.their.is_some(),
                );
                if let (Some(path), Some(code)) = (path, code) {
                    status.conflicted.push(ConflictedFile::new(path, code));
                }
            }
        }

        let mut opts = StatusOptions::new();
        opts.include_untracked(true)
            .recurse_untracked_dirs(false)
            .include_ignored(false);
        let statuses = repo.statuses(Some(&mut opts))?;
        for entry in statuses.iter() {
            let flags = entry.status();
            let Some(path) = entry.path().map(str::to_string) else {
                continue;
            };
            if flags.contains(Status::CONFLICTED) {
                continue;
            }
            if flags.intersects(STAGED) {
                status.has_staged_changes = true;
            }
            if flags.intersects(UNSTAGED) {
                status.has_unstaged_changes = true;
            }
            if flags != Status::WT_NEW {
                status.dirty = true;
            }
            status.files.push(FileEntry::new(path, short_status(flags)));
        }

        for conflict in &status.conflicted {
            status.files.push(FileEntry {
                path: conflict.path.clone(),
                short_status: conflict.code.to_string(),
                conflicted: true,
            });
        }
        if !status.conflicted.is_empty() {
            status.dirty = true;
        }
        status.files.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(status)
    }

    #[instrument(skip(self, commits), fields(count = commits.len()))]
    fn replay(&self, commits: &[CommitRef], mode: ReplayMode) -> Result<StepResult, BackendError> {
        info!(%mode, "replaying commits");
        match mode {
            ReplayMode::CherryPick => {
                for commit in commits {
                    let result = self.cherry_pick_one(commit)?;
                    if result != StepResult::Success {
                        return Ok(result);
                    }
                }
                Ok(StepResult::Success)
            }
            ReplayMode::Rebase => self.rebase_onto_head(commits),
        }
    }

    #[instrument(skip(self))]
    fn continue_replay(&self, mode: ReplayMode) -> Result<StepResult, BackendError> {
        let output = match mode {
            ReplayMode::CherryPick => self.run(&["cherry-pick", "--continue"])?,
            ReplayMode::Rebase => self.run(&["rebase", "--continue"])?,
        };
        self.step_result(output)
    }

    #[instrument(skip(self))]
    fn abort_replay(&self, mode: ReplayMode) -> Result<(), BackendError> {
        match mode {
            ReplayMode::CherryPick => self.run_checked(&["cherry-pick", "--abort"])?,
            ReplayMode::Rebase => self.run_checked(&["rebase", "--abort"])?,
        };
        info!(%mode, "aborted replay");
        Ok(())
    }

    #[instrument(skip(self))]
    fn skip_current_step(&self, mode: ReplayMode) -> Result<StepResult, BackendError> {
        let output = match mode {
            ReplayMode::CherryPick => self.run(&["cherry-pick", "--skip"])?,
            ReplayMode::Rebase => self.run(&["rebase", "--skip"])?,
        };
        self.step_result(output)
    }

    #[instrument(skip(self))]
    fn commit_empty(&self, mode: ReplayMode) -> Result<StepResult, BackendError> {
        let output = self.run(&["commit", "--allow-empty", "--no-edit"])?;
        if !output.success {
            return Err(output.into_error());
        }
        match mode {
            ReplayMode::CherryPick => self.step_result(output),
            ReplayMode::Rebase => {
                let output = self.run(&["rebase", "--continue"])?;
                self.step_result(output)
            }
        }
    }

    #[instrument(skip(self))]
    fn reset_hard(&self, id: &str) -> Result<(), BackendError> {
        self.run_checked(&["reset", "--hard", id])?;
        info!(id, "reset worktree");
        Ok(())
    }

    #[instrument(skip(self))]
    fn stash_push(&self, label: &str) -> Result<(), BackendError> {
        self.run_checked(&["stash", "push", "-m", label])?;
        Ok(())
    }

    #[instrument(skip(self))]
    fn stash_pop(&self) -> Result<(), BackendError> {
        self.run_checked(&["stash", "pop"])?;
        Ok(())
    }

    fn stash_count(&self) -> Result<usize, BackendError> {
        let mut repo = self.repo()?;
        let mut count = 0;
        repo.stash_foreach(|_, _, _| {
            count += 1;
            true
        })?;
        Ok(count)
    }

    fn stash_top_message(&self) -> Result<Option<String>, BackendError> {
        let mut repo = self.repo()?;
        let mut top = None;
        repo.stash_foreach(|index, message, _| {
            if index == 0 {
                top = Some(message.to_string());
            }
            true
        })?;
        Ok(top)
    }

    #[instrument(skip(self))]
    fn resolve_file_with_strategy(&self, path: &str, strategy: MergeStrategy) -> Result<(), BackendError> {
        let sides = self.conflict_sides(path)?;
        let scratch = tempfile::tempdir()?;
        let ours = scratch.path().join("ours");
        let base = scratch.path().join("base");
        let theirs = scratch.path().join("theirs");
        std::fs::write(&ours, sides.ours.as_deref().unwrap_or_default())?;
        std::fs::write(&base, sides.base.as_deref().unwrap_or_default())?;
        std::fs::write(&theirs, sides.theirs.as_deref().unwrap_or_default())?;

        let output = self.run_checked(&[
            "merge-file",
            strategy.merge_file_flag(),
            "-p",
            &ours.to_string_lossy(),
            &base.to_string_lossy(),
            &theirs.to_string_lossy(),
        ])?;
        self.write_file(path, &output.stdout)?;
        self.stage_file(path)
    }

    fn stage_file(&self, path: &str) -> Result<(), BackendError> {
        self.run_checked(&["add", "--", path])?;
        debug!(path, "staged file");
        Ok(())
    }

    fn stage_all(&self) -> Result<(), BackendError> {
        self.run_checked(&["add", "-A"])?;
        Ok(())
    }

    fn remove_file(&self, path: &str) -> Result<(), BackendError> {
        self.run_checked(&["rm", "-f", "--", path])?;
        debug!(path, "removed file");
        Ok(())
    }

    fn conflict_sides(&self, path: &str) -> Result<ConflictSides, BackendError> {
        let repo = self.repo()?;
        let index = repo.index()?;
        for conflict in index.conflicts()? {
            let conflict = conflict?;
            let matches = [&conflict.our, &conflict.their, &conflict.ancestor]
                .into_iter()
                .flatten()
                .any(|e| entry_path(e) == path);
            if matches {
                return Ok(ConflictSides {
                    base: blob_content(&repo, conflict.ancestor)?,
                    ours: blob_content(&repo, conflict.our)?,
                    theirs: blob_content(&repo, conflict.their)?,
                });
            }
        }
        Err(BackendError::RefNotFound(format!("no conflict entry for '{}'", path)))
    }

    fn read_file(&self, path: &str) -> Result<Option<Vec<u8>>, BackendError> {
        read_optional(&self.repo_path.join(path))
    }

    fn write_file(&self, path: &str, content: &[u8]) -> Result<(), BackendError> {
        let full = self.repo_path.join(path);
        if let Some(parent) = full.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(full, content)?;
        Ok(())
    }

    fn read_rebase_todo(&self) -> Result<Option<RebaseTodoFiles>, BackendError> {
        let Some(todo) = read_text(&self.rebase_todo_path())? else {
            return Ok(None);
        };
        let done = read_text(&self.git_dir.join("rebase-merge").join("done"))?.unwrap_or_default();
        Ok(Some(RebaseTodoFiles { done, todo }))
    }

    fn write_rebase_todo(&self, todo: &str) -> Result<(), BackendError> {
        let path = self.rebase_todo_path();
        if !path.exists() {
            return Err(BackendError::IoError(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "no interactive rebase in progress",
            )));
        }
        std::fs::write(path, todo)?;
        debug!("rewrote rebase todo");
        Ok(())
    }

    fn read_operation_state(&self) -> Result<Option<String>, BackendError> {
        read_text(&self.operation_state_path())
    }

    fn write_operation_state(&self, state: Option<&str>) -> Result<(), BackendError> {
        let path = self.operation_state_path();
        match state {
            Some(state) => {
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                std::fs::write(&path, state)?;
            }
            None => match std::fs::remove_file(&path) {
                Ok(()) => debug!("cleared saved transplant"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            },
        }
        Ok(())
    }
}
