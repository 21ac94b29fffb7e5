//! The transplant state machine.

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use super::{
    Decision, OperationStatus, Outcome, PendingDecision, Step, TransplantReport, TransplantSnapshot,
};
use crate::autostash::{AutostashCoordinator, GuardedOutcome};
use crate::config::{GraftConfig, TransplantConfig};
use crate::conflict::{ConflictGate, GateVerdict};
use crate::copy_buffer::{CopyBuffer, Notifier};
use crate::errors::{BackendError, TodoError, TransplantError};
use crate::git::RepositoryAdapter;
use crate::models::{CommitRef, ReplayMode, RepoStatus, StepResult};
use crate::todo::{RebaseTodo, RebaseTodoProjector};

/// How an operation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Terminal {
    Completed,
    Aborted,
    Cancelled,
}

/// The transplant in flight.
#[derive(Debug, Serialize, Deserialize)]
struct Operation {
    mode: ReplayMode,
    /// Everything this run was asked to replay, in order.
    commits: Vec<CommitRef>,
    /// Not yet started.
    remaining: VecDeque<CommitRef>,
    /// The step the backend stopped at, if any.
    current: Option<CommitRef>,
    /// HEAD before the first step.
    start_head: String,
    report: TransplantReport,
    pending: Option<PendingDecision>,
}

impl Operation {
    fn new(mode: ReplayMode, commits: Vec<CommitRef>, start_head: String) -> Self {
        Self {
            mode,
            remaining: commits.iter().cloned().collect(),
            commits,
            current: None,
            start_head,
            report: TransplantReport::new(mode),
            pending: None,
        }
    }

    fn find(&self, id: &str) -> Option<CommitRef> {
        self.commits.iter().find(|c| c.matches(id)).cloned()
    }

    /// Past the confirmations, so the backend may have been touched.
    fn started(&self) -> bool {
        !matches!(
            self.pending,
            Some(PendingDecision::ConfirmPaste { .. }) | Some(PendingDecision::ConfirmAutostash { .. })
        )
    }
}

/// What is written through the adapter after every transition.
#[derive(Serialize)]
struct SavedOperationRef<'a> {
    stash_held: bool,
    operation: &'a Operation,
}

#[derive(Deserialize)]
struct SavedOperation {
    stash_held: bool,
    operation: Operation,
}

/// The decision a replay found stopped in the repository waits on.
fn adopted_pending(status: &RepoStatus, current: Option<CommitRef>) -> PendingDecision {
    match ConflictGate::classify(status) {
        GateVerdict::NoOpCommit => PendingDecision::EmptyCommit { commit: current },
        GateVerdict::ConflictedFiles(files) => PendingDecision::Conflicts { files },
        GateVerdict::NoConflict => PendingDecision::Conflicts { files: Vec::new() },
    }
}

/// Replays copied commits onto the current branch, one suspension point at
/// a time.
pub struct Transplanter<A: RepositoryAdapter> {
    adapter: A,
    config: TransplantConfig,
    gate: ConflictGate,
    autostash: AutostashCoordinator,
    projector: RebaseTodoProjector,
    op: Option<Operation>,
    snapshot: Arc<TransplantSnapshot>,
    notifier: Option<Box<dyn Notifier + Send>>,
}

impl<A: RepositoryAdapter> Transplanter<A> {
    pub fn new(adapter: A, config: &GraftConfig) -> Self {
        Self {
            adapter,
            gate: ConflictGate::new(config.transplant.auto_stage_resolved),
            autostash: AutostashCoordinator::from_config(&config.transplant),
            projector: RebaseTodoProjector::new(config.git.comment_char),
            config: config.transplant.clone(),
            op: None,
            snapshot: Arc::new(TransplantSnapshot::default()),
            notifier: None,
        }
    }

    /// Send copy-count notices to `notifier`.
    pub fn with_notifier(mut self, notifier: Box<dyn Notifier + Send>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn adapter(&self) -> &A {
        &self.adapter
    }

    pub fn into_adapter(self) -> A {
        self.adapter
    }

    pub fn gate(&self) -> &ConflictGate {
        &self.gate
    }

    pub fn projector(&self) -> &RebaseTodoProjector {
        &self.projector
    }

    /// The latest published state. Cheap to clone and safe to hold while
    /// the engine moves on.
    pub fn snapshot(&self) -> Arc<TransplantSnapshot> {
        Arc::clone(&self.snapshot)
    }

    pub fn pending(&self) -> Option<&PendingDecision> {
        self.op.as_ref().and_then(|op| op.pending.as_ref())
    }

    pub fn is_idle(&self) -> bool {
        self.op.is_none()
    }

    // -----------------------------------------------------------------------
    // Entry points
    // -----------------------------------------------------------------------

    /// Paste the copy buffer onto the current branch.
    ///
    /// During an active interactive rebase the commits are queued in its
    /// TODO list instead.
    #[instrument(skip(self, buffer), fields(count = buffer.count(), %mode))]
    pub fn paste(&mut self, buffer: &mut CopyBuffer, mode: ReplayMode) -> Result<Step, TransplantError> {
        if let Some(op) = &self.op {
            return Err(TransplantError::OperationInFlight {
                kind: op.mode.to_string(),
            });
        }
        let result = self.begin(buffer, mode);
        self.recover(result)
    }

    /// Answer the pending decision.
    #[instrument(skip(self, buffer), fields(%decision))]
    pub fn resume(&mut self, buffer: &mut CopyBuffer, decision: Decision) -> Result<Step, TransplantError> {
        let pending = self.pending().cloned().ok_or(TransplantError::NoPendingDecision)?;
        if !pending.accepts(decision) {
            return Err(TransplantError::InvalidDecision {
                decision: decision.to_string(),
                pending: pending.to_string(),
            });
        }
        let result = self.apply(buffer, pending, decision);
        self.recover(result)
    }

    /// Re-derive displayed state from the backend. Never advances the
    /// operation.
    ///
    /// With nothing in flight, a transplant saved by an earlier process is
    /// picked up with its remaining commits and stash. A replay started
    /// elsewhere is adopted as waiting for the user.
    #[instrument(skip(self))]
    pub fn resync(&mut self) -> Result<Arc<TransplantSnapshot>, TransplantError> {
        let status = self.adapter.status()?;
        if let Some(op) = self.op.as_mut() {
            if let Some(PendingDecision::Conflicts { files }) = op.pending.as_mut() {
                *files = status.conflicted.clone();
            }
        } else {
            match (status.replay_mode(), self.load_saved()) {
                (Some(mode), Some(saved)) if saved.operation.mode == mode => {
                    let pending = adopted_pending(&status, saved.operation.current.clone());
                    self.restore(saved, pending);
                }
                (Some(mode), _) => self.adopt_foreign(mode, &status)?,
                // The stopped step was concluded outside graft; continuing
                // replays the rest.
                (None, Some(saved)) => self.restore(saved, PendingDecision::Conflicts { files: Vec::new() }),
                (None, None) => {}
            }
            if self.op.as_ref().is_some_and(|op| op.mode == ReplayMode::Rebase) {
                self.sync_rebase_progress()?;
            }
        }
        self.publish();
        Ok(self.snapshot())
    }

    // -----------------------------------------------------------------------
    // Transitions
    // -----------------------------------------------------------------------

    fn begin(&mut self, buffer: &mut CopyBuffer, mode: ReplayMode) -> Result<Step, TransplantError> {
        let status = self.adapter.status()?;
        if status.rebase_in_progress && self.adapter.read_rebase_todo()?.is_some() {
            let count = self.projector.project(&self.adapter, buffer)?;
            let head = self.adapter.head().ok();
            self.publish_finished(OperationStatus::Completed, None, Vec::new(), head);
            self.notify(buffer);
            return Ok(Step::Finished(Outcome::Queued { count }));
        }
        if let Some(kind) = status.replay_mode() {
            return Err(TransplantError::OperationInFlight {
                kind: kind.to_string(),
            });
        }
        if buffer.is_empty() {
            return Err(TransplantError::EmptyCopyBuffer);
        }
        if mode == ReplayMode::Rebase {
            if let Some(merge) = buffer.first_merge() {
                return Err(TransplantError::MergeCommitUnsupported {
                    id: merge.short_id().to_string(),
                });
            }
        }

        let start_head = self.adapter.head()?;
        self.op = Some(Operation::new(mode, buffer.items().to_vec(), start_head));
        info!(count = buffer.count(), "starting transplant");
        if self.config.confirm_before_paste {
            return Ok(self.suspend(PendingDecision::ConfirmPaste {
                count: buffer.count(),
            }));
        }
        self.after_paste_confirmed(buffer)
    }

    fn apply(
        &mut self,
        buffer: &mut CopyBuffer,
        pending: PendingDecision,
        decision: Decision,
    ) -> Result<Step, TransplantError> {
        let mode = self.mode()?;
        match (pending, decision) {
            (PendingDecision::ConfirmPaste { .. }, Decision::Confirm) => {
                self.clear_pending();
                self.after_paste_confirmed(buffer)
            }
            (PendingDecision::ConfirmAutostash { .. }, Decision::Confirm) => {
                self.clear_pending();
                self.autostash.stash(&self.adapter)?;
                self.start(buffer)
            }
            (PendingDecision::ConfirmPaste { .. }, Decision::Decline)
            | (PendingDecision::ConfirmAutostash { .. }, Decision::Decline) => {
                debug!("transplant declined");
                self.op = None;
                let head = self.adapter.head().ok();
                self.publish_finished(OperationStatus::Idle, None, Vec::new(), head);
                Ok(Step::Finished(Outcome::Declined))
            }

            (PendingDecision::EmptyCommit { .. }, Decision::Skip) => {
                let result = self.adapter.skip_current_step(mode)?;
                let stopped = self.op_mut()?.current.take();
                if let Some(commit) = stopped {
                    info!(id = commit.short_id(), "skipped empty commit");
                    self.op_mut()?.report.skipped.push(commit);
                }
                self.clear_pending();
                self.continue_after(buffer, result)
            }
            (PendingDecision::EmptyCommit { .. }, Decision::CreateEmpty) => {
                let result = self.adapter.commit_empty(mode)?;
                let stopped = self.op_mut()?.current.take();
                if let Some(commit) = stopped {
                    info!(id = commit.short_id(), "recorded empty commit");
                    self.op_mut()?.report.emptied.push(commit);
                }
                self.clear_pending();
                self.continue_after(buffer, result)
            }
            (PendingDecision::EmptyCommit { .. }, Decision::Cancel) => {
                self.adapter.abort_replay(mode)?;
                self.finish(buffer, Terminal::Cancelled)
            }

            (PendingDecision::Conflicts { .. }, Decision::Continue) => {
                let status = self.adapter.status()?;
                ConflictGate::check_continue(&status)?;
                let unstaged = status.unstaged_paths();
                if !unstaged.is_empty() {
                    return Ok(self.suspend(PendingDecision::StageRemaining { paths: unstaged }));
                }
                self.continue_replay(buffer, mode)
            }
            (PendingDecision::Conflicts { .. }, Decision::Abort) => Ok(self.suspend(PendingDecision::ConfirmAbort)),

            (PendingDecision::StageRemaining { paths }, Decision::Confirm) => {
                self.gate.stage_paths(&self.adapter, &paths)?;
                self.continue_replay(buffer, mode)
            }
            (PendingDecision::StageRemaining { .. }, Decision::Decline)
            | (PendingDecision::ConfirmAbort, Decision::Decline) => {
                let files = self.adapter.status()?.conflicted;
                Ok(self.suspend(PendingDecision::Conflicts { files }))
            }
            (PendingDecision::ConfirmAbort, Decision::Confirm) => {
                let replaying = self.adapter.status()?.replay_in_progress();
                if replaying {
                    self.adapter.abort_replay(mode)?;
                }
                if mode == ReplayMode::CherryPick || !replaying {
                    let start_head = self.op_mut()?.start_head.clone();
                    if self.adapter.head()? != start_head {
                        self.adapter.reset_hard(&start_head)?;
                    }
                }
                self.finish(buffer, Terminal::Aborted)
            }

            (pending, decision) => Err(TransplantError::InvalidDecision {
                decision: decision.to_string(),
                pending: pending.to_string(),
            }),
        }
    }

    fn after_paste_confirmed(&mut self, buffer: &mut CopyBuffer) -> Result<Step, TransplantError> {
        let status = self.adapter.status()?;
        if status.dirty {
            if self.autostash.requires_confirmation() {
                return Ok(self.suspend(PendingDecision::ConfirmAutostash {
                    dirty_files: status.dirty_file_count(),
                }));
            }
            self.autostash.stash(&self.adapter)?;
        }
        self.start(buffer)
    }

    fn start(&mut self, buffer: &mut CopyBuffer) -> Result<Step, TransplantError> {
        self.publish();
        match self.mode()? {
            ReplayMode::CherryPick => self.drive(buffer),
            ReplayMode::Rebase => {
                let commits = self.op_mut()?.commits.clone();
                let result = self.adapter.replay(&commits, ReplayMode::Rebase)?;
                self.settle_rebase(buffer, result)
            }
        }
    }

    /// Cherry-pick the remaining commits one by one until done or stopped.
    fn drive(&mut self, buffer: &mut CopyBuffer) -> Result<Step, TransplantError> {
        loop {
            let next = match self.op_mut()?.remaining.pop_front() {
                Some(commit) => commit,
                None => return self.finish(buffer, Terminal::Completed),
            };
            debug!(id = next.short_id(), "cherry-picking");
            self.op_mut()?.current = Some(next.clone());
            self.publish();
            let result = self.adapter.replay(std::slice::from_ref(&next), ReplayMode::CherryPick)?;
            if let Some(step) = self.after_cherry_pick_step(result)? {
                return Ok(step);
            }
        }
    }

    fn after_cherry_pick_step(&mut self, result: StepResult) -> Result<Option<Step>, TransplantError> {
        match self.verdict(result)? {
            GateVerdict::NoConflict => {
                let op = self.op_mut()?;
                if let Some(commit) = op.current.take() {
                    op.report.applied.push(commit);
                }
                Ok(None)
            }
            GateVerdict::NoOpCommit => {
                let commit = self.op_mut()?.current.clone();
                Ok(Some(self.suspend(PendingDecision::EmptyCommit { commit })))
            }
            GateVerdict::ConflictedFiles(files) => Ok(Some(self.suspend(PendingDecision::Conflicts { files }))),
        }
    }

    fn continue_replay(&mut self, buffer: &mut CopyBuffer, mode: ReplayMode) -> Result<Step, TransplantError> {
        let result = if self.adapter.status()?.replay_in_progress() {
            self.adapter.continue_replay(mode)?
        } else {
            debug!("stopped step was already concluded");
            StepResult::Success
        };
        self.clear_pending();
        self.continue_after(buffer, result)
    }

    fn continue_after(&mut self, buffer: &mut CopyBuffer, result: StepResult) -> Result<Step, TransplantError> {
        match self.mode()? {
            ReplayMode::CherryPick => match self.after_cherry_pick_step(result)? {
                Some(step) => Ok(step),
                None => self.drive(buffer),
            },
            ReplayMode::Rebase => self.settle_rebase(buffer, result),
        }
    }

    /// Follow a backend-driven rebase until it finishes or stops for the
    /// user.
    fn settle_rebase(&mut self, buffer: &mut CopyBuffer, result: StepResult) -> Result<Step, TransplantError> {
        let bound = self.op_mut()?.commits.len() + 1;
        let mut result = result;
        for _ in 0..=bound {
            let verdict = self.verdict(result)?;
            self.sync_rebase_progress()?;
            match verdict {
                GateVerdict::NoOpCommit => {
                    let commit = self.op_mut()?.current.clone();
                    return Ok(self.suspend(PendingDecision::EmptyCommit { commit }));
                }
                GateVerdict::ConflictedFiles(files) => {
                    return Ok(self.suspend(PendingDecision::Conflicts { files }));
                }
                GateVerdict::NoConflict => {
                    if !self.adapter.status()?.rebase_in_progress {
                        return self.finish(buffer, Terminal::Completed);
                    }
                    debug!("rebase stopped without conflicts, continuing");
                    result = self.adapter.continue_replay(ReplayMode::Rebase)?;
                }
            }
        }
        Err(BackendError::CommandFailed {
            command: "git rebase --continue".into(),
            exit_code: -1,
            stderr: "rebase kept stopping without conflicts".into(),
        }
        .into())
    }

    fn finish(&mut self, buffer: &mut CopyBuffer, terminal: Terminal) -> Result<Step, TransplantError> {
        let mut op = self.op.take().ok_or(TransplantError::NoPendingDecision)?;
        op.report.finished_at = Some(Utc::now());
        match (terminal, op.mode) {
            (Terminal::Completed, ReplayMode::Rebase) => {
                let applied: Vec<CommitRef> = op
                    .commits
                    .iter()
                    .filter(|c| !op.report.skipped.contains(c) && !op.report.emptied.contains(c))
                    .cloned()
                    .collect();
                op.report.applied = applied;
            }
            (Terminal::Aborted, _) | (Terminal::Cancelled, ReplayMode::Rebase) => {
                op.report.applied.clear();
                op.report.emptied.clear();
            }
            _ => {}
        }

        if let Err(e) = self.autostash.reconcile(&self.adapter, GuardedOutcome::Resolved) {
            warn!(error = %e, "could not restore stashed changes, the stash entry is kept");
        }

        if terminal != Terminal::Aborted {
            let all_transplanted = buffer
                .items()
                .iter()
                .all(|c| op.commits.iter().any(|o| o.id == c.id));
            if all_transplanted {
                buffer.clear();
            } else {
                let ids: Vec<String> = op.commits.iter().map(|c| c.id.clone()).collect();
                buffer.remove_all(&ids);
            }
        }

        let head = self.adapter.head().ok();
        let (status, outcome) = match terminal {
            Terminal::Completed => (OperationStatus::Completed, Outcome::Completed { report: op.report.clone() }),
            Terminal::Aborted => (OperationStatus::Aborted, Outcome::Aborted { report: op.report.clone() }),
            Terminal::Cancelled => (OperationStatus::Cancelled, Outcome::Cancelled { report: op.report.clone() }),
        };
        info!(
            id = %op.report.id,
            %status,
            applied = op.report.applied.len(),
            skipped = op.report.skipped.len(),
            emptied = op.report.emptied.len(),
            "transplant finished"
        );
        self.publish_finished(status, Some(op.mode), op.report.applied, head);
        self.notify(buffer);
        Ok(Step::Finished(outcome))
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    /// Classify the backend's state after `result`, reading status fresh.
    fn verdict(&self, result: StepResult) -> Result<GateVerdict, TransplantError> {
        let status = self.adapter.status()?;
        Ok(match ConflictGate::classify(&status) {
            GateVerdict::NoConflict => match result {
                StepResult::Success => GateVerdict::NoConflict,
                StepResult::NoOpWouldBeEmpty => GateVerdict::NoOpCommit,
                StepResult::Conflicted(files) => GateVerdict::ConflictedFiles(files),
            },
            verdict => verdict,
        })
    }

    /// Re-derive the current and remaining commits from the rebase TODO.
    fn sync_rebase_progress(&mut self) -> Result<(), TransplantError> {
        let todo = match self.projector.load(&self.adapter) {
            Ok(todo) => todo,
            Err(TransplantError::Todo(TodoError::NoRebaseInProgress)) => return Ok(()),
            Err(e) => return Err(e),
        };
        let op = self.op_mut()?;
        let current = todo
            .current()
            .and_then(|line| line.commit.as_deref())
            .and_then(|id| op.find(id));
        let remaining: VecDeque<CommitRef> = todo
            .pending()
            .iter()
            .filter_map(|line| line.commit.as_deref())
            .filter_map(|id| op.find(id))
            .collect();
        op.current = current;
        op.remaining = remaining;
        Ok(())
    }

    /// The transplant an earlier process saved, if it got as far as
    /// touching the repository. Unreadable state is logged and ignored.
    fn load_saved(&self) -> Option<SavedOperation> {
        let text = match self.adapter.read_operation_state() {
            Ok(Some(text)) => text,
            Ok(None) => return None,
            Err(e) => {
                warn!(error = %e, "could not read saved transplant");
                return None;
            }
        };
        match serde_json::from_str::<SavedOperation>(&text) {
            Ok(saved) if saved.operation.started() => Some(saved),
            Ok(_) => {
                debug!("saved transplant never started, discarding");
                None
            }
            Err(e) => {
                warn!(error = %e, "discarding unreadable saved transplant");
                None
            }
        }
    }

    fn restore(&mut self, saved: SavedOperation, pending: PendingDecision) {
        let mut op = saved.operation;
        info!(
            mode = %op.mode,
            id = %op.report.id,
            remaining = op.remaining.len(),
            "resumed saved transplant"
        );
        op.pending = Some(pending);
        if saved.stash_held {
            self.autostash.adopt();
        }
        self.op = Some(op);
    }

    /// Adopt a replay graft did not start. Its remaining commits are the
    /// backend's business; a stash carrying our label is taken as ours.
    fn adopt_foreign(&mut self, mode: ReplayMode, status: &RepoStatus) -> Result<(), TransplantError> {
        let commits = self.adopted_commits(mode)?;
        let mut op = Operation::new(mode, commits, self.adapter.head()?);
        op.remaining.clear();
        op.pending = Some(adopted_pending(status, None));
        self.op = Some(op);
        self.autostash.adopt_labelled(&self.adapter)?;
        info!(%mode, "adopted replay already in progress");
        Ok(())
    }

    /// Commits of a rebase started elsewhere, read from its TODO.
    fn adopted_commits(&self, mode: ReplayMode) -> Result<Vec<CommitRef>, TransplantError> {
        if mode != ReplayMode::Rebase {
            return Ok(Vec::new());
        }
        let todo: RebaseTodo = match self.projector.load(&self.adapter) {
            Ok(todo) => todo,
            Err(TransplantError::Todo(TodoError::NoRebaseInProgress)) => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };
        Ok(todo
            .done()
            .iter()
            .chain(todo.pending())
            .filter_map(|line| line.commit.as_deref().map(|id| CommitRef::new(id, line.subject())))
            .collect())
    }

    fn mode(&self) -> Result<ReplayMode, TransplantError> {
        self.op
            .as_ref()
            .map(|op| op.mode)
            .ok_or(TransplantError::NoPendingDecision)
    }

    fn op_mut(&mut self) -> Result<&mut Operation, TransplantError> {
        self.op.as_mut().ok_or(TransplantError::NoPendingDecision)
    }

    fn suspend(&mut self, pending: PendingDecision) -> Step {
        info!(waiting_on = %pending, "transplant suspended");
        if let Some(op) = self.op.as_mut() {
            op.pending = Some(pending.clone());
        }
        self.publish();
        Step::Suspended(pending)
    }

    fn clear_pending(&mut self) {
        if let Some(op) = self.op.as_mut() {
            op.pending = None;
        }
    }

    /// Drop the operation after a backend failure. The stash comes back
    /// only when the backend left no replay behind.
    fn recover(&mut self, result: Result<Step, TransplantError>) -> Result<Step, TransplantError> {
        if let Err(TransplantError::BackendInvocationFailed(e)) = &result {
            warn!(error = %e, "backend invocation failed, dropping transplant");
            let replaying = self
                .adapter
                .status()
                .map(|s| s.replay_in_progress())
                .unwrap_or(true);
            if !replaying {
                if let Err(pop) = self.autostash.reconcile(&self.adapter, GuardedOutcome::Resolved) {
                    warn!(error = %pop, "could not restore stashed changes");
                }
            }
            self.op = None;
            self.publish();
        }
        result
    }

    /// Save the operation through the adapter, or clear it once there is
    /// none. Failures only cost resumability and are logged.
    fn persist(&self) {
        let state = match &self.op {
            Some(op) => {
                let saved = SavedOperationRef {
                    stash_held: self.autostash.is_holding(),
                    operation: op,
                };
                match serde_json::to_string(&saved) {
                    Ok(json) => Some(json),
                    Err(e) => {
                        warn!(error = %e, "could not serialize transplant state");
                        return;
                    }
                }
            }
            None => None,
        };
        if let Err(e) = self.adapter.write_operation_state(state.as_deref()) {
            warn!(error = %e, "could not save transplant state");
        }
    }

    fn notify(&self, buffer: &CopyBuffer) {
        if let Some(notifier) = &self.notifier {
            notifier.notify(buffer.notice());
        }
    }

    fn publish(&mut self) {
        let select_commit = self.snapshot.select_commit.clone();
        let snapshot = match &self.op {
            Some(op) => TransplantSnapshot {
                status: op
                    .pending
                    .as_ref()
                    .map(|p| p.status())
                    .unwrap_or(OperationStatus::Running),
                mode: Some(op.mode),
                remaining: op.current.iter().chain(op.remaining.iter()).cloned().collect(),
                applied: op.report.applied.clone(),
                conflicts: match &op.pending {
                    Some(PendingDecision::Conflicts { files }) => files.clone(),
                    _ => Vec::new(),
                },
                pending: op.pending.clone(),
                stash_held: self.autostash.is_holding(),
                select_commit,
            },
            None => TransplantSnapshot {
                stash_held: self.autostash.is_holding(),
                select_commit,
                ..Default::default()
            },
        };
        self.snapshot = Arc::new(snapshot);
        self.persist();
    }

    fn publish_finished(
        &mut self,
        status: OperationStatus,
        mode: Option<ReplayMode>,
        applied: Vec<CommitRef>,
        select_commit: Option<String>,
    ) {
        self.snapshot = Arc::new(TransplantSnapshot {
            status,
            mode,
            applied,
            stash_held: self.autostash.is_holding(),
            select_commit,
            ..Default::default()
        });
        self.persist();
    }
}
