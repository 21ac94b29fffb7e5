//! Orchestrator flows driven against a scripted in-memory repository.
//!
//! Every test pastes copied commits through the engine and answers its
//! pending decisions the way a user would, then checks the branch
//! history, the stash list and the copy buffer.

mod common;

use common::{commit, history_ids, FakeRepo, RecordingNotifier, Script};
use graft_core::config::{AutostashPolicy, GraftConfig};
use graft_core::conflict::{Resolution, StatusCode};
use graft_core::errors::{BackendError, TodoError, TransplantError};
use graft_core::models::{MergeStrategy, ReplayMode, StructuralChoice};
use graft_core::todo::TodoAction;
use graft_core::transplant::OperationStatus;
use graft_core::{
    AutostashCoordinator, CopyBuffer, Decision, GuardedOutcome, Outcome, PendingDecision, RepositoryAdapter, Step,
    Transplanter,
};

// ===========================================================================
// Helpers
// ===========================================================================

fn config(confirm: bool, autostash: AutostashPolicy) -> GraftConfig {
    let mut config = GraftConfig::default();
    config.transplant.confirm_before_paste = confirm;
    config.transplant.autostash = autostash;
    config
}

/// An engine that starts replaying as soon as `paste` is called.
fn engine(repo: FakeRepo) -> (Transplanter<FakeRepo>, RecordingNotifier) {
    let notifier = RecordingNotifier::default();
    let engine = Transplanter::new(repo, &config(false, AutostashPolicy::Always))
        .with_notifier(Box::new(notifier.clone()));
    (engine, notifier)
}

fn buffer(ids: &[&str]) -> CopyBuffer {
    let mut buffer = CopyBuffer::new();
    buffer.add_range(ids.iter().map(|id| commit(id)));
    buffer
}

fn ids(commits: &[graft_core::CommitRef]) -> Vec<String> {
    commits.iter().map(|c| c.id.clone()).collect()
}

fn completed(step: Step) -> graft_core::transplant::TransplantReport {
    match step {
        Step::Finished(Outcome::Completed { report }) => report,
        other => panic!("expected completion, got {:?}", other),
    }
}

// ===========================================================================
// Test 1: Order and buffer handling
// ===========================================================================

/// Commits land in copy order, not in the order they appear on the source
/// branch, and the buffer empties once they are all pasted.
#[test]
fn test_paste_preserves_copy_order() {
    let (mut engine, notifier) = engine(FakeRepo::new());
    let mut buf = buffer(&["c3", "c1", "c2"]);

    let report = completed(engine.paste(&mut buf, ReplayMode::CherryPick).unwrap());

    assert_eq!(history_ids(engine.adapter()), vec!["base", "c3", "c1", "c2"]);
    assert_eq!(ids(&report.applied), vec!["c3", "c1", "c2"]);
    assert!(buf.is_empty());
    assert_eq!(notifier.last(), Some(None));

    let snapshot = engine.snapshot();
    assert_eq!(snapshot.status, OperationStatus::Completed);
    assert_eq!(snapshot.select_commit.as_deref(), Some("c2"));
    assert!(engine.is_idle());
}

/// The "are you sure" prompt reports the exact count; declining leaves the
/// buffer and the branch untouched.
#[test]
fn test_confirm_paste_counts_and_decline_keeps_buffer() {
    let mut engine = Transplanter::new(FakeRepo::new(), &config(true, AutostashPolicy::Prompt));
    let mut buf = buffer(&["c1", "c2"]);

    let step = engine.paste(&mut buf, ReplayMode::CherryPick).unwrap();
    assert_eq!(step, Step::Suspended(PendingDecision::ConfirmPaste { count: 2 }));
    assert_eq!(engine.snapshot().status, OperationStatus::AwaitingConfirmation);

    let step = engine.resume(&mut buf, Decision::Decline).unwrap();
    assert_eq!(step, Step::Finished(Outcome::Declined));
    assert_eq!(buf.count(), 2);
    assert_eq!(history_ids(engine.adapter()), vec!["base"]);
    assert!(engine.is_idle());
    assert_eq!(engine.snapshot().select_commit.as_deref(), Some("base"));
}

#[test]
fn test_paste_with_nothing_copied() {
    let (mut engine, _) = engine(FakeRepo::new());
    let err = engine.paste(&mut CopyBuffer::new(), ReplayMode::CherryPick).unwrap_err();
    assert!(matches!(err, TransplantError::EmptyCopyBuffer));
}

#[test]
fn test_second_paste_while_suspended_is_refused() {
    let repo = FakeRepo::new();
    repo.script("c1", Script::Empty);
    let (mut engine, _) = engine(repo);
    let mut buf = buffer(&["c1"]);

    engine.paste(&mut buf, ReplayMode::CherryPick).unwrap();
    let err = engine.paste(&mut buf, ReplayMode::CherryPick).unwrap_err();
    assert!(matches!(err, TransplantError::OperationInFlight { .. }));
}

// ===========================================================================
// Test 2: Empty commits
// ===========================================================================

fn empty_middle() -> (Transplanter<FakeRepo>, RecordingNotifier, CopyBuffer) {
    let repo = FakeRepo::new();
    repo.script("c2", Script::Empty);
    let (engine, notifier) = engine(repo);
    (engine, notifier, buffer(&["c1", "c2", "c3"]))
}

/// An empty replay is a decision with exactly three choices, never an
/// error.
#[test]
fn test_empty_commit_offers_three_choices() {
    let (mut engine, _, mut buf) = empty_middle();

    let step = engine.paste(&mut buf, ReplayMode::CherryPick).unwrap();
    let pending = step.pending().cloned().unwrap();
    assert_eq!(pending, PendingDecision::EmptyCommit { commit: Some(commit("c2")) });
    assert_eq!(
        pending.choices(),
        &[Decision::Skip, Decision::CreateEmpty, Decision::Cancel]
    );
    assert_eq!(engine.snapshot().status, OperationStatus::NoOpPending);
    assert_eq!(ids(&engine.snapshot().remaining), vec!["c2", "c3"]);
}

#[test]
fn test_empty_commit_skip() {
    let (mut engine, _, mut buf) = empty_middle();
    engine.paste(&mut buf, ReplayMode::CherryPick).unwrap();

    let report = completed(engine.resume(&mut buf, Decision::Skip).unwrap());

    assert_eq!(history_ids(engine.adapter()), vec!["base", "c1", "c3"]);
    assert_eq!(ids(&report.skipped), vec!["c2"]);
    assert_eq!(ids(&report.applied), vec!["c1", "c3"]);
    assert!(buf.is_empty());
}

#[test]
fn test_empty_commit_create_empty() {
    let (mut engine, _, mut buf) = empty_middle();
    engine.paste(&mut buf, ReplayMode::CherryPick).unwrap();

    let report = completed(engine.resume(&mut buf, Decision::CreateEmpty).unwrap());

    assert_eq!(history_ids(engine.adapter()), vec!["base", "c1", "c2", "c3"]);
    assert_eq!(ids(&report.emptied), vec!["c2"]);
    assert_eq!(report.created(), 3);
}

/// Cancel stops the run: commits already picked stay, later ones are never
/// attempted.
#[test]
fn test_empty_commit_cancel() {
    let (mut engine, notifier, mut buf) = empty_middle();
    engine.paste(&mut buf, ReplayMode::CherryPick).unwrap();

    let step = engine.resume(&mut buf, Decision::Cancel).unwrap();
    assert!(matches!(step, Step::Finished(Outcome::Cancelled { .. })));
    assert_eq!(history_ids(engine.adapter()), vec!["base", "c1"]);
    assert!(engine.adapter().state.borrow().in_progress.is_none());
    assert!(buf.is_empty());
    assert_eq!(notifier.last(), Some(None));
    assert_eq!(engine.snapshot().status, OperationStatus::Cancelled);
}

#[test]
fn test_wrong_answer_leaves_decision_pending() {
    let (mut engine, _, mut buf) = empty_middle();
    engine.paste(&mut buf, ReplayMode::CherryPick).unwrap();

    let err = engine.resume(&mut buf, Decision::Continue).unwrap_err();
    assert!(matches!(err, TransplantError::InvalidDecision { .. }));
    assert!(matches!(engine.pending(), Some(PendingDecision::EmptyCommit { .. })));
}

#[test]
fn test_resume_without_pending_decision() {
    let (mut engine, _) = engine(FakeRepo::new());
    let err = engine.resume(&mut CopyBuffer::new(), Decision::Confirm).unwrap_err();
    assert!(matches!(err, TransplantError::NoPendingDecision));
}

// ===========================================================================
// Test 3: Conflicts
// ===========================================================================

fn conflicted_second() -> (Transplanter<FakeRepo>, CopyBuffer) {
    let repo = FakeRepo::new();
    repo.script("c2", Script::Conflict(vec![("a.txt", StatusCode::UU)]));
    let (engine, _) = engine(repo);
    (engine, buffer(&["c1", "c2", "c3"]))
}

/// Continue is refused while markers remain, and the refusal changes
/// nothing.
#[test]
fn test_continue_refused_while_conflicted() {
    let (mut engine, mut buf) = conflicted_second();

    let step = engine.paste(&mut buf, ReplayMode::CherryPick).unwrap();
    let files = match step {
        Step::Suspended(PendingDecision::Conflicts { files }) => files,
        other => panic!("expected conflicts, got {:?}", other),
    };
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].path, "a.txt");

    let before = engine.snapshot();
    let err = engine.resume(&mut buf, Decision::Continue).unwrap_err();
    match err {
        TransplantError::ConflictStillPresent { paths } => assert_eq!(paths, vec!["a.txt"]),
        other => panic!("unexpected error {:?}", other),
    }
    assert_eq!(engine.snapshot(), before);
    assert!(matches!(engine.pending(), Some(PendingDecision::Conflicts { .. })));
}

/// Staging refuses a file that still has markers; after picking a side
/// per hunk the same staging succeeds and the run continues.
#[test]
fn test_resolve_hunks_then_continue() {
    let (mut engine, mut buf) = conflicted_second();
    engine.paste(&mut buf, ReplayMode::CherryPick).unwrap();

    let gate = engine.gate().clone();
    let paths = vec!["a.txt".to_string()];
    let err = gate.stage_paths(engine.adapter(), &paths).unwrap_err();
    assert!(matches!(err, TransplantError::ConflictStillPresent { .. }));
    assert!(engine.adapter().state.borrow().staged.is_empty());

    let mut session = gate.open_session(engine.adapter(), "a.txt").unwrap();
    session.pick(Resolution::Theirs).unwrap();
    assert!(session.is_resolved());
    assert!(!gate.save_session(engine.adapter(), &session).unwrap());
    assert_eq!(
        engine.adapter().state.borrow().worktree.get("a.txt").map(String::as_str),
        Some("theirs c2\n")
    );
    gate.stage_paths(engine.adapter(), &paths).unwrap();

    let report = completed(engine.resume(&mut buf, Decision::Continue).unwrap());
    assert_eq!(history_ids(engine.adapter()), vec!["base", "c1", "c2", "c3"]);
    assert_eq!(ids(&report.applied), vec!["c1", "c2", "c3"]);
}

/// With auto-staging on, saving a fully resolved session stages it.
#[test]
fn test_auto_stage_on_last_hunk() {
    let repo = FakeRepo::new();
    repo.script("c1", Script::Conflict(vec![("a.txt", StatusCode::AA)]));
    let mut config = config(false, AutostashPolicy::Always);
    config.transplant.auto_stage_resolved = true;
    let mut engine = Transplanter::new(repo, &config);
    let mut buf = buffer(&["c1"]);
    engine.paste(&mut buf, ReplayMode::CherryPick).unwrap();

    let gate = engine.gate().clone();
    let mut session = gate.open_session(engine.adapter(), "a.txt").unwrap();
    session.pick(Resolution::Both).unwrap();
    assert!(gate.save_session(engine.adapter(), &session).unwrap());
    assert!(engine.adapter().state.borrow().conflicts.is_empty());

    completed(engine.resume(&mut buf, Decision::Continue).unwrap());
}

/// Abort is confirmed first; declining goes back to the conflicts, and
/// confirming restores the branch to where it was before the paste.
#[test]
fn test_abort_is_confirmed_and_rolls_back() {
    let (mut engine, mut buf) = conflicted_second();
    engine.paste(&mut buf, ReplayMode::CherryPick).unwrap();

    let step = engine.resume(&mut buf, Decision::Abort).unwrap();
    assert_eq!(step, Step::Suspended(PendingDecision::ConfirmAbort));

    let step = engine.resume(&mut buf, Decision::Decline).unwrap();
    assert!(matches!(step, Step::Suspended(PendingDecision::Conflicts { .. })));

    engine.resume(&mut buf, Decision::Abort).unwrap();
    let step = engine.resume(&mut buf, Decision::Confirm).unwrap();
    match step {
        Step::Finished(Outcome::Aborted { report }) => assert!(report.applied.is_empty()),
        other => panic!("expected abort, got {:?}", other),
    }
    assert_eq!(history_ids(engine.adapter()), vec!["base"]);
    assert!(engine.adapter().state.borrow().in_progress.is_none());
    assert_eq!(buf.count(), 3);
    assert_eq!(engine.snapshot().status, OperationStatus::Aborted);
}

/// Unstaged tracked edits left after resolving are offered for staging
/// before continuing.
#[test]
fn test_continue_offers_to_stage_remaining() {
    let (mut engine, mut buf) = conflicted_second();
    engine.paste(&mut buf, ReplayMode::CherryPick).unwrap();
    engine
        .adapter()
        .resolve_file_with_strategy("a.txt", graft_core::models::MergeStrategy::Ours)
        .unwrap();
    engine.adapter().make_dirty("notes.txt");

    let step = engine.resume(&mut buf, Decision::Continue).unwrap();
    assert_eq!(
        step,
        Step::Suspended(PendingDecision::StageRemaining {
            paths: vec!["notes.txt".into()]
        })
    );

    completed(engine.resume(&mut buf, Decision::Confirm).unwrap());
    assert!(engine.adapter().state.borrow().unstaged.is_empty());
}

/// A resolution that leaves nothing to commit turns into the empty-commit
/// decision.
#[test]
fn test_conflict_resolved_to_nothing_becomes_empty_commit() {
    let repo = FakeRepo::new();
    repo.script("c1", Script::EmptyAfterResolve(vec![("a.txt", StatusCode::UU)]));
    let (mut engine, _) = engine(repo);
    let mut buf = buffer(&["c1"]);
    engine.paste(&mut buf, ReplayMode::CherryPick).unwrap();

    let gate = engine.gate().clone();
    gate.resolve_with_strategy(engine.adapter(), "a.txt", graft_core::models::MergeStrategy::Ours)
        .unwrap();

    let step = engine.resume(&mut buf, Decision::Continue).unwrap();
    assert_eq!(
        step,
        Step::Suspended(PendingDecision::EmptyCommit { commit: Some(commit("c1")) })
    );
    let report = completed(engine.resume(&mut buf, Decision::Skip).unwrap());
    assert_eq!(ids(&report.skipped), vec!["c1"]);
    assert_eq!(history_ids(engine.adapter()), vec!["base"]);
}

/// Add/delete conflicts get keep or delete, never hunks.
#[test]
fn test_structural_conflicts_keep_and_delete() {
    let repo = FakeRepo::new();
    repo.script(
        "c1",
        Script::Conflict(vec![("kept.txt", StatusCode::DU), ("gone.txt", StatusCode::UD)]),
    );
    let (mut engine, _) = engine(repo);
    let mut buf = buffer(&["c1"]);
    engine.paste(&mut buf, ReplayMode::CherryPick).unwrap();
    let gate = engine.gate().clone();

    let err = gate.open_session(engine.adapter(), "kept.txt").unwrap_err();
    assert!(matches!(err, TransplantError::Conflict(_)));
    let err = gate
        .stage_paths(engine.adapter(), &["kept.txt".to_string()])
        .unwrap_err();
    assert!(matches!(err, TransplantError::ConflictStillPresent { .. }));

    gate.resolve_structural(engine.adapter(), "kept.txt", StructuralChoice::Keep)
        .unwrap();
    gate.resolve_structural(engine.adapter(), "gone.txt", StructuralChoice::Delete)
        .unwrap();
    {
        let state = engine.adapter().state.borrow();
        assert_eq!(state.worktree.get("kept.txt").map(String::as_str), Some("theirs c1\n"));
        assert!(!state.worktree.contains_key("gone.txt"));
        assert!(state.conflicts.is_empty());
    }

    completed(engine.resume(&mut buf, Decision::Continue).unwrap());
}

/// Keep restores the surviving side and delete removes the path, for every
/// add/delete status code. Either way the path leaves the conflicted list.
#[test]
fn test_structural_resolution_every_code_and_choice() {
    const CASES: [(&str, StatusCode, StructuralChoice, Option<&str>); 10] = [
        ("ua-keep.txt", StatusCode::UA, StructuralChoice::Keep, Some("theirs c1\n")),
        ("ua-delete.txt", StatusCode::UA, StructuralChoice::Delete, None),
        ("au-keep.txt", StatusCode::AU, StructuralChoice::Keep, Some("ours\n")),
        ("au-delete.txt", StatusCode::AU, StructuralChoice::Delete, None),
        ("dd-keep.txt", StatusCode::DD, StructuralChoice::Keep, Some("base\n")),
        ("dd-delete.txt", StatusCode::DD, StructuralChoice::Delete, None),
        ("ud-keep.txt", StatusCode::UD, StructuralChoice::Keep, Some("ours\n")),
        ("ud-delete.txt", StatusCode::UD, StructuralChoice::Delete, None),
        ("du-keep.txt", StatusCode::DU, StructuralChoice::Keep, Some("theirs c1\n")),
        ("du-delete.txt", StatusCode::DU, StructuralChoice::Delete, None),
    ];
    let repo = FakeRepo::new();
    repo.script(
        "c1",
        Script::Conflict(CASES.iter().map(|(path, code, _, _)| (*path, *code)).collect()),
    );
    let (mut engine, _) = engine(repo);
    let mut buf = buffer(&["c1"]);
    engine.paste(&mut buf, ReplayMode::CherryPick).unwrap();
    let gate = engine.gate().clone();

    for (path, code, choice, expected) in CASES {
        assert!(
            gate.resolve_with_strategy(engine.adapter(), path, MergeStrategy::Ours).is_err(),
            "{} {} accepted a textual strategy",
            code,
            path
        );
        gate.resolve_structural(engine.adapter(), path, choice).unwrap();

        let status = engine.adapter().status().unwrap();
        assert!(!status.conflicted_paths().iter().any(|p| p == path), "{} still conflicted", path);
        let entry = status.files.iter().find(|f| f.path == path);
        assert!(entry.is_some_and(|f| !f.conflicted), "{} not listed as staged", path);
        let state = engine.adapter().state.borrow();
        assert_eq!(state.worktree.get(path).map(String::as_str), expected, "{} {:?}", code, choice);
    }

    let report = completed(engine.resume(&mut buf, Decision::Continue).unwrap());
    assert_eq!(ids(&report.applied), vec!["c1"]);
}

/// A strategy preview shows the merged result without touching the file.
#[test]
fn test_strategy_preview_writes_nothing() {
    let (mut engine, mut buf) = conflicted_second();
    engine.paste(&mut buf, ReplayMode::CherryPick).unwrap();
    let gate = engine.gate().clone();

    assert_eq!(
        gate.preview_strategy(engine.adapter(), "a.txt", MergeStrategy::Union).unwrap(),
        "ours\ntheirs c2\n"
    );
    assert_eq!(
        gate.preview_strategy(engine.adapter(), "a.txt", MergeStrategy::Theirs).unwrap(),
        "theirs c2\n"
    );
    let state = engine.adapter().state.borrow();
    assert_eq!(state.conflicts.len(), 1);
    assert!(state.worktree["a.txt"].starts_with("<<<<<<< HEAD"));
}

// ===========================================================================
// Test 4: Autostash
// ===========================================================================

/// A dirty worktree is stashed once, kept while the user decides, and
/// restored when the run ends. No stash entries are left behind.
#[test]
fn test_autostash_around_empty_commit() {
    let repo = FakeRepo::new();
    repo.make_dirty("wip.txt");
    repo.script("c1", Script::Empty);
    let notifier = RecordingNotifier::default();
    let mut engine = Transplanter::new(repo, &config(true, AutostashPolicy::Prompt))
        .with_notifier(Box::new(notifier.clone()));
    let mut buf = buffer(&["c1"]);

    let step = engine.paste(&mut buf, ReplayMode::CherryPick).unwrap();
    assert_eq!(step, Step::Suspended(PendingDecision::ConfirmPaste { count: 1 }));
    let step = engine.resume(&mut buf, Decision::Confirm).unwrap();
    assert_eq!(step, Step::Suspended(PendingDecision::ConfirmAutostash { dirty_files: 1 }));

    let step = engine.resume(&mut buf, Decision::Confirm).unwrap();
    assert!(matches!(step, Step::Suspended(PendingDecision::EmptyCommit { .. })));
    assert_eq!(engine.adapter().stash_len(), 1);
    assert!(engine.snapshot().stash_held);

    completed(engine.resume(&mut buf, Decision::Skip).unwrap());
    assert_eq!(engine.adapter().stash_len(), 0);
    assert_eq!(engine.adapter().state.borrow().unstaged, vec!["wip.txt".to_string()]);
    assert!(!engine.snapshot().stash_held);
    assert_eq!(notifier.last(), Some(None));
}

#[test]
fn test_autostash_declined() {
    let repo = FakeRepo::new();
    repo.make_dirty("wip.txt");
    let mut engine = Transplanter::new(repo, &config(false, AutostashPolicy::Prompt));
    let mut buf = buffer(&["c1"]);

    engine.paste(&mut buf, ReplayMode::CherryPick).unwrap();
    let step = engine.resume(&mut buf, Decision::Decline).unwrap();
    assert_eq!(step, Step::Finished(Outcome::Declined));
    assert_eq!(engine.adapter().stash_len(), 0);
    assert_eq!(history_ids(engine.adapter()), vec!["base"]);
    assert_eq!(buf.count(), 1);
}

/// The stash stays put across a conflict and comes back after abort.
#[test]
fn test_autostash_held_through_conflict() {
    let repo = FakeRepo::new();
    repo.make_dirty("wip.txt");
    repo.script("c1", Script::Conflict(vec![("a.txt", StatusCode::UU)]));
    let (mut engine, _) = engine(repo);
    let mut buf = buffer(&["c1"]);

    engine.paste(&mut buf, ReplayMode::CherryPick).unwrap();
    assert_eq!(engine.adapter().stash_len(), 1);
    let _ = engine.resume(&mut buf, Decision::Continue).unwrap_err();
    assert_eq!(engine.adapter().stash_len(), 1);

    engine.resume(&mut buf, Decision::Abort).unwrap();
    engine.resume(&mut buf, Decision::Confirm).unwrap();
    assert_eq!(engine.adapter().stash_len(), 0);
    assert_eq!(engine.adapter().state.borrow().unstaged, vec!["wip.txt".to_string()]);
}

#[test]
fn test_run_guarded_decline_does_not_stash() {
    let repo = FakeRepo::new();
    repo.make_dirty("wip.txt");
    let mut coordinator = AutostashCoordinator::new("Stash all changes", AutostashPolicy::Prompt);

    let mut asked = None;
    let err = coordinator
        .run_guarded(
            &repo,
            |count| {
                asked = Some(count);
                false
            },
            |_| Ok(GuardedOutcome::Resolved),
        )
        .unwrap_err();
    assert!(err.is_declined());
    assert_eq!(asked, Some(1));
    assert_eq!(repo.stash_len(), 0);
}

#[test]
fn test_run_guarded_keeps_stash_while_pending() {
    let repo = FakeRepo::new();
    repo.make_dirty("wip.txt");
    let mut coordinator = AutostashCoordinator::new("label", AutostashPolicy::Always);

    let outcome = coordinator
        .run_guarded(&repo, |_| true, |_| Ok(GuardedOutcome::Pending))
        .unwrap();
    assert_eq!(outcome, GuardedOutcome::Pending);
    assert_eq!(repo.stash_len(), 1);
    assert_eq!(repo.state.borrow().stashes[0].0, "label");

    assert!(coordinator.reconcile(&repo, GuardedOutcome::Resolved).unwrap());
    assert_eq!(repo.stash_len(), 0);
}

#[test]
fn test_run_guarded_pops_on_error() {
    let repo = FakeRepo::new();
    repo.make_dirty("wip.txt");
    let mut coordinator = AutostashCoordinator::new("label", AutostashPolicy::Always);

    let err = coordinator
        .run_guarded(&repo, |_| true, |_| Err(TransplantError::EmptyCopyBuffer))
        .unwrap_err();
    assert!(matches!(err, TransplantError::EmptyCopyBuffer));
    assert_eq!(repo.stash_len(), 0);
    assert!(!coordinator.is_holding());
}

// ===========================================================================
// Test 5: Backend failures
// ===========================================================================

/// A failing backend call surfaces stderr verbatim, drops the operation
/// and gives the stash back.
#[test]
fn test_backend_failure_drops_operation() {
    let repo = FakeRepo::new();
    repo.make_dirty("wip.txt");
    repo.fail_next("replay");
    let (mut engine, _) = engine(repo);
    let mut buf = buffer(&["c1"]);

    let err = engine.paste(&mut buf, ReplayMode::CherryPick).unwrap_err();
    match err {
        TransplantError::BackendInvocationFailed(BackendError::CommandFailed { stderr, .. }) => {
            assert_eq!(stderr, "fatal: replay exploded");
        }
        other => panic!("unexpected error {:?}", other),
    }
    assert!(engine.is_idle());
    assert_eq!(engine.snapshot().status, OperationStatus::Idle);
    assert_eq!(engine.adapter().stash_len(), 0);
    assert_eq!(buf.count(), 1);
}

// ===========================================================================
// Test 6: Rebase mode
// ===========================================================================

#[test]
fn test_rebase_mode_skip_empty() {
    let repo = FakeRepo::new();
    repo.script("c2", Script::Empty);
    let (mut engine, _) = engine(repo);
    let mut buf = buffer(&["c1", "c2", "c3"]);

    let step = engine.paste(&mut buf, ReplayMode::Rebase).unwrap();
    assert_eq!(
        step,
        Step::Suspended(PendingDecision::EmptyCommit { commit: Some(commit("c2")) })
    );
    assert_eq!(ids(&engine.snapshot().remaining), vec!["c2", "c3"]);

    let report = completed(engine.resume(&mut buf, Decision::Skip).unwrap());
    assert_eq!(ids(&report.applied), vec!["c1", "c3"]);
    assert_eq!(ids(&report.skipped), vec!["c2"]);
    assert_eq!(history_ids(engine.adapter()), vec!["base", "c1", "c3"]);
}

/// Cancelling a rebase-mode paste rolls the whole run back.
#[test]
fn test_rebase_mode_cancel_rolls_back() {
    let repo = FakeRepo::new();
    repo.script("c2", Script::Empty);
    let (mut engine, _) = engine(repo);
    let mut buf = buffer(&["c1", "c2"]);

    engine.paste(&mut buf, ReplayMode::Rebase).unwrap();
    match engine.resume(&mut buf, Decision::Cancel).unwrap() {
        Step::Finished(Outcome::Cancelled { report }) => assert!(report.applied.is_empty()),
        other => panic!("expected cancel, got {:?}", other),
    }
    assert_eq!(history_ids(engine.adapter()), vec!["base"]);
}

/// During someone else's interactive rebase the paste goes into its TODO
/// list, right after the current entry, instead of running.
#[test]
fn test_paste_during_rebase_queues_picks() {
    let repo = FakeRepo::new();
    repo.start_external_rebase(&["pick aaa first"], &["pick bbb second"]);
    let (mut engine, notifier) = engine(repo);
    let mut buf = buffer(&["c1", "c2"]);
    engine.adapter().state.borrow_mut().rebase = Some((
        vec!["pick aaa first".into()],
        vec!["pick bbb second".into(), "".into(), "# Commands:".into()],
    ));

    let step = engine.paste(&mut buf, ReplayMode::CherryPick).unwrap();
    assert_eq!(step, Step::Finished(Outcome::Queued { count: 2 }));
    assert!(buf.is_empty());
    assert_eq!(notifier.last(), Some(None));

    let state = engine.adapter().state.borrow();
    let (_, todo) = state.rebase.as_ref().unwrap();
    assert_eq!(
        todo,
        &vec![
            "pick c1 subject c1".to_string(),
            "pick c2 subject c2".to_string(),
            "pick bbb second".to_string(),
            "".to_string(),
            "# Commands:".to_string(),
        ]
    );
    assert!(!state.calls.iter().any(|c| c == "replay"));
}

/// A rebase plan cannot pick a merge commit, so neither rebase mode nor a
/// paste into someone else's rebase accepts one. Nothing is touched.
#[test]
fn test_merge_commits_only_cherry_picked() {
    let (mut engine, _) = engine(FakeRepo::new());
    let mut merge = commit("m1");
    merge.is_merge = true;
    let mut buf = buffer(&["c1"]);
    buf.add(merge);

    let err = engine.paste(&mut buf, ReplayMode::Rebase).unwrap_err();
    assert!(matches!(err, TransplantError::MergeCommitUnsupported { ref id } if id == "m1"));
    assert!(engine.is_idle());
    assert_eq!(buf.count(), 2);
    assert!(!engine.adapter().state.borrow().calls.iter().any(|c| c == "replay"));

    engine
        .adapter()
        .start_external_rebase(&["pick aaa first"], &["pick bbb second"]);
    let err = engine.paste(&mut buf, ReplayMode::CherryPick).unwrap_err();
    assert!(matches!(err, TransplantError::MergeCommitUnsupported { .. }));
    assert_eq!(buf.count(), 2);
    let state = engine.adapter().state.borrow();
    assert_eq!(state.rebase.as_ref().map(|(_, todo)| todo.len()), Some(1));
}

#[test]
fn test_set_action_on_pending_entry() {
    let repo = FakeRepo::new();
    repo.start_external_rebase(&["pick aaa first"], &["pick bbb second", "exec make", "# help"]);
    let (engine, _) = engine(repo);
    let projector = engine.projector();

    let todo = projector
        .set_action(engine.adapter(), "bbb", TodoAction::Fixup)
        .unwrap();
    assert_eq!(todo.pending()[0].action, TodoAction::Fixup);

    let err = projector
        .set_action(engine.adapter(), "bbb", TodoAction::Exec)
        .unwrap_err();
    assert!(matches!(err, TransplantError::Todo(TodoError::ActionNotAllowed { .. })));

    let state = engine.adapter().state.borrow();
    let (_, pending) = state.rebase.as_ref().unwrap();
    assert_eq!(pending, &vec!["fixup bbb second", "exec make", "# help"]);
}

// ===========================================================================
// Test 7: Adopting an operation started elsewhere
// ===========================================================================

/// A conflicted cherry-pick found on startup is shown as waiting for the
/// user and can be aborted.
#[test]
fn test_resync_adopts_conflicted_cherry_pick() {
    let repo = FakeRepo::new();
    repo.script("c9", Script::Conflict(vec![("a.txt", StatusCode::UU)]));
    {
        let mut state = repo.state.borrow_mut();
        let c9 = commit("c9");
        state.apply_one(&c9, ReplayMode::CherryPick);
    }
    let (mut engine, _) = engine(repo);

    let snapshot = engine.resync().unwrap();
    assert_eq!(snapshot.status, OperationStatus::Conflicted);
    assert_eq!(snapshot.conflicts.len(), 1);

    engine.resume(&mut CopyBuffer::new(), Decision::Abort).unwrap();
    let step = engine.resume(&mut CopyBuffer::new(), Decision::Confirm).unwrap();
    assert!(matches!(step, Step::Finished(Outcome::Aborted { .. })));
    assert!(engine.adapter().state.borrow().in_progress.is_none());
}

/// A run left waiting on conflicts is picked up by a fresh engine, as when
/// the user exits and runs `graft continue` later: the commits not yet
/// replayed and the held stash come with it.
#[test]
fn test_new_engine_resumes_saved_transplant() {
    let repo = FakeRepo::new();
    repo.make_dirty("wip.txt");
    repo.script("c1", Script::Conflict(vec![("a.txt", StatusCode::UU)]));
    let (mut first, _) = engine(repo);
    let mut buf = buffer(&["c1", "c2"]);
    first.paste(&mut buf, ReplayMode::CherryPick).unwrap();
    assert_eq!(first.adapter().stash_len(), 1);
    let repo = first.into_adapter();
    assert!(repo.state.borrow().saved_operation.is_some());

    let (mut later, _) = engine(repo);
    let snapshot = later.resync().unwrap();
    assert_eq!(snapshot.status, OperationStatus::Conflicted);
    assert!(snapshot.stash_held);
    assert_eq!(ids(&snapshot.remaining), vec!["c1", "c2"]);

    later
        .gate()
        .resolve_with_strategy(later.adapter(), "a.txt", MergeStrategy::Theirs)
        .unwrap();
    let report = completed(later.resume(&mut CopyBuffer::new(), Decision::Continue).unwrap());

    assert_eq!(ids(&report.applied), vec!["c1", "c2"]);
    assert_eq!(history_ids(later.adapter()), vec!["base", "c1", "c2"]);
    assert_eq!(later.adapter().stash_len(), 0);
    let state = later.adapter().state.borrow();
    assert_eq!(state.unstaged, vec!["wip.txt".to_string()]);
    assert!(state.saved_operation.is_none());
}

/// The user finished the stopped cherry-pick by hand; continuing from a new
/// engine replays the rest.
#[test]
fn test_new_engine_continues_after_step_finished_by_hand() {
    let repo = FakeRepo::new();
    repo.script("c1", Script::Conflict(vec![("a.txt", StatusCode::UU)]));
    let (mut first, _) = engine(repo);
    let mut buf = buffer(&["c1", "c2"]);
    first.paste(&mut buf, ReplayMode::CherryPick).unwrap();
    let repo = first.into_adapter();
    repo.resolve_file_with_strategy("a.txt", MergeStrategy::Ours).unwrap();
    repo.continue_replay(ReplayMode::CherryPick).unwrap();
    assert!(repo.state.borrow().in_progress.is_none());

    let (mut later, _) = engine(repo);
    let snapshot = later.resync().unwrap();
    assert_eq!(snapshot.pending, Some(PendingDecision::Conflicts { files: vec![] }));

    let report = completed(later.resume(&mut CopyBuffer::new(), Decision::Continue).unwrap());
    assert_eq!(ids(&report.applied), vec!["c1", "c2"]);
    assert_eq!(history_ids(later.adapter()), vec!["base", "c1", "c2"]);
}

/// Without saved state, only a top stash entry carrying graft's label is
/// taken over; someone else's entry stays put.
#[test]
fn test_resync_adopts_only_labelled_stash() {
    for (label, adopted) in [("On main: Stash all changes", true), ("On main: experiment", false)] {
        let repo = FakeRepo::new();
        repo.push_stash(label, "wip.txt");
        repo.script("c9", Script::Conflict(vec![("a.txt", StatusCode::UU)]));
        repo.state.borrow_mut().apply_one(&commit("c9"), ReplayMode::CherryPick);
        let (mut engine, _) = engine(repo);

        assert_eq!(engine.resync().unwrap().stash_held, adopted, "{}", label);
        engine.resume(&mut CopyBuffer::new(), Decision::Abort).unwrap();
        engine.resume(&mut CopyBuffer::new(), Decision::Confirm).unwrap();
        assert_eq!(engine.adapter().stash_len(), if adopted { 0 } else { 1 }, "{}", label);
    }
}

#[test]
fn test_resync_when_idle_changes_nothing() {
    let (mut engine, _) = engine(FakeRepo::new());
    let snapshot = engine.resync().unwrap();
    assert_eq!(snapshot.status, OperationStatus::Idle);
    assert!(engine.is_idle());
}
