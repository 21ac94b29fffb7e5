//! Stash a dirty worktree around a transplant and restore it afterwards.

use tracing::{info, warn};

use crate::config::{AutostashPolicy, TransplantConfig};
use crate::errors::{BackendError, TransplantError};
use crate::git::RepositoryAdapter;

/// How far the guarded action got.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardedOutcome {
    /// Finished, aborted or cancelled: the stash can come back.
    Resolved,
    /// Stopped on a conflict the user still has to resolve.
    Pending,
}

/// Owns at most one stash entry, created for the current operation.
#[derive(Debug, Clone)]
pub struct AutostashCoordinator {
    label: String,
    policy: AutostashPolicy,
    held: bool,
}

impl AutostashCoordinator {
    pub fn new(label: impl Into<String>, policy: AutostashPolicy) -> Self {
        Self {
            label: label.into(),
            policy,
            held: false,
        }
    }

    pub fn from_config(config: &TransplantConfig) -> Self {
        Self::new(config.stash_label.clone(), config.autostash)
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn requires_confirmation(&self) -> bool {
        self.policy == AutostashPolicy::Prompt
    }

    /// Whether a stash entry created by this coordinator is outstanding.
    pub fn is_holding(&self) -> bool {
        self.held
    }

    /// Push a stash entry. Only an entry that actually appeared in the
    /// stash list counts as held.
    pub fn stash<A: RepositoryAdapter + ?Sized>(&mut self, adapter: &A) -> Result<(), BackendError> {
        let before = adapter.stash_count()?;
        adapter.stash_push(&self.label)?;
        let after = adapter.stash_count()?;
        if after > before {
            self.held = true;
            info!(label = %self.label, "stashed local changes");
        } else {
            warn!("stash push created no entry");
        }
        Ok(())
    }

    /// Take over an entry pushed by an earlier process for the same
    /// operation.
    pub fn adopt(&mut self) {
        if !self.held {
            info!(label = %self.label, "adopted stash from an earlier run");
        }
        self.held = true;
    }

    /// Adopt the newest stash entry if it carries this coordinator's label.
    /// `git stash push -m` records it as "On <branch>: <label>".
    pub fn adopt_labelled<A: RepositoryAdapter + ?Sized>(&mut self, adapter: &A) -> Result<bool, BackendError> {
        let Some(message) = adapter.stash_top_message()? else {
            return Ok(false);
        };
        let ours = message == self.label || message.ends_with(&format!(": {}", self.label));
        if ours {
            self.adopt();
        }
        Ok(ours)
    }

    /// Pop the held entry unless a conflict is still pending. Returns
    /// whether anything was restored.
    pub fn reconcile<A: RepositoryAdapter + ?Sized>(
        &mut self,
        adapter: &A,
        outcome: GuardedOutcome,
    ) -> Result<bool, BackendError> {
        if !self.held || outcome == GuardedOutcome::Pending {
            return Ok(false);
        }
        adapter.stash_pop()?;
        self.held = false;
        info!("restored stashed changes");
        Ok(true)
    }

    /// Stash if dirty (asking `confirm` with the dirty file count under the
    /// prompt policy), run `action`, then reconcile.
    pub fn run_guarded<A, C, F>(&mut self, adapter: &A, confirm: C, action: F) -> Result<GuardedOutcome, TransplantError>
    where
        A: RepositoryAdapter + ?Sized,
        C: FnOnce(usize) -> bool,
        F: FnOnce(&A) -> Result<GuardedOutcome, TransplantError>,
    {
        let status = adapter.status()?;
        if status.dirty {
            if self.requires_confirmation() && !confirm(status.dirty_file_count()) {
                return Err(TransplantError::UserDeclined);
            }
            self.stash(adapter)?;
        }

        match action(adapter) {
            Ok(outcome) => {
                self.reconcile(adapter, outcome)?;
                Ok(outcome)
            }
            Err(e) => {
                if let Err(pop) = self.reconcile(adapter, GuardedOutcome::Resolved) {
                    warn!(error = %pop, "could not restore stashed changes");
                }
                Err(e)
            }
        }
    }
}
