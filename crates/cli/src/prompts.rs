//! Turns a pending engine decision into a terminal prompt.

use anyhow::{Context, Result};
use dialoguer::{Confirm, Select};

use graft_core::{Decision, PendingDecision};

use crate::resolve;
use crate::style;

/// What the user chose at a suspension point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Answer {
    Decide(Decision),
    /// Open the resolver on this path, then ask again.
    Resolve(String),
    /// Leave the operation suspended and exit.
    Later,
}

/// Ask the user to answer `pending`.
pub fn ask(pending: &PendingDecision) -> Result<Answer> {
    match pending {
        PendingDecision::EmptyCommit { .. } => {
            let choices = pending.choices();
            let labels: Vec<&str> = choices.iter().map(|d| d.label()).collect();
            let idx = Select::new()
                .with_prompt(pending.prompt())
                .items(&labels)
                .default(0)
                .interact()
                .context("failed to read choice")?;
            Ok(Answer::Decide(choices[idx]))
        }

        PendingDecision::Conflicts { files } => {
            println!();
            println!("{}", style::warn(&pending.prompt()));
            if !files.is_empty() {
                println!("{}", resolve::conflict_table(files));
            }

            let mut labels: Vec<String> = files.iter().map(|f| format!("Resolve {}", f.path)).collect();
            labels.push(Decision::Continue.label().to_string());
            labels.push(Decision::Abort.label().to_string());
            labels.push("Exit and resolve later".to_string());

            let idx = Select::new()
                .items(&labels)
                .default(0)
                .interact()
                .context("failed to read choice")?;
            let answer = match idx.checked_sub(files.len()) {
                None => Answer::Resolve(files[idx].path.clone()),
                Some(0) => Answer::Decide(Decision::Continue),
                Some(1) => Answer::Decide(Decision::Abort),
                Some(_) => Answer::Later,
            };
            Ok(answer)
        }

        PendingDecision::StageRemaining { paths } => {
            for path in paths {
                println!("  {}", style::dim(path));
            }
            confirm(&pending.prompt(), true)
        }

        PendingDecision::ConfirmAbort => confirm(&pending.prompt(), false),

        PendingDecision::ConfirmPaste { .. } | PendingDecision::ConfirmAutostash { .. } => {
            confirm(&pending.prompt(), true)
        }
    }
}

fn confirm(prompt: &str, default: bool) -> Result<Answer> {
    let yes = Confirm::new()
        .with_prompt(prompt)
        .default(default)
        .interact()
        .context("failed to read confirmation")?;
    Ok(Answer::Decide(if yes {
        Decision::Confirm
    } else {
        Decision::Decline
    }))
}
