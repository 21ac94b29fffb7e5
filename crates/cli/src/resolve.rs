//! Interactive conflict resolution for a single path.

use anyhow::{anyhow, Context, Result};
use comfy_table::{presets::UTF8_FULL, Cell, ContentArrangement, Table};
use dialoguer::{Confirm, Select};

use graft_core::conflict::{ConflictedFile, HunkSession, Resolution};
use graft_core::models::{MergeStrategy, StructuralChoice};
use graft_core::{ConflictGate, RepositoryAdapter};

use crate::style;

/// Conflicted files as a table.
pub fn conflict_table(files: &[ConflictedFile]) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Status", "Path", "Conflict", "Hunks"]);

    for file in files {
        let hunks = file
            .hunks
            .as_ref()
            .map(|h| h.len().to_string())
            .unwrap_or_else(|| "-".to_string());
        table.add_row(vec![
            Cell::new(style::status_code(file.code.as_str(), true)),
            Cell::new(&file.path),
            Cell::new(file.code.describe()),
            Cell::new(hunks),
        ]);
    }
    table
}

/// Resolve `path`: whole-file strategy or hunk by hunk for textual
/// conflicts, keep or delete for add/delete conflicts.
pub fn run<A: RepositoryAdapter + ?Sized>(gate: &ConflictGate, adapter: &A, path: &str) -> Result<()> {
    let files = gate.load_conflicts(adapter).context("failed to read conflicts")?;
    let file = files
        .iter()
        .find(|f| f.path == path)
        .ok_or_else(|| anyhow!("'{}' is not conflicted", path))?;

    println!();
    println!(
        "{}",
        style::header(&format!("{} ({}, {})", file.path, file.code, file.code.describe()))
    );

    if file.is_textual() {
        textual(gate, adapter, file)
    } else {
        structural(gate, adapter, file)
    }
}

// ---------------------------------------------------------------------------
// Add/delete conflicts
// ---------------------------------------------------------------------------

fn structural<A: RepositoryAdapter + ?Sized>(gate: &ConflictGate, adapter: &A, file: &ConflictedFile) -> Result<()> {
    if let Some(stage) = file.code.surviving_stage() {
        let sides = adapter
            .conflict_sides(&file.path)
            .context("failed to read index stages")?;
        let preview = sides.preview(stage);
        if !preview.trim().is_empty() {
            println!("{}", style::dim(&preview));
        }
    }

    let idx = Select::new()
        .with_prompt("Keep or delete this file?")
        .items(&["Keep file", "Delete file", "Cancel"])
        .default(0)
        .interact()
        .context("failed to read choice")?;
    let choice = match idx {
        0 => StructuralChoice::Keep,
        1 => StructuralChoice::Delete,
        _ => return Ok(()),
    };

    gate.resolve_structural(adapter, &file.path, choice)
        .with_context(|| format!("failed to resolve {}", file.path))?;
    let verb = match choice {
        StructuralChoice::Keep => "Kept",
        StructuralChoice::Delete => "Deleted",
    };
    println!("{}", style::success(&format!("{} {}", verb, file.path)));
    Ok(())
}

// ---------------------------------------------------------------------------
// Textual conflicts
// ---------------------------------------------------------------------------

const STRATEGIES: [MergeStrategy; 3] = [MergeStrategy::Ours, MergeStrategy::Theirs, MergeStrategy::Union];

fn textual<A: RepositoryAdapter + ?Sized>(gate: &ConflictGate, adapter: &A, file: &ConflictedFile) -> Result<()> {
    let mut labels = vec!["Pick hunks one by one".to_string()];
    labels.extend(STRATEGIES.iter().map(|s| capitalize(&s.to_string())));
    labels.push("Cancel".to_string());

    let idx = Select::new()
        .with_prompt("How do you want to resolve this file?")
        .items(&labels)
        .default(0)
        .interact()
        .context("failed to read choice")?;

    match idx {
        0 => hunk_session(gate, adapter, &file.path),
        i if i <= STRATEGIES.len() => {
            let strategy = STRATEGIES[i - 1];
            let preview = gate
                .preview_strategy(adapter, &file.path, strategy)
                .with_context(|| format!("failed to preview {}", file.path))?;
            println!("{}", style::dim(&preview));
            let apply = Confirm::new()
                .with_prompt(format!("Write this to {}?", file.path))
                .default(true)
                .interact()
                .context("failed to read confirmation")?;
            if !apply {
                println!("{}", style::dim("No changes written."));
                return Ok(());
            }
            gate.resolve_with_strategy(adapter, &file.path, strategy)
                .with_context(|| format!("failed to resolve {}", file.path))?;
            println!("{}", style::success(&format!("Resolved {} ({})", file.path, strategy)));
            Ok(())
        }
        _ => Ok(()),
    }
}

#[derive(Debug, Clone, Copy)]
enum Action {
    Pick(Resolution),
    Undo,
    Next,
    Previous,
    Save,
    Discard,
}

impl Action {
    fn label(&self) -> &'static str {
        match self {
            Self::Pick(Resolution::Ours) => "Pick current",
            Self::Pick(Resolution::Theirs) => "Pick incoming",
            Self::Pick(_) => "Pick both",
            Self::Undo => "Undo",
            Self::Next => "Next hunk",
            Self::Previous => "Previous hunk",
            Self::Save => "Save and stop",
            Self::Discard => "Discard changes",
        }
    }
}

fn hunk_session<A: RepositoryAdapter + ?Sized>(gate: &ConflictGate, adapter: &A, path: &str) -> Result<()> {
    let mut session = gate
        .open_session(adapter, path)
        .with_context(|| format!("failed to open {}", path))?;

    while !session.is_resolved() {
        print_hunk(&session);

        let mut actions = vec![
            Action::Pick(Resolution::Ours),
            Action::Pick(Resolution::Theirs),
            Action::Pick(Resolution::Both),
        ];
        if session.can_undo() {
            actions.push(Action::Undo);
        }
        if session.unresolved_count() > 1 {
            actions.push(Action::Next);
            actions.push(Action::Previous);
        }
        actions.push(Action::Save);
        actions.push(Action::Discard);

        let labels: Vec<&str> = actions.iter().map(|a| a.label()).collect();
        let idx = Select::new()
            .items(&labels)
            .default(0)
            .interact()
            .context("failed to read choice")?;

        match actions[idx] {
            Action::Pick(resolution) => session.pick(resolution)?,
            Action::Undo => session.undo()?,
            Action::Next => {
                session.next_hunk();
            }
            Action::Previous => {
                session.prev_hunk();
            }
            Action::Save => break,
            Action::Discard => {
                println!("{}", style::dim("No changes written."));
                return Ok(());
            }
        }
    }

    let staged = gate.save_session(adapter, &session)?;
    if !session.is_resolved() {
        println!(
            "{}",
            style::warn(&format!(
                "Saved {} with {} unresolved hunk(s)",
                path,
                session.unresolved_count()
            ))
        );
        return Ok(());
    }
    if staged {
        println!("{}", style::success(&format!("Resolved and staged {}", path)));
        return Ok(());
    }

    let stage = Confirm::new()
        .with_prompt(format!("All conflicts in {} resolved. Stage it?", path))
        .default(true)
        .interact()
        .context("failed to read confirmation")?;
    if stage {
        gate.stage_paths(adapter, &[path.to_string()])
            .with_context(|| format!("failed to stage {}", path))?;
        println!("{}", style::success(&format!("Staged {}", path)));
    }
    Ok(())
}

fn print_hunk(session: &HunkSession) {
    let Some(hunk) = session.current() else {
        return;
    };
    println!();
    println!(
        "{}",
        style::header(&format!(
            "Hunk {}/{} at line {} ({} unresolved)",
            session.cursor() + 1,
            session.hunks().len(),
            hunk.start_line,
            session.unresolved_count()
        ))
    );
    println!("{}", style::dim(&format!("<<<<<<< {}", hunk.markers.ours_label)));
    print!("{}", style::side(&hunk.ours_lines.concat(), true));
    println!("{}", style::dim("======="));
    print!("{}", style::side(&hunk.theirs_lines.concat(), false));
    println!("{}", style::dim(&format!(">>>>>>> {}", hunk.markers.theirs_label)));
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use graft_core::conflict::StatusCode;

    #[test]
    fn test_capitalize() {
        assert_eq!(capitalize("use both"), "Use both");
        assert_eq!(capitalize(""), "");
    }

    #[test]
    fn test_conflict_table_lists_every_file() {
        let files = vec![
            ConflictedFile::new("a.txt", StatusCode::UU),
            ConflictedFile::new("gone.txt", StatusCode::UD),
        ];
        let rendered = conflict_table(&files).to_string();
        assert!(rendered.contains("a.txt"));
        assert!(rendered.contains("deleted by them"));
    }
}
