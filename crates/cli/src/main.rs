//! graft command-line front-end.
//!
//! Copies commits onto the current branch, walks the user through every
//! decision the transplant engine suspends on, and resolves conflicts file
//! by file or hunk by hunk.

mod prompts;
mod resolve;
mod style;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use comfy_table::{presets::UTF8_FULL, Cell, ContentArrangement, Table};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::debug;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use graft_core::errors::TransplantError;
use graft_core::todo::TodoAction;
use graft_core::transplant::OperationStatus;
use graft_core::{
    CommitListView, CopyBuffer, Decision, GitCli, GraftConfig, Notifier, Outcome, ReplayMode, RepositoryAdapter,
    StatusCache, Step, SupportsCommitPaste, Transplanter,
};

use prompts::Answer;

type Engine = Transplanter<GitCli>;

// ---------------------------------------------------------------------------
// CLI argument definitions
// ---------------------------------------------------------------------------

/// Copy commits between branches and resolve the conflicts that follow.
#[derive(Parser, Debug)]
#[command(name = "graft", version, about = "Cherry-pick copied commits and resolve conflicts")]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Repository to operate on.
    #[arg(short = 'C', long, global = true, default_value = ".")]
    repo: PathBuf,

    /// Log at debug level.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Copy the given commits, in order, and paste them onto HEAD.
    Pick {
        /// Revisions to copy.
        #[arg(required = true)]
        revs: Vec<String>,

        /// Replay with an interactive rebase instead of cherry-pick.
        #[arg(long)]
        rebase: bool,
    },

    /// Show the transplant state and changed files.
    Status {
        /// Print machine-readable JSON.
        #[arg(long)]
        json: bool,
    },

    /// Continue a cherry-pick or rebase stopped on conflicts.
    Continue,

    /// Abort a cherry-pick or rebase in progress.
    Abort,

    /// Resolve one conflicted file interactively.
    Resolve {
        /// Conflicted path.
        path: String,
    },

    /// Show or edit the TODO list of an interactive rebase.
    Todo {
        /// Move the entry for this commit one step earlier.
        #[arg(long, value_name = "ID", conflicts_with = "move_down")]
        move_up: Option<String>,

        /// Move the entry for this commit one step later.
        #[arg(long, value_name = "ID", conflicts_with = "set_action")]
        move_down: Option<String>,

        /// Change the command of the entry for a commit, e.g. `fixup`.
        #[arg(
            long,
            num_args = 2,
            value_names = ["ID", "ACTION"],
            conflicts_with = "move_up"
        )]
        set_action: Option<Vec<String>>,
    },

    /// Write a default configuration file.
    Init {
        /// Output path; defaults to the user config directory.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match &cli.command {
        Commands::Init { .. } => Ok(GraftConfig::default()),
        _ => load_config(cli.config.as_deref()),
    };
    let config = match config {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", style::error(&format!("{:#}", e)));
            return ExitCode::FAILURE;
        }
    };
    let _guard = init_tracing(&config, cli.verbose);

    match run(cli, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", style::error(&format!("{:#}", e)));
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli, config: GraftConfig) -> Result<()> {
    match cli.command {
        Commands::Init { output } => cmd_init(output),
        Commands::Pick { revs, rebase } => {
            let mode = if rebase {
                ReplayMode::Rebase
            } else {
                config.transplant.default_mode
            };
            cmd_pick(open_engine(&cli.repo, &config)?, &revs, mode).await
        }
        Commands::Status { json } => cmd_status(open_engine(&cli.repo, &config)?, json),
        Commands::Continue => cmd_resume(open_engine(&cli.repo, &config)?, Decision::Continue).await,
        Commands::Abort => cmd_resume(open_engine(&cli.repo, &config)?, Decision::Abort).await,
        Commands::Resolve { path } => {
            let engine = open_engine(&cli.repo, &config)?;
            resolve::run(engine.gate(), engine.adapter(), &path)
        }
        Commands::Todo {
            move_up,
            move_down,
            set_action,
        } => {
            let edit = todo_edit(move_up, move_down, set_action)?;
            cmd_todo(&open_engine(&cli.repo, &config)?, edit)
        }
    }
}

// ---------------------------------------------------------------------------
// Setup helpers
// ---------------------------------------------------------------------------

fn load_config(path: Option<&Path>) -> Result<GraftConfig> {
    match path {
        Some(path) => {
            let config = GraftConfig::load_from_file(path).context("failed to load configuration file")?;
            config.validate().context("invalid configuration")?;
            Ok(config)
        }
        None => match GraftConfig::default_path() {
            Some(path) => GraftConfig::load_or_default(path).context("failed to load configuration file"),
            None => Ok(GraftConfig::default()),
        },
    }
}

/// Log to stderr, or to `[log] file` through a non-blocking writer so
/// prompts stay readable.
fn init_tracing(config: &GraftConfig, verbose: bool) -> Option<WorkerGuard> {
    let level = if verbose { "debug" } else { config.log.level.as_str() };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let file = config.log.file.as_ref().and_then(|path| {
        let name = path.file_name()?.to_owned();
        let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
        Some((dir.to_path_buf(), name))
    });

    match file {
        Some((dir, name)) => {
            let appender = tracing_appender::rolling::never(dir, name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_target(false)
                .with_ansi(false)
                .with_writer(writer)
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_target(false)
                .without_time()
                .with_writer(std::io::stderr)
                .init();
            None
        }
    }
}

/// Prints the copy-count notice.
struct CopyNotice;

impl Notifier for CopyNotice {
    fn notify(&self, message: Option<String>) {
        match message {
            Some(msg) => println!("{}", style::dim(&msg)),
            None => debug!("copy buffer cleared"),
        }
    }
}

fn open_engine(repo: &Path, config: &GraftConfig) -> Result<Engine> {
    let cli = GitCli::open(repo, config.git.binary.clone())
        .with_context(|| format!("failed to open repository at {}", repo.display()))?;
    Ok(Transplanter::new(cli, config).with_notifier(Box::new(CopyNotice)))
}

/// Run `work` on a blocking worker with a spinner.
async fn with_spinner<T, F>(message: &str, work: F) -> Result<T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner:.blue} {msg}")
            .context("invalid spinner template")?
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
    );
    spinner.set_message(message.to_string());
    spinner.enable_steady_tick(Duration::from_millis(100));

    let result = tokio::task::spawn_blocking(work).await;
    spinner.finish_and_clear();
    result.context("git task panicked")
}

// ---------------------------------------------------------------------------
// Subcommand implementations
// ---------------------------------------------------------------------------

async fn cmd_pick(engine: Engine, revs: &[String], mode: ReplayMode) -> Result<()> {
    let mut buffer = CopyBuffer::new();
    for rev in revs {
        let commit = engine
            .adapter()
            .list_commits(rev, 1)
            .with_context(|| format!("failed to resolve '{}'", rev))?
            .into_iter()
            .next()
            .with_context(|| format!("'{}' names no commit", rev))?;
        println!("  {} {}", style::commit_id(&commit.id), commit.subject);
        buffer.add(commit);
    }
    if let Some(notice) = buffer.notice() {
        println!("{}", style::dim(&notice));
    }

    let view = CommitListView::load(engine.adapter(), "HEAD", 1, mode).context("failed to read HEAD")?;
    let (engine, buffer, result) = with_spinner("Pasting commits...", move || {
        let mut engine = engine;
        let mut buffer = buffer;
        let result = view.paste(&mut engine, &mut buffer);
        (engine, buffer, result)
    })
    .await?;

    let step = result.context("failed to paste commits")?;
    drive(engine, buffer, step).await
}

/// Continue or abort an operation left suspended by an earlier run.
async fn cmd_resume(mut engine: Engine, decision: Decision) -> Result<()> {
    let snapshot = engine.resync().context("failed to read repository state")?;
    let Some(pending) = snapshot.pending.clone() else {
        bail!("no cherry-pick or rebase is in progress");
    };
    if !pending.accepts(decision) {
        bail!("the current operation is {}; '{}' does not apply", pending, decision);
    }

    let buffer = CopyBuffer::new();
    let (engine, buffer, result) = with_spinner(&format!("Running {}...", decision), move || {
        let mut engine = engine;
        let mut buffer = buffer;
        let result = engine.resume(&mut buffer, decision);
        (engine, buffer, result)
    })
    .await?;

    let step = match result {
        Ok(step) => step,
        Err(TransplantError::ConflictStillPresent { paths }) => {
            bail!(
                "unresolved conflicts remain in: {}. Run 'graft resolve <path>' first",
                paths.join(", ")
            )
        }
        Err(e) => return Err(e).context("transplant failed"),
    };
    drive(engine, buffer, step).await
}

/// Prompt for each pending decision until the operation finishes or the
/// user leaves it for later.
async fn drive(mut engine: Engine, mut buffer: CopyBuffer, mut step: Step) -> Result<()> {
    loop {
        let pending = match step {
            Step::Finished(outcome) => {
                print_outcome(&engine, &outcome);
                return Ok(());
            }
            Step::Suspended(pending) => pending,
        };

        let decision = match prompts::ask(&pending)? {
            Answer::Decide(decision) => decision,
            Answer::Resolve(path) => {
                if let Err(e) = resolve::run(engine.gate(), engine.adapter(), &path) {
                    eprintln!("{}", style::error(&format!("{:#}", e)));
                }
                engine.resync().context("failed to refresh repository state")?;
                step = match engine.pending() {
                    Some(pending) => Step::Suspended(pending.clone()),
                    None => bail!("the operation is no longer in progress"),
                };
                continue;
            }
            Answer::Later => {
                println!();
                println!("{}", style::dim("Run 'graft resolve <path>', then 'graft continue' or 'graft abort'."));
                return Ok(());
            }
        };

        let (next_engine, next_buffer, result) = with_spinner(&format!("Running {}...", decision), move || {
            let result = engine.resume(&mut buffer, decision);
            (engine, buffer, result)
        })
        .await?;
        engine = next_engine;
        buffer = next_buffer;

        step = match result {
            Ok(step) => step,
            Err(TransplantError::ConflictStillPresent { paths }) => {
                eprintln!(
                    "{}",
                    style::warn(&format!("Unresolved conflicts remain in: {}", paths.join(", ")))
                );
                Step::Suspended(pending)
            }
            Err(e) => return Err(e).context("transplant failed"),
        };
    }
}

fn print_outcome(engine: &Engine, outcome: &Outcome) {
    println!();
    match outcome {
        Outcome::Completed { report } => {
            println!(
                "{}",
                style::success(&format!("Pasted {} commit(s) ({})", report.created(), report.mode))
            );
            if !report.skipped.is_empty() {
                println!("  Skipped empty: {}", report.skipped.len());
            }
            if !report.emptied.is_empty() {
                println!("  Empty commits: {}", report.emptied.len());
            }
        }
        Outcome::Aborted { .. } => println!("{}", style::warn("Aborted; the branch is back where it started")),
        Outcome::Cancelled { report } => println!(
            "{}",
            style::warn(&format!("Cancelled after {} commit(s)", report.created()))
        ),
        Outcome::Declined => println!("{}", style::dim("Nothing pasted.")),
        Outcome::Queued { count } => println!(
            "{}",
            style::success(&format!("Queued {} commit(s) in the rebase TODO", count))
        ),
    }
    if let Some(head) = engine.snapshot().select_commit.as_deref() {
        println!("  HEAD: {}", style::commit_id(head));
    }
}

fn cmd_status(mut engine: Engine, json: bool) -> Result<()> {
    let snapshot = engine.resync().context("failed to read repository state")?;
    let adapter = engine.adapter();
    let branch = adapter.current_branch().context("failed to read branch")?;
    let head = adapter.head().ok();
    let mut cache = StatusCache::new();
    cache.update(adapter.status().context("failed to read status")?);
    let files = cache.visible_files();

    if json {
        let value = serde_json::json!({
            "branch": branch,
            "head": head,
            "transplant": &*snapshot,
            "files": files,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    println!();
    println!("{}", style::header("graft status"));
    println!();
    println!("  Branch : {}", branch.as_deref().unwrap_or("(detached)"));
    println!(
        "  HEAD   : {}",
        head.as_deref().map(style::commit_id).unwrap_or_else(|| "(no commits)".to_string())
    );
    let state = match snapshot.mode {
        Some(mode) if snapshot.status != OperationStatus::Idle => format!("{} ({})", snapshot.status, mode),
        _ => snapshot.status.to_string(),
    };
    println!("  State  : {}", state);
    if let Some(pending) = &snapshot.pending {
        println!("  Waiting: {}", pending.prompt());
    }
    if !snapshot.remaining.is_empty() {
        println!("  Remaining:");
        for commit in &snapshot.remaining {
            println!("    {} {}", style::commit_id(&commit.id), commit.subject);
        }
    }
    println!();

    if files.is_empty() {
        println!("{}", style::success("Working tree clean"));
        println!();
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Status", "Path"]);
    for file in &files {
        table.add_row(vec![
            Cell::new(style::status_code(&file.short_status, file.conflicted)),
            Cell::new(&file.path),
        ]);
    }
    println!("{}", table);
    println!();
    Ok(())
}

/// A change to the pending rebase entries.
#[derive(Debug, PartialEq, Eq)]
enum TodoEdit {
    MoveUp(String),
    MoveDown(String),
    SetAction(String, TodoAction),
}

fn todo_edit(
    move_up: Option<String>,
    move_down: Option<String>,
    set_action: Option<Vec<String>>,
) -> Result<Option<TodoEdit>> {
    if let Some(id) = move_up {
        return Ok(Some(TodoEdit::MoveUp(id)));
    }
    if let Some(id) = move_down {
        return Ok(Some(TodoEdit::MoveDown(id)));
    }
    match set_action.as_deref() {
        Some([id, word]) => {
            let action = TodoAction::parse(word)
                .filter(TodoAction::is_commit_action)
                .with_context(|| {
                    format!("'{}' is not one of pick, reword, edit, squash, fixup, drop", word)
                })?;
            Ok(Some(TodoEdit::SetAction(id.clone(), action)))
        }
        Some(_) => bail!("--set-action takes a commit id and an action"),
        None => Ok(None),
    }
}

fn cmd_todo(engine: &Engine, edit: Option<TodoEdit>) -> Result<()> {
    let projector = engine.projector();
    let adapter = engine.adapter();
    let todo = match edit {
        Some(TodoEdit::MoveUp(id)) => projector.move_up(adapter, &id),
        Some(TodoEdit::MoveDown(id)) => projector.move_down(adapter, &id),
        Some(TodoEdit::SetAction(id, action)) => projector.set_action(adapter, &id, action),
        None => projector.load(adapter),
    }
    .context("failed to read rebase TODO")?;

    println!();
    println!("{}", style::header("Rebase TODO"));
    println!();
    print!("{}", todo);
    println!();
    Ok(())
}

fn cmd_init(output: Option<PathBuf>) -> Result<()> {
    let output = match output.or_else(GraftConfig::default_path) {
        Some(path) => path,
        None => bail!("no config directory found; pass --output"),
    };
    if output.exists() {
        bail!(
            "file already exists: {}. Use a different path or remove the existing file.",
            output.display()
        );
    }

    let contents = GraftConfig::default()
        .to_toml()
        .context("failed to render default configuration")?;
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).context("failed to create config directory")?;
    }
    std::fs::write(&output, contents).context("failed to write config file")?;

    println!("{}", style::success(&format!("Default configuration written to {}", output.display())));
    Ok(())
}
