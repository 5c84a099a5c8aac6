//! phasegate CLI
//!
//! Command-line interface for the phase-gated workflow engine: create CAPA
//! and design-control records, record gate reviews, advance phases and
//! inspect progress.

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use clap::{Parser, Subcommand};
use phasegate_core::{
    EntityId, PHASEGATE_DIR, PhaseWorkflow, PhasegateConfig, ProgressReport, ReviewDecision,
    TomlStore, TransitionOutcome, WorkflowEngine, WorkflowStore,
};
use phasegate_notice::{NoticeContext, NoticeEngine, NoticeKind, NoticeManager, PhaseLine};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};

mod tui;

/// phasegate - phase-gated workflows for CAPA and design control
#[derive(Parser)]
#[command(name = "phasegate", version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Print machine-readable JSON instead of text
    #[arg(long, global = true)]
    json: bool,
}

/// Available phasegate commands
#[derive(Subcommand)]
enum Commands {
    /// Initialize the current directory for phasegate use
    ///
    /// Creates .phasegate/ with a default config.toml and an entities/ directory.
    Init,

    /// Show the phase catalog of a workflow type
    Catalog {
        /// Workflow type (capa, capa-preventive, design-control)
        workflow_type: String,
    },

    /// List stored entities
    List,

    /// Create a CAPA record or design-control project
    Create {
        /// Entity id (e.g. CAPA-2024-001)
        id: String,

        /// Workflow type (capa, capa-preventive, design-control)
        #[arg(long = "type")]
        workflow_type: String,

        /// Human-readable title
        #[arg(long)]
        title: String,
    },

    /// Check whether a phase may be entered
    Gate {
        /// Entity id
        id: String,

        /// Phase id
        phase: String,
    },

    /// Move an entity to the next phase
    Advance {
        /// Entity id
        id: String,

        /// Phase to enter (must be the next phase)
        phase: String,

        /// Acting user (defaults to engine.default_actor)
        #[arg(long)]
        user: Option<String>,

        /// Remarks stored in the history entry
        #[arg(long)]
        comment: Option<String>,
    },

    /// Record a gate review decision
    Review {
        /// Entity id
        id: String,

        /// Reviewed phase
        phase: String,

        /// pending, approved or rejected
        #[arg(long)]
        decision: ReviewDecision,

        /// Reviewer (defaults to engine.default_actor)
        #[arg(long)]
        reviewer: Option<String>,

        /// Reviewer remarks
        #[arg(long)]
        comment: Option<String>,
    },

    /// Show progress of an entity
    Status {
        /// Entity id
        id: String,
    },

    /// Show transition history of an entity
    History {
        /// Entity id
        id: String,
    },

    /// Put an active phase on hold
    Hold {
        /// Entity id
        id: String,

        /// Phase id
        phase: String,

        /// Why the phase is paused
        #[arg(long)]
        reason: String,
    },

    /// Mark an active phase blocked
    Block {
        /// Entity id
        id: String,

        /// Phase id
        phase: String,

        /// What blocks the phase
        #[arg(long)]
        reason: String,
    },

    /// Release a held or blocked phase
    Release {
        /// Entity id
        id: String,

        /// Phase id
        phase: String,
    },

    /// Assign a phase to a user
    Assign {
        /// Entity id
        id: String,

        /// Phase id
        phase: String,

        /// Assignee
        user: String,
    },

    /// Record a phase completion percentage (0-100)
    Complete {
        /// Entity id
        id: String,

        /// Phase id
        phase: String,

        /// Completion percentage
        percent: u8,
    },

    /// Close the final phase once its gate is approved
    Close {
        /// Entity id
        id: String,
    },

    /// Open the read-only phase board
    Board {
        /// Entity id
        id: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.verbose);

    if let Err(e) = run_command(cli.command, cli.json) {
        error!("Command failed: {:#}", e);
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}

/// Initialize tracing subscriber for structured logging
///
/// Logs go to stderr so `--json` output on stdout stays parseable.
fn init_tracing(verbose: bool) {
    use tracing_subscriber::{EnvFilter, fmt};

    let default = if verbose {
        "phasegate=debug,phasegate_core=debug,phasegate_notice=debug"
    } else {
        "phasegate=info,phasegate_core=info,phasegate_notice=info"
    };
    let filter = EnvFilter::try_from_env("PHASEGATE_LOG").unwrap_or_else(|_| EnvFilter::new(default));

    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_level(true)
        .init();
}

/// Loaded configuration, engine and notice templates for one command.
struct App {
    config: PhasegateConfig,
    engine: WorkflowEngine<TomlStore>,
    notices: NoticeManager,
    json: bool,
}

impl App {
    fn open(json: bool) -> Result<Self> {
        let root = find_root().context("Failed to find phasegate root")?;
        let config = load_config(&root).context("Failed to load phasegate configuration")?;
        let engine = WorkflowEngine::from_config(TomlStore::new(&config.data_dir), &config);
        let notices = NoticeManager::from_dir(config.notices.templates_dir.clone())
            .context("Failed to load notice templates")?;
        Ok(Self {
            config,
            engine,
            notices,
            json,
        })
    }

    fn actor(&self, user: Option<String>) -> String {
        user.unwrap_or_else(|| self.config.engine.default_actor.clone())
    }

    fn emit<T: Serialize>(&self, value: &T, text: impl FnOnce() -> Result<String>) -> Result<()> {
        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(value).context("Failed to encode JSON output")?
            );
        } else {
            println!("{}", text()?);
        }
        Ok(())
    }

    fn progress_notice(&self, report: &ProgressReport) -> Result<String> {
        let ctx = progress_context(report);
        self.notices
            .render_notice(NoticeKind::Progress, &ctx)
            .context("Failed to render progress notice")
    }
}

/// Execute the specified command
fn run_command(command: Commands, json: bool) -> Result<()> {
    match command {
        Commands::Init => {
            info!("Initializing phasegate...");
            run_init()
        }
        Commands::Catalog { workflow_type } => run_catalog(&App::open(json)?, &workflow_type),
        Commands::List => run_list(&App::open(json)?),
        Commands::Create {
            id,
            workflow_type,
            title,
        } => run_create(&App::open(json)?, &id, &workflow_type, &title),
        Commands::Gate { id, phase } => run_gate(&App::open(json)?, &id, &phase),
        Commands::Advance {
            id,
            phase,
            user,
            comment,
        } => run_advance(&App::open(json)?, &id, &phase, user, comment),
        Commands::Review {
            id,
            phase,
            decision,
            reviewer,
            comment,
        } => run_review(&App::open(json)?, &id, &phase, decision, reviewer, comment),
        Commands::Status { id } => run_status(&App::open(json)?, &id),
        Commands::History { id } => run_history(&App::open(json)?, &id),
        Commands::Hold { id, phase, reason } => {
            let app = App::open(json)?;
            let entity = parse_id(&id)?;
            let instance = app
                .engine
                .hold_phase(&entity, &phase, &reason)
                .with_context(|| format!("Failed to hold {phase} of {id}"))?;
            app.emit(&instance, || Ok(format!("✔ {phase} of {id} is on hold: {reason}")))
        }
        Commands::Block { id, phase, reason } => {
            let app = App::open(json)?;
            let entity = parse_id(&id)?;
            let instance = app
                .engine
                .block_phase(&entity, &phase, &reason)
                .with_context(|| format!("Failed to block {phase} of {id}"))?;
            app.emit(&instance, || Ok(format!("✔ {phase} of {id} is blocked: {reason}")))
        }
        Commands::Release { id, phase } => {
            let app = App::open(json)?;
            let entity = parse_id(&id)?;
            let instance = app
                .engine
                .release_phase(&entity, &phase)
                .with_context(|| format!("Failed to release {phase} of {id}"))?;
            app.emit(&instance, || {
                Ok(format!("✔ {phase} of {id} released ({})", instance.status))
            })
        }
        Commands::Assign { id, phase, user } => {
            let app = App::open(json)?;
            let entity = parse_id(&id)?;
            let instance = app
                .engine
                .assign_phase(&entity, &phase, &user)
                .with_context(|| format!("Failed to assign {phase} of {id}"))?;
            app.emit(&instance, || Ok(format!("✔ {phase} of {id} assigned to {user}")))
        }
        Commands::Complete { id, phase, percent } => {
            let app = App::open(json)?;
            let entity = parse_id(&id)?;
            let instance = app
                .engine
                .set_completion(&entity, &phase, percent)
                .with_context(|| format!("Failed to set completion of {phase} of {id}"))?;
            app.emit(&instance, || Ok(format!("✔ {phase} of {id} is {percent}% complete")))
        }
        Commands::Close { id } => run_close(&App::open(json)?, &id),
        Commands::Board { id } => {
            let app = App::open(json)?;
            let entity = parse_id(&id)?;
            info!("Opening phase board for {}", entity);
            tui::run_board_tui(&app.engine, &entity).context("Phase board failed")
        }
    }
}

/// Run the init command
fn run_init() -> Result<()> {
    let root = std::env::current_dir().context("Failed to get current directory")?;
    let config = PhasegateConfig::new(root);

    if config.config_file.exists() {
        anyhow::bail!(
            "phasegate is already initialized: {}",
            config.config_file.display()
        );
    }

    config
        .write_default()
        .context("Failed to write default configuration")?;
    std::fs::create_dir_all(&config.data_dir)
        .with_context(|| format!("Failed to create {}", config.data_dir.display()))?;

    println!("✔ Created {}/", PHASEGATE_DIR);
    println!("✔ Generated default configuration");
    println!("\nNext steps:");
    println!("  phasegate create <id> --type capa --title <title>");
    println!("  phasegate catalog design-control");

    Ok(())
}

fn run_catalog(app: &App, workflow_type: &str) -> Result<()> {
    let wt = app.config.resolve_workflow_type(workflow_type)?;
    let catalog = app.engine.get_catalog(wt)?;
    app.emit(catalog, || {
        let mut out = format!("{} ({} phases)\n", catalog.workflow_type(), catalog.len());
        for def in catalog.phases() {
            let gate = if def.gate_review_required {
                "gate review"
            } else {
                "no gate"
            };
            out.push_str(&format!(
                "{}. {:<22} {:<28} [{}]\n",
                def.sequence,
                def.id.as_str(),
                def.name,
                gate
            ));
        }
        Ok(out.trim_end().to_string())
    })
}

#[derive(Serialize)]
struct ListEntry {
    id: EntityId,
    workflow_type: String,
    title: String,
    overall_progress: u8,
    current_phase: Option<String>,
}

fn run_list(app: &App) -> Result<()> {
    let mut entries = Vec::new();
    for id in app.engine.store().list()? {
        let entity = app.engine.load(&id)?;
        entries.push(ListEntry {
            workflow_type: entity.workflow_type.to_string(),
            title: entity.title,
            overall_progress: entity.overall_progress,
            current_phase: entity.current_phase_id.map(|p| p.to_string()),
            id,
        });
    }

    app.emit(&entries, || {
        if entries.is_empty() {
            return Ok("No entities yet.".to_string());
        }
        Ok(entries
            .iter()
            .map(|e| {
                format!(
                    "{:<20} {:<16} {:>3}%  {:<26} {}",
                    e.id.as_str(),
                    e.workflow_type,
                    e.overall_progress,
                    e.current_phase.as_deref().unwrap_or("complete"),
                    e.title
                )
            })
            .collect::<Vec<_>>()
            .join("\n"))
    })
}

fn run_create(app: &App, id: &str, workflow_type: &str, title: &str) -> Result<()> {
    let entity_id = parse_id(id)?;
    let wt = app.config.resolve_workflow_type(workflow_type)?;
    let entity = app
        .engine
        .create_entity(&entity_id, wt, title)
        .with_context(|| format!("Failed to create {id}"))?;
    let report = app.engine.get_progress(&entity_id)?;
    app.emit(&entity, || {
        Ok(format!("✔ Created {id} ({wt})\n{}", app.progress_notice(&report)?))
    })
}

fn run_gate(app: &App, id: &str, phase: &str) -> Result<()> {
    let entity = parse_id(id)?;
    let decision = app.engine.can_enter(&entity, phase)?;
    app.emit(&decision, || {
        let mark = if decision.allowed { "open" } else { "closed" };
        Ok(format!("{phase}: gate {mark} ({})", decision.reason))
    })
}

fn run_advance(
    app: &App,
    id: &str,
    phase: &str,
    user: Option<String>,
    comment: Option<String>,
) -> Result<()> {
    let entity = parse_id(id)?;
    let user = app.actor(user);
    let outcome = app
        .engine
        .transition(&entity, phase, &user, comment.as_deref())
        .with_context(|| format!("Failed to advance {id} to {phase}"))?;

    app.emit(&outcome, || match &outcome {
        TransitionOutcome::Transitioned(result) => {
            let entry = &result.history_entry;
            let mut ctx = NoticeContext::new(result.entity.id.as_str(), &result.entity.title)
                .with_workflow_type(result.entity.workflow_type.to_string())
                .with_phases(result.from_phase.as_str(), result.to_phase.as_str())
                .with_actor(&result.acting_user)
                .with_timestamp(timestamp(&result.timestamp))
                .with_comments(entry.comments.as_deref())
                .with_progress(result.entity.overall_progress);
            if let Some(decision) = entry.decision {
                ctx = ctx.with_decision(decision.to_string());
            }
            app.notices
                .render_notice(NoticeKind::Transition, &ctx)
                .context("Failed to render transition notice")
        }
        TransitionOutcome::AlreadyInPhase { phase_id } => {
            Ok(format!("{id} is already in or past {phase_id}; nothing to do"))
        }
    })
}

fn run_review(
    app: &App,
    id: &str,
    phase: &str,
    decision: ReviewDecision,
    reviewer: Option<String>,
    comment: Option<String>,
) -> Result<()> {
    let entity_id = parse_id(id)?;
    let reviewer = app.actor(reviewer);
    let instance = app
        .engine
        .submit_gate_review(&entity_id, phase, decision, &reviewer, comment.as_deref())
        .with_context(|| format!("Failed to record review of {phase} for {id}"))?;

    app.emit(&instance, || {
        let entity = app.engine.load(&entity_id)?;
        let mut ctx = NoticeContext::new(entity.id.as_str(), &entity.title)
            .with_phase(phase)
            .with_decision(decision.to_string())
            .with_actor(&reviewer)
            .with_comments(comment.as_deref())
            .with_progress(entity.overall_progress);
        if let Some(completed) = instance.gate_review.as_ref().and_then(|r| r.completed_date) {
            ctx = ctx.with_timestamp(timestamp(&completed));
        }
        app.notices
            .render_notice(NoticeKind::GateReview, &ctx)
            .context("Failed to render gate review notice")
    })
}

fn run_status(app: &App, id: &str) -> Result<()> {
    let entity = parse_id(id)?;
    let report = app
        .engine
        .get_progress(&entity)
        .with_context(|| format!("Failed to load progress of {id}"))?;
    app.emit(&report, || app.progress_notice(&report))
}

fn run_history(app: &App, id: &str) -> Result<()> {
    let entity = parse_id(id)?;
    let history = app
        .engine
        .get_history(&entity)
        .with_context(|| format!("Failed to load history of {id}"))?;

    app.emit(&history, || {
        if history.is_empty() {
            return Ok(format!("{id} has no transitions yet."));
        }
        Ok(history
            .iter()
            .map(|h| {
                let from = h.from_phase_id.as_ref().map_or("-", |p| p.as_str());
                let mut line = format!(
                    "{}  {} -> {}  by {}",
                    timestamp(&h.timestamp),
                    from,
                    h.to_phase_id,
                    h.transitioned_by
                );
                if let Some(decision) = h.decision {
                    line.push_str(&format!("  [{decision}]"));
                }
                if let Some(comments) = &h.comments {
                    line.push_str(&format!("  \"{comments}\""));
                }
                line
            })
            .collect::<Vec<_>>()
            .join("\n"))
    })
}

fn run_close(app: &App, id: &str) -> Result<()> {
    let entity_id = parse_id(id)?;
    let entity = app
        .engine
        .close_out(&entity_id)
        .with_context(|| format!("Failed to close out {id}"))?;
    let report = app.engine.get_progress(&entity_id)?;
    app.emit(&entity, || {
        Ok(format!("✔ {id} closed out\n{}", app.progress_notice(&report)?))
    })
}

fn parse_id(id: &str) -> Result<EntityId> {
    EntityId::parse(id).with_context(|| format!("Invalid entity id '{id}'"))
}

fn timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn progress_context(report: &ProgressReport) -> NoticeContext {
    let phases = report
        .phases
        .iter()
        .map(|p| PhaseLine {
            sequence: p.sequence,
            name: p.name.clone(),
            status: p.status.to_string(),
            gate: p.gate_decision.map(|d| d.to_string()),
            assigned_to: p.assigned_to.clone(),
        })
        .collect();

    let ctx = NoticeContext::new(report.entity_id.as_str(), &report.title)
        .with_workflow_type(report.workflow_type.to_string())
        .with_progress(report.overall_progress)
        .with_phase_lines(phases);
    match &report.current_phase_id {
        Some(current) => ctx.with_current_phase(current.as_str()),
        None => ctx,
    }
}

/// Find the phasegate root by searching for a .phasegate directory
fn find_root() -> Result<PathBuf> {
    let current_dir = std::env::current_dir().context("Failed to get current directory")?;

    let mut path = current_dir.as_path();
    loop {
        if path.join(PHASEGATE_DIR).is_dir() {
            return Ok(path.to_path_buf());
        }

        match path.parent() {
            Some(parent) => path = parent,
            None => {
                anyhow::bail!(
                    "Not a phasegate directory (or any parent). Run 'phasegate init' first."
                )
            }
        }
    }
}

/// Load configuration from .phasegate/config.toml
fn load_config(root: &Path) -> Result<PhasegateConfig> {
    let config = PhasegateConfig::load(root.to_path_buf())?;
    debug!("phasegate root: {}", config.root.display());
    Ok(config)
}
