//! Terminal User Interface for the read-only phase board.
//!
//! Shows every phase of one entity with its status, gate decision and
//! assignee, an overall progress gauge, and the transition history.

use anyhow::{Context, Result};
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use phasegate_core::{
    EntityId, PhaseStatus, PhaseWorkflow, ProgressReport, TomlStore, TransitionHistoryEntry,
    WorkflowEngine,
};
use ratatui::{
    Frame, Terminal,
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Gauge, Paragraph, Row, Table, Wrap},
};
use std::io;

/// Application state for the phase board
struct BoardApp {
    /// Latest progress snapshot
    report: ProgressReport,

    /// Transition history, oldest first
    history: Vec<TransitionHistoryEntry>,

    /// Current view mode
    view_mode: ViewMode,

    /// Status message
    status: String,

    /// Set when the user asks for fresh data
    reload_requested: bool,

    /// Whether the app should exit
    should_quit: bool,
}

/// View modes for the board
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ViewMode {
    /// Phase table
    Phases,

    /// Transition history
    History,

    /// Help screen
    Help,
}

const DEFAULT_STATUS: &str = "q quit | t history | r reload | ? help";

impl BoardApp {
    fn new(report: ProgressReport, history: Vec<TransitionHistoryEntry>) -> Self {
        Self {
            report,
            history,
            view_mode: ViewMode::Phases,
            status: DEFAULT_STATUS.to_string(),
            reload_requested: false,
            should_quit: false,
        }
    }

    /// Handle keyboard input
    fn handle_input(&mut self, key: KeyCode) {
        match key {
            KeyCode::Char('q') => {
                self.should_quit = true;
            }
            KeyCode::Char('t') => {
                self.view_mode = if self.view_mode == ViewMode::History {
                    ViewMode::Phases
                } else {
                    ViewMode::History
                };
            }
            KeyCode::Char('?') => {
                self.view_mode = ViewMode::Help;
                self.status = "Viewing help - press Esc to go back".to_string();
            }
            KeyCode::Char('r') => {
                self.reload_requested = true;
            }
            KeyCode::Esc => {
                self.view_mode = ViewMode::Phases;
                self.status = DEFAULT_STATUS.to_string();
            }
            _ => {}
        }
    }

    fn refresh(&mut self, report: ProgressReport, history: Vec<TransitionHistoryEntry>) {
        self.report = report;
        self.history = history;
        self.reload_requested = false;
        self.status = format!("Reloaded - {DEFAULT_STATUS}");
    }
}

/// Run the phase board for `id`
pub fn run_board_tui(engine: &WorkflowEngine<TomlStore>, id: &EntityId) -> Result<()> {
    let load = || -> Result<(ProgressReport, Vec<TransitionHistoryEntry>)> {
        let report = engine.get_progress(id)?;
        let history = engine.get_history(id)?;
        Ok((report, history))
    };
    // Fail before touching the terminal if the entity cannot be loaded.
    let (report, history) = load().with_context(|| format!("Failed to load {id}"))?;

    enable_raw_mode().context("Failed to enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)
        .context("Failed to enter alternate screen")?;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("Failed to create terminal")?;

    let mut app = BoardApp::new(report, history);
    let result = run_app(&mut terminal, &mut app, &load);

    disable_raw_mode().context("Failed to disable raw mode")?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )
    .context("Failed to leave alternate screen")?;
    terminal.show_cursor().context("Failed to show cursor")?;

    result
}

/// Run the main application loop
fn run_app<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    app: &mut BoardApp,
    load: &dyn Fn() -> Result<(ProgressReport, Vec<TransitionHistoryEntry>)>,
) -> Result<()> {
    loop {
        terminal
            .draw(|f| ui(f, app))
            .map_err(|e| anyhow::anyhow!("Failed to draw UI: {}", e))?;

        if event::poll(std::time::Duration::from_millis(100)).context("Failed to poll events")?
            && let Event::Key(key) = event::read().context("Failed to read event")?
            && key.kind == KeyEventKind::Press
        {
            app.handle_input(key.code);
        }

        if app.reload_requested {
            match load() {
                Ok((report, history)) => app.refresh(report, history),
                Err(e) => {
                    app.reload_requested = false;
                    app.status = format!("Reload failed: {e:#}");
                }
            }
        }

        if app.should_quit {
            break;
        }
    }

    Ok(())
}

/// Render the UI
fn ui(frame: &mut Frame, app: &BoardApp) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Title
            Constraint::Length(3), // Progress gauge
            Constraint::Min(8),    // Content
            Constraint::Length(3), // Status bar
        ])
        .split(frame.area());

    let title = Paragraph::new(vec![Line::from(vec![
        Span::styled(
            format!("{} ", app.report.entity_id),
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(
            app.report.title.as_str(),
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw(format!("  ({})", app.report.workflow_type)),
    ])])
    .block(Block::default().borders(Borders::ALL));
    frame.render_widget(title, chunks[0]);

    let gauge = Gauge::default()
        .block(Block::default().borders(Borders::ALL).title("Overall progress"))
        .gauge_style(Style::default().fg(Color::Green))
        .percent(u16::from(app.report.overall_progress));
    frame.render_widget(gauge, chunks[1]);

    match app.view_mode {
        ViewMode::Phases => render_phase_table(frame, app, chunks[2]),
        ViewMode::History => render_history(frame, app, chunks[2]),
        ViewMode::Help => render_help_view(frame, chunks[2]),
    }

    let status = Paragraph::new(app.status.as_str())
        .style(Style::default().fg(Color::Green))
        .block(Block::default().borders(Borders::ALL).title("Status"));
    frame.render_widget(status, chunks[3]);
}

fn status_color(status: PhaseStatus) -> Color {
    match status {
        PhaseStatus::Completed | PhaseStatus::Approved => Color::Green,
        PhaseStatus::InProgress => Color::Yellow,
        PhaseStatus::ReviewPending => Color::Magenta,
        PhaseStatus::OnHold | PhaseStatus::Blocked => Color::Red,
        _ => Color::DarkGray,
    }
}

/// Render the phase table
fn render_phase_table(frame: &mut Frame, app: &BoardApp, area: Rect) {
    let current = &app.report.current_phase_display;
    let rows: Vec<Row> = app
        .report
        .phases
        .iter()
        .map(|p| {
            let gate = match (p.gate_review_required, p.gate_decision) {
                (false, _) => "-".to_string(),
                (true, Some(decision)) => decision.to_string(),
                (true, None) => "not_started".to_string(),
            };
            let row = Row::new(vec![
                Cell::from(p.sequence.to_string()),
                Cell::from(p.name.clone()),
                Cell::from(p.status.to_string()).style(Style::default().fg(status_color(p.status))),
                Cell::from(gate),
                Cell::from(format!("{}%", p.completion_percentage)),
                Cell::from(p.assigned_to.clone().unwrap_or_default()),
            ]);
            if &p.phase_id == current && !app.report.is_complete {
                row.style(Style::default().add_modifier(Modifier::BOLD))
            } else {
                row
            }
        })
        .collect();

    let table = Table::new(
        rows,
        [
            Constraint::Length(3),
            Constraint::Min(20),
            Constraint::Length(15),
            Constraint::Length(12),
            Constraint::Length(6),
            Constraint::Length(16),
        ],
    )
    .header(
        Row::new(vec!["#", "Phase", "Status", "Gate", "Done", "Assignee"])
            .style(Style::default().add_modifier(Modifier::BOLD)),
    )
    .block(Block::default().borders(Borders::ALL).title("Phases"));
    frame.render_widget(table, area);
}

/// Render the transition history
fn render_history(frame: &mut Frame, app: &BoardApp, area: Rect) {
    let lines: Vec<Line> = if app.history.is_empty() {
        vec![Line::from("No transitions yet.")]
    } else {
        app.history
            .iter()
            .map(|h| {
                let from = h.from_phase_id.as_ref().map_or("-", |p| p.as_str());
                Line::from(format!(
                    "{}  {} -> {}  by {}{}",
                    h.timestamp.format("%Y-%m-%d %H:%M"),
                    from,
                    h.to_phase_id,
                    h.transitioned_by,
                    h.comments
                        .as_deref()
                        .map(|c| format!("  \"{c}\""))
                        .unwrap_or_default()
                ))
            })
            .collect()
    };

    let history = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title("History"))
        .wrap(Wrap { trim: false });
    frame.render_widget(history, area);
}

/// Render the help view
fn render_help_view(frame: &mut Frame, area: Rect) {
    let help_text = vec![
        Line::from(""),
        Line::from(vec![Span::styled(
            "Keyboard Shortcuts:",
            Style::default().add_modifier(Modifier::BOLD),
        )]),
        Line::from(""),
        Line::from("  q          - Quit the board"),
        Line::from("  t          - Toggle phases / history"),
        Line::from("  r          - Reload from disk"),
        Line::from("  ?          - Show this help screen"),
        Line::from("  Esc        - Return to phase view"),
        Line::from(""),
        Line::from("The board is read-only; use the advance and review commands to change state."),
    ];

    let help = Paragraph::new(help_text)
        .block(Block::default().borders(Borders::ALL).title("Help"))
        .wrap(Wrap { trim: false });
    frame.render_widget(help, area);
}
