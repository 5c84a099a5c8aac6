//! Context structures for notice rendering.

use serde::Serialize;

/// One phase row for progress notices.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PhaseLine {
    /// Position in the catalog.
    pub sequence: u32,

    /// Display name.
    pub name: String,

    /// Status label.
    pub status: String,

    /// Gate decision label, if a review was recorded.
    pub gate: Option<String>,

    /// Assignee.
    pub assigned_to: Option<String>,
}

/// Data made available to notice templates.
///
/// Values are plain strings so templates do not depend on engine types;
/// callers fill in what the notice needs.
///
/// # Examples
///
/// ```
/// use phasegate_notice::NoticeContext;
///
/// let ctx = NoticeContext::new("DP-7", "Infusion pump v2")
///     .with_phases("PLANNING_URS", "DESIGN_INPUTS")
///     .with_actor("pat");
/// assert_eq!(ctx.to_phase.as_deref(), Some("DESIGN_INPUTS"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NoticeContext {
    /// Entity id.
    pub entity_id: String,

    /// Entity title.
    pub title: String,

    /// Workflow type label.
    pub workflow_type: Option<String>,

    /// Phase that was left.
    pub from_phase: Option<String>,

    /// Phase that was entered.
    pub to_phase: Option<String>,

    /// Phase a review or hold refers to.
    pub phase: Option<String>,

    /// Phase the entity is currently in.
    pub current_phase: Option<String>,

    /// Gate decision label.
    pub decision: Option<String>,

    /// User who acted.
    pub acting_user: Option<String>,

    /// RFC 3339 timestamp.
    pub timestamp: Option<String>,

    /// Free-text remarks.
    pub comments: Option<String>,

    /// Overall progress percentage.
    pub overall_progress: u8,

    /// Per-phase rows.
    pub phases: Vec<PhaseLine>,
}

impl NoticeContext {
    /// Creates a context for an entity.
    #[must_use]
    pub fn new(entity_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            entity_id: entity_id.into(),
            title: title.into(),
            ..Default::default()
        }
    }

    /// Sets the workflow type label.
    #[must_use]
    pub fn with_workflow_type(mut self, workflow_type: impl Into<String>) -> Self {
        self.workflow_type = Some(workflow_type.into());
        self
    }

    /// Sets the phases of a transition.
    #[must_use]
    pub fn with_phases(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.from_phase = Some(from.into());
        self.to_phase = Some(to.into());
        self
    }

    /// Sets the phase a review refers to.
    #[must_use]
    pub fn with_phase(mut self, phase: impl Into<String>) -> Self {
        self.phase = Some(phase.into());
        self
    }

    /// Sets the current phase.
    #[must_use]
    pub fn with_current_phase(mut self, phase: impl Into<String>) -> Self {
        self.current_phase = Some(phase.into());
        self
    }

    /// Sets the gate decision label.
    #[must_use]
    pub fn with_decision(mut self, decision: impl Into<String>) -> Self {
        self.decision = Some(decision.into());
        self
    }

    /// Sets the acting user.
    #[must_use]
    pub fn with_actor(mut self, user: impl Into<String>) -> Self {
        self.acting_user = Some(user.into());
        self
    }

    /// Sets the timestamp.
    #[must_use]
    pub fn with_timestamp(mut self, timestamp: impl Into<String>) -> Self {
        self.timestamp = Some(timestamp.into());
        self
    }

    /// Sets comments; `None` leaves them unset.
    #[must_use]
    pub fn with_comments(mut self, comments: Option<impl Into<String>>) -> Self {
        self.comments = comments.map(Into::into);
        self
    }

    /// Sets overall progress.
    #[must_use]
    pub fn with_progress(mut self, overall_progress: u8) -> Self {
        self.overall_progress = overall_progress;
        self
    }

    /// Sets the per-phase rows.
    #[must_use]
    pub fn with_phase_lines(mut self, phases: Vec<PhaseLine>) -> Self {
        self.phases = phases;
        self
    }
}
