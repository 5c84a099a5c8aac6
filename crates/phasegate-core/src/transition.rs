//! Transition execution.
//!
//! Pure functions that validate a requested change against the catalog and
//! return an updated copy of the parent entity. The input entity is never
//! mutated; callers persist the returned copy in a single save so a rejected
//! or failed change leaves nothing behind.

use crate::catalog::{PhaseCatalog, PhaseId};
use crate::error::{PhasegateError, Result};
use crate::gate;
use crate::history::TransitionHistoryEntry;
use crate::state::{GateReview, ParentEntity, PhaseInstance, PhaseStatus, ReviewDecision};
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// A requested move to the next phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionRequest {
    /// Phase to enter.
    pub target: PhaseId,

    /// User performing the transition.
    pub acting_user: String,

    /// Optional remarks stored in the history entry.
    pub comments: Option<String>,
}

impl TransitionRequest {
    /// Creates a request without comments.
    pub fn new(target: impl Into<PhaseId>, acting_user: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            acting_user: acting_user.into(),
            comments: None,
        }
    }

    /// Attaches comments.
    #[must_use]
    pub fn with_comments(mut self, comments: impl Into<String>) -> Self {
        self.comments = Some(comments.into());
        self
    }
}

/// Result of a successful transition, with what notifications need.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransitionResult {
    /// Entity after the transition.
    pub entity: ParentEntity,

    /// Phase that was closed.
    pub from_phase: PhaseId,

    /// Phase that became active.
    pub to_phase: PhaseId,

    /// Acting user.
    pub acting_user: String,

    /// When the transition happened.
    pub timestamp: DateTime<Utc>,

    /// History entry appended by the transition.
    pub history_entry: TransitionHistoryEntry,
}

/// Outcome of a transition request that did not fail.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TransitionOutcome {
    /// The entity moved to the target phase.
    Transitioned(Box<TransitionResult>),

    /// Target is already current or already closed; nothing changed.
    AlreadyInPhase {
        /// The requested phase.
        phase_id: PhaseId,
    },
}

impl TransitionOutcome {
    /// Whether the request changed state.
    pub fn is_transitioned(&self) -> bool {
        matches!(self, TransitionOutcome::Transitioned(_))
    }

    /// The transition result, when state changed.
    pub fn result(&self) -> Option<&TransitionResult> {
        match self {
            TransitionOutcome::Transitioned(result) => Some(result),
            TransitionOutcome::AlreadyInPhase { .. } => None,
        }
    }
}

/// Validates `request` and returns the outcome with an updated entity copy.
///
/// Checks run in this order: unknown target, idempotent no-op, finished
/// workflow, non-successor target, suspended current phase, gate.
///
/// # Errors
///
/// - `PhasegateError::UnknownPhase` if the target is not in the catalog
/// - `PhasegateError::InvalidTransition` for anything but the immediate successor
/// - `PhasegateError::GateBlocked` if the current phase's gate is closed
pub fn apply_transition(
    catalog: &PhaseCatalog,
    entity: &ParentEntity,
    request: &TransitionRequest,
    now: DateTime<Utc>,
) -> Result<TransitionOutcome> {
    entity.check_against(catalog)?;
    let target = catalog.require(request.target.as_str())?;

    let already = || TransitionOutcome::AlreadyInPhase {
        phase_id: target.id.clone(),
    };

    if entity
        .phase(target.id.as_str())
        .is_some_and(|p| p.status.is_terminal())
    {
        return Ok(already());
    }

    let Some(current_id) = crate::progress::current_phase_id(catalog, entity) else {
        return Err(PhasegateError::InvalidTransition(format!(
            "{} has completed its workflow",
            entity.id
        )));
    };

    if current_id == target.id {
        return Ok(already());
    }

    let current = catalog.require(current_id.as_str())?;
    match catalog.next(current.id.as_str()) {
        Some(next) if next.id == target.id => {}
        Some(next) => {
            return Err(PhasegateError::InvalidTransition(format!(
                "cannot move from {} to {}: only {} may follow {}",
                current.name, target.name, next.name, current.name
            )));
        }
        None => {
            return Err(PhasegateError::InvalidTransition(format!(
                "cannot move from {} to {}: {} is the final phase",
                current.name, target.name, current.name
            )));
        }
    }

    let current_status = entity
        .phase(current.id.as_str())
        .map_or(PhaseStatus::NotStarted, |p| p.status);
    match current_status {
        PhaseStatus::OnHold => {
            return Err(PhasegateError::gate_blocked(
                target.id.as_str(),
                format!("{} is on hold", current.name),
            ));
        }
        PhaseStatus::Blocked => {
            return Err(PhasegateError::gate_blocked(
                target.id.as_str(),
                format!("{} is blocked", current.name),
            ));
        }
        PhaseStatus::NotStarted => {
            return Err(PhasegateError::InvalidTransition(format!(
                "{} has not been started",
                current.name
            )));
        }
        _ => {}
    }

    let mut next = entity.clone();

    // Closing the current phase is part of the transition, so an ungated
    // predecessor satisfies its own gate here; a gated one still needs an
    // approved review.
    let leaving = next.phase_or_insert(&current.id);
    leaving.status = PhaseStatus::Completed;
    leaving.end_date = Some(now);
    leaving.completion_percentage = 100;
    leaving.held_from = None;
    let decision = if current.gate_review_required {
        leaving.review_decision()
    } else {
        None
    };

    let gate = gate::can_enter(catalog, &next, target.id.as_str());
    if !gate.allowed {
        return Err(PhasegateError::gate_blocked(target.id.as_str(), gate.reason));
    }

    let entering = next.phase_or_insert(&target.id);
    entering.status = PhaseStatus::InProgress;
    entering.start_date = Some(now);
    entering.end_date = None;

    let entry = TransitionHistoryEntry {
        id: Uuid::new_v4(),
        parent_entity_id: entity.id.clone(),
        from_phase_id: Some(current.id.clone()),
        to_phase_id: target.id.clone(),
        decision,
        comments: request.comments.clone(),
        transitioned_by: request.acting_user.clone(),
        timestamp: now,
    };
    next.history.append(entry.clone());
    next.refresh_derived(catalog);

    Ok(TransitionOutcome::Transitioned(Box::new(TransitionResult {
        entity: next,
        from_phase: current.id.clone(),
        to_phase: target.id.clone(),
        acting_user: request.acting_user.clone(),
        timestamp: now,
        history_entry: entry,
    })))
}

/// A gate review to record against a phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateReviewSubmission {
    /// Reviewed phase.
    pub phase_id: PhaseId,

    /// Decision to record.
    pub decision: ReviewDecision,

    /// Reviewer.
    pub reviewer_id: String,

    /// Reviewer remarks.
    pub comments: Option<String>,
}

/// Records a gate review and returns the updated entity copy.
///
/// `Pending` marks the phase ReviewPending. `Approved` and `Rejected` leave
/// the status alone: an approved phase is closed by the next transition and a
/// rejected one stays open for rework.
///
/// # Errors
///
/// - `PhasegateError::UnknownPhase` if the phase is not in the catalog
/// - `PhasegateError::InvalidTransition` if the phase is ungated, not open,
///   or the decision is `NotStarted`
pub fn apply_gate_review(
    catalog: &PhaseCatalog,
    entity: &ParentEntity,
    submission: &GateReviewSubmission,
    now: DateTime<Utc>,
) -> Result<ParentEntity> {
    entity.check_against(catalog)?;
    let def = catalog.require(submission.phase_id.as_str())?;

    if !def.gate_review_required {
        return Err(PhasegateError::InvalidTransition(format!(
            "{} does not require a gate review",
            def.name
        )));
    }
    if submission.decision == ReviewDecision::NotStarted {
        return Err(PhasegateError::InvalidTransition(
            "a gate review cannot be reset to not_started".to_string(),
        ));
    }

    let status = entity
        .phase(def.id.as_str())
        .map_or(PhaseStatus::NotStarted, |p| p.status);
    if !status.is_active() {
        return Err(PhasegateError::InvalidTransition(format!(
            "{} is not open for review (status {})",
            def.name, status
        )));
    }

    let mut next = entity.clone();
    let instance = next.phase_or_insert(&def.id);
    instance.gate_review = Some(GateReview {
        decision: submission.decision,
        completed_date: Some(now),
        comments: submission.comments.clone(),
        reviewer_id: Some(submission.reviewer_id.clone()),
    });
    if submission.decision == ReviewDecision::Pending {
        instance.status = PhaseStatus::ReviewPending;
    }
    next.refresh_derived(catalog);
    Ok(next)
}

/// Administrative suspension kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Suspension {
    /// Pause the phase.
    Hold,

    /// Mark the phase blocked.
    Block,
}

impl Suspension {
    fn status(self) -> PhaseStatus {
        match self {
            Suspension::Hold => PhaseStatus::OnHold,
            Suspension::Block => PhaseStatus::Blocked,
        }
    }
}

/// Puts an active phase on hold or blocks it, remembering its status.
///
/// # Errors
///
/// Returns `PhasegateError::InvalidTransition` unless the phase is
/// InProgress or ReviewPending.
pub fn apply_suspension(
    catalog: &PhaseCatalog,
    entity: &ParentEntity,
    phase_id: &str,
    suspension: Suspension,
) -> Result<ParentEntity> {
    let def = catalog.require(phase_id)?;
    update_instance(catalog, entity, &def.id, |instance| {
        if !instance.status.is_active() {
            return Err(PhasegateError::InvalidTransition(format!(
                "{} cannot be suspended from status {}",
                def.name, instance.status
            )));
        }
        instance.held_from = Some(instance.status);
        instance.status = suspension.status();
        Ok(())
    })
}

/// Releases an OnHold/Blocked phase back to the status it had.
///
/// # Errors
///
/// Returns `PhasegateError::InvalidTransition` if the phase is not suspended.
pub fn apply_release(
    catalog: &PhaseCatalog,
    entity: &ParentEntity,
    phase_id: &str,
) -> Result<ParentEntity> {
    let def = catalog.require(phase_id)?;
    update_instance(catalog, entity, &def.id, |instance| {
        if !instance.status.is_suspended() {
            return Err(PhasegateError::InvalidTransition(format!(
                "{} is not on hold or blocked",
                def.name
            )));
        }
        instance.status = instance.held_from.take().unwrap_or(PhaseStatus::InProgress);
        Ok(())
    })
}

/// Assigns a phase to a user.
pub fn apply_assignment(
    catalog: &PhaseCatalog,
    entity: &ParentEntity,
    phase_id: &str,
    user: &str,
) -> Result<ParentEntity> {
    let def = catalog.require(phase_id)?;
    update_instance(catalog, entity, &def.id, |instance| {
        instance.assigned_to = Some(user.to_string());
        Ok(())
    })
}

/// Stores a per-phase completion percentage.
///
/// # Errors
///
/// Returns `PhasegateError::InvalidCompletion` above 100.
pub fn apply_completion(
    catalog: &PhaseCatalog,
    entity: &ParentEntity,
    phase_id: &str,
    percentage: u8,
) -> Result<ParentEntity> {
    if percentage > 100 {
        return Err(PhasegateError::InvalidCompletion(percentage));
    }
    let def = catalog.require(phase_id)?;
    update_instance(catalog, entity, &def.id, |instance| {
        instance.completion_percentage = percentage;
        Ok(())
    })
}

/// Closes the final phase, finishing the workflow.
///
/// The final phase has no successor, so it is closed explicitly once its own
/// gate (if any) is approved. No history entry is written since no phase is
/// entered.
///
/// # Errors
///
/// - `PhasegateError::InvalidTransition` if the final phase is not current
/// - `PhasegateError::GateBlocked` if its gate review is not approved
pub fn apply_close_out(
    catalog: &PhaseCatalog,
    entity: &ParentEntity,
    now: DateTime<Utc>,
) -> Result<ParentEntity> {
    entity.check_against(catalog)?;
    let last = catalog.last();
    let instance = entity.phase(last.id.as_str());
    let status = instance.map_or(PhaseStatus::NotStarted, |p| p.status);

    if status.is_terminal() {
        return Err(PhasegateError::InvalidTransition(format!(
            "{} has completed its workflow",
            entity.id
        )));
    }
    if !status.is_active() {
        return Err(PhasegateError::InvalidTransition(format!(
            "{} is not the current phase (status {})",
            last.name, status
        )));
    }
    if last.gate_review_required && !instance.is_some_and(PhaseInstance::is_gate_approved) {
        return Err(PhasegateError::gate_blocked(
            last.id.as_str(),
            format!("requires {} gate review approval", last.name),
        ));
    }

    update_instance(catalog, entity, &last.id, |instance| {
        instance.status = PhaseStatus::Completed;
        instance.end_date = Some(now);
        instance.completion_percentage = 100;
        Ok(())
    })
}

fn update_instance<F>(
    catalog: &PhaseCatalog,
    entity: &ParentEntity,
    phase_id: &PhaseId,
    f: F,
) -> Result<ParentEntity>
where
    F: FnOnce(&mut PhaseInstance) -> Result<()>,
{
    entity.check_against(catalog)?;
    let mut next = entity.clone();
    f(next.phase_or_insert(phase_id))?;
    next.refresh_derived(catalog);
    Ok(next)
}
