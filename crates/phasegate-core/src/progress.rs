//! Progress projection.
//!
//! Pure aggregation over phase instances. Per-phase percentages are stored on
//! the instances and passed through unchanged; nothing here infers them.

use crate::catalog::{PhaseCatalog, PhaseId, WorkflowType};
use crate::state::{EntityId, ParentEntity, PhaseStatus, ReviewDecision};
use serde::Serialize;

/// `round(100 * closed / catalog_len)`, where closed means Completed or Approved.
pub fn overall_progress(catalog: &PhaseCatalog, entity: &ParentEntity) -> u8 {
    let total = catalog.len();
    if total == 0 {
        return 0;
    }
    let closed = catalog
        .ids()
        .filter(|id| {
            entity
                .phase(id.as_str())
                .is_some_and(|p| p.status.is_terminal())
        })
        .count();
    ((100.0 * closed as f64) / total as f64).round() as u8
}

/// Phase the executor treats as current.
///
/// Highest-sequence phase that is InProgress or ReviewPending; otherwise the
/// lowest-sequence NotStarted phase. `None` once every phase is closed.
/// An OnHold/Blocked phase still counts as current so it keeps its place
/// until released.
pub fn current_phase_id(catalog: &PhaseCatalog, entity: &ParentEntity) -> Option<PhaseId> {
    let status_of = |id: &PhaseId| {
        entity
            .phase(id.as_str())
            .map_or(PhaseStatus::NotStarted, |p| p.status)
    };

    catalog
        .phases()
        .iter()
        .rev()
        .find(|def| {
            let status = status_of(&def.id);
            status.is_active() || status.is_suspended()
        })
        .or_else(|| {
            catalog
                .phases()
                .iter()
                .find(|def| status_of(&def.id) == PhaseStatus::NotStarted)
        })
        .map(|def| def.id.clone())
}

/// Phase to show as "current" in displays.
///
/// Highest-sequence phase that has started but is not closed (suspended
/// phases count). Falls back to the first phase when nothing has started and
/// to the last phase when everything is closed.
pub fn current_phase_display(catalog: &PhaseCatalog, entity: &ParentEntity) -> PhaseId {
    let statuses: Vec<_> = catalog
        .phases()
        .iter()
        .map(|def| {
            (
                def,
                entity
                    .phase(def.id.as_str())
                    .map_or(PhaseStatus::NotStarted, |p| p.status),
            )
        })
        .collect();

    if let Some((def, _)) = statuses
        .iter()
        .rev()
        .find(|(_, status)| !status.is_terminal() && *status != PhaseStatus::NotStarted)
    {
        return def.id.clone();
    }

    if statuses.iter().all(|(_, status)| status.is_terminal()) {
        return catalog.last().id.clone();
    }

    // Nothing active: the next phase waiting to start, or the entry phase.
    statuses
        .iter()
        .find(|(_, status)| *status == PhaseStatus::NotStarted)
        .map_or_else(|| catalog.first().id.clone(), |(def, _)| def.id.clone())
}

/// One row of a [`ProgressReport`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PhaseProgress {
    /// Phase id.
    pub phase_id: PhaseId,

    /// Position in the catalog.
    pub sequence: u32,

    /// Display name.
    pub name: String,

    /// Current status.
    pub status: PhaseStatus,

    /// Gate review decision, if one has been recorded.
    pub gate_decision: Option<ReviewDecision>,

    /// Whether the phase is gated.
    pub gate_review_required: bool,

    /// Stored per-phase completion.
    pub completion_percentage: u8,

    /// Assignee.
    pub assigned_to: Option<String>,
}

/// Aggregate progress snapshot of a parent entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressReport {
    /// Entity id.
    pub entity_id: EntityId,

    /// Workflow type.
    pub workflow_type: WorkflowType,

    /// Entity title.
    pub title: String,

    /// Rounded percentage of closed phases.
    pub overall_progress: u8,

    /// Phase the executor treats as current.
    pub current_phase_id: Option<PhaseId>,

    /// Phase to highlight in displays.
    pub current_phase_display: PhaseId,

    /// Whether the final phase is closed.
    pub is_complete: bool,

    /// Per-phase rows in catalog order.
    pub phases: Vec<PhaseProgress>,
}

/// Builds a [`ProgressReport`] for `entity`.
pub fn project(catalog: &PhaseCatalog, entity: &ParentEntity) -> ProgressReport {
    let phases = catalog
        .phases()
        .iter()
        .map(|def| {
            let instance = entity.phase(def.id.as_str());
            PhaseProgress {
                phase_id: def.id.clone(),
                sequence: def.sequence,
                name: def.name.clone(),
                status: instance.map_or(PhaseStatus::NotStarted, |p| p.status),
                gate_decision: instance.and_then(|p| p.review_decision()),
                gate_review_required: def.gate_review_required,
                completion_percentage: instance.map_or(0, |p| p.completion_percentage),
                assigned_to: instance.and_then(|p| p.assigned_to.clone()),
            }
        })
        .collect();

    ProgressReport {
        entity_id: entity.id.clone(),
        workflow_type: entity.workflow_type,
        title: entity.title.clone(),
        overall_progress: overall_progress(catalog, entity),
        current_phase_id: current_phase_id(catalog, entity),
        current_phase_display: current_phase_display(catalog, entity),
        is_complete: entity.is_complete(catalog),
        phases,
    }
}
