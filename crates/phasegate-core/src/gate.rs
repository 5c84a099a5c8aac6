//! Gate evaluation.
//!
//! Pure functions deciding whether a phase may become active. Gates are
//! strictly linear: phase `k` opens only when phase `k-1` has an approved
//! gate review (gated predecessor) or is completed (ungated predecessor).

use crate::catalog::{PhaseCatalog, PhaseDefinition};
use crate::state::{ParentEntity, PhaseInstance};
use serde::Serialize;

/// Reason reported for the entry phase.
pub const ENTRY_PHASE_REASON: &str = "entry phase - always accessible";

/// Reason reported for ids outside the catalog.
pub const UNKNOWN_PHASE_REASON: &str = "Unknown phase";

/// Result of a gate check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GateDecision {
    /// Whether the phase may be entered.
    pub allowed: bool,

    /// Human-readable explanation, present for both outcomes.
    pub reason: String,
}

impl GateDecision {
    /// Open gate.
    pub fn open(reason: impl Into<String>) -> Self {
        Self {
            allowed: true,
            reason: reason.into(),
        }
    }

    /// Closed gate.
    pub fn closed(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason: reason.into(),
        }
    }
}

/// Decides whether `phase_id` may be entered for `entity`.
///
/// Phases that are already closed report `allowed = true` so read paths stay
/// idempotent; the executor turns attempts to re-enter them into a no-op.
pub fn can_enter(catalog: &PhaseCatalog, entity: &ParentEntity, phase_id: &str) -> GateDecision {
    let Some(target) = catalog.get(phase_id) else {
        return GateDecision::closed(UNKNOWN_PHASE_REASON);
    };

    if target.sequence == 1 {
        return GateDecision::open(ENTRY_PHASE_REASON);
    }

    if entity
        .phase(phase_id)
        .is_some_and(|instance| instance.status.is_terminal())
    {
        return GateDecision::open(format!("{} already closed", target.name));
    }

    let Some(predecessor) = catalog.by_sequence(target.sequence - 1) else {
        return GateDecision::closed(UNKNOWN_PHASE_REASON);
    };

    predecessor_gate(predecessor, entity.phase(predecessor.id.as_str()))
}

/// Evaluates the gate a predecessor phase imposes on its successor.
///
/// A gated predecessor is judged by its review decision only, not its
/// status. The predecessor is closed by the transition that leaves it, so
/// until then a read reports `allowed` for a phase whose predecessor is
/// approved but still InProgress or ReviewPending. An ungated predecessor has
/// no review and must already be Completed or Approved.
pub fn predecessor_gate(
    predecessor: &PhaseDefinition,
    instance: Option<&PhaseInstance>,
) -> GateDecision {
    if predecessor.gate_review_required {
        match instance {
            Some(instance) if instance.is_gate_approved() => GateDecision::open(format!(
                "{} gate review approved",
                predecessor.name
            )),
            _ => GateDecision::closed(format!(
                "requires {} gate review approval",
                predecessor.name
            )),
        }
    } else {
        match instance {
            Some(instance) if instance.status.is_terminal() => {
                GateDecision::open(format!("{} completed", predecessor.name))
            }
            _ => GateDecision::closed(format!("requires {} to be completed", predecessor.name)),
        }
    }
}
