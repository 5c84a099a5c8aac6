//! Live workflow state for parent entities.
//!
//! This module defines the per-phase status model ([`PhaseInstance`]) and the
//! parent entity that owns one instance per catalog phase plus its transition
//! history. Derived fields on [`ParentEntity`] are recomputed through
//! [`ParentEntity::refresh_derived`] and never set directly.

use crate::catalog::{PhaseCatalog, PhaseId, WorkflowType};
use crate::error::{PhasegateError, Result};
use crate::history::History;
use crate::progress;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Status of one phase for one parent entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseStatus {
    /// Work on the phase has not begun.
    NotStarted,

    /// Phase is the active one.
    InProgress,

    /// Phase has been submitted for its gate review.
    ReviewPending,

    /// Phase was closed by a transition.
    Completed,

    /// Phase was closed and signed off.
    Approved,

    /// Paused by an administrator.
    OnHold,

    /// Blocked by an administrator.
    Blocked,
}

impl PhaseStatus {
    /// Returns the string representation of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            PhaseStatus::NotStarted => "not_started",
            PhaseStatus::InProgress => "in_progress",
            PhaseStatus::ReviewPending => "review_pending",
            PhaseStatus::Completed => "completed",
            PhaseStatus::Approved => "approved",
            PhaseStatus::OnHold => "on_hold",
            PhaseStatus::Blocked => "blocked",
        }
    }

    /// Completed or Approved.
    pub fn is_terminal(&self) -> bool {
        matches!(self, PhaseStatus::Completed | PhaseStatus::Approved)
    }

    /// InProgress or ReviewPending.
    pub fn is_active(&self) -> bool {
        matches!(self, PhaseStatus::InProgress | PhaseStatus::ReviewPending)
    }

    /// OnHold or Blocked.
    pub fn is_suspended(&self) -> bool {
        matches!(self, PhaseStatus::OnHold | PhaseStatus::Blocked)
    }
}

impl fmt::Display for PhaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for PhaseStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "not_started" => Ok(PhaseStatus::NotStarted),
            "in_progress" => Ok(PhaseStatus::InProgress),
            "review_pending" => Ok(PhaseStatus::ReviewPending),
            "completed" => Ok(PhaseStatus::Completed),
            "approved" => Ok(PhaseStatus::Approved),
            "on_hold" => Ok(PhaseStatus::OnHold),
            "blocked" => Ok(PhaseStatus::Blocked),
            _ => Err(format!("invalid phase status: {}", s)),
        }
    }
}

/// Outcome recorded by a gate review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewDecision {
    /// No review has been requested.
    NotStarted,

    /// Review requested, awaiting a decision.
    Pending,

    /// Gate opened.
    Approved,

    /// Gate stays closed; rework continues in place.
    Rejected,
}

impl ReviewDecision {
    /// Returns the string representation of the decision.
    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewDecision::NotStarted => "not_started",
            ReviewDecision::Pending => "pending",
            ReviewDecision::Approved => "approved",
            ReviewDecision::Rejected => "rejected",
        }
    }
}

impl fmt::Display for ReviewDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ReviewDecision {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "not_started" => Ok(ReviewDecision::NotStarted),
            "pending" => Ok(ReviewDecision::Pending),
            "approved" => Ok(ReviewDecision::Approved),
            "rejected" => Ok(ReviewDecision::Rejected),
            _ => Err(format!("invalid review decision: {}", s)),
        }
    }
}

/// Gate review recorded against a phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateReview {
    /// Latest decision.
    pub decision: ReviewDecision,

    /// When the decision was recorded.
    pub completed_date: Option<DateTime<Utc>>,

    /// Reviewer remarks.
    pub comments: Option<String>,

    /// Who recorded the decision.
    pub reviewer_id: Option<String>,
}

/// Live state of one catalog phase for one parent entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseInstance {
    /// Catalog phase this instance tracks.
    pub phase_id: PhaseId,

    /// Current status.
    pub status: PhaseStatus,

    /// Owner of the phase work.
    pub assigned_to: Option<String>,

    /// When the phase became active.
    pub start_date: Option<DateTime<Utc>>,

    /// When the phase was closed.
    pub end_date: Option<DateTime<Utc>>,

    /// Gate review, once one has been submitted.
    pub gate_review: Option<GateReview>,

    /// Stored completion, set by deliverable tracking.
    pub completion_percentage: u8,

    /// Status to restore when an OnHold/Blocked phase is released.
    pub held_from: Option<PhaseStatus>,
}

impl PhaseInstance {
    /// Creates a NotStarted instance.
    pub fn new(phase_id: PhaseId) -> Self {
        Self {
            phase_id,
            status: PhaseStatus::NotStarted,
            assigned_to: None,
            start_date: None,
            end_date: None,
            gate_review: None,
            completion_percentage: 0,
            held_from: None,
        }
    }

    /// Decision of the gate review, if any was recorded.
    pub fn review_decision(&self) -> Option<ReviewDecision> {
        self.gate_review.as_ref().map(|r| r.decision)
    }

    /// Whether the gate review has been approved.
    pub fn is_gate_approved(&self) -> bool {
        self.review_decision() == Some(ReviewDecision::Approved)
    }
}

/// Identifier of a CAPA or design project.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    /// Validates and wraps an entity id.
    ///
    /// Ids double as file names, so they must be 1-64 characters of ASCII
    /// letters, digits, `-` or `_`, starting with a letter or digit.
    ///
    /// # Errors
    ///
    /// Returns `PhasegateError::InvalidEntityId` when the format is wrong.
    pub fn parse(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        if id.is_empty() || id.len() > 64 {
            return Err(PhasegateError::InvalidEntityId(format!(
                "{} (length must be 1-64 characters)",
                id
            )));
        }
        if !id.chars().next().is_some_and(|c| c.is_ascii_alphanumeric()) {
            return Err(PhasegateError::InvalidEntityId(format!(
                "{} (must start with a letter or digit)",
                id
            )));
        }
        if !id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(PhasegateError::InvalidEntityId(format!(
                "{} (only letters, digits, '-' and '_' allowed)",
                id
            )));
        }
        Ok(Self(id))
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for EntityId {
    type Err = PhasegateError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// A CAPA or design-control project moving through its catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParentEntity {
    /// Entity id.
    pub id: EntityId,

    /// Catalog selector.
    pub workflow_type: WorkflowType,

    /// Human-readable title.
    pub title: String,

    /// Creation time.
    pub created_at: DateTime<Utc>,

    /// Incremented by every persisted mutation.
    pub version: u64,

    /// Derived: phase the entity is currently in; `None` once complete.
    pub current_phase_id: Option<PhaseId>,

    /// Derived: rounded percentage of closed phases.
    pub overall_progress: u8,

    /// One instance per catalog phase, in catalog order.
    pub phases: Vec<PhaseInstance>,

    /// Transition log.
    pub history: History,
}

impl ParentEntity {
    /// Creates an entity with its first phase active and the rest NotStarted.
    pub fn new(
        id: EntityId,
        catalog: &PhaseCatalog,
        title: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        let phases = catalog
            .phases()
            .iter()
            .map(|def| {
                let mut instance = PhaseInstance::new(def.id.clone());
                if def.sequence == 1 {
                    instance.status = PhaseStatus::InProgress;
                    instance.start_date = Some(now);
                }
                instance
            })
            .collect();

        let mut entity = Self {
            id,
            workflow_type: catalog.workflow_type(),
            title: title.into(),
            created_at: now,
            version: 0,
            current_phase_id: None,
            overall_progress: 0,
            phases,
            history: History::default(),
        };
        entity.refresh_derived(catalog);
        entity
    }

    /// Instance for `phase_id`, if present.
    pub fn phase(&self, phase_id: &str) -> Option<&PhaseInstance> {
        self.phases.iter().find(|p| p.phase_id == phase_id)
    }

    /// Mutable instance for `phase_id`, if present.
    pub fn phase_mut(&mut self, phase_id: &str) -> Option<&mut PhaseInstance> {
        self.phases.iter_mut().find(|p| p.phase_id == phase_id)
    }

    /// Mutable instance for `phase_id`, creating a NotStarted one if missing.
    pub fn phase_or_insert(&mut self, phase_id: &PhaseId) -> &mut PhaseInstance {
        let idx = match self.phases.iter().position(|p| &p.phase_id == phase_id) {
            Some(idx) => idx,
            None => {
                self.phases.push(PhaseInstance::new(phase_id.clone()));
                self.phases.len() - 1
            }
        };
        &mut self.phases[idx]
    }

    /// Recomputes `current_phase_id` and `overall_progress`.
    pub fn refresh_derived(&mut self, catalog: &PhaseCatalog) {
        self.current_phase_id = progress::current_phase_id(catalog, self);
        self.overall_progress = progress::overall_progress(catalog, self);
    }

    /// Whether the last catalog phase is closed.
    pub fn is_complete(&self, catalog: &PhaseCatalog) -> bool {
        self.phase(catalog.last().id.as_str())
            .is_some_and(|p| p.status.is_terminal())
    }

    /// Checks that the stored instances match `catalog`.
    ///
    /// # Errors
    ///
    /// Returns `PhasegateError::InvalidConfig` when the workflow type differs
    /// or an instance refers to a phase outside the catalog.
    pub fn check_against(&self, catalog: &PhaseCatalog) -> Result<()> {
        if self.workflow_type != catalog.workflow_type() {
            return Err(PhasegateError::InvalidConfig(format!(
                "entity {} is a {} workflow, catalog is {}",
                self.id,
                self.workflow_type,
                catalog.workflow_type()
            )));
        }
        if let Some(stray) = self
            .phases
            .iter()
            .find(|p| catalog.get(p.phase_id.as_str()).is_none())
        {
            return Err(PhasegateError::InvalidConfig(format!(
                "entity {} has phase {} outside its catalog",
                self.id, stray.phase_id
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{capa_catalog, design_control_catalog};

    fn capa() -> ParentEntity {
        ParentEntity::new(
            EntityId::parse("CAPA-001").unwrap(),
            &capa_catalog(),
            "Label misprint",
            Utc::now(),
        )
    }

    #[test]
    fn test_should_start_first_phase() {
        let entity = capa();
        assert_eq!(entity.phases.len(), 4);
        assert_eq!(entity.phases[0].status, PhaseStatus::InProgress);
        assert!(entity.phases[0].start_date.is_some());
        assert!(
            entity.phases[1..]
                .iter()
                .all(|p| p.status == PhaseStatus::NotStarted && p.start_date.is_none())
        );
        assert_eq!(entity.current_phase_id, Some(PhaseId::new("CORRECTION")));
        assert_eq!(entity.overall_progress, 0);
        assert_eq!(entity.version, 0);
        assert!(entity.history.is_empty());
    }

    #[test]
    fn test_phase_lookup() {
        let mut entity = capa();
        assert!(entity.phase("ROOT_CAUSE_ANALYSIS").is_some());
        assert!(entity.phase("TRANSFER").is_none());

        entity.phase_mut("ROOT_CAUSE_ANALYSIS").unwrap().assigned_to = Some("dana".into());
        assert_eq!(
            entity.phase("ROOT_CAUSE_ANALYSIS").unwrap().assigned_to.as_deref(),
            Some("dana")
        );
    }

    #[test]
    fn test_phase_or_insert_keeps_one_instance_per_phase() {
        let mut entity = capa();
        entity.phases.retain(|p| p.phase_id != "CORRECTIVE_ACTION");
        assert_eq!(entity.phases.len(), 3);

        let id = PhaseId::new("CORRECTIVE_ACTION");
        entity.phase_or_insert(&id).assigned_to = Some("lee".into());
        entity.phase_or_insert(&id);
        assert_eq!(entity.phases.len(), 4);
        assert_eq!(
            entity.phases.iter().filter(|p| p.phase_id == id).count(),
            1
        );
    }

    #[test]
    fn test_check_against_catalog() {
        let entity = capa();
        assert!(entity.check_against(&capa_catalog()).is_ok());
        assert!(entity.check_against(&design_control_catalog()).is_err());
    }

    #[test]
    fn test_entity_id_validation() {
        assert!(EntityId::parse("CAPA-2024_07").is_ok());
        assert!(EntityId::parse("").is_err());
        assert!(EntityId::parse("-leading").is_err());
        assert!(EntityId::parse("../escape").is_err());
        assert!(EntityId::parse("a".repeat(65)).is_err());
    }

    #[test]
    fn test_status_round_trip_strings() {
        for status in [
            PhaseStatus::NotStarted,
            PhaseStatus::InProgress,
            PhaseStatus::ReviewPending,
            PhaseStatus::Completed,
            PhaseStatus::Approved,
            PhaseStatus::OnHold,
            PhaseStatus::Blocked,
        ] {
            assert_eq!(status.as_str().parse::<PhaseStatus>(), Ok(status));
        }
        assert!("done".parse::<PhaseStatus>().is_err());
    }

    #[test]
    fn test_parse_review_decision() {
        assert_eq!("Approved".parse::<ReviewDecision>(), Ok(ReviewDecision::Approved));
        assert_eq!("rejected".parse::<ReviewDecision>(), Ok(ReviewDecision::Rejected));
        assert!("maybe".parse::<ReviewDecision>().is_err());
    }
}
