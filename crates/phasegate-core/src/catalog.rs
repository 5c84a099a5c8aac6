//! Phase catalogs for the supported workflow types.
//!
//! A catalog is the fixed, ordered list of phases a parent entity moves
//! through. The `sequence` field of each [`PhaseDefinition`] is the only source
//! of next/previous relationships; nothing outside this module should rely on
//! vector positions.

use crate::error::{PhasegateError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

/// Upper bound on phases per catalog.
pub const MAX_PHASES: usize = 6;

/// Stable string key of a catalog phase (e.g. `ROOT_CAUSE_ANALYSIS`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PhaseId(String);

impl PhaseId {
    /// Creates a phase id from any string-like value.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PhaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PhaseId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for PhaseId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl PartialEq<str> for PhaseId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for PhaseId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// Workflow type tag selecting a catalog.
///
/// Both CAPA variants are distinct types so an entity always resolves to the
/// catalog it was created with, whatever the current configuration says.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowType {
    /// Four-phase CAPA.
    Capa,

    /// Five-phase CAPA including a preventive action phase.
    CapaPreventive,

    /// Six-phase design-control project.
    DesignControl,
}

impl WorkflowType {
    /// Returns the string representation used in storage and on the CLI.
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowType::Capa => "capa",
            WorkflowType::CapaPreventive => "capa_preventive",
            WorkflowType::DesignControl => "design_control",
        }
    }
}

impl fmt::Display for WorkflowType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for WorkflowType {
    type Err = PhasegateError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "capa" => Ok(WorkflowType::Capa),
            "capa_preventive" => Ok(WorkflowType::CapaPreventive),
            "design_control" => Ok(WorkflowType::DesignControl),
            _ => Err(PhasegateError::UnknownWorkflowType(s.to_string())),
        }
    }
}

/// Static definition of one catalog phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseDefinition {
    /// Stable key.
    pub id: PhaseId,

    /// 1-based position in the catalog.
    pub sequence: u32,

    /// Display name.
    pub name: String,

    /// What happens during this phase.
    pub description: String,

    /// Deliverables expected before the phase can close.
    pub required_deliverables: Vec<String>,

    /// Whether leaving this phase needs an approved gate review.
    pub gate_review_required: bool,
}

impl PhaseDefinition {
    /// Creates a definition with no deliverables.
    pub fn new(
        id: impl Into<PhaseId>,
        sequence: u32,
        name: impl Into<String>,
        gate_review_required: bool,
    ) -> Self {
        Self {
            id: id.into(),
            sequence,
            name: name.into(),
            description: String::new(),
            required_deliverables: Vec::new(),
            gate_review_required,
        }
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Sets the required deliverables.
    #[must_use]
    pub fn with_deliverables<I, S>(mut self, deliverables: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required_deliverables = deliverables.into_iter().map(Into::into).collect();
        self
    }
}

/// Ordered, immutable list of phases for one workflow type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PhaseCatalog {
    workflow_type: WorkflowType,
    phases: Vec<PhaseDefinition>,
}

impl PhaseCatalog {
    /// Builds a catalog, rejecting definitions that break the ordering rules.
    ///
    /// # Errors
    ///
    /// Returns `PhasegateError::InvalidCatalog` if the list is empty, longer
    /// than [`MAX_PHASES`], contains duplicate ids, or its sequences are not
    /// exactly `1..=n` in order.
    pub fn new(workflow_type: WorkflowType, phases: Vec<PhaseDefinition>) -> Result<Self> {
        let invalid = |reason: String| PhasegateError::InvalidCatalog {
            workflow: workflow_type.to_string(),
            reason,
        };

        if phases.is_empty() {
            return Err(invalid("catalog has no phases".to_string()));
        }
        if phases.len() > MAX_PHASES {
            return Err(invalid(format!(
                "catalog has {} phases (at most {MAX_PHASES} allowed)",
                phases.len()
            )));
        }

        let mut seen = HashSet::new();
        for (idx, phase) in phases.iter().enumerate() {
            if !seen.insert(phase.id.clone()) {
                return Err(invalid(format!("duplicate phase id {}", phase.id)));
            }
            let expected = idx as u32 + 1;
            if phase.sequence != expected {
                return Err(invalid(format!(
                    "phase {} has sequence {} (expected {expected})",
                    phase.id, phase.sequence
                )));
            }
        }

        Ok(Self {
            workflow_type,
            phases,
        })
    }

    /// Workflow type this catalog belongs to.
    pub fn workflow_type(&self) -> WorkflowType {
        self.workflow_type
    }

    /// All phases in sequence order.
    pub fn phases(&self) -> &[PhaseDefinition] {
        &self.phases
    }

    /// Number of phases.
    pub fn len(&self) -> usize {
        self.phases.len()
    }

    /// Always false for a validated catalog.
    pub fn is_empty(&self) -> bool {
        self.phases.is_empty()
    }

    /// Entry phase (sequence 1).
    pub fn first(&self) -> &PhaseDefinition {
        &self.phases[0]
    }

    /// Final phase.
    pub fn last(&self) -> &PhaseDefinition {
        &self.phases[self.phases.len() - 1]
    }

    /// Looks up a phase by id.
    pub fn get(&self, id: &str) -> Option<&PhaseDefinition> {
        self.phases.iter().find(|p| p.id == id)
    }

    /// Looks up a phase by id, failing with `UnknownPhase`.
    pub fn require(&self, id: &str) -> Result<&PhaseDefinition> {
        self.get(id)
            .ok_or_else(|| PhasegateError::UnknownPhase(id.to_string()))
    }

    /// Looks up a phase by its sequence number.
    pub fn by_sequence(&self, sequence: u32) -> Option<&PhaseDefinition> {
        self.phases.iter().find(|p| p.sequence == sequence)
    }

    /// Phase immediately after `id`, if any.
    pub fn next(&self, id: &str) -> Option<&PhaseDefinition> {
        self.get(id).and_then(|p| self.by_sequence(p.sequence + 1))
    }

    /// Phase immediately before `id`, if any.
    pub fn previous(&self, id: &str) -> Option<&PhaseDefinition> {
        self.get(id)
            .filter(|p| p.sequence > 1)
            .and_then(|p| self.by_sequence(p.sequence - 1))
    }

    /// Sequence number of `id`, if it is part of the catalog.
    pub fn sequence_of(&self, id: &str) -> Option<u32> {
        self.get(id).map(|p| p.sequence)
    }

    /// Phase ids in order.
    pub fn ids(&self) -> impl Iterator<Item = &PhaseId> {
        self.phases.iter().map(|p| &p.id)
    }
}

/// Registry of catalogs keyed by workflow type.
#[derive(Debug, Clone, Default)]
pub struct CatalogRegistry {
    catalogs: HashMap<WorkflowType, PhaseCatalog>,
}

impl CatalogRegistry {
    /// Registry with no catalogs.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Registry holding the built-in CAPA and design-control catalogs.
    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        registry.insert(capa_catalog());
        registry.insert(capa_preventive_catalog());
        registry.insert(design_control_catalog());
        registry
    }

    /// Registers a catalog, replacing any previous one for the same type.
    pub fn insert(&mut self, catalog: PhaseCatalog) {
        self.catalogs.insert(catalog.workflow_type(), catalog);
    }

    /// Returns the catalog for `workflow_type`.
    ///
    /// # Errors
    ///
    /// Returns `PhasegateError::UnknownWorkflowType` if nothing is registered
    /// for the type.
    pub fn get_catalog(&self, workflow_type: WorkflowType) -> Result<&PhaseCatalog> {
        self.catalogs
            .get(&workflow_type)
            .ok_or_else(|| PhasegateError::UnknownWorkflowType(workflow_type.to_string()))
    }

    /// Parses `name` and returns its catalog.
    ///
    /// # Errors
    ///
    /// Returns `PhasegateError::UnknownWorkflowType` for unparseable or
    /// unregistered names.
    pub fn resolve(&self, name: &str) -> Result<&PhaseCatalog> {
        let workflow_type = name.parse::<WorkflowType>()?;
        self.get_catalog(workflow_type)
    }

    /// Registered workflow types.
    pub fn workflow_types(&self) -> Vec<WorkflowType> {
        let mut types: Vec<_> = self.catalogs.keys().copied().collect();
        types.sort_by_key(|t| t.as_str());
        types
    }
}

fn capa_phases(include_preventive_action: bool) -> Vec<PhaseDefinition> {
    let mut phases = vec![
        PhaseDefinition::new("CORRECTION", 1, "Correction", true)
            .with_description("Contain the nonconformance and correct affected product")
            .with_deliverables(["Containment actions", "Affected product disposition"]),
        PhaseDefinition::new("ROOT_CAUSE_ANALYSIS", 2, "Root Cause Analysis", true)
            .with_description("Investigate and document the underlying cause")
            .with_deliverables(["Investigation report", "Root cause statement"]),
        PhaseDefinition::new("CORRECTIVE_ACTION", 3, "Corrective Action", true)
            .with_description("Eliminate the root cause of the detected nonconformance")
            .with_deliverables(["Corrective action plan", "Implementation evidence"]),
    ];

    if include_preventive_action {
        phases.push(
            PhaseDefinition::new("PREVENTIVE_ACTION", 4, "Preventive Action", true)
                .with_description("Prevent occurrence of similar nonconformances elsewhere")
                .with_deliverables(["Preventive action plan", "Risk assessment update"]),
        );
    }

    let sequence = phases.len() as u32 + 1;
    phases.push(
        PhaseDefinition::new(
            "EFFECTIVENESS_VERIFICATION",
            sequence,
            "Effectiveness Verification",
            true,
        )
        .with_description("Confirm the actions were effective and did not introduce new risk")
        .with_deliverables(["Verification criteria", "Effectiveness check results"]),
    );
    phases
}

/// Four-phase CAPA catalog.
pub fn capa_catalog() -> PhaseCatalog {
    PhaseCatalog {
        workflow_type: WorkflowType::Capa,
        phases: capa_phases(false),
    }
}

/// Five-phase CAPA catalog with `PREVENTIVE_ACTION`.
pub fn capa_preventive_catalog() -> PhaseCatalog {
    PhaseCatalog {
        workflow_type: WorkflowType::CapaPreventive,
        phases: capa_phases(true),
    }
}

/// Six-phase design-control catalog. Every phase but the first is gated.
pub fn design_control_catalog() -> PhaseCatalog {
    PhaseCatalog {
        workflow_type: WorkflowType::DesignControl,
        phases: vec![
            PhaseDefinition::new("PLANNING_URS", 1, "Planning & URS", false)
                .with_description("Plan the project and capture user requirements")
                .with_deliverables(["Design and development plan", "User requirements specification"]),
            PhaseDefinition::new("DESIGN_INPUTS", 2, "Design Inputs", true)
                .with_description("Translate user needs into design input requirements")
                .with_deliverables(["Design input requirements", "Risk management plan"]),
            PhaseDefinition::new("DESIGN_OUTPUTS", 3, "Design Outputs", true)
                .with_description("Produce the design outputs that satisfy the inputs")
                .with_deliverables(["Design output documents", "Traceability matrix"]),
            PhaseDefinition::new("VERIFICATION", 4, "Verification", true)
                .with_description("Verify outputs meet inputs")
                .with_deliverables(["Verification protocols", "Verification reports"]),
            PhaseDefinition::new("VALIDATION", 5, "Validation", true)
                .with_description("Validate the device meets user needs and intended uses")
                .with_deliverables(["Validation protocols", "Validation reports"]),
            PhaseDefinition::new("TRANSFER", 6, "Transfer", true)
                .with_description("Transfer the design into production")
                .with_deliverables(["Design transfer plan", "Device master record"]),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_catalogs_pass_validation() {
        for catalog in [capa_catalog(), capa_preventive_catalog(), design_control_catalog()] {
            let rebuilt = PhaseCatalog::new(catalog.workflow_type(), catalog.phases().to_vec());
            assert!(rebuilt.is_ok(), "{} failed validation", catalog.workflow_type());
        }
    }

    #[test]
    fn test_capa_catalog_order() {
        let catalog = capa_catalog();
        let ids: Vec<_> = catalog.ids().map(PhaseId::as_str).collect();
        assert_eq!(
            ids,
            vec![
                "CORRECTION",
                "ROOT_CAUSE_ANALYSIS",
                "CORRECTIVE_ACTION",
                "EFFECTIVENESS_VERIFICATION"
            ]
        );
        assert!(catalog.phases().iter().all(|p| p.gate_review_required));
    }

    #[test]
    fn test_capa_preventive_has_five_phases() {
        let catalog = capa_preventive_catalog();
        assert_eq!(catalog.len(), 5);
        assert_eq!(catalog.sequence_of("PREVENTIVE_ACTION"), Some(4));
        assert_eq!(catalog.last().id, "EFFECTIVENESS_VERIFICATION");
        assert_eq!(catalog.last().sequence, 5);
    }

    #[test]
    fn test_design_control_gates() {
        let catalog = design_control_catalog();
        assert_eq!(catalog.len(), 6);
        assert!(!catalog.first().gate_review_required);
        assert!(catalog.phases()[1..].iter().all(|p| p.gate_review_required));
        assert_eq!(catalog.first().name, "Planning & URS");
    }

    #[test]
    fn test_next_and_previous_follow_sequence() {
        let catalog = design_control_catalog();
        assert_eq!(catalog.next("PLANNING_URS").map(|p| p.id.as_str()), Some("DESIGN_INPUTS"));
        assert!(catalog.next("TRANSFER").is_none());
        assert!(catalog.previous("PLANNING_URS").is_none());
        assert_eq!(catalog.previous("VALIDATION").map(|p| p.id.as_str()), Some("VERIFICATION"));
        assert!(catalog.next("NOPE").is_none());
    }

    #[test]
    fn test_rejects_bad_sequences() {
        let phases = vec![
            PhaseDefinition::new("A", 1, "A", false),
            PhaseDefinition::new("B", 3, "B", true),
        ];
        let err = PhaseCatalog::new(WorkflowType::Capa, phases).unwrap_err();
        assert!(matches!(err, PhasegateError::InvalidCatalog { .. }));
    }

    #[test]
    fn test_rejects_duplicates_and_oversized() {
        let dup = vec![
            PhaseDefinition::new("A", 1, "A", false),
            PhaseDefinition::new("A", 2, "A again", true),
        ];
        assert!(PhaseCatalog::new(WorkflowType::Capa, dup).is_err());

        let many = (1..=7)
            .map(|i| PhaseDefinition::new(format!("P{i}"), i, format!("Phase {i}"), true))
            .collect();
        assert!(PhaseCatalog::new(WorkflowType::Capa, many).is_err());

        assert!(PhaseCatalog::new(WorkflowType::Capa, Vec::new()).is_err());
    }

    #[test]
    fn test_registry_lookup() {
        let registry = CatalogRegistry::builtin();
        assert_eq!(registry.resolve("design-control").unwrap().len(), 6);
        assert_eq!(registry.get_catalog(WorkflowType::Capa).unwrap().len(), 4);
        assert!(matches!(
            registry.resolve("supplier_audit"),
            Err(PhasegateError::UnknownWorkflowType(_))
        ));

        let empty = CatalogRegistry::empty();
        assert!(matches!(
            empty.get_catalog(WorkflowType::Capa),
            Err(PhasegateError::UnknownWorkflowType(_))
        ));
    }

    #[test]
    fn test_parse_workflow_type() {
        assert_eq!("capa".parse::<WorkflowType>().unwrap(), WorkflowType::Capa);
        assert_eq!(
            "CAPA_PREVENTIVE".parse::<WorkflowType>().unwrap(),
            WorkflowType::CapaPreventive
        );
        assert_eq!(format!("{}", WorkflowType::DesignControl), "design_control");
    }
}
