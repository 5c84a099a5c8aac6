//! phasegate core - phase-gated workflow engine for CAPA and design-control
//! projects.
//!
//! A parent entity (a CAPA record or a design-control project) moves through
//! an ordered catalog of up to six phases. Each move goes only to the next
//! phase, and only once the predecessor's gate is satisfied: an approved gate
//! review for gated phases, completion for ungated ones.
//!
//! # Architecture
//!
//! - [`catalog`]: static phase definitions per workflow type
//! - [`state`]: parent entity and per-phase instance state
//! - [`history`]: append-only transition log
//! - [`gate`]: "may this phase be entered?" evaluation
//! - [`transition`]: pure functions producing updated entity copies
//! - [`progress`]: derived current phase and overall progress
//! - [`store`]: persistence collaborators (in-memory and TOML files)
//! - [`engine`]: facade serializing writers and committing versioned saves
//! - [`config`]: `.phasegate/config.toml` loading
//!
//! # Example
//!
//! ```
//! use phasegate_core::{EntityId, MemoryStore, PhaseWorkflow, WorkflowEngine, WorkflowType};
//!
//! # fn main() -> phasegate_core::Result<()> {
//! let engine = WorkflowEngine::with_builtin_catalogs(MemoryStore::new());
//! let id = EntityId::parse("DP-7")?;
//! engine.create_entity(&id, WorkflowType::DesignControl, "Infusion pump v2")?;
//!
//! // Planning & URS is ungated; advancing closes it.
//! engine.transition(&id, "DESIGN_INPUTS", "pat", Some("URS signed"))?;
//!
//! let report = engine.get_progress(&id)?;
//! assert_eq!(report.current_phase_display, "DESIGN_INPUTS");
//! assert_eq!(report.overall_progress, 17);
//! # Ok(())
//! # }
//! ```

pub mod catalog;
pub mod config;
pub mod engine;
pub mod error;
pub mod gate;
pub mod history;
pub mod progress;
pub mod state;
pub mod store;
pub mod transition;

#[cfg(test)]
mod property_tests;

// Re-export core types for convenience
pub use catalog::{CatalogRegistry, MAX_PHASES, PhaseCatalog, PhaseDefinition, PhaseId, WorkflowType};
pub use config::{CapaConfig, EngineConfig, NoticeConfig, PHASEGATE_DIR, PhasegateConfig};
pub use engine::{PhaseWorkflow, WorkflowEngine};
pub use error::{PhasegateError, Result};
pub use gate::GateDecision;
pub use history::{History, TransitionHistoryEntry};
pub use progress::{PhaseProgress, ProgressReport};
pub use state::{EntityId, GateReview, ParentEntity, PhaseInstance, PhaseStatus, ReviewDecision};
pub use store::{MemoryStore, TomlStore, WorkflowStore};
pub use transition::{
    GateReviewSubmission, Suspension, TransitionOutcome, TransitionRequest, TransitionResult,
};
