//! Workflow engine facade.
//!
//! `WorkflowEngine` ties the catalogs, the pure transition functions and a
//! [`WorkflowStore`] together. Writers on one entity are serialized through a
//! per-entity lock and every save is a version compare-and-swap, so two
//! concurrent transitions can never both advance the same phase.

use crate::catalog::{CatalogRegistry, PhaseCatalog, PhaseId, WorkflowType};
use crate::config::PhasegateConfig;
use crate::error::{PhasegateError, Result};
use crate::gate::{self, GateDecision};
use crate::history::TransitionHistoryEntry;
use crate::progress::{self, ProgressReport};
use crate::state::{EntityId, ParentEntity, PhaseInstance, ReviewDecision};
use crate::store::WorkflowStore;
use crate::transition::{
    self, GateReviewSubmission, Suspension, TransitionOutcome, TransitionRequest,
};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

/// Operations exposed to API callers.
///
/// Defines the surface a route layer wraps. This trait allows alternative
/// engines and facilitates testing of callers.
pub trait PhaseWorkflow {
    /// Moves an entity to the immediate successor of its current phase.
    fn transition(
        &self,
        entity_id: &EntityId,
        target_phase_id: &str,
        acting_user_id: &str,
        comments: Option<&str>,
    ) -> Result<TransitionOutcome>;

    /// Records a gate review decision against a phase.
    fn submit_gate_review(
        &self,
        entity_id: &EntityId,
        phase_id: &str,
        decision: ReviewDecision,
        reviewer_id: &str,
        comments: Option<&str>,
    ) -> Result<PhaseInstance>;

    /// Aggregate progress of an entity.
    fn get_progress(&self, entity_id: &EntityId) -> Result<ProgressReport>;

    /// Transition history of an entity in chronological order.
    fn get_history(&self, entity_id: &EntityId) -> Result<Vec<TransitionHistoryEntry>>;
}

/// Phase-gated workflow engine.
///
/// # Examples
///
/// ```
/// use phasegate_core::{EntityId, MemoryStore, PhaseWorkflow, ReviewDecision, WorkflowEngine, WorkflowType};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let engine = WorkflowEngine::with_builtin_catalogs(MemoryStore::new());
/// let id = EntityId::parse("CAPA-001")?;
/// engine.create_entity(&id, WorkflowType::Capa, "Label misprint")?;
///
/// engine.submit_gate_review(&id, "CORRECTION", ReviewDecision::Approved, "qa-lead", None)?;
/// let outcome = engine.transition(&id, "ROOT_CAUSE_ANALYSIS", "engineer", None)?;
/// assert!(outcome.is_transitioned());
/// assert_eq!(engine.get_progress(&id)?.overall_progress, 25);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct WorkflowEngine<S> {
    store: S,
    catalogs: CatalogRegistry,
    locks: Mutex<HashMap<EntityId, Arc<Mutex<()>>>>,
}

impl<S: WorkflowStore> WorkflowEngine<S> {
    /// Creates an engine over `store` with the given catalogs.
    pub fn new(store: S, catalogs: CatalogRegistry) -> Self {
        Self {
            store,
            catalogs,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Creates an engine with the built-in CAPA and design-control catalogs.
    pub fn with_builtin_catalogs(store: S) -> Self {
        Self::new(store, CatalogRegistry::builtin())
    }

    /// Creates an engine whose catalogs follow `config`.
    pub fn from_config(store: S, config: &PhasegateConfig) -> Self {
        Self::new(store, config.catalog_registry())
    }

    /// Underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Catalog registry.
    pub fn catalogs(&self) -> &CatalogRegistry {
        &self.catalogs
    }

    /// Catalog for `workflow_type`.
    ///
    /// # Errors
    ///
    /// Returns `PhasegateError::UnknownWorkflowType` if none is registered.
    pub fn get_catalog(&self, workflow_type: WorkflowType) -> Result<&PhaseCatalog> {
        self.catalogs.get_catalog(workflow_type)
    }

    /// Creates a new parent entity with its phase instances.
    ///
    /// # Errors
    ///
    /// Returns `PhasegateError::UnknownWorkflowType` if the type has no
    /// catalog, or `PhasegateError::EntityAlreadyExists`.
    #[tracing::instrument(skip(self), fields(entity = %id))]
    pub fn create_entity(
        &self,
        id: &EntityId,
        workflow_type: WorkflowType,
        title: &str,
    ) -> Result<ParentEntity> {
        let catalog = self.catalogs.get_catalog(workflow_type)?;
        let entity = ParentEntity::new(id.clone(), catalog, title, Utc::now());
        self.store.create(&entity)?;
        tracing::info!(
            workflow = %workflow_type,
            phases = catalog.len(),
            "entity created"
        );
        Ok(entity)
    }

    /// Loads an entity snapshot.
    pub fn load(&self, id: &EntityId) -> Result<ParentEntity> {
        self.store.load(id)
    }

    /// Gate check for display purposes; takes no lock.
    pub fn can_enter(&self, id: &EntityId, phase_id: &str) -> Result<GateDecision> {
        let (catalog, entity) = self.snapshot(id)?;
        Ok(gate::can_enter(catalog, &entity, phase_id))
    }

    /// Transition with a prepared request.
    #[tracing::instrument(skip(self, request), fields(entity = %id, target = %request.target))]
    pub fn transition_with(
        &self,
        id: &EntityId,
        request: &TransitionRequest,
    ) -> Result<TransitionOutcome> {
        self.with_entity_lock(id, || {
            let (catalog, entity) = self.snapshot(id)?;
            let outcome =
                match transition::apply_transition(catalog, &entity, request, Utc::now()) {
                    Ok(outcome) => outcome,
                    Err(e) => {
                        if let PhasegateError::GateBlocked { reason, .. } = &e {
                            tracing::warn!(reason = %reason, "transition blocked by gate");
                        }
                        return Err(e);
                    }
                };

            match outcome {
                TransitionOutcome::Transitioned(result) => {
                    let mut result = *result;
                    result.entity = self.commit(&entity, result.entity)?;
                    tracing::info!(
                        from = %result.from_phase,
                        to = %result.to_phase,
                        user = %result.acting_user,
                        progress = result.entity.overall_progress,
                        "phase transition applied"
                    );
                    Ok(TransitionOutcome::Transitioned(Box::new(result)))
                }
                already @ TransitionOutcome::AlreadyInPhase { .. } => {
                    tracing::debug!("transition target already reached, nothing to do");
                    Ok(already)
                }
            }
        })
    }

    /// Closes the final phase once its gate allows it.
    #[tracing::instrument(skip(self), fields(entity = %id))]
    pub fn close_out(&self, id: &EntityId) -> Result<ParentEntity> {
        self.mutate(id, |catalog, entity| {
            transition::apply_close_out(catalog, entity, Utc::now())
        })
        .inspect(|_| tracing::info!("workflow closed out"))
    }

    /// Puts an active phase on hold.
    #[tracing::instrument(skip(self), fields(entity = %id))]
    pub fn hold_phase(&self, id: &EntityId, phase_id: &str, reason: &str) -> Result<PhaseInstance> {
        let entity = self.mutate(id, |catalog, entity| {
            transition::apply_suspension(catalog, entity, phase_id, Suspension::Hold)
        })?;
        tracing::info!(phase = phase_id, reason, "phase put on hold");
        phase_of(&entity, phase_id)
    }

    /// Blocks an active phase.
    #[tracing::instrument(skip(self), fields(entity = %id))]
    pub fn block_phase(&self, id: &EntityId, phase_id: &str, reason: &str) -> Result<PhaseInstance> {
        let entity = self.mutate(id, |catalog, entity| {
            transition::apply_suspension(catalog, entity, phase_id, Suspension::Block)
        })?;
        tracing::info!(phase = phase_id, reason, "phase blocked");
        phase_of(&entity, phase_id)
    }

    /// Returns a held or blocked phase to its previous status.
    #[tracing::instrument(skip(self), fields(entity = %id))]
    pub fn release_phase(&self, id: &EntityId, phase_id: &str) -> Result<PhaseInstance> {
        let entity = self.mutate(id, |catalog, entity| {
            transition::apply_release(catalog, entity, phase_id)
        })?;
        tracing::info!(phase = phase_id, "phase released");
        phase_of(&entity, phase_id)
    }

    /// Assigns a phase to a user.
    #[tracing::instrument(skip(self), fields(entity = %id))]
    pub fn assign_phase(&self, id: &EntityId, phase_id: &str, user: &str) -> Result<PhaseInstance> {
        let entity = self.mutate(id, |catalog, entity| {
            transition::apply_assignment(catalog, entity, phase_id, user)
        })?;
        phase_of(&entity, phase_id)
    }

    /// Stores a per-phase completion percentage.
    #[tracing::instrument(skip(self), fields(entity = %id))]
    pub fn set_completion(
        &self,
        id: &EntityId,
        phase_id: &str,
        percentage: u8,
    ) -> Result<PhaseInstance> {
        let entity = self.mutate(id, |catalog, entity| {
            transition::apply_completion(catalog, entity, phase_id, percentage)
        })?;
        phase_of(&entity, phase_id)
    }

    fn snapshot(&self, id: &EntityId) -> Result<(&PhaseCatalog, ParentEntity)> {
        let entity = self.store.load(id)?;
        let catalog = self.catalogs.get_catalog(entity.workflow_type)?;
        Ok((catalog, entity))
    }

    fn mutate<F>(&self, id: &EntityId, f: F) -> Result<ParentEntity>
    where
        F: FnOnce(&PhaseCatalog, &ParentEntity) -> Result<ParentEntity>,
    {
        self.with_entity_lock(id, || {
            let (catalog, entity) = self.snapshot(id)?;
            let next = f(catalog, &entity)?;
            self.commit(&entity, next)
        })
    }

    /// Bumps the version and saves `next` against the version `loaded` had.
    fn commit(&self, loaded: &ParentEntity, mut next: ParentEntity) -> Result<ParentEntity> {
        next.version = loaded.version + 1;
        if let Err(e) = self.store.save(&next, loaded.version) {
            if matches!(e, PhasegateError::ConcurrentModification { .. }) {
                tracing::warn!(entity = %loaded.id, error = %e, "save rejected");
            }
            return Err(e);
        }
        Ok(next)
    }

    fn with_entity_lock<T>(&self, id: &EntityId, f: impl FnOnce() -> Result<T>) -> Result<T> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(locks.entry(id.clone()).or_default())
        };
        let result = {
            let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
            f()
        };

        // The map and this call hold the only references: nobody else is
        // waiting, so the entry can go.
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        if Arc::strong_count(&lock) == 2
            && locks.get(id).is_some_and(|held| Arc::ptr_eq(held, &lock))
        {
            locks.remove(id);
        }
        // Release our reference before the map so the next check sees it gone.
        drop(lock);
        drop(locks);
        result
    }
}

fn phase_of(entity: &ParentEntity, phase_id: &str) -> Result<PhaseInstance> {
    entity
        .phase(phase_id)
        .cloned()
        .ok_or_else(|| PhasegateError::UnknownPhase(phase_id.to_string()))
}

impl<S: WorkflowStore> PhaseWorkflow for WorkflowEngine<S> {
    fn transition(
        &self,
        entity_id: &EntityId,
        target_phase_id: &str,
        acting_user_id: &str,
        comments: Option<&str>,
    ) -> Result<TransitionOutcome> {
        let mut request = TransitionRequest::new(PhaseId::new(target_phase_id), acting_user_id);
        request.comments = comments.map(str::to_string);
        self.transition_with(entity_id, &request)
    }

    #[tracing::instrument(skip(self, comments), fields(entity = %entity_id))]
    fn submit_gate_review(
        &self,
        entity_id: &EntityId,
        phase_id: &str,
        decision: ReviewDecision,
        reviewer_id: &str,
        comments: Option<&str>,
    ) -> Result<PhaseInstance> {
        let submission = GateReviewSubmission {
            phase_id: PhaseId::new(phase_id),
            decision,
            reviewer_id: reviewer_id.to_string(),
            comments: comments.map(str::to_string),
        };
        let entity = self.mutate(entity_id, |catalog, entity| {
            transition::apply_gate_review(catalog, entity, &submission, Utc::now())
        })?;
        tracing::info!(phase = phase_id, %decision, reviewer = reviewer_id, "gate review recorded");
        phase_of(&entity, phase_id)
    }

    fn get_progress(&self, entity_id: &EntityId) -> Result<ProgressReport> {
        let (catalog, entity) = self.snapshot(entity_id)?;
        Ok(progress::project(catalog, &entity))
    }

    fn get_history(&self, entity_id: &EntityId) -> Result<Vec<TransitionHistoryEntry>> {
        Ok(self.store.load(entity_id)?.history.chronological())
    }
}
