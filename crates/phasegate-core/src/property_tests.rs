//! Property-based tests for the transition functions.

use crate::catalog::{
    PhaseCatalog, PhaseDefinition, capa_catalog, capa_preventive_catalog, design_control_catalog,
};
use crate::error::PhasegateError;
use crate::gate;
use crate::state::{EntityId, ParentEntity, PhaseStatus, ReviewDecision};
use crate::transition::{
    self, GateReviewSubmission, Suspension, TransitionOutcome, TransitionRequest,
};
use chrono::{Duration, TimeZone, Utc};
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Action {
    Review(ReviewDecision),
    Advance,
    Request(usize),
    Suspend(bool),
    Release,
    CloseOut,
}

fn action_strategy() -> impl Strategy<Value = Action> {
    prop_oneof![
        prop_oneof![
            Just(ReviewDecision::Pending),
            Just(ReviewDecision::Approved),
            Just(ReviewDecision::Rejected),
        ]
        .prop_map(Action::Review),
        Just(Action::Advance),
        (0usize..8).prop_map(Action::Request),
        any::<bool>().prop_map(Action::Suspend),
        Just(Action::Release),
        Just(Action::CloseOut),
    ]
}

fn catalog_strategy() -> impl Strategy<Value = PhaseCatalog> {
    prop_oneof![
        Just(capa_catalog()),
        Just(capa_preventive_catalog()),
        Just(design_control_catalog()),
    ]
}

fn new_entity(catalog: &PhaseCatalog) -> ParentEntity {
    let created = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    ParentEntity::new(EntityId::parse("PROP-1").unwrap(), catalog, "prop", created)
}

/// Applies one action; returns the next entity and whether a transition happened.
fn step(
    catalog: &PhaseCatalog,
    entity: &ParentEntity,
    action: &Action,
    tick: i64,
) -> (ParentEntity, bool) {
    let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::minutes(tick);
    let current = entity.current_phase_id.clone();

    let result = match (action, current) {
        (Action::Review(decision), Some(phase)) => transition::apply_gate_review(
            catalog,
            entity,
            &GateReviewSubmission {
                phase_id: phase,
                decision: *decision,
                reviewer_id: "rev".into(),
                comments: None,
            },
            now,
        )
        .map(|e| (e, false)),
        (Action::Advance, Some(phase)) => match catalog.next(phase.as_str()) {
            Some(next) => apply(catalog, entity, next.id.as_str(), now),
            None => return (entity.clone(), false),
        },
        (Action::Request(idx), _) => match catalog.phases().get(*idx) {
            Some(def) => apply(catalog, entity, def.id.as_str(), now),
            None => return (entity.clone(), false),
        },
        (Action::Suspend(hold), Some(phase)) => {
            let kind = if *hold { Suspension::Hold } else { Suspension::Block };
            transition::apply_suspension(catalog, entity, phase.as_str(), kind).map(|e| (e, false))
        }
        (Action::Release, Some(phase)) => {
            transition::apply_release(catalog, entity, phase.as_str()).map(|e| (e, false))
        }
        (Action::CloseOut, _) => {
            transition::apply_close_out(catalog, entity, now).map(|e| (e, false))
        }
        (_, None) => return (entity.clone(), false),
    };

    result.unwrap_or_else(|_| (entity.clone(), false))
}

fn apply(
    catalog: &PhaseCatalog,
    entity: &ParentEntity,
    target: &str,
    now: chrono::DateTime<Utc>,
) -> crate::error::Result<(ParentEntity, bool)> {
    let request = TransitionRequest::new(target, "user");
    match transition::apply_transition(catalog, entity, &request, now)? {
        TransitionOutcome::Transitioned(result) => Ok((result.entity, true)),
        TransitionOutcome::AlreadyInPhase { .. } => Ok((entity.clone(), false)),
    }
}

/// Gate rule stated directly over stored state, independent of `gate`.
fn expected_gate(catalog: &PhaseCatalog, entity: &ParentEntity, def: &PhaseDefinition) -> bool {
    let closed = |status: PhaseStatus| {
        matches!(status, PhaseStatus::Completed | PhaseStatus::Approved)
    };

    if def.sequence == 1 {
        return true;
    }
    if entity.phase(def.id.as_str()).is_some_and(|p| closed(p.status)) {
        return true;
    }

    let Some(pred) = catalog.by_sequence(def.sequence - 1) else {
        return false;
    };
    match entity.phase(pred.id.as_str()) {
        None => false,
        Some(instance) if pred.gate_review_required => instance
            .gate_review
            .as_ref()
            .is_some_and(|review| review.decision == ReviewDecision::Approved),
        Some(instance) => closed(instance.status),
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn prop_progress_never_decreases(
        catalog in catalog_strategy(),
        actions in prop::collection::vec(action_strategy(), 0..40)
    ) {
        let mut entity = new_entity(&catalog);
        for (tick, action) in actions.iter().enumerate() {
            let (next, _) = step(&catalog, &entity, action, tick as i64);
            prop_assert!(next.overall_progress >= entity.overall_progress);
            prop_assert!(next.overall_progress <= 100);
            entity = next;
        }
    }

    #[test]
    fn prop_history_grows_by_one_per_transition(
        catalog in catalog_strategy(),
        actions in prop::collection::vec(action_strategy(), 0..40)
    ) {
        let mut entity = new_entity(&catalog);
        for (tick, action) in actions.iter().enumerate() {
            let (next, transitioned) = step(&catalog, &entity, action, tick as i64);
            let expected = entity.history.len() + usize::from(transitioned);
            prop_assert_eq!(next.history.len(), expected);
            // Existing entries are never rewritten or reordered.
            prop_assert_eq!(&next.history.entries()[..entity.history.len()], entity.history.entries());
            entity = next;
        }
    }

    #[test]
    fn prop_skipping_a_phase_is_invalid(
        catalog in catalog_strategy(),
        actions in prop::collection::vec(action_strategy(), 0..30)
    ) {
        let mut entity = new_entity(&catalog);
        for (tick, action) in actions.iter().enumerate() {
            entity = step(&catalog, &entity, action, tick as i64).0;
        }

        if let Some(current) = entity.current_phase_id.clone() {
            let seq = catalog.sequence_of(current.as_str()).unwrap();
            if let Some(skip) = catalog.by_sequence(seq + 2) {
                let request = TransitionRequest::new(skip.id.clone(), "user");
                let result = transition::apply_transition(&catalog, &entity, &request, Utc::now());
                let is_invalid = matches!(result, Err(PhasegateError::InvalidTransition(_)));
                prop_assert!(is_invalid);
            }
        }
    }

    #[test]
    fn prop_gate_matches_predecessor_rule(
        catalog in catalog_strategy(),
        actions in prop::collection::vec(action_strategy(), 0..30),
        dropped in prop::option::of(0usize..6)
    ) {
        let mut entity = new_entity(&catalog);
        for (tick, action) in actions.iter().enumerate() {
            entity = step(&catalog, &entity, action, tick as i64).0;
        }

        // Stored entities may lack an instance; the gate must stay shut behind it.
        if let Some(def) = dropped.and_then(|idx| catalog.phases().get(idx)) {
            entity.phases.retain(|p| p.phase_id != def.id);
        }

        for def in catalog.phases() {
            let decision = gate::can_enter(&catalog, &entity, def.id.as_str());
            prop_assert_eq!(
                decision.allowed,
                expected_gate(&catalog, &entity, def),
                "phase {} reason {}",
                def.id.as_str(),
                decision.reason
            );
        }
    }
}
