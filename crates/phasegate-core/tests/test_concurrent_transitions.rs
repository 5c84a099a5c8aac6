//! Concurrency tests: writers on one entity are serialized.

use phasegate_core::{
    EntityId, MemoryStore, PhaseWorkflow, ReviewDecision, TransitionOutcome, WorkflowEngine,
    WorkflowType,
};
use std::sync::Barrier;
use std::thread;

const WRITERS: usize = 8;

#[test]
fn test_racing_transitions_apply_once() {
    let engine = WorkflowEngine::with_builtin_catalogs(MemoryStore::new());
    let id = EntityId::parse("CAPA-RACE").unwrap();
    engine.create_entity(&id, WorkflowType::Capa, "race").unwrap();
    engine
        .submit_gate_review(&id, "CORRECTION", ReviewDecision::Approved, "qa", None)
        .unwrap();

    let barrier = Barrier::new(WRITERS);
    let outcomes: Vec<TransitionOutcome> = thread::scope(|s| {
        let handles: Vec<_> = (0..WRITERS)
            .map(|n| {
                let engine = &engine;
                let id = &id;
                let barrier = &barrier;
                s.spawn(move || {
                    barrier.wait();
                    engine
                        .transition(id, "ROOT_CAUSE_ANALYSIS", &format!("user-{n}"), None)
                        .unwrap()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let transitioned = outcomes.iter().filter(|o| o.is_transitioned()).count();
    assert_eq!(transitioned, 1);
    assert!(
        outcomes
            .iter()
            .filter(|o| !o.is_transitioned())
            .all(|o| matches!(o, TransitionOutcome::AlreadyInPhase { .. }))
    );

    let entity = engine.load(&id).unwrap();
    assert_eq!(entity.history.len(), 1);
    assert_eq!(entity.version, 2);
    assert_eq!(entity.overall_progress, 25);
}

#[test]
fn test_writers_on_different_entities_do_not_interfere() {
    let engine = WorkflowEngine::with_builtin_catalogs(MemoryStore::new());
    let ids: Vec<_> = (0..WRITERS)
        .map(|n| EntityId::parse(format!("DP-{n}")).unwrap())
        .collect();
    for id in &ids {
        engine
            .create_entity(id, WorkflowType::DesignControl, "parallel")
            .unwrap();
    }

    thread::scope(|s| {
        for id in &ids {
            let engine = &engine;
            s.spawn(move || {
                engine.transition(id, "DESIGN_INPUTS", "pm", None).unwrap();
                engine
                    .submit_gate_review(id, "DESIGN_INPUTS", ReviewDecision::Approved, "rev", None)
                    .unwrap();
                engine.transition(id, "DESIGN_OUTPUTS", "pm", None).unwrap();
            });
        }
    });

    for id in &ids {
        let entity = engine.load(id).unwrap();
        assert_eq!(entity.history.len(), 2);
        assert_eq!(entity.overall_progress, 33);
    }
}
