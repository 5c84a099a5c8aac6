//! In-process entity store.

use crate::error::{PhasegateError, Result};
use crate::state::{EntityId, ParentEntity};
use crate::store::WorkflowStore;
use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

/// Entity store backed by a `RwLock`-guarded map.
///
/// Readers clone whole entities under the read lock, so they never observe a
/// half-written entity. Clones share the same map.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entities: Arc<RwLock<BTreeMap<EntityId, ParentEntity>>>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl WorkflowStore for MemoryStore {
    fn load(&self, id: &EntityId) -> Result<ParentEntity> {
        self.entities
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
            .ok_or_else(|| PhasegateError::EntityNotFound(id.to_string()))
    }

    fn create(&self, entity: &ParentEntity) -> Result<()> {
        let mut entities = self.entities.write().unwrap_or_else(PoisonError::into_inner);
        if entities.contains_key(&entity.id) {
            return Err(PhasegateError::EntityAlreadyExists(entity.id.to_string()));
        }
        entities.insert(entity.id.clone(), entity.clone());
        Ok(())
    }

    fn save(&self, entity: &ParentEntity, expected_version: u64) -> Result<()> {
        let mut entities = self.entities.write().unwrap_or_else(PoisonError::into_inner);
        let stored = entities
            .get_mut(&entity.id)
            .ok_or_else(|| PhasegateError::EntityNotFound(entity.id.to_string()))?;
        if stored.version != expected_version {
            return Err(PhasegateError::ConcurrentModification {
                entity: entity.id.to_string(),
                expected: expected_version,
                found: stored.version,
            });
        }
        *stored = entity.clone();
        Ok(())
    }

    fn list(&self) -> Result<Vec<EntityId>> {
        Ok(self
            .entities
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::capa_catalog;
    use chrono::Utc;

    fn entity(id: &str) -> ParentEntity {
        ParentEntity::new(EntityId::parse(id).unwrap(), &capa_catalog(), "t", Utc::now())
    }

    #[test]
    fn test_create_load_list() {
        let store = MemoryStore::new();
        store.create(&entity("B")).unwrap();
        store.create(&entity("A")).unwrap();

        assert_eq!(store.load(&EntityId::parse("A").unwrap()).unwrap().title, "t");
        let ids: Vec<_> = store.list().unwrap().iter().map(|i| i.to_string()).collect();
        assert_eq!(ids, vec!["A", "B"]);
        assert!(matches!(
            store.create(&entity("A")),
            Err(PhasegateError::EntityAlreadyExists(_))
        ));
    }

    #[test]
    fn test_save_checks_version() {
        let store = MemoryStore::new();
        let mut e = entity("A");
        store.create(&e).unwrap();

        e.version = 1;
        store.save(&e, 0).unwrap();

        let mut stale = e.clone();
        stale.version = 2;
        stale.title = "stale".into();
        let err = store.save(&stale, 0).unwrap_err();
        assert!(matches!(
            err,
            PhasegateError::ConcurrentModification { expected: 0, found: 1, .. }
        ));
        assert_eq!(store.load(&e.id).unwrap().title, "t");
    }

    #[test]
    fn test_missing_entity() {
        let store = MemoryStore::new();
        let e = entity("Z");
        assert!(matches!(store.load(&e.id), Err(PhasegateError::EntityNotFound(_))));
        assert!(matches!(store.save(&e, 0), Err(PhasegateError::EntityNotFound(_))));
    }
}
