//! File-backed entity store.
//!
//! Each entity lives in `<data_dir>/<entity-id>.toml`. Saves go through
//! [`FsAdapter::write_atomic`] so a crashed or failed save leaves the previous
//! file in place.
//!
//! Writers take `<entity-id>.lock` with an exclusive create before reading
//! the stored version and drop it after the write, so writers in different
//! processes cannot both pass the version check. A writer that finds the lock
//! taken fails with `ConcurrentModification` instead of waiting. A process
//! killed mid-save leaves the lock file behind; it has to be removed by hand.

use crate::error::{PhasegateError, Result};
use crate::state::{EntityId, ParentEntity};
use crate::store::WorkflowStore;
use crate::store::fs::FsAdapter;
use crate::store::fs_impl::StdFsAdapter;
use anyhow::Context;
use std::path::{Path, PathBuf};

const EXTENSION: &str = "toml";
const LOCK_EXTENSION: &str = "lock";

/// Exclusive writer lock on one entity, released on drop.
struct EntityLockGuard<'a> {
    fs: &'a dyn FsAdapter,
    path: PathBuf,
}

impl Drop for EntityLockGuard<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.fs.remove_file(&self.path) {
            tracing::warn!(path = %self.path.display(), error = %e, "failed to release entity lock");
        }
    }
}

/// Entity store writing one TOML document per entity.
pub struct TomlStore {
    data_dir: PathBuf,
    fs: Box<dyn FsAdapter>,
}

impl TomlStore {
    /// Creates a store over the real file system.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self::with_fs(data_dir, Box::new(StdFsAdapter::new()))
    }

    /// Creates a store over a custom adapter.
    pub fn with_fs(data_dir: impl Into<PathBuf>, fs: Box<dyn FsAdapter>) -> Self {
        Self {
            data_dir: data_dir.into(),
            fs,
        }
    }

    /// Directory holding the entity files.
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Path of the file for `id`.
    pub fn entity_path(&self, id: &EntityId) -> PathBuf {
        self.data_dir.join(format!("{}.{EXTENSION}", id.as_str()))
    }

    /// Path of the writer lock for `id`.
    pub fn lock_path(&self, id: &EntityId) -> PathBuf {
        self.data_dir.join(format!("{}.{LOCK_EXTENSION}", id.as_str()))
    }

    /// Takes the writer lock for `id`, or `None` if another writer holds it.
    fn try_lock(&self, id: &EntityId) -> Result<Option<EntityLockGuard<'_>>> {
        self.fs.create_dir_all(&self.data_dir)?;
        let path = self.lock_path(id);
        if !self.fs.create_new(&path)? {
            tracing::warn!(entity = %id, path = %path.display(), "entity lock held by another writer");
            return Ok(None);
        }
        Ok(Some(EntityLockGuard {
            fs: self.fs.as_ref(),
            path,
        }))
    }

    fn read(&self, id: &EntityId) -> Result<ParentEntity> {
        let path = self.entity_path(id);
        let content = match self.fs.read_to_string(&path) {
            Ok(content) => content,
            Err(PhasegateError::PathNotFound(_)) => {
                return Err(PhasegateError::EntityNotFound(id.to_string()));
            }
            Err(e) => return Err(e),
        };

        let entity: ParentEntity = toml::from_str(&content).map_err(|e| {
            tracing::warn!(path = %path.display(), error = %e, "failed to decode entity");
            PhasegateError::CorruptedState(path.clone())
        })?;
        if &entity.id != id {
            return Err(PhasegateError::CorruptedState(path));
        }
        Ok(entity)
    }

    fn write(&self, entity: &ParentEntity) -> Result<()> {
        let path = self.entity_path(&entity.id);
        let content = toml::to_string_pretty(entity)
            .with_context(|| format!("failed to serialize entity {}", entity.id))?;
        self.fs.write_atomic(&path, &content)?;
        tracing::debug!(
            entity = %entity.id,
            version = entity.version,
            path = %path.display(),
            "entity written"
        );
        Ok(())
    }
}

impl std::fmt::Debug for TomlStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TomlStore")
            .field("data_dir", &self.data_dir)
            .field("fs", &"Box<dyn FsAdapter>")
            .finish()
    }
}

impl WorkflowStore for TomlStore {
    fn load(&self, id: &EntityId) -> Result<ParentEntity> {
        self.read(id)
    }

    fn create(&self, entity: &ParentEntity) -> Result<()> {
        let Some(_lock) = self.try_lock(&entity.id)? else {
            return Err(PhasegateError::EntityAlreadyExists(entity.id.to_string()));
        };
        if self.fs.exists(&self.entity_path(&entity.id)) {
            return Err(PhasegateError::EntityAlreadyExists(entity.id.to_string()));
        }
        self.write(entity)
    }

    fn save(&self, entity: &ParentEntity, expected_version: u64) -> Result<()> {
        let Some(_lock) = self.try_lock(&entity.id)? else {
            let found = self
                .read(&entity.id)
                .map_or(expected_version, |stored| stored.version);
            return Err(PhasegateError::ConcurrentModification {
                entity: entity.id.to_string(),
                expected: expected_version,
                found,
            });
        };

        let stored = self.read(&entity.id)?;
        if stored.version != expected_version {
            return Err(PhasegateError::ConcurrentModification {
                entity: entity.id.to_string(),
                expected: expected_version,
                found: stored.version,
            });
        }
        self.write(entity)
    }

    fn list(&self) -> Result<Vec<EntityId>> {
        if !self.fs.exists(&self.data_dir) {
            return Ok(Vec::new());
        }

        let mut ids: Vec<EntityId> = self
            .fs
            .list_dir(&self.data_dir)?
            .into_iter()
            .filter(|name| self.fs.is_file(&self.data_dir.join(name)))
            .filter_map(|name| {
                let stem = name.strip_suffix(&format!(".{EXTENSION}"))?.to_string();
                EntityId::parse(stem).ok()
            })
            .collect();
        ids.sort();
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::design_control_catalog;
    use crate::store::fs_mock::MockFsAdapter;
    use chrono::Utc;

    fn store() -> (TomlStore, MockFsAdapter) {
        let fs = MockFsAdapter::new();
        (TomlStore::with_fs("/data", Box::new(fs.clone())), fs)
    }

    fn entity(id: &str) -> ParentEntity {
        ParentEntity::new(
            EntityId::parse(id).unwrap(),
            &design_control_catalog(),
            "Infusion pump v2",
            Utc::now(),
        )
    }

    #[test]
    fn test_create_and_load() {
        let (store, _fs) = store();
        let e = entity("DP-1");
        store.create(&e).unwrap();

        let loaded = store.load(&e.id).unwrap();
        assert_eq!(loaded, e);
    }

    #[test]
    fn test_list_ignores_foreign_files() {
        let (store, fs) = store();
        store.create(&entity("DP-2")).unwrap();
        store.create(&entity("DP-1")).unwrap();
        fs.write(Path::new("/data/notes.txt"), "x").unwrap();
        fs.write(Path::new("/data/DP-3.toml.tmp"), "x").unwrap();
        fs.create_dir_all(Path::new("/data/DP-4.toml")).unwrap();
        fs.write(Path::new("/data/DP-5.lock"), "").unwrap();

        let ids: Vec<_> = store.list().unwrap().iter().map(|i| i.to_string()).collect();
        assert_eq!(ids, vec!["DP-1", "DP-2"]);
    }

    #[test]
    fn test_list_without_data_dir() {
        let (store, _fs) = store();
        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn test_corrupted_file() {
        let (store, fs) = store();
        fs.write(Path::new("/data/DP-9.toml"), "not = [valid").unwrap();
        let err = store.load(&EntityId::parse("DP-9").unwrap()).unwrap_err();
        assert!(matches!(err, PhasegateError::CorruptedState(_)));
    }

    #[test]
    fn test_save_version_conflict() {
        let (store, _fs) = store();
        let mut e = entity("DP-1");
        store.create(&e).unwrap();

        e.version = 1;
        store.save(&e, 0).unwrap();
        let err = store.save(&e, 0).unwrap_err();
        assert!(matches!(err, PhasegateError::ConcurrentModification { found: 1, .. }));
    }

    #[test]
    fn test_save_releases_lock() {
        let (store, fs) = store();
        let mut e = entity("DP-1");
        store.create(&e).unwrap();
        assert!(!fs.exists(&store.lock_path(&e.id)));

        e.version = 1;
        store.save(&e, 0).unwrap();
        assert!(!fs.exists(&store.lock_path(&e.id)));
    }

    #[test]
    fn test_held_lock_rejects_save_and_create() {
        let (store, fs) = store();
        let mut e = entity("DP-1");
        store.create(&e).unwrap();
        fs.create_new(&store.lock_path(&e.id)).unwrap();

        e.version = 1;
        let err = store.save(&e, 0).unwrap_err();
        assert!(matches!(
            err,
            PhasegateError::ConcurrentModification {
                expected: 0,
                found: 0,
                ..
            }
        ));
        assert_eq!(store.load(&e.id).unwrap().version, 0);
        // The foreign lock is left alone.
        assert!(fs.exists(&store.lock_path(&e.id)));

        let other = entity("DP-2");
        fs.create_new(&store.lock_path(&other.id)).unwrap();
        assert!(matches!(
            store.create(&other).unwrap_err(),
            PhasegateError::EntityAlreadyExists(_)
        ));

        fs.remove_file(&store.lock_path(&e.id)).unwrap();
        store.save(&e, 0).unwrap();
        assert_eq!(store.load(&e.id).unwrap().version, 1);
    }

    #[test]
    fn test_failed_save_keeps_previous_file() {
        let (store, fs) = store();
        let mut e = entity("DP-1");
        store.create(&e).unwrap();

        fs.set_fail_writes(true);
        e.version = 1;
        e.title = "changed".into();
        assert!(store.save(&e, 0).is_err());

        fs.set_fail_writes(false);
        let loaded = store.load(&e.id).unwrap();
        assert_eq!(loaded.version, 0);
        assert_eq!(loaded.title, "Infusion pump v2");
    }
}
