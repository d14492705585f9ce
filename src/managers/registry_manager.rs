// RegistryManager: shared access to the transform registry
//
// Single Responsibility: locking discipline around `TransformRegistry`
//
// Control operations take the write lock for the whole mutation. Sample
// processing only holds the read lock long enough to clone the active
// program, then runs it unlocked, so a slow transform never stalls the
// control channel and always sees a fully committed selection.

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use crate::error::{log_registry_error, ErrorCode, RegistryError, TransformError};
use crate::profile::{Point, ProfileSample};
use crate::registry::{TransformDefinition, TransformRegistry, TransformStore};
use crate::transform::{SeamTransform, TransformProgram};

/// Snapshot of the traversal cursor for editors
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct CursorState {
    /// Position in insertion order, `None` when the registry is empty
    pub position: Option<usize>,
    pub id: Option<u32>,
    pub valid: bool,
    pub is_begin: bool,
    pub is_end: bool,
}

/// Thread-safe wrapper around the registry and its backing store
#[derive(Debug, Clone)]
pub struct RegistryManager {
    registry: Arc<RwLock<TransformRegistry>>,
    store: TransformStore,
}

impl RegistryManager {
    pub fn new(registry: TransformRegistry, store: TransformStore) -> Self {
        Self {
            registry: Arc::new(RwLock::new(registry)),
            store,
        }
    }

    pub fn store(&self) -> &TransformStore {
        &self.store
    }

    // ========================================================================
    // QUERIES
    // ========================================================================

    pub fn active_id(&self) -> Result<Option<u32>, RegistryError> {
        Ok(self.read_registry("active_id")?.active_id())
    }

    pub fn len(&self) -> Result<usize, RegistryError> {
        Ok(self.read_registry("len")?.len())
    }

    pub fn definitions(&self) -> Result<Vec<TransformDefinition>, RegistryError> {
        Ok(self.read_registry("definitions")?.definitions().to_vec())
    }

    /// Definition `id`, or the one under the cursor when `id` is `None`
    ///
    /// # Returns
    /// `Ok(None)` only when `id` is `None` and the registry is empty
    pub fn definition(&self, id: Option<u32>) -> Result<Option<TransformDefinition>, RegistryError> {
        let registry = self.read_registry("definition")?;
        match id {
            Some(id) => registry
                .get(id)
                .cloned()
                .map(Some)
                .ok_or(RegistryError::UnknownTask { id }),
            None => Ok(registry.current().cloned()),
        }
    }

    pub fn cursor(&self) -> Result<CursorState, RegistryError> {
        Ok(cursor_state(&*self.read_registry("cursor")?))
    }

    // ========================================================================
    // MUTATIONS
    // ========================================================================

    /// Select task `id`; see `TransformRegistry::select`
    pub fn select(&self, id: u32) -> Result<Option<u32>, RegistryError> {
        let mut registry = self.write_registry("select")?;
        registry
            .select(id)
            .inspect_err(|err| log_registry_error(err, "select"))
    }

    pub fn append(&self, body: impl Into<String>) -> Result<u32, RegistryError> {
        Ok(self.write_registry("append")?.append(body))
    }

    pub fn delete(&self) -> Result<bool, RegistryError> {
        Ok(self.write_registry("delete")?.delete())
    }

    /// Replace a body; `None` edits the definition under the cursor
    ///
    /// # Returns
    /// `false` when `id` is `None` and the registry is empty
    pub fn modify(&self, id: Option<u32>, body: impl Into<String>) -> Result<bool, RegistryError> {
        let mut registry = self.write_registry("modify")?;
        match id {
            Some(id) => registry
                .modify_at(id, body)
                .map(|()| true)
                .inspect_err(|err| log_registry_error(err, "modify")),
            None => Ok(registry.modify(body)),
        }
    }

    pub fn replace_all(&self, definitions: Vec<TransformDefinition>) -> Result<(), RegistryError> {
        self.write_registry("replace_all")?
            .replace_all(definitions)
            .inspect_err(|err| log_registry_error(err, "replace_all"))
    }

    pub fn previous(&self) -> Result<CursorState, RegistryError> {
        let mut registry = self.write_registry("previous")?;
        registry.previous();
        Ok(cursor_state(&registry))
    }

    pub fn next(&self) -> Result<CursorState, RegistryError> {
        let mut registry = self.write_registry("next")?;
        registry.next();
        Ok(cursor_state(&registry))
    }

    // ========================================================================
    // PERSISTENCE
    // ========================================================================

    /// Reload from the backing store; see `TransformRegistry::load`
    pub fn load(&self) -> Result<usize, RegistryError> {
        let mut registry = self.write_registry("load")?;
        registry
            .load(&self.store)
            .inspect_err(|err| log_registry_error(err, "load"))
    }

    /// Persist to the backing store
    ///
    /// Serializes under the read lock, so sample processing continues while
    /// the file is written.
    pub fn dump(&self) -> Result<usize, RegistryError> {
        let registry = self.read_registry("dump")?;
        registry
            .dump(&self.store)
            .inspect_err(|err| log_registry_error(err, "dump"))
    }

    // ========================================================================
    // EXECUTION
    // ========================================================================

    /// Clone of the active program and the budget it runs under
    pub fn active_program(
        &self,
    ) -> Result<Option<(Arc<TransformProgram>, Option<Duration>)>, RegistryError> {
        let registry = self.read_registry("active_program")?;
        Ok(registry
            .active_program()
            .map(|program| (program, registry.budget())))
    }

    // ========================================================================
    // HELPER METHODS - Lock management
    // ========================================================================

    fn read_registry(
        &self,
        context: &str,
    ) -> Result<RwLockReadGuard<'_, TransformRegistry>, RegistryError> {
        self.registry.read().map_err(|_| {
            let err = RegistryError::LockPoisoned {
                component: "TransformRegistry".to_string(),
            };
            log_registry_error(&err, context);
            err
        })
    }

    fn write_registry(
        &self,
        context: &str,
    ) -> Result<RwLockWriteGuard<'_, TransformRegistry>, RegistryError> {
        self.registry.write().map_err(|_| {
            let err = RegistryError::LockPoisoned {
                component: "TransformRegistry".to_string(),
            };
            log_registry_error(&err, context);
            err
        })
    }
}

impl SeamTransform for RegistryManager {
    fn transform(&self, sample: &ProfileSample) -> Result<Vec<Point>, TransformError> {
        let (program, budget) = self
            .active_program()
            .map_err(|err| TransformError::Execution {
                message: err.message(),
            })?
            .ok_or(TransformError::NoActiveSelection)?;
        program.run(sample, budget)
    }
}

fn cursor_state(registry: &TransformRegistry) -> CursorState {
    CursorState {
        position: registry.position(),
        id: registry.current().map(|def| def.id),
        valid: registry.is_valid(),
        is_begin: registry.is_begin(),
        is_end: registry.is_end(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SegmentationConfig;

    fn manager_with(bodies: &[&str]) -> (RegistryManager, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = TransformStore::new(dir.path().join("transforms.json"));
        let defaults = SegmentationConfig {
            dx_max: 1.0,
            dy_max: 1.0,
            min_run_len: 3,
        };
        let mut registry = TransformRegistry::new(defaults);
        for body in bodies {
            registry.append(*body);
        }
        (RegistryManager::new(registry, store), dir)
    }

    fn two_plates() -> ProfileSample {
        ProfileSample::new(
            vec![0.0, 1.0, 2.0, 10.0, 11.0, 12.0],
            vec![0.0; 6],
        )
    }

    #[test]
    fn test_transform_requires_selection() {
        let (manager, _dir) = manager_with(&["segment\npick 0"]);
        assert_eq!(
            manager.transform(&two_plates()),
            Err(TransformError::NoActiveSelection)
        );
    }

    #[test]
    fn test_select_then_transform() {
        let (manager, _dir) = manager_with(&["segment\npick 0", "segment\npick 3"]);
        manager.select(1).unwrap();
        assert_eq!(
            manager.transform(&two_plates()).unwrap(),
            vec![Point::new(12.0, 0.0)]
        );
        assert_eq!(manager.active_id().unwrap(), Some(1));
    }

    #[test]
    fn test_definition_by_id_and_cursor() {
        let (manager, _dir) = manager_with(&["none", "lowest"]);
        assert_eq!(manager.definition(None).unwrap().unwrap().id, 1);
        assert_eq!(manager.definition(Some(0)).unwrap().unwrap().body, "none");
        assert_eq!(
            manager.definition(Some(5)),
            Err(RegistryError::UnknownTask { id: 5 })
        );
    }

    #[test]
    fn test_cursor_state_tracks_traversal() {
        let (manager, _dir) = manager_with(&["none", "none", "none"]);
        let state = manager.cursor().unwrap();
        assert_eq!(state.position, Some(2));
        assert!(state.is_end);

        manager.previous().unwrap();
        let state = manager.previous().unwrap();
        assert_eq!(state.position, Some(0));
        assert!(state.is_begin);
        assert!(state.valid);

        let state = manager.previous().unwrap();
        assert_eq!(state.position, Some(0));
    }

    #[test]
    fn test_modify_unknown_id_fails() {
        let (manager, _dir) = manager_with(&["none"]);
        assert!(manager.modify(None, "lowest").unwrap());
        assert_eq!(
            manager.modify(Some(3), "none"),
            Err(RegistryError::UnknownTask { id: 3 })
        );
    }

    #[test]
    fn test_dump_and_load_use_store() {
        let (manager, _dir) = manager_with(&["none", "segment\npick 1"]);
        assert_eq!(manager.dump().unwrap(), 2);
        manager.append("highest").unwrap();
        assert_eq!(manager.load().unwrap(), 2);
        assert_eq!(manager.len().unwrap(), 2);
    }

    #[test]
    fn test_transform_runs_while_control_reads() {
        let (manager, _dir) = manager_with(&["segment\npick 0"]);
        manager.select(0).unwrap();

        let worker = {
            let manager = manager.clone();
            std::thread::spawn(move || {
                for _ in 0..100 {
                    assert!(manager.transform(&two_plates()).is_ok());
                }
            })
        };
        for _ in 0..100 {
            manager.modify(Some(0), "segment\npick 1").unwrap();
        }
        worker.join().unwrap();
    }
}
