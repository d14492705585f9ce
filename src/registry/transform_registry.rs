// TransformRegistry - per-task transform definitions and the active selection
//
// The registry keeps three independent pieces of state:
// - the ordered definitions (insertion order, ids unique)
// - a traversal cursor used by editors to step through them
// - the active selection: a compiled program plus the id it came from
//
// Only `select` and a successful reload change the active program, and only
// after the candidate body compiled and passed its self-test.

use std::sync::Arc;
use std::time::Duration;

use crate::config::SegmentationConfig;
use crate::error::{ErrorCode, RegistryError, TransformError};
use crate::profile::{Point, ProfileSample};
use crate::transform::{SeamTransform, TransformProgram};

use super::definition::TransformDefinition;
use super::storage::{ensure_unique_ids, TransformStore};

/// The compiled program currently in effect
#[derive(Debug, Clone)]
pub struct ActiveTransform {
    pub id: u32,
    pub program: Arc<TransformProgram>,
}

/// Ordered collection of transform definitions with an active selection
#[derive(Debug, Clone)]
pub struct TransformRegistry {
    definitions: Vec<TransformDefinition>,
    cursor: usize,
    active: Option<ActiveTransform>,
    defaults: SegmentationConfig,
    budget: Option<Duration>,
}

impl TransformRegistry {
    /// Create an empty registry
    ///
    /// `defaults` fill in omitted `segment` parameters when bodies compile.
    pub fn new(defaults: SegmentationConfig) -> Self {
        Self {
            definitions: Vec::new(),
            cursor: 0,
            active: None,
            defaults,
            budget: None,
        }
    }

    /// Bound every `apply` call by `budget`
    pub fn with_budget(mut self, budget: Duration) -> Self {
        self.budget = Some(budget);
        self
    }

    /// Build a registry from an existing collection (nothing selected)
    pub fn from_definitions(
        definitions: Vec<TransformDefinition>,
        defaults: SegmentationConfig,
    ) -> Result<Self, RegistryError> {
        let mut registry = Self::new(defaults);
        registry.replace_all(definitions)?;
        Ok(registry)
    }

    // ========================================================================
    // QUERIES
    // ========================================================================

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    pub fn definitions(&self) -> &[TransformDefinition] {
        &self.definitions
    }

    pub fn get(&self, id: u32) -> Option<&TransformDefinition> {
        self.definitions.iter().find(|def| def.id == id)
    }

    pub fn budget(&self) -> Option<Duration> {
        self.budget
    }

    /// Cursor position, `None` when the registry is empty
    pub fn position(&self) -> Option<usize> {
        (!self.definitions.is_empty()).then_some(self.cursor)
    }

    /// Definition under the cursor
    pub fn current(&self) -> Option<&TransformDefinition> {
        self.definitions.get(self.cursor)
    }

    /// Whether the definition under the cursor last compiled and self-tested
    pub fn is_valid(&self) -> bool {
        self.current().is_some_and(|def| def.valid)
    }

    pub fn active_id(&self) -> Option<u32> {
        self.active.as_ref().map(|active| active.id)
    }

    pub fn active_program(&self) -> Option<Arc<TransformProgram>> {
        self.active
            .as_ref()
            .map(|active| Arc::clone(&active.program))
    }

    // ========================================================================
    // SELECTION
    // ========================================================================

    /// Make the definition `id` the active transform
    ///
    /// The body is compiled and test-executed first. On failure nothing but
    /// the definition's validity flag changes.
    ///
    /// # Returns
    /// The previously active id, if any
    ///
    /// # Errors
    /// - `UnknownTask` when no definition has this id
    /// - `Selection` when the body fails to compile or self-test
    pub fn select(&mut self, id: u32) -> Result<Option<u32>, RegistryError> {
        let pos = self.position_of(id).ok_or(RegistryError::UnknownTask { id })?;

        let program = match self.check_body(&self.definitions[pos].body) {
            Ok(program) => program,
            Err(reason) => {
                self.definitions[pos].valid = false;
                return Err(RegistryError::Selection { id, reason });
            }
        };

        self.definitions[pos].valid = true;
        self.cursor = pos;
        let prior = self.active.replace(ActiveTransform {
            id,
            program: Arc::new(program),
        });

        log::info!("[TransformRegistry] Task {} selected", id);
        Ok(prior.map(|active| active.id))
    }

    // ========================================================================
    // EDITING
    // ========================================================================

    /// Append a definition at the end and move the cursor onto it
    ///
    /// # Returns
    /// The new definition's id (one past the largest id in use)
    pub fn append(&mut self, body: impl Into<String>) -> u32 {
        let id = self
            .definitions
            .iter()
            .map(|def| def.id)
            .max()
            .map_or(0, |max| max.saturating_add(1));

        let mut def = TransformDefinition::new(id, body);
        def.valid = self.check_body(&def.body).is_ok();
        self.definitions.push(def);
        self.cursor = self.definitions.len() - 1;
        id
    }

    /// Delete the definition under the cursor
    ///
    /// # Returns
    /// `false` (not modified) when the registry is empty
    pub fn delete(&mut self) -> bool {
        if self.definitions.is_empty() {
            return false;
        }

        let removed = self.definitions.remove(self.cursor);
        if self.cursor >= self.definitions.len() {
            self.cursor = self.definitions.len().saturating_sub(1);
        }

        if self.active_id() == Some(removed.id) {
            log::warn!(
                "[TransformRegistry] Deleted task {} is still the active transform",
                removed.id
            );
        }
        true
    }

    /// Replace the body under the cursor
    ///
    /// The active program is not swapped; call `select` to commit.
    ///
    /// # Returns
    /// `false` (not modified) when the registry is empty
    pub fn modify(&mut self, body: impl Into<String>) -> bool {
        if self.definitions.is_empty() {
            return false;
        }
        let pos = self.cursor;
        self.set_body(pos, body.into());
        true
    }

    /// Replace the body of definition `id`
    pub fn modify_at(&mut self, id: u32, body: impl Into<String>) -> Result<(), RegistryError> {
        let pos = self.position_of(id).ok_or(RegistryError::UnknownTask { id })?;
        self.set_body(pos, body.into());
        Ok(())
    }

    /// Replace the whole collection
    ///
    /// Validity flags are recomputed, the cursor moves to the active task (or
    /// the first definition) and the active program is refreshed from its new
    /// body when that body passes the self-test.
    ///
    /// # Errors
    /// `DuplicateId` if two definitions share an id; nothing changes then.
    pub fn replace_all(
        &mut self,
        mut definitions: Vec<TransformDefinition>,
    ) -> Result<(), RegistryError> {
        ensure_unique_ids(&definitions)?;

        for def in &mut definitions {
            def.valid = self.check_body(&def.body).is_ok();
        }
        self.definitions = definitions;
        self.cursor = self
            .active_id()
            .and_then(|id| self.position_of(id))
            .unwrap_or(0);
        self.refresh_active();
        Ok(())
    }

    // ========================================================================
    // PERSISTENCE
    // ========================================================================

    /// Replace the collection with the stored one
    ///
    /// # Returns
    /// Number of definitions loaded
    ///
    /// # Errors
    /// `Load` if the store is missing or corrupt; the collection is unchanged.
    pub fn load(&mut self, store: &TransformStore) -> Result<usize, RegistryError> {
        let definitions = store.read()?;
        let count = definitions.len();
        self.replace_all(definitions)
            .map_err(|err| RegistryError::Load {
                reason: err.message(),
            })?;

        log::info!(
            "[TransformRegistry] Loaded {} definitions from {}",
            count,
            store.path().display()
        );
        Ok(count)
    }

    /// Persist the full collection
    ///
    /// # Returns
    /// Number of definitions written
    pub fn dump(&self, store: &TransformStore) -> Result<usize, RegistryError> {
        store.write(&self.definitions)?;
        Ok(self.definitions.len())
    }

    // ========================================================================
    // TRAVERSAL
    // ========================================================================

    /// Step the cursor back; clamped at the first definition
    pub fn previous(&mut self) -> bool {
        if self.cursor == 0 || self.definitions.is_empty() {
            return false;
        }
        self.cursor -= 1;
        true
    }

    /// Step the cursor forward; clamped at the last definition
    pub fn next(&mut self) -> bool {
        if self.cursor + 1 >= self.definitions.len() {
            return false;
        }
        self.cursor += 1;
        true
    }

    pub fn is_begin(&self) -> bool {
        self.definitions.is_empty() || self.cursor == 0
    }

    pub fn is_end(&self) -> bool {
        self.cursor + 1 >= self.definitions.len()
    }

    // ========================================================================
    // EXECUTION
    // ========================================================================

    /// Run the active transform on one sample
    ///
    /// # Errors
    /// `NoActiveSelection` before the first successful `select`, otherwise
    /// whatever the program raises.
    pub fn apply(&self, sample: &ProfileSample) -> Result<Vec<Point>, TransformError> {
        let active = self
            .active
            .as_ref()
            .ok_or(TransformError::NoActiveSelection)?;
        active.program.run(sample, self.budget)
    }

    // ========================================================================
    // HELPERS
    // ========================================================================

    fn position_of(&self, id: u32) -> Option<usize> {
        self.definitions.iter().position(|def| def.id == id)
    }

    /// Compile and self-test a body, flattening failures to a reason string
    fn check_body(&self, body: &str) -> Result<TransformProgram, String> {
        let program = TransformProgram::compile(body, &self.defaults).map_err(|err| err.message())?;
        program.self_test(self.budget).map_err(|err| err.message())?;
        Ok(program)
    }

    fn set_body(&mut self, pos: usize, body: String) {
        let valid = self.check_body(&body).is_ok();
        let def = &mut self.definitions[pos];
        def.body = body;
        def.valid = valid;
    }

    fn refresh_active(&mut self) {
        let Some(active_id) = self.active_id() else {
            return;
        };

        let Some(pos) = self.position_of(active_id) else {
            log::warn!(
                "[TransformRegistry] Active task {} no longer stored, keeping its program",
                active_id
            );
            return;
        };

        match self.check_body(&self.definitions[pos].body) {
            Ok(program) => {
                self.active = Some(ActiveTransform {
                    id: active_id,
                    program: Arc::new(program),
                });
            }
            Err(reason) => {
                log::warn!(
                    "[TransformRegistry] Reloaded task {} is invalid ({}), keeping previous program",
                    active_id,
                    reason
                );
            }
        }
    }
}

impl SeamTransform for TransformRegistry {
    fn transform(&self, sample: &ProfileSample) -> Result<Vec<Point>, TransformError> {
        self.apply(sample)
    }
}

#[cfg(test)]
#[path = "transform_registry_tests.rs"]
mod tests;
