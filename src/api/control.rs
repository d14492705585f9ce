// ControlSurface - operator request/response operations
//
// Every operation converts typed errors into a `ControlOutcome`/`ControlReply`
// carrying the error code and message, so callers (CLI, HTTP, tests) never
// have to match on error enums.

use std::sync::Arc;

use crate::config::OffsetConfig;
use crate::engine::TrackerHandle;
use crate::error::{log_registry_error, ControlError, ErrorCode, RegistryError};
use crate::managers::CursorState;
use crate::registry::{parse_definitions, serialize_definitions};
use crate::telemetry::TelemetrySnapshot;
use crate::transform::DEFAULT_TRANSFORM_BODY;

use super::types::{ControlOutcome, ControlReply, DefinitionView};

/// Control operations over a shared tracker
#[derive(Clone)]
pub struct ControlSurface {
    handle: Arc<TrackerHandle>,
}

impl ControlSurface {
    pub fn new(handle: Arc<TrackerHandle>) -> Self {
        Self { handle }
    }

    pub fn handle(&self) -> &TrackerHandle {
        &self.handle
    }

    // ========================================================================
    // TASK SELECTION
    // ========================================================================

    /// Id of the active task (`None` before the first successful selection)
    pub fn get_task(&self) -> ControlReply<u32> {
        match self.handle.registry().active_id() {
            Ok(id) => ControlReply::ok(id),
            Err(err) => self.reply_failed(&err, "get_task"),
        }
    }

    /// Select a task by its raw (operator supplied) id
    pub fn set_task(&self, raw: i64) -> ControlOutcome {
        let Ok(id) = u32::try_from(raw) else {
            let err = RegistryError::InvalidTaskId { raw };
            log_registry_error(&err, "set_task");
            self.handle.telemetry().record_error(&err, "set_task");
            return ControlOutcome::failed(&err);
        };

        match self.handle.select_task(id) {
            Ok(Some(prior)) if prior != id => {
                ControlOutcome::ok(format!("Task {} selected (was {})", id, prior))
            }
            Ok(_) => ControlOutcome::ok(format!("Task {} selected", id)),
            Err(err) => ControlOutcome::failed(&err),
        }
    }

    // ========================================================================
    // OFFSETS
    // ========================================================================

    pub fn get_offsets(&self) -> ControlReply<OffsetConfig> {
        match self.handle.offsets().get() {
            Ok(offsets) => ControlReply::ok(Some(offsets)),
            Err(err) => self.reply_failed(&err, "get_offsets"),
        }
    }

    /// Update one or both offsets; takes effect from the next sample
    pub fn set_offsets(&self, x: Option<f64>, y: Option<f64>) -> ControlOutcome {
        let result = self.handle.offsets().set(x, y);
        self.offset_outcome(result, "set_offsets")
    }

    pub fn set_offset_x(&self, raw: &str) -> ControlOutcome {
        let result = self.handle.offsets().set_x_text(raw);
        self.offset_outcome(result, "set_offset_x")
    }

    pub fn set_offset_y(&self, raw: &str) -> ControlOutcome {
        let result = self.handle.offsets().set_y_text(raw);
        self.offset_outcome(result, "set_offset_y")
    }

    // ========================================================================
    // DEFINITIONS
    // ========================================================================

    /// Definition `id`, or the one under the cursor
    pub fn get_definition(&self, id: Option<u32>) -> ControlReply<DefinitionView> {
        match self.handle.registry().definition(id) {
            Ok(def) => ControlReply::ok(def.map(DefinitionView::from)),
            Err(err) => self.reply_failed(&err, "get_definition"),
        }
    }

    /// Replace a body; the running program changes only on the next
    /// `set_task`
    pub fn set_definition(&self, id: Option<u32>, body: &str) -> ControlOutcome {
        match self.handle.registry().modify(id, body) {
            Ok(true) => ControlOutcome::ok("Definition updated; select the task to apply it"),
            Ok(false) => ControlOutcome::not_modified("No definition to modify"),
            Err(err) => self.outcome_failed(&err, "set_definition"),
        }
    }

    /// All definitions in insertion order, validity included
    pub fn list_definitions(&self) -> ControlReply<Vec<DefinitionView>> {
        match self.handle.registry().definitions() {
            Ok(defs) => ControlReply::ok(Some(defs.into_iter().map(DefinitionView::from).collect())),
            Err(err) => self.reply_failed(&err, "list_definitions"),
        }
    }

    /// All definitions as a JSON array of `{id, body}`
    pub fn get_definitions(&self) -> ControlReply<String> {
        let json = self
            .handle
            .registry()
            .definitions()
            .and_then(|defs| serialize_definitions(&defs));
        match json {
            Ok(json) => ControlReply::ok(Some(json)),
            Err(err) => self.reply_failed(&err, "get_definitions"),
        }
    }

    /// Replace every definition from a JSON array of `{id, body}`
    pub fn set_definitions(&self, json: &str) -> ControlOutcome {
        let replaced = parse_definitions(json)
            .and_then(|defs| self.handle.replace_definitions(defs));
        match replaced {
            Ok(count) => ControlOutcome::ok(format!("{} definitions set", count)),
            Err(err) => self.outcome_failed(&err, "set_definitions"),
        }
    }

    /// Append a task, with the default body when `body` is `None`
    pub fn append_definition(&self, body: Option<&str>) -> ControlOutcome {
        let body = body.unwrap_or(DEFAULT_TRANSFORM_BODY);
        match self.handle.registry().append(body) {
            Ok(id) => ControlOutcome::ok(format!("Task {} appended", id)),
            Err(err) => self.outcome_failed(&err, "append_definition"),
        }
    }

    /// Delete the definition under the cursor
    pub fn delete_definition(&self) -> ControlOutcome {
        match self.handle.registry().delete() {
            Ok(true) => ControlOutcome::ok("Definition deleted"),
            Ok(false) => ControlOutcome::not_modified("No definition to delete"),
            Err(err) => self.outcome_failed(&err, "delete_definition"),
        }
    }

    pub fn count(&self) -> ControlReply<usize> {
        match self.handle.registry().len() {
            Ok(len) => ControlReply::ok(Some(len)),
            Err(err) => self.reply_failed(&err, "count"),
        }
    }

    // ========================================================================
    // TRAVERSAL
    // ========================================================================

    pub fn cursor(&self) -> ControlReply<CursorState> {
        match self.handle.registry().cursor() {
            Ok(state) => ControlReply::ok(Some(state)),
            Err(err) => self.reply_failed(&err, "cursor"),
        }
    }

    pub fn previous(&self) -> ControlReply<CursorState> {
        match self.handle.registry().previous() {
            Ok(state) => ControlReply::ok(Some(state)),
            Err(err) => self.reply_failed(&err, "previous"),
        }
    }

    pub fn next(&self) -> ControlReply<CursorState> {
        match self.handle.registry().next() {
            Ok(state) => ControlReply::ok(Some(state)),
            Err(err) => self.reply_failed(&err, "next"),
        }
    }

    // ========================================================================
    // STORAGE
    // ========================================================================

    pub fn dump(&self) -> ControlOutcome {
        match self.handle.dump_definitions() {
            Ok(count) => ControlOutcome::ok(format!("Dumped {} definitions", count)),
            Err(err) => ControlOutcome::failed(&err),
        }
    }

    pub fn load(&self) -> ControlOutcome {
        match self.handle.load_definitions() {
            Ok(count) => ControlOutcome::ok(format!("Loaded {} definitions", count)),
            Err(err) => ControlOutcome::failed(&err),
        }
    }

    pub fn telemetry_snapshot(&self) -> TelemetrySnapshot {
        self.handle.telemetry().snapshot()
    }

    // ========================================================================
    // HELPERS
    // ========================================================================

    fn offset_outcome(
        &self,
        result: Result<OffsetConfig, ControlError>,
        context: &str,
    ) -> ControlOutcome {
        match result {
            Ok(offsets) => {
                ControlOutcome::ok(format!("Offsets x={}, y={}", offsets.x, offsets.y))
            }
            Err(err) => self.outcome_failed(&err, context),
        }
    }

    fn outcome_failed<E: ErrorCode>(&self, err: &E, context: &str) -> ControlOutcome {
        self.handle.telemetry().record_error(err, context);
        ControlOutcome::failed(err)
    }

    fn reply_failed<T, E: ErrorCode>(&self, err: &E, context: &str) -> ControlReply<T> {
        self.handle.telemetry().record_error(err, context);
        ControlReply::failed(err)
    }
}
