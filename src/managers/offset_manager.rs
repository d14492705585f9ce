// OffsetManager: operator offsets applied to the primary pick
//
// Both axes live under one RwLock so a combined update is never observed
// half-applied. The pipeline takes one snapshot per cycle.

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::config::OffsetConfig;
use crate::error::{log_control_error, ControlError};

/// Thread-safe holder of the current `OffsetConfig`
#[derive(Debug, Clone)]
pub struct OffsetManager {
    offsets: Arc<RwLock<OffsetConfig>>,
}

impl OffsetManager {
    pub fn new(initial: OffsetConfig) -> Self {
        Self {
            offsets: Arc::new(RwLock::new(initial)),
        }
    }

    /// Current offsets (the per-cycle snapshot)
    pub fn get(&self) -> Result<OffsetConfig, ControlError> {
        let guard = self.read_offsets().inspect_err(|err| {
            log_control_error(err, "get_offsets");
        })?;
        Ok(*guard)
    }

    /// Update one or both axes atomically
    ///
    /// # Errors
    /// `InvalidOffset` if a provided value is NaN or infinite; nothing changes.
    pub fn set(&self, x: Option<f64>, y: Option<f64>) -> Result<OffsetConfig, ControlError> {
        for value in [x, y].into_iter().flatten() {
            if !value.is_finite() {
                let err = ControlError::InvalidOffset {
                    raw: value.to_string(),
                };
                log_control_error(&err, "set_offsets");
                return Err(err);
            }
        }

        let mut guard = self.write_offsets().inspect_err(|err| {
            log_control_error(err, "set_offsets");
        })?;
        if let Some(x) = x {
            guard.x = x;
        }
        if let Some(y) = y {
            guard.y = y;
        }
        log::info!("[OffsetManager] Offsets now x={}, y={}", guard.x, guard.y);
        Ok(*guard)
    }

    /// Parse operator text and update the x offset
    pub fn set_x_text(&self, raw: &str) -> Result<OffsetConfig, ControlError> {
        let x = parse_offset(raw)?;
        self.set(Some(x), None)
    }

    /// Parse operator text and update the y offset
    pub fn set_y_text(&self, raw: &str) -> Result<OffsetConfig, ControlError> {
        let y = parse_offset(raw)?;
        self.set(None, Some(y))
    }

    // ========================================================================
    // HELPER METHODS - Lock management
    // ========================================================================

    fn read_offsets(&self) -> Result<RwLockReadGuard<'_, OffsetConfig>, ControlError> {
        self.offsets.read().map_err(|_| ControlError::LockPoisoned {
            component: "OffsetConfig".to_string(),
        })
    }

    fn write_offsets(&self) -> Result<RwLockWriteGuard<'_, OffsetConfig>, ControlError> {
        self.offsets.write().map_err(|_| ControlError::LockPoisoned {
            component: "OffsetConfig".to_string(),
        })
    }
}

impl Default for OffsetManager {
    fn default() -> Self {
        Self::new(OffsetConfig::default())
    }
}

/// Parse a finite float, surrounding whitespace allowed
pub fn parse_offset(raw: &str) -> Result<f64, ControlError> {
    match raw.trim().parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(value),
        _ => {
            let err = ControlError::InvalidOffset {
                raw: raw.to_string(),
            };
            log_control_error(&err, "parse_offset");
            Err(err)
        }
    }
}
