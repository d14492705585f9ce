//! Configuration management for the seam tracker
//!
//! This module provides runtime configuration loading from JSON files so
//! segmentation defaults, continuity tolerances and storage paths can be
//! tuned per cell without recompilation.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Complete application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub segmentation: SegmentationConfig,
    #[serde(default)]
    pub continuity: ContinuityConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub offsets: OffsetConfig,
}

/// Defaults for `segment` stages that omit their parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SegmentationConfig {
    /// Largest |Δx| between neighbours that keeps them in one run
    pub dx_max: f64,
    /// Largest |Δy| between neighbours that keeps them in one run
    pub dy_max: f64,
    /// Runs shorter than this many points are discarded
    pub min_run_len: usize,
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            dx_max: 1.0,
            dy_max: 1.0,
            min_run_len: 50,
        }
    }
}

/// Jump tolerances of the 3-sample continuity filter
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ContinuityConfig {
    pub dx_tolerance: f64,
    pub dy_tolerance: f64,
}

impl Default for ContinuityConfig {
    fn default() -> Self {
        Self {
            dx_tolerance: 2.0,
            dy_tolerance: 2.0,
        }
    }
}

/// Per-sample pipeline behaviour
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Execution budget of one transform invocation
    pub transform_budget_ms: u64,
    /// Append the raw profile to every output for visualization
    pub echo_profile: bool,
    /// Capacity of the lock-free ingress queue
    pub ingress_capacity: usize,
    /// Task selected at startup
    pub initial_task: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            transform_budget_ms: 20,
            echo_profile: true,
            ingress_capacity: 64,
            initial_task: 0,
        }
    }
}

/// Location of persisted transform definitions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub definitions_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            definitions_path: PathBuf::from("assets/transforms.json"),
        }
    }
}

/// Correction added to the primary pick (never to the profile echo)
///
/// The configured value is the startup offset; operators adjust it at runtime
/// through the control surface.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct OffsetConfig {
    pub x: f64,
    pub y: f64,
}

impl AppConfig {
    /// Load configuration from JSON file
    ///
    /// # Arguments
    /// * `path` - Path to JSON config file
    ///
    /// # Returns
    /// Loaded configuration, or defaults if the file is missing or invalid
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(config) => {
                    log::info!("[Config] Loaded configuration from {:?}", path.as_ref());
                    config
                }
                Err(err) => {
                    log::warn!(
                        "[Config] Failed to parse JSON from {:?}: {}. Using defaults.",
                        path.as_ref(),
                        err
                    );
                    Self::default()
                }
            },
            Err(err) => {
                log::warn!(
                    "[Config] Failed to read config file {:?}: {}. Using defaults.",
                    path.as_ref(),
                    err
                );
                Self::default()
            }
        }
    }

    /// Load configuration from the default asset location
    pub fn load() -> Self {
        Self::load_from_file("assets/seam_config.json")
    }
}
