//! Engine module housing the tracker core.
//!
//! `core` exposes [`TrackerHandle`], the orchestration layer shared by the
//! CLI, the control surface and the HTTP server.

pub mod core;

pub use core::{ProfileSender, TrackerHandle};
