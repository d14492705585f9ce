//! HTTP control server, compiled only with the `control_http` feature.
//!
//! This module spawns an Axum server exposing the control surface (task
//! selection, offsets, definition editing, storage) plus an SSE stream of
//! seam outputs.

#[cfg(feature = "control_http")]
mod routes;
#[cfg(feature = "control_http")]
mod sse;

#[cfg(feature = "control_http")]
pub use routes::{build_router, run_http_server, ControlHttpState, HttpServerError};

use std::net::SocketAddr;

use crate::api::ControlSurface;

/// Default bind address when `SEAM_HTTP_ADDR` is unset or unparsable
pub const DEFAULT_HTTP_ADDR: ([u8; 4], u16) = ([127, 0, 0, 1], 8790);

/// Bind address and access token of the control server
#[derive(Debug, Clone)]
pub struct HttpSettings {
    pub addr: SocketAddr,
    pub token: String,
}

impl HttpSettings {
    /// Read `SEAM_HTTP_ADDR` and `SEAM_HTTP_TOKEN`, falling back to defaults
    pub fn from_env() -> Self {
        let addr = std::env::var("SEAM_HTTP_ADDR")
            .ok()
            .and_then(|raw| raw.parse().ok())
            .unwrap_or_else(|| SocketAddr::from(DEFAULT_HTTP_ADDR));
        let token =
            std::env::var("SEAM_HTTP_TOKEN").unwrap_or_else(|_| "seam-control".to_string());
        Self { addr, token }
    }

    /// First characters of the token, safe to log
    pub fn token_preview(&self) -> String {
        self.token.chars().take(4).collect()
    }
}

/// Spawn the control server on its own thread and runtime.
///
/// Returns `false` when the feature is disabled or the runtime could not be
/// built.
#[cfg(feature = "control_http")]
pub fn spawn_if_enabled(surface: ControlSurface, settings: HttpSettings) -> bool {
    use log::{error, info};

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(err) => {
            error!("[ControlHttp] Failed to build tokio runtime: {}", err);
            return false;
        }
    };

    info!(
        "[ControlHttp] Binding {} (token prefix {}***)",
        settings.addr,
        settings.token_preview()
    );

    std::thread::spawn(move || {
        runtime.block_on(async move {
            let state = ControlHttpState::new(surface, settings.token);
            if let Err(err) = run_http_server(state, settings.addr).await {
                error!("[ControlHttp] Server stopped: {}", err);
            }
        });
    });
    true
}

#[cfg(not(feature = "control_http"))]
pub fn spawn_if_enabled(_surface: ControlSurface, _settings: HttpSettings) -> bool {
    log::info!("[ControlHttp] Built without the control_http feature; server disabled");
    false
}
