use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::extract::{Path, Query, State};
use axum::http::header::{HeaderName, AUTHORIZATION};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use serde::{Deserialize, Serialize};

use crate::api::{ControlOutcome, ControlReply, ControlSurface, RegistryErrorCodes};
use crate::telemetry::TelemetrySnapshot;

use super::sse;

/// Shared application state for HTTP handlers.
#[derive(Clone)]
pub struct ControlHttpState {
    pub surface: ControlSurface,
    token: Arc<String>,
}

impl ControlHttpState {
    pub fn new(surface: ControlSurface, token: String) -> Self {
        Self {
            surface,
            token: Arc::new(token),
        }
    }

    fn authorize(
        &self,
        headers: &HeaderMap,
        query_token: Option<&str>,
    ) -> Result<(), HttpServerError> {
        let provided = extract_token(headers, query_token);
        match provided {
            Some(value) if value == *self.token => Ok(()),
            _ => Err(HttpServerError::Unauthorized),
        }
    }
}

/// Query payload for extracting token from URL.
#[derive(Debug, Default, Deserialize)]
pub struct AuthQuery {
    pub token: Option<String>,
}

/// HTTP error variants mapped to JSON responses.
#[derive(Debug)]
pub enum HttpServerError {
    Unauthorized,
    BadRequest(&'static str),
    Internal(String),
}

impl IntoResponse for HttpServerError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::Unauthorized => (StatusCode::UNAUTHORIZED, "missing or invalid token".into()),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.to_string()),
            Self::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

/// Health endpoint response payload.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub uptime_ms: u64,
    pub ingress_running: bool,
    pub active_task: Option<u32>,
    pub dropped_samples: u64,
}

#[derive(Debug, Deserialize)]
pub struct TaskRequest {
    pub id: i64,
}

#[derive(Debug, Deserialize)]
pub struct OffsetsRequest {
    pub x: Option<f64>,
    pub y: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct BodyRequest {
    pub body: Option<String>,
}

/// Build the Axum router with all handlers.
pub fn build_router(state: ControlHttpState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/task", get(get_task).post(set_task))
        .route("/offsets", get(get_offsets).post(set_offsets))
        .route(
            "/definitions",
            get(list_definitions)
                .put(replace_definitions)
                .post(append_definition)
                .delete(delete_definition),
        )
        .route("/definitions/:id", get(get_definition).put(set_definition))
        .route("/cursor", get(cursor))
        .route("/cursor/previous", post(cursor_previous))
        .route("/cursor/next", post(cursor_next))
        .route("/storage/dump", post(dump))
        .route("/storage/load", post(load))
        .route("/telemetry", get(telemetry))
        .route("/seam-stream", get(seam_stream))
        .with_state(state)
}

/// Run the HTTP server loop.
pub async fn run_http_server(state: ControlHttpState, addr: SocketAddr) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("binding control HTTP listener")?;
    let router = build_router(state);
    axum::serve(listener, router)
        .await
        .context("serving control HTTP router")?;
    Ok(())
}

pub async fn health(
    State(state): State<ControlHttpState>,
    Query(query): Query<AuthQuery>,
    headers: HeaderMap,
) -> Result<Json<HealthResponse>, HttpServerError> {
    state.authorize(&headers, query.token.as_deref())?;

    let handle = state.surface.handle();
    Ok(Json(HealthResponse {
        status: "ok",
        uptime_ms: handle.uptime_ms(),
        ingress_running: handle.is_ingress_running(),
        active_task: state.surface.get_task().into_value(),
        dropped_samples: handle.dropped_samples(),
    }))
}

pub async fn get_task(
    State(state): State<ControlHttpState>,
    Query(query): Query<AuthQuery>,
    headers: HeaderMap,
) -> Result<Response, HttpServerError> {
    state.authorize(&headers, query.token.as_deref())?;
    Ok(reply_response(state.surface.get_task()))
}

pub async fn set_task(
    State(state): State<ControlHttpState>,
    Query(query): Query<AuthQuery>,
    headers: HeaderMap,
    Json(request): Json<TaskRequest>,
) -> Result<Response, HttpServerError> {
    state.authorize(&headers, query.token.as_deref())?;
    Ok(outcome_response(state.surface.set_task(request.id)))
}

pub async fn get_offsets(
    State(state): State<ControlHttpState>,
    Query(query): Query<AuthQuery>,
    headers: HeaderMap,
) -> Result<Response, HttpServerError> {
    state.authorize(&headers, query.token.as_deref())?;
    Ok(reply_response(state.surface.get_offsets()))
}

pub async fn set_offsets(
    State(state): State<ControlHttpState>,
    Query(query): Query<AuthQuery>,
    headers: HeaderMap,
    Json(request): Json<OffsetsRequest>,
) -> Result<Response, HttpServerError> {
    state.authorize(&headers, query.token.as_deref())?;

    if request.x.is_none() && request.y.is_none() {
        return Err(HttpServerError::BadRequest(
            "at least one offset must be provided",
        ));
    }
    Ok(outcome_response(
        state.surface.set_offsets(request.x, request.y),
    ))
}

pub async fn list_definitions(
    State(state): State<ControlHttpState>,
    Query(query): Query<AuthQuery>,
    headers: HeaderMap,
) -> Result<Response, HttpServerError> {
    state.authorize(&headers, query.token.as_deref())?;
    Ok(reply_response(state.surface.list_definitions()))
}

/// Replace every definition; the request body is the `[{id, body}]` document
pub async fn replace_definitions(
    State(state): State<ControlHttpState>,
    Query(query): Query<AuthQuery>,
    headers: HeaderMap,
    document: String,
) -> Result<Response, HttpServerError> {
    state.authorize(&headers, query.token.as_deref())?;
    Ok(outcome_response(state.surface.set_definitions(&document)))
}

pub async fn append_definition(
    State(state): State<ControlHttpState>,
    Query(query): Query<AuthQuery>,
    headers: HeaderMap,
    Json(request): Json<BodyRequest>,
) -> Result<Response, HttpServerError> {
    state.authorize(&headers, query.token.as_deref())?;
    Ok(outcome_response(
        state.surface.append_definition(request.body.as_deref()),
    ))
}

pub async fn delete_definition(
    State(state): State<ControlHttpState>,
    Query(query): Query<AuthQuery>,
    headers: HeaderMap,
) -> Result<Response, HttpServerError> {
    state.authorize(&headers, query.token.as_deref())?;
    Ok(outcome_response(state.surface.delete_definition()))
}

pub async fn get_definition(
    State(state): State<ControlHttpState>,
    Path(id): Path<u32>,
    Query(query): Query<AuthQuery>,
    headers: HeaderMap,
) -> Result<Response, HttpServerError> {
    state.authorize(&headers, query.token.as_deref())?;
    Ok(reply_response(state.surface.get_definition(Some(id))))
}

pub async fn set_definition(
    State(state): State<ControlHttpState>,
    Path(id): Path<u32>,
    Query(query): Query<AuthQuery>,
    headers: HeaderMap,
    Json(request): Json<BodyRequest>,
) -> Result<Response, HttpServerError> {
    state.authorize(&headers, query.token.as_deref())?;

    let Some(body) = request.body else {
        return Err(HttpServerError::BadRequest("body is required"));
    };
    Ok(outcome_response(state.surface.set_definition(Some(id), &body)))
}

pub async fn cursor(
    State(state): State<ControlHttpState>,
    Query(query): Query<AuthQuery>,
    headers: HeaderMap,
) -> Result<Response, HttpServerError> {
    state.authorize(&headers, query.token.as_deref())?;
    Ok(reply_response(state.surface.cursor()))
}

pub async fn cursor_previous(
    State(state): State<ControlHttpState>,
    Query(query): Query<AuthQuery>,
    headers: HeaderMap,
) -> Result<Response, HttpServerError> {
    state.authorize(&headers, query.token.as_deref())?;
    Ok(reply_response(state.surface.previous()))
}

pub async fn cursor_next(
    State(state): State<ControlHttpState>,
    Query(query): Query<AuthQuery>,
    headers: HeaderMap,
) -> Result<Response, HttpServerError> {
    state.authorize(&headers, query.token.as_deref())?;
    Ok(reply_response(state.surface.next()))
}

pub async fn dump(
    State(state): State<ControlHttpState>,
    Query(query): Query<AuthQuery>,
    headers: HeaderMap,
) -> Result<Response, HttpServerError> {
    state.authorize(&headers, query.token.as_deref())?;
    Ok(outcome_response(state.surface.dump()))
}

pub async fn load(
    State(state): State<ControlHttpState>,
    Query(query): Query<AuthQuery>,
    headers: HeaderMap,
) -> Result<Response, HttpServerError> {
    state.authorize(&headers, query.token.as_deref())?;
    Ok(outcome_response(state.surface.load()))
}

pub async fn telemetry(
    State(state): State<ControlHttpState>,
    Query(query): Query<AuthQuery>,
    headers: HeaderMap,
) -> Result<Json<TelemetrySnapshot>, HttpServerError> {
    state.authorize(&headers, query.token.as_deref())?;
    Ok(Json(state.surface.telemetry_snapshot()))
}

pub async fn seam_stream(
    State(state): State<ControlHttpState>,
    Query(query): Query<AuthQuery>,
    headers: HeaderMap,
) -> Result<sse::SeamStream, HttpServerError> {
    state.authorize(&headers, query.token.as_deref())?;
    Ok(sse::seam_outputs(state.surface.handle()))
}

/// Status for a failed control result: unknown ids are 404, "nothing to do"
/// is 409, every other error code is 422
fn failure_status(code: i32) -> StatusCode {
    match code {
        0 => StatusCode::CONFLICT,
        RegistryErrorCodes::UNKNOWN_TASK => StatusCode::NOT_FOUND,
        _ => StatusCode::UNPROCESSABLE_ENTITY,
    }
}

fn outcome_response(outcome: ControlOutcome) -> Response {
    let status = if outcome.success {
        StatusCode::OK
    } else {
        failure_status(outcome.code)
    };
    (status, Json(outcome)).into_response()
}

fn reply_response<T: Serialize>(reply: ControlReply<T>) -> Response {
    let status = if reply.success {
        StatusCode::OK
    } else {
        failure_status(reply.code)
    };
    (status, Json(reply)).into_response()
}

fn extract_token(headers: &HeaderMap, query_token: Option<&str>) -> Option<String> {
    if let Some(token) = query_token {
        return Some(token.to_string());
    }

    static X_SEAM_TOKEN: HeaderName = HeaderName::from_static("x-seam-token");

    headers
        .get(&X_SEAM_TOKEN)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.to_string())
        .or_else(|| {
            headers
                .get(AUTHORIZATION)
                .and_then(|value| value.to_str().ok())
                .and_then(|raw| raw.strip_prefix("Bearer ").map(|v| v.to_string()))
        })
}

#[cfg(all(test, feature = "control_http"))]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Method, Request, StatusCode};
    use axum::response::Response;
    use serde_json::Value;
    use tower::ServiceExt;

    use crate::config::AppConfig;
    use crate::engine::TrackerHandle;

    const TOKEN: &str = "smoke-token";

    fn make_router() -> (Router, tempfile::TempDir) {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut config = AppConfig::default();
        config.storage.definitions_path = dir.path().join("transforms.json");
        std::fs::write(
            &config.storage.definitions_path,
            r#"[{"id":0,"body":"lowest"},{"id":1,"body":"highest"}]"#,
        )
        .expect("seed definitions");

        let surface = ControlSurface::new(Arc::new(TrackerHandle::from_config(config)));
        (build_router(ControlHttpState::new(surface, TOKEN.to_string())), dir)
    }

    fn request(method: Method, uri: &str, body: Option<Value>) -> Request<Body> {
        let builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(AUTHORIZATION, format!("Bearer {TOKEN}"));
        match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .expect("json request"),
            None => builder.body(Body::empty()).expect("empty request"),
        }
    }

    async fn response_json(response: Response) -> (StatusCode, Value) {
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("response body bytes");
        let json = serde_json::from_slice::<Value>(&bytes).expect("JSON body");
        (status, json)
    }

    #[tokio::test]
    async fn health_requires_token() {
        let (router, _dir) = make_router();
        let (status, json) = response_json(
            router
                .oneshot(
                    Request::builder()
                        .uri("/health")
                        .body(Body::empty())
                        .expect("health request"),
                )
                .await
                .expect("health call"),
        )
        .await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(json["error"], "missing or invalid token");
    }

    #[tokio::test]
    async fn health_reports_active_task() {
        let (router, _dir) = make_router();
        let (status, json) = response_json(
            router
                .oneshot(
                    Request::builder()
                        .uri(format!("/health?token={TOKEN}"))
                        .body(Body::empty())
                        .expect("health request"),
                )
                .await
                .expect("health call"),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "ok");
        assert_eq!(json["active_task"], 0);
        assert_eq!(json["ingress_running"], false);
    }

    #[tokio::test]
    async fn set_task_switches_and_reports_failures() {
        let (router, _dir) = make_router();

        let (status, json) = response_json(
            router
                .clone()
                .oneshot(request(Method::POST, "/task", Some(serde_json::json!({"id": 1}))))
                .await
                .expect("task call"),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["message"], "Task 1 selected (was 0)");

        let (status, json) = response_json(
            router
                .oneshot(request(Method::POST, "/task", Some(serde_json::json!({"id": -3}))))
                .await
                .expect("task call"),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(json["code"], RegistryErrorCodes::INVALID_TASK_ID);
    }

    #[tokio::test]
    async fn offsets_require_a_value() {
        let (router, _dir) = make_router();

        let (status, _) = response_json(
            router
                .clone()
                .oneshot(request(Method::POST, "/offsets", Some(serde_json::json!({}))))
                .await
                .expect("offsets call"),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, json) = response_json(
            router
                .clone()
                .oneshot(request(
                    Method::POST,
                    "/offsets",
                    Some(serde_json::json!({"x": 1.5})),
                ))
                .await
                .expect("offsets call"),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["success"], true);

        let (_, json) = response_json(
            router
                .oneshot(request(Method::GET, "/offsets", None))
                .await
                .expect("offsets call"),
        )
        .await;
        assert_eq!(json["value"]["x"], 1.5);
        assert_eq!(json["value"]["y"], 0.0);
    }

    #[tokio::test]
    async fn unknown_definition_is_not_found() {
        let (router, _dir) = make_router();
        let (status, json) = response_json(
            router
                .oneshot(request(Method::GET, "/definitions/7", None))
                .await
                .expect("definition call"),
        )
        .await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["code"], RegistryErrorCodes::UNKNOWN_TASK);
    }

    #[tokio::test]
    async fn append_then_list_definitions() {
        let (router, _dir) = make_router();

        let (status, json) = response_json(
            router
                .clone()
                .oneshot(request(
                    Method::POST,
                    "/definitions",
                    Some(serde_json::json!({"body": "segment\npick 0"})),
                ))
                .await
                .expect("append call"),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["message"], "Task 2 appended");

        let (_, json) = response_json(
            router
                .oneshot(request(Method::GET, "/definitions", None))
                .await
                .expect("list call"),
        )
        .await;
        let listed = json["value"].as_array().expect("definition array");
        assert_eq!(listed.len(), 3);
        assert_eq!(listed[2]["body"], "segment\npick 0");
        assert_eq!(listed[2]["valid"], true);
    }
}
