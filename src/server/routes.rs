// src/server/routes.rs

use std::sync::Arc;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::extract::{Path, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::errors::BridgeError;
use crate::exec::RunTarget;

use super::BridgeState;
use super::packs::list_packs;

pub const RUN_ENDPOINT: &str = "/run";
pub const PACK_RUN_ENDPOINT: &str = "/packs/{slug}/run";
pub const PACK_INSTALL_ENDPOINT: &str = "/packs/{slug}/install";
pub const PACKS_ENDPOINT: &str = "/packs";
pub const HEALTH_ENDPOINT: &str = "/health";

const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";

pub fn build_router(state: Arc<BridgeState>) -> Router {
    Router::new()
        .route(RUN_ENDPOINT, post(handle_run))
        .route(PACK_RUN_ENDPOINT, post(handle_pack_run))
        .route(PACK_INSTALL_ENDPOINT, post(handle_pack_install))
        .route(PACKS_ENDPOINT, get(handle_list_packs))
        .route(HEALTH_ENDPOINT, get(handle_health))
        .with_state(state)
}

/// Serialize `value` with the bridge's JSON content type.
pub fn json_response(status: StatusCode, value: &Value) -> Response {
    let body = serde_json::to_vec(value)
        .unwrap_or_else(|_| br#"{"error":"failed to encode response"}"#.to_vec());
    (
        status,
        [(CONTENT_TYPE, HeaderValue::from_static(JSON_CONTENT_TYPE))],
        body,
    )
        .into_response()
}

impl IntoResponse for BridgeError {
    fn into_response(self) -> Response {
        json_response(self.status_code(), &self.payload())
    }
}

async fn handle_health() -> Response {
    json_response(StatusCode::OK, &json!({ "status": "ok" }))
}

async fn handle_run(State(state): State<Arc<BridgeState>>, body: Body) -> Response {
    let target = state.default_target();
    relay(&state, target, body).await
}

async fn handle_pack_run(
    State(state): State<Arc<BridgeState>>,
    Path(slug): Path<String>,
    body: Body,
) -> Response {
    match state.pack_target(&slug).await {
        Ok(target) => relay(&state, target, body).await,
        Err(err) => {
            debug!(slug = %slug, error = %err, "rejecting pack request");
            err.into_response()
        }
    }
}

/// Install a pack's requirements. Replies always carry `ok`; an installer
/// that ran but failed is reported with 200 and its exit code.
async fn handle_pack_install(
    State(state): State<Arc<BridgeState>>,
    Path(slug): Path<String>,
) -> Response {
    let result = match state.install_target(&slug).await {
        Ok(target) => state.backend().install(target).await,
        Err(err) => Err(err),
    };

    match result {
        Ok(outcome) if outcome.succeeded() => json_response(
            StatusCode::OK,
            &json!({ "ok": true, "log": outcome.log, "code": outcome.code }),
        ),
        Ok(outcome) => {
            warn!(slug = %slug, exit_code = outcome.code, "requirements install failed");
            json_response(
                StatusCode::OK,
                &json!({
                    "ok": false,
                    "error": format!("pip exited with {}", outcome.code),
                    "log": outcome.log,
                    "stderr": outcome.stderr,
                    "code": outcome.code,
                }),
            )
        }
        Err(err) => {
            debug!(slug = %slug, error = %err, "requirements install rejected");
            install_error_response(&err)
        }
    }
}

fn install_error_response(err: &BridgeError) -> Response {
    let mut payload = match err {
        BridgeError::Timeout { stderr } => json!({ "error": "pip timeout", "stderr": stderr }),
        other => other.payload(),
    };
    if let Value::Object(map) = &mut payload {
        map.insert("ok".to_string(), Value::Bool(false));
    }
    json_response(err.status_code(), &payload)
}

async fn handle_list_packs(State(state): State<Arc<BridgeState>>) -> Response {
    let Some(root) = state.packs_root() else {
        return json_response(StatusCode::OK, &json!({ "packs": [] }));
    };

    match list_packs(root, state.script()).await {
        Ok(packs) => json_response(StatusCode::OK, &json!({ "packs": packs })),
        Err(err) => {
            warn!(root = %root.display(), error = %err, "failed to list packs");
            err.into_response()
        }
    }
}

/// Read the body, hand it to the backend, and shape the result.
async fn relay(state: &BridgeState, target: RunTarget, body: Body) -> Response {
    let bytes = match to_bytes(body, state.max_body_bytes()).await {
        Ok(bytes) => bytes,
        Err(err) => {
            debug!(error = %err, "failed to read request body");
            return BridgeError::BadRequest("failed to read request body".to_string())
                .into_response();
        }
    };

    if bytes.iter().all(u8::is_ascii_whitespace) {
        return BridgeError::BadRequest("No input".to_string()).into_response();
    }

    match state.backend().invoke(target, bytes.to_vec()).await {
        Ok(value) => json_response(StatusCode::OK, &value),
        Err(err) => {
            debug!(error = %err, status = err.status_code().as_u16(), "runner request failed");
            err.into_response()
        }
    }
}
