//! HTTP boundary adapters (C6): routes requests to C3/C4/C5, serialized
//! through the Serialization Gate (C2) for the two write paths.

use std::collections::HashMap;
use std::time::Duration;

use axum::extract::{Extension, Path, Query};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use utxoledger_core::Block;
use utxoledger_indexer::{get_balance, process_block, rollback_to_height};

use crate::error::ApiError;
use crate::state::{AppState, DEFAULT_GATE_TTL};

/// Builds the full router with `state` attached via `Extension`, matching
/// the teacher's `RpcContext` wiring.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/blocks", post(post_blocks))
        .route("/balance/:address", get(balance))
        .route("/rollback", post(rollback))
        .layer(TraceLayer::new_for_http())
        .layer(Extension(state))
}

async fn root() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

/// Parses `x-block-ttl` into a gate acquire timeout, defaulting to 5000ms.
fn gate_ttl(headers: &HeaderMap, request_id: Uuid) -> Result<Duration, ApiError> {
    let Some(value) = headers.get("x-block-ttl") else {
        return Ok(DEFAULT_GATE_TTL);
    };
    let parsed = value.to_str().ok().and_then(|s| s.parse::<i64>().ok());
    match parsed {
        Some(ms) if ms > 0 => Ok(Duration::from_millis(ms as u64)),
        _ => Err(ApiError::new(
            request_id,
            StatusCode::BAD_REQUEST,
            "Invalid x-block-ttl header value",
        )),
    }
}

async fn post_blocks(
    Extension(state): Extension<AppState>,
    headers: HeaderMap,
    Json(block): Json<Block>,
) -> Result<impl IntoResponse, ApiError> {
    let request_id = Uuid::new_v4();
    let ttl = gate_ttl(&headers, request_id)?;
    let _guard = state
        .gate
        .acquire(ttl)
        .await
        .map_err(|e| ApiError::from_gate(request_id, e))?;

    process_block(state.store.as_ref(), &block)
        .await
        .map_err(|e| ApiError::from_indexer(request_id, e))?;

    Ok(Json(json!({ "success": true })))
}

async fn balance(
    Extension(state): Extension<AppState>,
    Path(address): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let request_id = Uuid::new_v4();
    let value = get_balance(state.store.as_ref(), &address)
        .await
        .map_err(|e| ApiError::from_indexer(request_id, e))?;

    Ok(Json(json!({ "balance": value })))
}

async fn rollback(
    Extension(state): Extension<AppState>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Result<impl IntoResponse, ApiError> {
    let request_id = Uuid::new_v4();
    let ttl = gate_ttl(&headers, request_id)?;

    let height: i64 = match params.get("height").and_then(|v| v.parse().ok()) {
        Some(h) => h,
        None => {
            return Err(ApiError::new(
                request_id,
                StatusCode::BAD_REQUEST,
                "Missing or invalid height query parameter",
            ))
        }
    };

    let _guard = state
        .gate
        .acquire(ttl)
        .await
        .map_err(|e| ApiError::from_gate(request_id, e))?;

    rollback_to_height(state.store.as_ref(), height)
        .await
        .map_err(|e| ApiError::from_indexer(request_id, e))?;

    Ok(Json(json!({ "success": true })))
}
