//! Maps engine and gate errors onto HTTP status codes and the JSON error
//! envelope `{"error": "..."}`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use uuid::Uuid;

use utxoledger_gate::GateError;
use utxoledger_indexer::IndexerError;

/// An error ready to be turned into an HTTP response, carrying the
/// correlation id under which it was logged.
pub struct ApiError {
    status: StatusCode,
    message: String,
    request_id: Uuid,
}

impl ApiError {
    pub fn new(request_id: Uuid, status: StatusCode, message: impl Into<String>) -> Self {
        ApiError {
            status,
            message: message.into(),
            request_id,
        }
    }

    pub fn from_indexer(request_id: Uuid, err: IndexerError) -> Self {
        let status = match &err {
            IndexerError::InvalidBlockHeight { .. }
            | IndexerError::InvalidInputOutputSum(_)
            | IndexerError::InvalidBlockId { .. }
            | IndexerError::InvalidRollbackHeight(_)
            | IndexerError::NoBlocksToRollback(_) => StatusCode::BAD_REQUEST,
            IndexerError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        ApiError::new(request_id, status, err.to_string())
    }

    pub fn from_gate(request_id: Uuid, err: GateError) -> Self {
        ApiError::new(request_id, StatusCode::REQUEST_TIMEOUT, err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        log::error!(
            "request {} failed ({}): {}",
            self.request_id,
            self.status,
            self.message
        );
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}
