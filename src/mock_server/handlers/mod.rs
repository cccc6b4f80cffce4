//! HTTP request handlers for the mock server.

pub mod assets;
pub mod audit_log;
pub mod exports;

pub use assets::*;
pub use audit_log::*;
pub use exports::*;

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use tokio::sync::RwLock;

use crate::mock_server::state::MockState;

/// Shared handle to the mock state.
pub type SharedState = Arc<RwLock<MockState>>;

/// JSON error body in the shape the Tenable API uses.
pub fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        [("x-request-uuid", "mock-request")],
        Json(serde_json::json!({
            "statusCode": status.as_u16(),
            "error": status.canonical_reason().unwrap_or("Error"),
            "message": message.into(),
        })),
    )
        .into_response()
}

/// Reject requests without the configured `X-APIKeys` header.
pub async fn require_keys(
    State(state): State<SharedState>,
    request: Request,
    next: Next,
) -> Response {
    let required = state.read().await.required_keys.clone();

    if let Some(keys) = required {
        let provided = request
            .headers()
            .get("x-apikeys")
            .and_then(|v| v.to_str().ok());
        if provided != Some(keys.as_str()) {
            return error_response(StatusCode::UNAUTHORIZED, "Invalid Credentials");
        }
    }

    next.run(request).await
}
