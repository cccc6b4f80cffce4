//! Export endpoint handlers.
//!
//! Every export kind shares these handlers; the router binds the kind when
//! it registers the routes.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::Value;

use super::{error_response, SharedState};
use crate::jobs::ExportKind;
use crate::{DEFAULT_ASSET_CHUNK_SIZE, DEFAULT_NUM_ASSETS};

/// Records per chunk requested by an export body.
fn requested_chunk_size(kind: ExportKind, body: &Value) -> u64 {
    let (field, default) = match kind {
        ExportKind::Assets => ("chunk_size", DEFAULT_ASSET_CHUNK_SIZE),
        ExportKind::Vulns | ExportKind::Compliance => ("num_assets", DEFAULT_NUM_ASSETS),
    };
    body.get(field)
        .and_then(Value::as_u64)
        .unwrap_or(u64::from(default))
}

/// POST /{kind}/export
pub async fn create_export(kind: ExportKind, state: SharedState, body: Value) -> Response {
    let chunk_size = requested_chunk_size(kind, &body);
    let mut state = state.write().await;
    let uuid = state.create_export(kind, chunk_size as usize);

    (
        StatusCode::OK,
        Json(serde_json::json!({ "export_uuid": uuid })),
    )
        .into_response()
}

/// GET /{kind}/export/{uuid}/status
pub async fn export_status(kind: ExportKind, state: SharedState, uuid: String) -> Response {
    let mut state = state.write().await;

    match state.poll_export(kind, &uuid) {
        Some(status) => (StatusCode::OK, Json(status)).into_response(),
        None => error_response(
            StatusCode::NOT_FOUND,
            format!("Export {} not found", uuid),
        ),
    }
}

/// GET /{kind}/export/{uuid}/chunks/{chunk_id}
pub async fn export_chunk(
    kind: ExportKind,
    state: SharedState,
    uuid: String,
    chunk_id: u64,
) -> Response {
    let state = state.read().await;

    match state.export_chunk(kind, &uuid, chunk_id) {
        Some(data) => (
            StatusCode::OK,
            [("content-type", "application/json")],
            data.to_vec(),
        )
            .into_response(),
        None => error_response(
            StatusCode::NOT_FOUND,
            format!("Chunk {} of export {} not available", chunk_id, uuid),
        ),
    }
}

/// POST /{kind}/export/{uuid}/cancel
pub async fn cancel_export(kind: ExportKind, state: SharedState, uuid: String) -> Response {
    let mut state = state.write().await;

    if state.cancel_export(kind, &uuid) {
        (
            StatusCode::OK,
            Json(serde_json::json!({ "status": "CANCELLED" })),
        )
            .into_response()
    } else {
        error_response(
            StatusCode::NOT_FOUND,
            format!("Export {} not found", uuid),
        )
    }
}

/// GET /{kind}/export/status
pub async fn list_exports(kind: ExportKind, state: SharedState) -> Response {
    let state = state.read().await;
    let exports = state.list_exports(kind);

    (
        StatusCode::OK,
        Json(serde_json::json!({ "exports": exports })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_size_from_body_or_default() {
        let body = serde_json::json!({"chunk_size": 250});
        assert_eq!(requested_chunk_size(ExportKind::Assets, &body), 250);
        assert_eq!(requested_chunk_size(ExportKind::Vulns, &body), 500);
        assert_eq!(
            requested_chunk_size(ExportKind::Vulns, &serde_json::json!({"num_assets": 2})),
            2
        );
    }
}
