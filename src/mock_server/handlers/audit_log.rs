//! Audit log endpoint handlers.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;

use super::SharedState;
use crate::AuditEvent;

/// Query parameters for listing audit events.
#[derive(Debug, Default, Deserialize)]
pub struct ListEventsQuery {
    pub limit: Option<u64>,
    pub offset: Option<u64>,
    pub f: Option<String>,
}

/// GET /audit-log/v1/events
pub async fn list_audit_events(
    State(state): State<SharedState>,
    Query(query): Query<ListEventsQuery>,
) -> impl IntoResponse {
    let state = state.read().await;

    let limit = query.limit.unwrap_or(50);
    let offset = query.offset.unwrap_or(0);

    let all_events = state.list_audit_events(query.f.as_deref());
    let total = if state.hide_totals {
        -1
    } else {
        all_events.len() as i64
    };

    let events: Vec<AuditEvent> = all_events
        .into_iter()
        .skip(offset as usize)
        .take(limit as usize)
        .cloned()
        .collect();

    (
        StatusCode::OK,
        Json(serde_json::json!({
            "events": events,
            "pagination": {"total": total, "limit": limit, "offset": offset},
        })),
    )
}
