//! Asset endpoint handlers.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};

use super::{error_response, SharedState};
use crate::Asset;

/// Query parameters for listing assets.
#[derive(Debug, Default, Deserialize)]
pub struct ListAssetsQuery {
    pub limit: Option<u64>,
    pub offset: Option<u64>,
    pub filter: Option<String>,
}

/// Response for listing assets.
#[derive(Debug, Serialize)]
pub struct ListAssetsResponse {
    pub assets: Vec<Asset>,
    pub total: i64,
}

/// GET /assets/{uuid}
pub async fn get_asset(
    State(state): State<SharedState>,
    Path(uuid): Path<String>,
) -> impl IntoResponse {
    let state = state.read().await;

    match state.get_asset(&uuid) {
        Some(asset) => (StatusCode::OK, Json(asset.clone())).into_response(),
        None => error_response(
            StatusCode::NOT_FOUND,
            format!("No asset found with uuid: {}", uuid),
        ),
    }
}

/// GET /assets
pub async fn list_assets(
    State(state): State<SharedState>,
    Query(query): Query<ListAssetsQuery>,
) -> impl IntoResponse {
    let state = state.read().await;

    let limit = query.limit.unwrap_or(100) as usize;
    let offset = query.offset.unwrap_or(0) as usize;

    let all_assets = state.list_assets(query.filter.as_deref());
    let total = if state.hide_totals {
        -1
    } else {
        all_assets.len() as i64
    };

    let assets: Vec<Asset> = all_assets
        .into_iter()
        .skip(offset)
        .take(limit)
        .cloned()
        .collect();

    (StatusCode::OK, Json(ListAssetsResponse { assets, total }))
}
