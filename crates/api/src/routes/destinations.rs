//! Destination feed routes.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::Utc;
use domain::models::visiting::FeedResponse;
use domain::services::directory::LocationScope;
use persistence::repositories::{PgLocationScope, VisitingRepository};
use serde::{Deserialize, Serialize};
use shared::pagination::{clamp_page_size, decode_cursor, encode_cursor};
use uuid::Uuid;

use crate::app::AppState;
use crate::error::ApiError;
use crate::routes::visitings::view_from;

const MAX_FEED_PAGE: i64 = 50;

/// Query parameters for the destination visiting feed.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct FeedQuery {
    pub cursor: Option<String>,
    #[serde(default = "default_feed_limit")]
    pub limit: i64,
}

fn default_feed_limit() -> i64 {
    20
}

/// Cursor-paginated feed of a destination's visitings, newest first.
///
/// GET /api/v1/destinations/:id/visitings
pub async fn visiting_feed(
    State(state): State<AppState>,
    Path(destination_id): Path<Uuid>,
    Query(query): Query<FeedQuery>,
) -> Result<Json<FeedResponse>, ApiError> {
    let limit = clamp_page_size(query.limit, MAX_FEED_PAGE);

    let cursor = match &query.cursor {
        Some(raw) => Some(
            decode_cursor(raw).map_err(|err| ApiError::Validation(err.to_string()))?,
        ),
        None => None,
    };

    let repo = VisitingRepository::new(state.pool.clone());
    let rows = repo
        .feed_for_destination(destination_id, cursor, limit)
        .await?;

    let next_cursor = if rows.len() as i64 == limit {
        rows.last().map(|row| encode_cursor(row.created_at, row.id))
    } else {
        None
    };

    let now = Utc::now();
    let data = rows.into_iter().map(|row| view_from(row, now)).collect();

    Ok(Json(FeedResponse { data, next_cursor }))
}

/// A gate keeper's destination scope.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct ScopeResponse {
    pub data: Vec<Uuid>,
}

/// Destinations a gate keeper may act on, derived from their assigned
/// buildings.
///
/// GET /api/v1/gate-keepers/:id/destinations
pub async fn assigned_destinations(
    State(state): State<AppState>,
    Path(gate_keeper_id): Path<Uuid>,
) -> Result<Json<ScopeResponse>, ApiError> {
    let scope = PgLocationScope::new(state.pool.clone());
    let mut data: Vec<Uuid> = scope
        .assigned_destinations(gate_keeper_id)
        .await?
        .into_iter()
        .collect();
    data.sort();

    Ok(Json(ScopeResponse { data }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feed_query_defaults() {
        let query: FeedQuery = serde_json::from_str("{}").unwrap();
        assert_eq!(query.limit, 20);
        assert!(query.cursor.is_none());
    }
}
