//! Visitor registry routes.
//!
//! The registry is keyed by mobile number: gates look visitors up to
//! prefill a walk-in, and upsert identity details as documents are seen.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use domain::models::visiting::VisitorIdentityRequest;
use domain::models::Visitor;
use persistence::repositories::VisitorRepository;
use serde::Deserialize;
use tracing::info;
use validator::Validate;

use crate::app::AppState;
use crate::error::ApiError;

/// Query parameters for the registry lookup.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct VisitorLookupQuery {
    pub mobile_number: String,
}

/// Look a visitor up by mobile number.
///
/// GET /api/v1/visitors/lookup?mobile_number=...
pub async fn lookup_visitor(
    State(state): State<AppState>,
    Query(query): Query<VisitorLookupQuery>,
) -> Result<Json<Visitor>, ApiError> {
    shared::validation::validate_mobile_number(&query.mobile_number)
        .map_err(|err| ApiError::Validation(err.to_string()))?;

    let repo = VisitorRepository::new(state.pool.clone());
    let visitor = repo
        .find_by_mobile(&query.mobile_number)
        .await?
        .ok_or_else(|| ApiError::NotFound("No visitor with that mobile number".into()))?;

    Ok(Json(visitor.into()))
}

/// Upsert a visitor identity record.
///
/// POST /api/v1/visitors
///
/// The first sighting of a mobile number creates the record; later
/// sightings update it in place.
pub async fn upsert_visitor(
    State(state): State<AppState>,
    Json(request): Json<VisitorIdentityRequest>,
) -> Result<(StatusCode, Json<Visitor>), ApiError> {
    request.validate()?;

    let repo = VisitorRepository::new(state.pool.clone());
    let visitor = repo.upsert(&request).await?;

    info!(
        visitor_id = %visitor.id,
        "Visitor identity upserted"
    );

    Ok((StatusCode::OK, Json(visitor.into())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_query_deserialize() {
        let query: VisitorLookupQuery =
            serde_json::from_str(r#"{"mobile_number":"9876543210"}"#).unwrap();
        assert_eq!(query.mobile_number, "9876543210");
    }
}
