//! Visiting routes: creation, transitions, decisions, lookups, and edits.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use domain::models::preapproval::{generate_visitor_code, resolve_window, WindowSpec};
use domain::models::status::{initial_walk_in_status, VisitingStatus, VisitingStatusEvent};
use domain::models::visiting::{
    CardStatus, CreateMultiWalkInRequest, CreatePreapprovedRequest, CreateWalkInRequest,
    DecisionRequest, EventHistoryResponse, MultiWalkInResponse, TransitionRequest,
    UpdatePreapprovalRequest, UpdateVisitorDetailsRequest, VisitingView, WalkInOutcome,
    WalkInResponse, WindowRequest,
};
use domain::models::Visitor;
use domain::services::directory::ResidentDirectory;
use domain::services::{NoticeKind, VisitNotice};
use domain::VisitError;
use persistence::entities::{StatusEventEntity, VisitingEntity, VisitingWithWindowEntity};
use persistence::repositories::{
    GateScopeRepository, LedgerRepository, PgResidentDirectory, VisitingRepository,
};
use serde::Deserialize;
use tracing::{info, warn};
use uuid::Uuid;
use validator::Validate;

use crate::app::AppState;
use crate::error::ApiError;
use crate::services::notify::notify_best_effort;

/// Create a preapproved visiting.
///
/// POST /api/v1/visitings/preapproved
pub async fn create_preapproved(
    State(state): State<AppState>,
    Json(request): Json<CreatePreapprovedRequest>,
) -> Result<(StatusCode, Json<VisitingView>), ApiError> {
    request.validate()?;

    let now = Utc::now();
    let (in_time, out_time) = resolve_request_window(&request.window, now)?;

    let repo = VisitingRepository::new(state.pool.clone());

    // Frequent passes are matched by resident/destination; one-off
    // windows carry a shareable code for the gate.
    let visitor_code = if request.window.is_frequent {
        None
    } else {
        Some(repo.generate_unique_code(generate_visitor_code).await?)
    };

    let (visiting, window) = repo
        .create_preapproved(&request, in_time, out_time, visitor_code)
        .await?;

    info!(
        visiting_id = %visiting.id,
        destination_id = %visiting.destination_id,
        resident_id = %request.resident_id,
        is_frequent = request.window.is_frequent,
        "Preapproved visiting created"
    );

    notify_best_effort(
        state.notifier.as_ref(),
        VisitNotice {
            kind: NoticeKind::PreapprovalCreated,
            visiting_id: visiting.id,
            destination_id: visiting.destination_id,
            actor_id: None,
            timestamp: now,
        },
    )
    .await;

    let view = VisitingView {
        card_status: CardStatus::derive(None, Some(window.out_time), now),
        current_status: None,
        visiting: visiting.into(),
        window: Some(window.into()),
    };

    Ok((StatusCode::CREATED, Json(view)))
}

/// Register a walk-in at a single destination.
///
/// POST /api/v1/visitings/walk-in
pub async fn create_walk_in(
    State(state): State<AppState>,
    Json(request): Json<CreateWalkInRequest>,
) -> Result<(StatusCode, Json<WalkInResponse>), ApiError> {
    request.validate()?;

    let (visiting, event) = register_walk_in(&state, &request).await?;

    Ok((
        StatusCode::CREATED,
        Json(WalkInResponse {
            visiting: visiting.into(),
            event: event.into(),
        }),
    ))
}

/// Register one walk-in visitor at several destinations.
///
/// POST /api/v1/visitings/walk-in/batch
///
/// Each destination is an independent sub-transaction: a failure on one
/// never rolls back or aborts the others, and the response reports every
/// outcome.
pub async fn create_walk_in_batch(
    State(state): State<AppState>,
    Json(request): Json<CreateMultiWalkInRequest>,
) -> Result<Json<MultiWalkInResponse>, ApiError> {
    request.validate()?;

    let mut data = Vec::with_capacity(request.destination_ids.len());

    for destination_id in &request.destination_ids {
        let single = CreateWalkInRequest {
            destination_id: *destination_id,
            category_id: request.category_id,
            gate_keeper_id: request.gate_keeper_id,
            display_name: request.display_name.clone(),
            headcount: 1,
            details: request.details.clone(),
            visitor: request.visitor.clone(),
        };

        match register_walk_in(&state, &single).await {
            Ok((visiting, event)) => data.push(WalkInOutcome {
                destination_id: *destination_id,
                visiting_id: Some(visiting.id),
                initial_status: Some(event.status.into()),
                error: None,
            }),
            Err(err) => {
                warn!(
                    destination_id = %destination_id,
                    error = %err,
                    "Walk-in registration failed for destination"
                );
                data.push(WalkInOutcome {
                    destination_id: *destination_id,
                    visiting_id: None,
                    initial_status: None,
                    error: Some(err.to_string()),
                });
            }
        }
    }

    Ok(Json(MultiWalkInResponse { data }))
}

async fn register_walk_in(
    state: &AppState,
    request: &CreateWalkInRequest,
) -> Result<(VisitingEntity, StatusEventEntity), VisitError> {
    let directory = PgResidentDirectory::new(state.pool.clone());
    let resident = directory
        .resident_for_destination(request.destination_id)
        .await?;

    // No resident means nobody to approve: straight to CHECKIN
    let initial_status = initial_walk_in_status(resident.is_some());

    let repo = VisitingRepository::new(state.pool.clone());
    let (visiting, event) = repo.create_walk_in(request, initial_status.into()).await?;

    info!(
        visiting_id = %visiting.id,
        destination_id = %visiting.destination_id,
        gate_keeper_id = %request.gate_keeper_id,
        initial_status = %initial_status,
        "Walk-in visiting created"
    );

    notify_best_effort(
        state.notifier.as_ref(),
        VisitNotice {
            kind: NoticeKind::for_transition(initial_status, true),
            visiting_id: visiting.id,
            destination_id: visiting.destination_id,
            actor_id: Some(request.gate_keeper_id),
            timestamp: event.created_at,
        },
    )
    .await;

    Ok((visiting, event))
}

/// Record a gate-initiated status transition.
///
/// POST /api/v1/visitings/:id/transition
pub async fn submit_transition(
    State(state): State<AppState>,
    Path(visiting_id): Path<Uuid>,
    Json(request): Json<TransitionRequest>,
) -> Result<Json<VisitingStatusEvent>, ApiError> {
    let status: VisitingStatus = request.status.parse().map_err(ApiError::from)?;

    let ledger = LedgerRepository::new(state.pool.clone());
    let (event, destination_id) = ledger
        .transition(visiting_id, status, Some(request.gate_keeper_id))
        .await?;

    info!(
        visiting_id = %visiting_id,
        status = %status,
        gate_keeper_id = %request.gate_keeper_id,
        seq = event.seq,
        "Status transition recorded"
    );

    notify_best_effort(
        state.notifier.as_ref(),
        VisitNotice {
            kind: NoticeKind::for_transition(status, true),
            visiting_id,
            destination_id,
            actor_id: Some(request.gate_keeper_id),
            timestamp: event.created_at,
        },
    )
    .await;

    Ok(Json(event.into()))
}

/// Record a resident decision on a pending visiting.
///
/// POST /api/v1/visitings/:id/decision
pub async fn submit_decision(
    State(state): State<AppState>,
    Path(visiting_id): Path<Uuid>,
    Json(request): Json<DecisionRequest>,
) -> Result<Json<VisitingStatusEvent>, ApiError> {
    let status: VisitingStatus = request.status.parse().map_err(ApiError::from)?;

    let ledger = LedgerRepository::new(state.pool.clone());
    let (event, destination_id) = ledger
        .approve_or_deny(visiting_id, status, request.resident_id)
        .await?;

    info!(
        visiting_id = %visiting_id,
        status = %status,
        resident_id = %request.resident_id,
        seq = event.seq,
        "Resident decision recorded"
    );

    notify_best_effort(
        state.notifier.as_ref(),
        VisitNotice {
            kind: NoticeKind::for_transition(status, false),
            visiting_id,
            destination_id,
            actor_id: None,
            timestamp: event.created_at,
        },
    )
    .await;

    Ok(Json(event.into()))
}

/// Fetch a visiting with its derived card status.
///
/// GET /api/v1/visitings/:id
pub async fn get_visiting(
    State(state): State<AppState>,
    Path(visiting_id): Path<Uuid>,
) -> Result<Json<VisitingView>, ApiError> {
    let repo = VisitingRepository::new(state.pool.clone());
    let row = repo
        .find_view(visiting_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Visiting {visiting_id} not found")))?;

    Ok(Json(view_from(row, Utc::now())))
}

/// Fetch only the current ledger status of a visiting.
///
/// GET /api/v1/visitings/:id/status
///
/// `current_status` is null for a preapproval with no gate activity yet.
pub async fn get_current_status(
    State(state): State<AppState>,
    Path(visiting_id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let repo = VisitingRepository::new(state.pool.clone());
    if repo.find_view(visiting_id).await?.is_none() {
        return Err(ApiError::NotFound(format!(
            "Visiting {visiting_id} not found"
        )));
    }

    let ledger = LedgerRepository::new(state.pool.clone());
    let current = ledger.current_status(visiting_id).await?;

    Ok(Json(serde_json::json!({
        "visiting_id": visiting_id,
        "current_status": current,
    })))
}

/// Query parameters for the event history endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct HistoryQuery {
    #[serde(default = "default_history_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_history_limit() -> i64 {
    20
}

/// Fetch a visiting's event history, most recent first.
///
/// GET /api/v1/visitings/:id/events
pub async fn get_history(
    State(state): State<AppState>,
    Path(visiting_id): Path<Uuid>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<EventHistoryResponse>, ApiError> {
    let limit = shared::pagination::clamp_page_size(query.limit, 100);
    let offset = query.offset.max(0);

    let repo = VisitingRepository::new(state.pool.clone());
    if repo.find_view(visiting_id).await?.is_none() {
        return Err(ApiError::NotFound(format!(
            "Visiting {visiting_id} not found"
        )));
    }

    let ledger = LedgerRepository::new(state.pool.clone());
    let events = ledger.history(visiting_id, limit, offset).await?;

    Ok(Json(EventHistoryResponse {
        data: events.into_iter().map(Into::into).collect(),
        limit,
        offset,
    }))
}

/// Query parameters for the gate code lookup.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LookupQuery {
    pub code: String,
    pub gate_keeper_id: Uuid,
}

/// Resolve a visiting by its shareable visitor code.
///
/// GET /api/v1/visitings/lookup?code=XXX-XXX-XXX&gate_keeper_id=...
///
/// An unknown, expired, or already-used code is a not-found, each with its
/// own message so the gate UI can tell them apart.
pub async fn lookup_by_code(
    State(state): State<AppState>,
    Query(query): Query<LookupQuery>,
) -> Result<Json<VisitingView>, ApiError> {
    let now = Utc::now();
    let repo = VisitingRepository::new(state.pool.clone());

    let row = repo
        .find_by_code(&query.code)
        .await?
        .ok_or_else(|| ApiError::NotFound("Unknown visitor code".into()))?;

    let scope = GateScopeRepository::new(state.pool.clone());
    scope.authorize(row.id, query.gate_keeper_id).await?;

    let (visiting, window, last_status) = row.into_parts();
    let window = window
        .ok_or_else(|| ApiError::Internal("code lookup returned a visiting without a window".into()))?;

    if !window.admits(now) {
        return Err(ApiError::NotFound("Visitor code expired".into()));
    }

    // A one-off pass is spent once its visit has closed
    if !window.is_frequent && last_status == Some(VisitingStatus::Checkout) {
        return Err(ApiError::NotFound("Visitor code already used".into()));
    }

    info!(
        visiting_id = %visiting.id,
        gate_keeper_id = %query.gate_keeper_id,
        "Visitor code resolved"
    );

    Ok(Json(VisitingView {
        card_status: CardStatus::derive(last_status, Some(window.out_time), now),
        current_status: last_status,
        visiting,
        window: Some(window),
    }))
}

/// Edit a preapproval before any gate activity.
///
/// PATCH /api/v1/visitings/:id/preapproval
pub async fn update_preapproval(
    State(state): State<AppState>,
    Path(visiting_id): Path<Uuid>,
    Json(request): Json<UpdatePreapprovalRequest>,
) -> Result<Json<VisitingView>, ApiError> {
    request.validate()?;

    let now = Utc::now();
    let window_times = match &request.window {
        Some(window) => {
            let (in_time, out_time) = resolve_request_window(window, now)?;
            Some((in_time, out_time, window.is_frequent))
        }
        None => None,
    };

    let repo = VisitingRepository::new(state.pool.clone());
    let (visiting, _) = repo
        .update_preapproval(visiting_id, &request, window_times)
        .await?;

    info!(
        visiting_id = %visiting.id,
        resident_id = %request.resident_id,
        window_updated = window_times.is_some(),
        "Preapproval updated"
    );

    let row = repo
        .find_view(visiting_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Visiting {visiting_id} not found")))?;

    Ok(Json(view_from(row, now)))
}

/// Query parameters for preapproval deletion.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DeleteQuery {
    pub resident_id: Uuid,
}

/// Soft-delete a preapproval and suppress its queued notices.
///
/// DELETE /api/v1/visitings/:id/preapproval?resident_id=...
pub async fn delete_preapproval(
    State(state): State<AppState>,
    Path(visiting_id): Path<Uuid>,
    Query(query): Query<DeleteQuery>,
) -> Result<StatusCode, ApiError> {
    let repo = VisitingRepository::new(state.pool.clone());
    repo.soft_delete(visiting_id, query.resident_id).await?;

    info!(
        visiting_id = %visiting_id,
        resident_id = %query.resident_id,
        "Visiting soft-deleted"
    );

    if let domain::services::NotifyResult::Failed(reason) =
        state.notifier.revoke(visiting_id).await
    {
        warn!(
            visiting_id = %visiting_id,
            reason = %reason,
            "Failed to revoke queued notices"
        );
    }

    Ok(StatusCode::NO_CONTENT)
}

/// Gate edit of the visitor identity on a visiting.
///
/// PATCH /api/v1/visitings/:id/visitor
pub async fn update_visitor_details(
    State(state): State<AppState>,
    Path(visiting_id): Path<Uuid>,
    Json(request): Json<UpdateVisitorDetailsRequest>,
) -> Result<Json<Visitor>, ApiError> {
    request.validate()?;

    let repo = VisitingRepository::new(state.pool.clone());
    let visitor = repo
        .update_visitor_details(visiting_id, request.gate_keeper_id, &request.visitor)
        .await?;

    info!(
        visiting_id = %visiting_id,
        visitor_id = %visitor.id,
        gate_keeper_id = %request.gate_keeper_id,
        "Visitor details updated"
    );

    Ok(Json(visitor.into()))
}

/// Resolves a window request into UTC instants, validating the timezone
/// and the window itself.
fn resolve_request_window(
    window: &WindowRequest,
    now: DateTime<Utc>,
) -> Result<(DateTime<Utc>, DateTime<Utc>), VisitError> {
    let tz: Tz = window
        .timezone
        .parse()
        .map_err(|_| VisitError::InvalidWindow(format!("unknown timezone '{}'", window.timezone)))?;

    resolve_window(
        WindowSpec {
            in_time_local: window.in_time_local,
            out_time_local: window.out_time_local,
            duration_hours: window.approval_duration_hours,
            is_frequent: window.is_frequent,
        },
        tz,
        now,
    )
}

/// Builds the client view from a joined row, deriving the card status at
/// read time.
pub(crate) fn view_from(row: VisitingWithWindowEntity, now: DateTime<Utc>) -> VisitingView {
    let (visiting, window, last_status) = row.into_parts();
    VisitingView {
        card_status: CardStatus::derive(last_status, window.as_ref().map(|w| w.out_time), now),
        current_status: last_status,
        visiting,
        window,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn window_request(timezone: &str) -> WindowRequest {
        let in_local = NaiveDate::from_ymd_opt(2099, 1, 1)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap();
        WindowRequest {
            in_time_local: in_local,
            out_time_local: in_local,
            approval_duration_hours: Some(4),
            is_frequent: false,
            timezone: timezone.to_string(),
        }
    }

    #[test]
    fn test_resolve_request_window_accepts_iana_timezone() {
        let result = resolve_request_window(&window_request("Asia/Kolkata"), Utc::now());
        assert!(result.is_ok());
    }

    #[test]
    fn test_resolve_request_window_rejects_unknown_timezone() {
        let err = resolve_request_window(&window_request("Mars/Olympus"), Utc::now()).unwrap_err();
        assert!(matches!(err, VisitError::InvalidWindow(_)));
    }

    #[test]
    fn test_history_query_defaults() {
        let query: HistoryQuery = serde_json::from_str("{}").unwrap();
        assert_eq!(query.limit, 20);
        assert_eq!(query.offset, 0);
    }
}
