//! Operational sweep trigger.

use axum::{extract::State, Json};
use chrono::Utc;
use serde::Deserialize;
use tracing::info;

use crate::app::AppState;
use crate::error::ApiError;
use crate::services::{SweepReport, SweepService};

/// Optional overrides for a manual sweep run.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SweepRequest {
    pub dwell_threshold_hours: Option<i64>,
}

/// Run the auto-checkout sweep now.
///
/// POST /api/v1/admin/sweep
///
/// The scheduled job is the normal driver; this route exists for
/// operational testing and incident recovery.
pub async fn trigger_sweep(
    State(state): State<AppState>,
    body: Option<Json<SweepRequest>>,
) -> Result<Json<SweepReport>, ApiError> {
    let dwell_threshold_hours = body
        .and_then(|Json(request)| request.dwell_threshold_hours)
        .unwrap_or(state.config.sweep.dwell_threshold_hours);

    if dwell_threshold_hours <= 0 {
        return Err(ApiError::Validation(
            "dwell_threshold_hours must be positive".into(),
        ));
    }

    info!(dwell_threshold_hours, "Manual sweep triggered");

    let service = SweepService::new(state.pool.clone(), state.notifier.clone());
    let report = service.sweep(Utc::now(), dwell_threshold_hours).await?;

    Ok(Json(report))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sweep_request_deserialize_empty() {
        let request: SweepRequest = serde_json::from_str("{}").unwrap();
        assert!(request.dwell_threshold_hours.is_none());
    }

    #[test]
    fn test_sweep_request_deserialize_override() {
        let request: SweepRequest =
            serde_json::from_str(r#"{"dwell_threshold_hours": 12}"#).unwrap();
        assert_eq!(request.dwell_threshold_hours, Some(12));
    }
}
