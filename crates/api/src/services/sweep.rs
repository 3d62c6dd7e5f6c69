//! Auto-checkout sweep.
//!
//! Force-closes visitings left in CHECKIN past the dwell threshold. Each
//! visiting is closed in its own transaction, so one failure never aborts
//! the batch; a visiting closed by one run is out of scope for the next
//! because its current status is no longer CHECKIN.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use domain::models::VisitingStatus;
use domain::services::{NoticeKind, Notifier, VisitNotice};
use domain::VisitError;
use persistence::repositories::LedgerRepository;
use serde::Serialize;
use sqlx::PgPool;
use tracing::{info, warn};
use uuid::Uuid;

use crate::middleware::metrics::record_sweep_run;
use crate::services::notify::notify_best_effort;

/// Outcome of one sweep run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct SweepReport {
    pub closed_count: usize,
    pub visiting_ids: Vec<Uuid>,
    pub failed_count: usize,
}

/// Sweep executor shared by the background job and the admin trigger.
pub struct SweepService {
    ledger: LedgerRepository,
    notifier: Arc<dyn Notifier>,
}

impl SweepService {
    pub fn new(pool: PgPool, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            ledger: LedgerRepository::new(pool),
            notifier,
        }
    }

    /// Close every visiting whose current status is CHECKIN recorded more
    /// than `dwell_threshold_hours` before `now`.
    pub async fn sweep(
        &self,
        now: DateTime<Utc>,
        dwell_threshold_hours: i64,
    ) -> Result<SweepReport, VisitError> {
        let cutoff = now - Duration::hours(dwell_threshold_hours);
        let stale = self.ledger.stale_checkins(cutoff).await?;

        let mut visiting_ids = Vec::new();
        let mut failed_count = 0;

        for item in stale {
            match self
                .ledger
                .transition(item.visiting_id, VisitingStatus::Checkout, None)
                .await
            {
                Ok((event, destination_id)) => {
                    visiting_ids.push(item.visiting_id);
                    notify_best_effort(
                        self.notifier.as_ref(),
                        VisitNotice {
                            kind: NoticeKind::AutoCheckedOut,
                            visiting_id: item.visiting_id,
                            destination_id,
                            actor_id: None,
                            timestamp: event.created_at,
                        },
                    )
                    .await;
                }
                Err(err) => {
                    // A concurrent checkout between the scan and the close
                    // lands here too; skip and move on.
                    failed_count += 1;
                    warn!(
                        visiting_id = %item.visiting_id,
                        checked_in_at = %item.checked_in_at,
                        error = %err,
                        "Failed to auto-close stale visiting"
                    );
                }
            }
        }

        let report = SweepReport {
            closed_count: visiting_ids.len(),
            visiting_ids,
            failed_count,
        };

        record_sweep_run(report.closed_count, report.failed_count);
        info!(
            closed = report.closed_count,
            failed = report.failed_count,
            dwell_threshold_hours,
            "Sweep completed"
        );

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sweep_report_serializes() {
        let report = SweepReport {
            closed_count: 2,
            visiting_ids: vec![Uuid::nil(), Uuid::nil()],
            failed_count: 1,
        };
        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("\"closed_count\":2"));
        assert!(json.contains("\"failed_count\":1"));
    }

    #[test]
    fn test_cutoff_math() {
        let now = Utc::now();
        let cutoff = now - Duration::hours(48);
        assert_eq!(now - cutoff, Duration::hours(48));
    }
}
