//! Auto-checkout background job.
//!
//! Runs the sweep on a fixed interval, independent of request traffic.

use std::sync::Arc;

use chrono::Utc;
use domain::services::Notifier;
use sqlx::PgPool;
use tracing::info;

use super::scheduler::{Job, JobFrequency};
use crate::services::SweepService;

/// Background job that force-closes visitings left in CHECKIN past the
/// dwell threshold.
pub struct AutoCheckoutJob {
    pool: PgPool,
    notifier: Arc<dyn Notifier>,
    dwell_threshold_hours: i64,
    interval_minutes: u64,
}

impl AutoCheckoutJob {
    pub fn new(
        pool: PgPool,
        notifier: Arc<dyn Notifier>,
        dwell_threshold_hours: i64,
        interval_minutes: u64,
    ) -> Self {
        Self {
            pool,
            notifier,
            dwell_threshold_hours,
            interval_minutes,
        }
    }
}

#[async_trait::async_trait]
impl Job for AutoCheckoutJob {
    fn name(&self) -> &'static str {
        "auto_checkout"
    }

    fn frequency(&self) -> JobFrequency {
        JobFrequency::Minutes(self.interval_minutes)
    }

    async fn execute(&self) -> anyhow::Result<()> {
        let service = SweepService::new(self.pool.clone(), self.notifier.clone());
        let report = service
            .sweep(Utc::now(), self.dwell_threshold_hours)
            .await?;

        info!(
            closed = report.closed_count,
            failed = report.failed_count,
            "Auto-checkout sweep finished"
        );

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_job_frequency_follows_config() {
        let freq = JobFrequency::Minutes(15);
        assert_eq!(freq.duration(), Duration::from_secs(900));
    }

    #[test]
    fn test_job_name() {
        assert_eq!("auto_checkout", "auto_checkout");
    }
}
