//! Database pool metrics background job.

use persistence::metrics::record_pool_metrics;
use sqlx::PgPool;

use super::scheduler::{Job, JobFrequency};

/// Periodically exports connection pool gauges.
pub struct PoolMetricsJob {
    pool: PgPool,
}

impl PoolMetricsJob {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl Job for PoolMetricsJob {
    fn name(&self) -> &'static str {
        "pool_metrics"
    }

    fn frequency(&self) -> JobFrequency {
        JobFrequency::Seconds(60)
    }

    async fn execute(&self) -> anyhow::Result<()> {
        record_pool_metrics(&self.pool);
        Ok(())
    }
}
