//! Background job scheduler and job implementations.

mod auto_checkout;
mod pool_metrics;
mod scheduler;

pub use auto_checkout::AutoCheckoutJob;
pub use pool_metrics::PoolMetricsJob;
pub use scheduler::{Job, JobFrequency, JobScheduler};
