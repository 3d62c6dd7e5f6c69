//! Application services.

pub mod notify;
pub mod sweep;

pub use notify::build_notifier;
pub use sweep::{SweepReport, SweepService};
