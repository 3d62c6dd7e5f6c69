//! Domain service traits and test doubles.

pub mod directory;
pub mod notify;

pub use directory::{LocationScope, ResidentDirectory};
pub use notify::{NoticeKind, Notifier, NotifyResult, VisitNotice};
