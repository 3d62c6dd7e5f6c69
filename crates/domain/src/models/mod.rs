//! Domain models.

pub mod preapproval;
pub mod status;
pub mod visiting;
pub mod visitor;

pub use preapproval::PreapprovedWindow;
pub use status::{VisitingStatus, VisitingStatusEvent};
pub use visiting::{CardStatus, CategoryClass, Visiting};
pub use visitor::Visitor;
