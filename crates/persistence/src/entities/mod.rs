//! Entity definitions (database row mappings).

mod destination;
mod status_event;
mod visiting;
mod visitor;

pub use destination::{CategoryClassDb, CategoryEntity, DestinationEntity};
pub use status_event::{StaleCheckinEntity, StatusEventEntity, VisitingStatusDb};
pub use visiting::{VisitingEntity, VisitingWithWindowEntity, WindowEntity};
pub use visitor::VisitorEntity;
