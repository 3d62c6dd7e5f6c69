//! Repository implementations.

mod gate_scope;
mod ledger;
mod visiting;
mod visitor;

pub use gate_scope::{GateScopeRepository, PgLocationScope, PgResidentDirectory};
pub use ledger::LedgerRepository;
pub use visiting::VisitingRepository;
pub use visitor::VisitorRepository;
