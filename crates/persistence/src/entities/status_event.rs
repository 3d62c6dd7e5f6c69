//! Status event entity (database row mapping).

use chrono::{DateTime, Utc};
use domain::models::status::{VisitingStatus, VisitingStatusEvent};
use sqlx::FromRow;
use uuid::Uuid;

/// Database enum for visiting_status that maps to the PostgreSQL enum type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "visiting_status", rename_all = "lowercase")]
pub enum VisitingStatusDb {
    Pending,
    Approved,
    Denied,
    Checkin,
    Checkout,
}

impl From<VisitingStatusDb> for VisitingStatus {
    fn from(db_status: VisitingStatusDb) -> Self {
        match db_status {
            VisitingStatusDb::Pending => VisitingStatus::Pending,
            VisitingStatusDb::Approved => VisitingStatus::Approved,
            VisitingStatusDb::Denied => VisitingStatus::Denied,
            VisitingStatusDb::Checkin => VisitingStatus::Checkin,
            VisitingStatusDb::Checkout => VisitingStatus::Checkout,
        }
    }
}

impl From<VisitingStatus> for VisitingStatusDb {
    fn from(status: VisitingStatus) -> Self {
        match status {
            VisitingStatus::Pending => VisitingStatusDb::Pending,
            VisitingStatus::Approved => VisitingStatusDb::Approved,
            VisitingStatus::Denied => VisitingStatusDb::Denied,
            VisitingStatus::Checkin => VisitingStatusDb::Checkin,
            VisitingStatus::Checkout => VisitingStatusDb::Checkout,
        }
    }
}

/// Database row mapping for the visiting_status_events table.
///
/// `seq` is the order-authoritative column; `created_at` is informational
/// and never used for ordering.
#[derive(Debug, Clone, FromRow)]
pub struct StatusEventEntity {
    pub seq: i64,
    pub visiting_id: Uuid,
    pub status: VisitingStatusDb,
    pub gate_keeper_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl From<StatusEventEntity> for VisitingStatusEvent {
    fn from(entity: StatusEventEntity) -> Self {
        Self {
            seq: entity.seq,
            visiting_id: entity.visiting_id,
            status: entity.status.into(),
            gate_keeper_id: entity.gate_keeper_id,
            created_at: entity.created_at,
        }
    }
}

/// Row for the auto-checkout sweep: a visiting whose latest event is a
/// stale CHECKIN.
#[derive(Debug, Clone, FromRow)]
pub struct StaleCheckinEntity {
    pub visiting_id: Uuid,
    pub destination_id: Uuid,
    pub checked_in_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_db_roundtrip() {
        for status in [
            VisitingStatus::Pending,
            VisitingStatus::Approved,
            VisitingStatus::Denied,
            VisitingStatus::Checkin,
            VisitingStatus::Checkout,
        ] {
            let db: VisitingStatusDb = status.into();
            let back: VisitingStatus = db.into();
            assert_eq!(back, status);
        }
    }
}
