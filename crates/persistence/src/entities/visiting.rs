//! Visiting and preapproved window entities (database row mappings).

use chrono::{DateTime, Utc};
use domain::models::preapproval::PreapprovedWindow;
use domain::models::status::VisitingStatus;
use domain::models::Visiting;
use sqlx::FromRow;
use uuid::Uuid;

use super::status_event::VisitingStatusDb;

/// Database row mapping for the visitings table.
#[derive(Debug, Clone, FromRow)]
pub struct VisitingEntity {
    pub id: Uuid,
    pub destination_id: Uuid,
    pub category_id: Uuid,
    pub visitor_id: Option<Uuid>,
    pub resident_id: Option<Uuid>,
    pub display_name: String,
    pub headcount: i32,
    pub leave_package: bool,
    pub details: serde_json::Value,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<VisitingEntity> for Visiting {
    fn from(entity: VisitingEntity) -> Self {
        Self {
            id: entity.id,
            destination_id: entity.destination_id,
            category_id: entity.category_id,
            visitor_id: entity.visitor_id,
            resident_id: entity.resident_id,
            display_name: entity.display_name,
            headcount: entity.headcount,
            leave_package: entity.leave_package,
            details: entity.details,
            is_active: entity.is_active,
            created_at: entity.created_at,
            updated_at: entity.updated_at,
        }
    }
}

/// Database row mapping for the preapproved_windows table.
#[derive(Debug, Clone, FromRow)]
pub struct WindowEntity {
    pub id: Uuid,
    pub visiting_id: Uuid,
    pub in_time: DateTime<Utc>,
    pub out_time: DateTime<Utc>,
    pub is_frequent: bool,
    pub visitor_code: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<WindowEntity> for PreapprovedWindow {
    fn from(entity: WindowEntity) -> Self {
        Self {
            id: entity.id,
            visiting_id: entity.visiting_id,
            in_time: entity.in_time,
            out_time: entity.out_time,
            is_frequent: entity.is_frequent,
            visitor_code: entity.visitor_code,
            created_at: entity.created_at,
            updated_at: entity.updated_at,
        }
    }
}

/// Joined row for read endpoints: a visiting with its optional window and
/// its latest ledger status.
#[derive(Debug, Clone, FromRow)]
pub struct VisitingWithWindowEntity {
    pub id: Uuid,
    pub destination_id: Uuid,
    pub category_id: Uuid,
    pub visitor_id: Option<Uuid>,
    pub resident_id: Option<Uuid>,
    pub display_name: String,
    pub headcount: i32,
    pub leave_package: bool,
    pub details: serde_json::Value,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    // Window fields (absent for walk-ins)
    pub window_id: Option<Uuid>,
    pub in_time: Option<DateTime<Utc>>,
    pub out_time: Option<DateTime<Utc>>,
    pub is_frequent: Option<bool>,
    pub visitor_code: Option<String>,
    pub window_created_at: Option<DateTime<Utc>>,
    pub window_updated_at: Option<DateTime<Utc>>,
    // Latest ledger status (absent for an event-free preapproval)
    pub last_status: Option<VisitingStatusDb>,
}

impl VisitingWithWindowEntity {
    /// Splits the joined row into its domain parts.
    pub fn into_parts(self) -> (Visiting, Option<PreapprovedWindow>, Option<VisitingStatus>) {
        let window = match (
            self.window_id,
            self.in_time,
            self.out_time,
            self.is_frequent,
            self.window_created_at,
            self.window_updated_at,
        ) {
            (Some(id), Some(in_time), Some(out_time), Some(is_frequent), Some(created), Some(updated)) => {
                Some(PreapprovedWindow {
                    id,
                    visiting_id: self.id,
                    in_time,
                    out_time,
                    is_frequent,
                    visitor_code: self.visitor_code.clone(),
                    created_at: created,
                    updated_at: updated,
                })
            }
            _ => None,
        };

        let visiting = Visiting {
            id: self.id,
            destination_id: self.destination_id,
            category_id: self.category_id,
            visitor_id: self.visitor_id,
            resident_id: self.resident_id,
            display_name: self.display_name,
            headcount: self.headcount,
            leave_package: self.leave_package,
            details: self.details,
            is_active: self.is_active,
            created_at: self.created_at,
            updated_at: self.updated_at,
        };

        (visiting, window, self.last_status.map(Into::into))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn joined_row(with_window: bool) -> VisitingWithWindowEntity {
        let now = Utc::now();
        VisitingWithWindowEntity {
            id: Uuid::new_v4(),
            destination_id: Uuid::new_v4(),
            category_id: Uuid::new_v4(),
            visitor_id: None,
            resident_id: None,
            display_name: "Courier".into(),
            headcount: 1,
            leave_package: false,
            details: serde_json::Value::Null,
            is_active: true,
            created_at: now,
            updated_at: now,
            window_id: with_window.then(Uuid::new_v4),
            in_time: with_window.then_some(now),
            out_time: with_window.then_some(now),
            is_frequent: with_window.then_some(false),
            visitor_code: with_window.then(|| "ABC-DEF-GHJ".to_string()),
            window_created_at: with_window.then_some(now),
            window_updated_at: with_window.then_some(now),
            last_status: None,
        }
    }

    #[test]
    fn test_into_parts_with_window() {
        let row = joined_row(true);
        let id = row.id;
        let (visiting, window, status) = row.into_parts();
        assert_eq!(visiting.id, id);
        let window = window.unwrap();
        assert_eq!(window.visiting_id, id);
        assert_eq!(window.visitor_code.as_deref(), Some("ABC-DEF-GHJ"));
        assert!(status.is_none());
    }

    #[test]
    fn test_into_parts_without_window() {
        let (_, window, _) = joined_row(false).into_parts();
        assert!(window.is_none());
    }
}
