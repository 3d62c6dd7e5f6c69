//! Destination and visit category entities (database row mappings).

use chrono::{DateTime, Utc};
use domain::models::CategoryClass;
use sqlx::FromRow;
use uuid::Uuid;

/// Database enum for visit_category_class that maps to the PostgreSQL
/// enum type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "visit_category_class", rename_all = "snake_case")]
pub enum CategoryClassDb {
    Guest,
    DailyHelp,
    Other,
}

impl From<CategoryClassDb> for CategoryClass {
    fn from(db_class: CategoryClassDb) -> Self {
        match db_class {
            CategoryClassDb::Guest => CategoryClass::Guest,
            CategoryClassDb::DailyHelp => CategoryClass::DailyHelp,
            CategoryClassDb::Other => CategoryClass::Other,
        }
    }
}

impl From<CategoryClass> for CategoryClassDb {
    fn from(class: CategoryClass) -> Self {
        match class {
            CategoryClass::Guest => CategoryClassDb::Guest,
            CategoryClass::DailyHelp => CategoryClassDb::DailyHelp,
            CategoryClass::Other => CategoryClassDb::Other,
        }
    }
}

/// Database row mapping for the destinations table.
#[derive(Debug, Clone, FromRow)]
pub struct DestinationEntity {
    pub id: Uuid,
    pub building_id: Uuid,
    pub label: String,
    pub resident_id: Option<Uuid>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Database row mapping for the visit_categories table.
#[derive(Debug, Clone, FromRow)]
pub struct CategoryEntity {
    pub id: Uuid,
    pub name: String,
    pub class: CategoryClassDb,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_class_db_roundtrip() {
        for class in [
            CategoryClass::Guest,
            CategoryClass::DailyHelp,
            CategoryClass::Other,
        ] {
            let db: CategoryClassDb = class.into();
            let back: CategoryClass = db.into();
            assert_eq!(back, class);
        }
    }
}
