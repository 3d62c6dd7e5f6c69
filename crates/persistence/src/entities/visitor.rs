//! Visitor entity (database row mapping).

use chrono::{DateTime, NaiveDate, Utc};
use domain::models::Visitor;
use sqlx::FromRow;
use uuid::Uuid;

/// Database row mapping for the visitors table.
#[derive(Debug, Clone, FromRow)]
pub struct VisitorEntity {
    pub id: Uuid,
    pub country_code: String,
    pub mobile_number: String,
    pub name: String,
    pub document_id: Option<String>,
    pub document_type: Option<String>,
    pub document_country: Option<String>,
    pub document_expiry: Option<NaiveDate>,
    pub document_issued: Option<NaiveDate>,
    pub details: serde_json::Value,
    pub profile_picture_url: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<VisitorEntity> for Visitor {
    fn from(entity: VisitorEntity) -> Self {
        Self {
            id: entity.id,
            country_code: entity.country_code,
            mobile_number: entity.mobile_number,
            name: entity.name,
            document_id: entity.document_id,
            document_type: entity.document_type,
            document_country: entity.document_country,
            document_expiry: entity.document_expiry,
            document_issued: entity.document_issued,
            details: entity.details,
            profile_picture_url: entity.profile_picture_url,
            is_active: entity.is_active,
            created_at: entity.created_at,
            updated_at: entity.updated_at,
        }
    }
}
