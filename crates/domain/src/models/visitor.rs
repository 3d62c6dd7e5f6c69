//! Visitor domain model.
//!
//! A visitor is keyed by mobile number: the first sighting creates the
//! record, later sightings update it in place. The registry never
//! duplicates and never hard-deletes.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// A person known to the gate, keyed by mobile number.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Visitor {
    pub id: Uuid,
    pub country_code: String,
    pub mobile_number: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_country: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_expiry: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_issued: Option<NaiveDate>,
    /// Free-form additional details (occupation, gender, vehicle number...).
    pub details: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_picture_url: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_visitor_serializes_without_empty_document_fields() {
        let visitor = Visitor {
            id: Uuid::nil(),
            country_code: "+91".into(),
            mobile_number: "9876543210".into(),
            name: "Ramesh".into(),
            document_id: None,
            document_type: None,
            document_country: None,
            document_expiry: None,
            document_issued: None,
            details: serde_json::json!({"vehicle_number": "KA01AB1234"}),
            profile_picture_url: None,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let json = serde_json::to_string(&visitor).unwrap();
        assert!(!json.contains("document_id"));
        assert!(json.contains("KA01AB1234"));
    }
}
