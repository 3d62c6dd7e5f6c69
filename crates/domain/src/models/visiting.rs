//! Visiting domain models: the aggregate root, category classes, and the
//! derived card-status projection.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;
use validator::Validate;

use super::status::{VisitingStatus, VisitingStatusEvent};

/// Closed classification of visit categories.
///
/// The concrete categories (cab, delivery, plumber, ...) are data; the
/// class drives behavior and is resolved once at category lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoryClass {
    Guest,
    DailyHelp,
    Other,
}

impl std::fmt::Display for CategoryClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CategoryClass::Guest => write!(f, "guest"),
            CategoryClass::DailyHelp => write!(f, "daily_help"),
            CategoryClass::Other => write!(f, "other"),
        }
    }
}

/// One occurrence of a visitor's expected or actual presence at a
/// destination. Identity, destination, and category class are fixed at
/// creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Visiting {
    pub id: Uuid,
    pub destination_id: Uuid,
    pub category_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visitor_id: Option<Uuid>,
    /// Set by whoever approves; bound exactly once (first responder wins).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resident_id: Option<Uuid>,
    pub display_name: String,
    pub headcount: i32,
    pub leave_package: bool,
    pub details: Value,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Read-only projection shown on visit cards. Recomputed on every read,
/// never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CardStatus {
    Upcoming,
    Expired,
    Pending,
    Approved,
    Denied,
    Active,
    Visited,
}

impl CardStatus {
    /// Derives the card status from the last ledger event and the window's
    /// out time. An event-free visiting is judged by its window alone.
    pub fn derive(
        last_status: Option<VisitingStatus>,
        window_out_time: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> CardStatus {
        match last_status {
            Some(VisitingStatus::Pending) => CardStatus::Pending,
            Some(VisitingStatus::Approved) => CardStatus::Approved,
            Some(VisitingStatus::Denied) => CardStatus::Denied,
            Some(VisitingStatus::Checkin) => CardStatus::Active,
            Some(VisitingStatus::Checkout) => CardStatus::Visited,
            None => match window_out_time {
                Some(out_time) if out_time < now => CardStatus::Expired,
                // No events and no window only happens mid-creation; treat
                // as not-yet-arrived.
                _ => CardStatus::Upcoming,
            },
        }
    }
}

impl std::fmt::Display for CardStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            CardStatus::Upcoming => "upcoming",
            CardStatus::Expired => "expired",
            CardStatus::Pending => "pending",
            CardStatus::Approved => "approved",
            CardStatus::Denied => "denied",
            CardStatus::Active => "active",
            CardStatus::Visited => "visited",
        };
        write!(f, "{label}")
    }
}

/// Window fields accepted on preapproval create/update, in local time.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "snake_case")]
pub struct WindowRequest {
    pub in_time_local: NaiveDateTime,
    pub out_time_local: NaiveDateTime,
    /// Hours from in time; overrides `out_time_local` when present.
    #[validate(range(min = 1, max = 720, message = "approval_duration_hours must be between 1 and 720"))]
    pub approval_duration_hours: Option<i64>,
    #[serde(default)]
    pub is_frequent: bool,
    /// IANA timezone of the destination, e.g. "Asia/Kolkata".
    pub timezone: String,
}

/// Request to create a preapproved visiting (resident path).
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "snake_case")]
pub struct CreatePreapprovedRequest {
    pub destination_id: Uuid,
    pub category_id: Uuid,
    pub resident_id: Uuid,
    #[validate(custom(function = "shared::validation::validate_display_name"))]
    pub display_name: String,
    #[validate(custom(function = "shared::validation::validate_headcount"))]
    #[serde(default = "default_headcount")]
    pub headcount: i32,
    #[serde(default)]
    pub leave_package: bool,
    #[serde(default)]
    pub details: Value,
    #[validate(nested)]
    pub window: WindowRequest,
    /// Identity of the expected visitor, when the resident knows it.
    #[validate(nested)]
    pub visitor: Option<VisitorIdentityRequest>,
}

/// Request to create a walk-in visiting (gate path).
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "snake_case")]
pub struct CreateWalkInRequest {
    pub destination_id: Uuid,
    pub category_id: Uuid,
    pub gate_keeper_id: Uuid,
    #[validate(custom(function = "shared::validation::validate_display_name"))]
    pub display_name: String,
    #[validate(custom(function = "shared::validation::validate_headcount"))]
    #[serde(default = "default_headcount")]
    pub headcount: i32,
    #[serde(default)]
    pub details: Value,
    #[validate(nested)]
    pub visitor: Option<VisitorIdentityRequest>,
}

/// Request to register one walk-in visitor at several destinations at once.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "snake_case")]
pub struct CreateMultiWalkInRequest {
    #[validate(length(min = 1, max = 20, message = "destination_ids must contain 1 to 20 entries"))]
    pub destination_ids: Vec<Uuid>,
    pub category_id: Uuid,
    pub gate_keeper_id: Uuid,
    #[validate(custom(function = "shared::validation::validate_display_name"))]
    pub display_name: String,
    #[serde(default)]
    pub details: Value,
    #[validate(nested)]
    pub visitor: Option<VisitorIdentityRequest>,
}

/// Per-destination outcome of a multi-destination walk-in.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct WalkInOutcome {
    pub destination_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visiting_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub initial_status: Option<VisitingStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl WalkInOutcome {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Point updates allowed on a preapproval before arrival.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "snake_case")]
pub struct UpdatePreapprovalRequest {
    pub resident_id: Uuid,
    /// New category; must stay within the original category class.
    pub category_id: Option<Uuid>,
    #[validate(custom(function = "shared::validation::validate_headcount"))]
    pub headcount: Option<i32>,
    pub leave_package: Option<bool>,
    pub details: Option<Value>,
    #[validate(nested)]
    pub window: Option<WindowRequest>,
}

/// Resident decision on a pending visiting.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DecisionRequest {
    /// "approved" or "denied".
    pub status: String,
    pub resident_id: Uuid,
}

/// Gate-submitted status transition.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct TransitionRequest {
    pub status: String,
    pub gate_keeper_id: Uuid,
}

/// Visitor identity fields accepted on create/update paths.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "snake_case")]
pub struct VisitorIdentityRequest {
    #[validate(custom(function = "shared::validation::validate_country_code"))]
    pub country_code: String,
    #[validate(custom(function = "shared::validation::validate_mobile_number"))]
    pub mobile_number: String,
    #[validate(length(min = 1, max = 80, message = "name must be 1-80 characters"))]
    pub name: String,
    pub document_id: Option<String>,
    pub document_type: Option<String>,
    pub document_country: Option<String>,
    pub document_expiry: Option<chrono::NaiveDate>,
    pub document_issued: Option<chrono::NaiveDate>,
    #[serde(default)]
    pub details: Value,
    pub profile_picture_url: Option<String>,
}

/// A visiting with its window and derived card status, as returned to
/// clients.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct VisitingView {
    #[serde(flatten)]
    pub visiting: Visiting,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub window: Option<super::preapproval::PreapprovedWindow>,
    pub card_status: CardStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_status: Option<VisitingStatus>,
}

/// Response for the event history endpoint.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct EventHistoryResponse {
    pub data: Vec<VisitingStatusEvent>,
    pub limit: i64,
    pub offset: i64,
}

/// Response after creating a single walk-in.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct WalkInResponse {
    pub visiting: Visiting,
    pub event: VisitingStatusEvent,
}

/// Response for a multi-destination walk-in: one outcome per destination.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct MultiWalkInResponse {
    pub data: Vec<WalkInOutcome>,
}

/// Cursor-paginated destination feed.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct FeedResponse {
    pub data: Vec<VisitingView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

/// Gate edit of the visitor identity attached to a visiting.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "snake_case")]
pub struct UpdateVisitorDetailsRequest {
    pub gate_keeper_id: Uuid,
    #[validate(nested)]
    pub visitor: VisitorIdentityRequest,
}

fn default_headcount() -> i32 {
    1
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_category_class_display() {
        assert_eq!(CategoryClass::Guest.to_string(), "guest");
        assert_eq!(CategoryClass::DailyHelp.to_string(), "daily_help");
        assert_eq!(CategoryClass::Other.to_string(), "other");
    }

    #[test]
    fn test_card_status_follows_last_event() {
        let now = Utc::now();
        let cases = [
            (VisitingStatus::Pending, CardStatus::Pending),
            (VisitingStatus::Approved, CardStatus::Approved),
            (VisitingStatus::Denied, CardStatus::Denied),
            (VisitingStatus::Checkin, CardStatus::Active),
            (VisitingStatus::Checkout, CardStatus::Visited),
        ];
        for (last, expected) in cases {
            // The window must not override a recorded event
            assert_eq!(
                CardStatus::derive(Some(last), Some(now - Duration::days(1)), now),
                expected
            );
        }
    }

    #[test]
    fn test_card_status_upcoming_before_out_time() {
        let now = chrono::DateTime::parse_from_rfc3339("2024-01-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let out_time = chrono::DateTime::parse_from_rfc3339("2024-01-01T18:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(
            CardStatus::derive(None, Some(out_time), now),
            CardStatus::Upcoming
        );
    }

    #[test]
    fn test_card_status_expired_after_out_time() {
        let now = chrono::DateTime::parse_from_rfc3339("2024-01-02T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let out_time = chrono::DateTime::parse_from_rfc3339("2024-01-01T18:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(
            CardStatus::derive(None, Some(out_time), now),
            CardStatus::Expired
        );
    }

    #[test]
    fn test_card_status_no_events_no_window() {
        assert_eq!(
            CardStatus::derive(None, None, Utc::now()),
            CardStatus::Upcoming
        );
    }

    #[test]
    fn test_walk_in_outcome_succeeded() {
        let ok = WalkInOutcome {
            destination_id: Uuid::new_v4(),
            visiting_id: Some(Uuid::new_v4()),
            initial_status: Some(VisitingStatus::Pending),
            error: None,
        };
        let failed = WalkInOutcome {
            destination_id: Uuid::new_v4(),
            visiting_id: None,
            initial_status: None,
            error: Some("destination inactive".into()),
        };
        assert!(ok.succeeded());
        assert!(!failed.succeeded());
    }

    #[test]
    fn test_create_walk_in_requires_display_name() {
        let request = CreateWalkInRequest {
            destination_id: Uuid::new_v4(),
            category_id: Uuid::new_v4(),
            gate_keeper_id: Uuid::new_v4(),
            display_name: "  ".into(),
            headcount: 1,
            details: Value::Null,
            visitor: None,
        };
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_visitor_identity_validation() {
        let valid = VisitorIdentityRequest {
            country_code: "+91".into(),
            mobile_number: "9876543210".into(),
            name: "Ramesh".into(),
            document_id: None,
            document_type: None,
            document_country: None,
            document_expiry: None,
            document_issued: None,
            details: Value::Null,
            profile_picture_url: None,
        };
        assert!(valid.validate().is_ok());

        let bad_mobile = VisitorIdentityRequest {
            mobile_number: "12ab".into(),
            ..valid.clone()
        };
        assert!(bad_mobile.validate().is_err());

        let bad_code = VisitorIdentityRequest {
            country_code: "91".into(),
            ..valid
        };
        assert!(bad_code.validate().is_err());
    }

    #[test]
    fn test_multi_walk_in_rejects_empty_destination_list() {
        let request = CreateMultiWalkInRequest {
            destination_ids: vec![],
            category_id: Uuid::new_v4(),
            gate_keeper_id: Uuid::new_v4(),
            display_name: "Courier".into(),
            details: Value::Null,
            visitor: None,
        };
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_decision_request_deserialize() {
        let json = r#"{"status":"approved","resident_id":"550e8400-e29b-41d4-a716-446655440000"}"#;
        let req: DecisionRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.status, "approved");
    }
}
