//! Notification sink for visiting lifecycle events.
//!
//! The sink is fire-and-forget: delivery failures are logged by callers
//! and never block a transition.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::status::VisitingStatus;

/// Kind of notice emitted for a lifecycle event.
///
/// A transition emits exactly one notice, keyed by the new status and by
/// whether a gate keeper initiated it: a denial recorded at the gate reads
/// differently to the resident than one that happened with nobody at the
/// gate (timeout or cancellation path).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeKind {
    PreapprovalCreated,
    ArrivalRequested,
    Approved,
    DeniedAtGate,
    Denied,
    CheckedIn,
    CheckedOut,
    AutoCheckedOut,
}

impl NoticeKind {
    /// The notice for a transition into `status`, parameterized by actor
    /// presence.
    pub fn for_transition(status: VisitingStatus, gate_keeper_present: bool) -> NoticeKind {
        match (status, gate_keeper_present) {
            (VisitingStatus::Pending, _) => NoticeKind::ArrivalRequested,
            (VisitingStatus::Approved, _) => NoticeKind::Approved,
            (VisitingStatus::Denied, true) => NoticeKind::DeniedAtGate,
            (VisitingStatus::Denied, false) => NoticeKind::Denied,
            (VisitingStatus::Checkin, _) => NoticeKind::CheckedIn,
            (VisitingStatus::Checkout, true) => NoticeKind::CheckedOut,
            (VisitingStatus::Checkout, false) => NoticeKind::AutoCheckedOut,
        }
    }
}

impl std::fmt::Display for NoticeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            NoticeKind::PreapprovalCreated => "preapproval_created",
            NoticeKind::ArrivalRequested => "arrival_requested",
            NoticeKind::Approved => "approved",
            NoticeKind::DeniedAtGate => "denied_at_gate",
            NoticeKind::Denied => "denied",
            NoticeKind::CheckedIn => "checked_in",
            NoticeKind::CheckedOut => "checked_out",
            NoticeKind::AutoCheckedOut => "auto_checked_out",
        };
        write!(f, "{label}")
    }
}

/// Payload handed to the notification sink.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct VisitNotice {
    pub kind: NoticeKind,
    pub visiting_id: Uuid,
    pub destination_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actor_id: Option<Uuid>,
    pub timestamp: DateTime<Utc>,
}

/// Result of a notification send attempt.
#[derive(Debug, Clone)]
pub enum NotifyResult {
    /// Notice was handed off to the sink.
    Sent,
    /// Sending failed (logged, non-blocking).
    Failed(String),
    /// The sink is disabled by configuration.
    Skipped,
}

/// Notification sink trait.
#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver a lifecycle notice. Must never block the caller's
    /// transaction; failures surface only through the result.
    async fn notify(&self, notice: VisitNotice) -> NotifyResult;

    /// Suppress any queued notices for a soft-deleted visiting.
    async fn revoke(&self, visiting_id: Uuid) -> NotifyResult;
}

/// Mock notifier for development and testing. Records notices in memory
/// and logs them.
#[derive(Debug, Default)]
pub struct MockNotifier {
    /// Whether to simulate delivery failures.
    pub simulate_failure: bool,
    sent: std::sync::Mutex<Vec<VisitNotice>>,
    revoked: std::sync::Mutex<Vec<Uuid>>,
}

impl MockNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            simulate_failure: true,
            ..Self::default()
        }
    }

    /// Notices delivered so far.
    pub fn sent(&self) -> Vec<VisitNotice> {
        self.sent.lock().expect("notifier mutex poisoned").clone()
    }

    /// Visitings whose notices were revoked.
    pub fn revoked(&self) -> Vec<Uuid> {
        self.revoked.lock().expect("notifier mutex poisoned").clone()
    }
}

#[async_trait::async_trait]
impl Notifier for MockNotifier {
    async fn notify(&self, notice: VisitNotice) -> NotifyResult {
        if self.simulate_failure {
            tracing::warn!(
                visiting_id = %notice.visiting_id,
                kind = %notice.kind,
                "Mock notifier simulating failure"
            );
            return NotifyResult::Failed("Simulated failure".to_string());
        }

        tracing::info!(
            visiting_id = %notice.visiting_id,
            destination_id = %notice.destination_id,
            kind = %notice.kind,
            "Mock: would send visiting notice"
        );
        self.sent
            .lock()
            .expect("notifier mutex poisoned")
            .push(notice);
        NotifyResult::Sent
    }

    async fn revoke(&self, visiting_id: Uuid) -> NotifyResult {
        if self.simulate_failure {
            return NotifyResult::Failed("Simulated failure".to_string());
        }
        tracing::info!(visiting_id = %visiting_id, "Mock: would revoke queued notices");
        self.revoked
            .lock()
            .expect("notifier mutex poisoned")
            .push(visiting_id);
        NotifyResult::Sent
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notice_kind_for_transition_distinguishes_denial_actor() {
        assert_eq!(
            NoticeKind::for_transition(VisitingStatus::Denied, true),
            NoticeKind::DeniedAtGate
        );
        assert_eq!(
            NoticeKind::for_transition(VisitingStatus::Denied, false),
            NoticeKind::Denied
        );
    }

    #[test]
    fn test_notice_kind_for_transition_distinguishes_checkout_actor() {
        assert_eq!(
            NoticeKind::for_transition(VisitingStatus::Checkout, true),
            NoticeKind::CheckedOut
        );
        assert_eq!(
            NoticeKind::for_transition(VisitingStatus::Checkout, false),
            NoticeKind::AutoCheckedOut
        );
    }

    #[test]
    fn test_notice_kind_display() {
        assert_eq!(NoticeKind::AutoCheckedOut.to_string(), "auto_checked_out");
        assert_eq!(NoticeKind::ArrivalRequested.to_string(), "arrival_requested");
    }

    #[tokio::test]
    async fn test_mock_notifier_records_notices() {
        let notifier = MockNotifier::new();
        let notice = VisitNotice {
            kind: NoticeKind::CheckedIn,
            visiting_id: Uuid::new_v4(),
            destination_id: Uuid::new_v4(),
            actor_id: None,
            timestamp: Utc::now(),
        };
        let result = notifier.notify(notice.clone()).await;
        assert!(matches!(result, NotifyResult::Sent));
        assert_eq!(notifier.sent().len(), 1);
        assert_eq!(notifier.sent()[0].visiting_id, notice.visiting_id);
    }

    #[tokio::test]
    async fn test_mock_notifier_failure() {
        let notifier = MockNotifier::failing();
        let notice = VisitNotice {
            kind: NoticeKind::Approved,
            visiting_id: Uuid::new_v4(),
            destination_id: Uuid::new_v4(),
            actor_id: Some(Uuid::new_v4()),
            timestamp: Utc::now(),
        };
        let result = notifier.notify(notice).await;
        assert!(matches!(result, NotifyResult::Failed(_)));
        assert!(notifier.sent().is_empty());
    }

    #[tokio::test]
    async fn test_mock_notifier_revoke() {
        let notifier = MockNotifier::new();
        let id = Uuid::new_v4();
        let result = notifier.revoke(id).await;
        assert!(matches!(result, NotifyResult::Sent));
        assert_eq!(notifier.revoked(), vec![id]);
    }
}
