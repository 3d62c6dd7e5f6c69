//! Status ledger types and the visiting transition rules.
//!
//! A visiting's state is never stored as a mutable column. It is derived
//! from the most recent row of an append-only event ledger, ordered by a
//! monotonic sequence number rather than wall-clock time, so two events
//! written in the same instant still have an unambiguous order.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::VisitError;

/// Status of a visiting, as recorded in the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VisitingStatus {
    Pending,
    Approved,
    Denied,
    Checkin,
    Checkout,
}

impl std::fmt::Display for VisitingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VisitingStatus::Pending => write!(f, "pending"),
            VisitingStatus::Approved => write!(f, "approved"),
            VisitingStatus::Denied => write!(f, "denied"),
            VisitingStatus::Checkin => write!(f, "checkin"),
            VisitingStatus::Checkout => write!(f, "checkout"),
        }
    }
}

impl FromStr for VisitingStatus {
    type Err = VisitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(VisitingStatus::Pending),
            "approved" => Ok(VisitingStatus::Approved),
            "denied" => Ok(VisitingStatus::Denied),
            "checkin" => Ok(VisitingStatus::Checkin),
            "checkout" => Ok(VisitingStatus::Checkout),
            other => Err(VisitError::InvalidStatus(format!(
                "unknown status '{other}'"
            ))),
        }
    }
}

/// One immutable ledger row: "at time T, visiting V became S, optionally
/// recorded by gate keeper G".
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct VisitingStatusEvent {
    /// Monotonic, order-authoritative sequence number.
    pub seq: i64,
    pub visiting_id: Uuid,
    pub status: VisitingStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gate_keeper_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// Facts about a visiting that the transition rules depend on.
#[derive(Debug, Clone, Copy, Default)]
pub struct TransitionContext {
    /// The visiting is linked to a frequent (recurring) preapproval.
    pub is_frequent_pass: bool,
}

/// Initial ledger status for a guard-created walk-in.
///
/// A destination with no resident has nobody to approve, so the visiting
/// goes straight to CHECKIN.
pub fn initial_walk_in_status(destination_has_resident: bool) -> VisitingStatus {
    if destination_has_resident {
        VisitingStatus::Pending
    } else {
        VisitingStatus::Checkin
    }
}

/// Validates a proposed transition against the current ledger state.
///
/// `current` is `None` for a visiting that has never transitioned (a fresh
/// preapproval). Re-entering CHECKIN after CHECKOUT is only legal for a
/// frequent pass; DENIED is terminal.
pub fn validate_transition(
    current: Option<VisitingStatus>,
    next: VisitingStatus,
    ctx: TransitionContext,
) -> Result<(), VisitError> {
    if current == Some(next) {
        return Err(VisitError::DuplicateTransition { status: next });
    }

    use VisitingStatus::*;
    let allowed = match (current, next) {
        (None, Pending) | (None, Checkin) => true,
        (Some(Pending), Approved) | (Some(Pending), Denied) => true,
        (Some(Approved), Checkin) => true,
        (Some(Checkin), Checkout) => true,
        (Some(Checkout), Checkin) => ctx.is_frequent_pass,
        _ => false,
    };

    if allowed {
        Ok(())
    } else {
        let from = current
            .map(|s| s.to_string())
            .unwrap_or_else(|| "start".to_string());
        Err(VisitError::InvalidTransition { from, to: next })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn one_off() -> TransitionContext {
        TransitionContext {
            is_frequent_pass: false,
        }
    }

    fn frequent() -> TransitionContext {
        TransitionContext {
            is_frequent_pass: true,
        }
    }

    #[test]
    fn test_status_display_roundtrip() {
        for status in [
            VisitingStatus::Pending,
            VisitingStatus::Approved,
            VisitingStatus::Denied,
            VisitingStatus::Checkin,
            VisitingStatus::Checkout,
        ] {
            let parsed: VisitingStatus = status.to_string().parse().unwrap();
            assert_eq!(parsed, status);
        }
    }

    #[test]
    fn test_unknown_status_is_invalid() {
        let err = "arrived".parse::<VisitingStatus>().unwrap_err();
        assert!(matches!(err, VisitError::InvalidStatus(_)));
    }

    #[test]
    fn test_initial_walk_in_status() {
        assert_eq!(initial_walk_in_status(true), VisitingStatus::Pending);
        assert_eq!(initial_walk_in_status(false), VisitingStatus::Checkin);
    }

    #[test]
    fn test_happy_path_transitions() {
        use VisitingStatus::*;
        assert!(validate_transition(None, Pending, one_off()).is_ok());
        assert!(validate_transition(Some(Pending), Approved, one_off()).is_ok());
        assert!(validate_transition(Some(Approved), Checkin, one_off()).is_ok());
        assert!(validate_transition(Some(Checkin), Checkout, one_off()).is_ok());
    }

    #[test]
    fn test_preapproved_arrival_checks_in_from_empty_ledger() {
        assert!(validate_transition(None, VisitingStatus::Checkin, one_off()).is_ok());
    }

    #[test]
    fn test_denial_from_pending() {
        assert!(validate_transition(
            Some(VisitingStatus::Pending),
            VisitingStatus::Denied,
            one_off()
        )
        .is_ok());
    }

    #[test]
    fn test_duplicate_transition_rejected_for_every_status() {
        for status in [
            VisitingStatus::Pending,
            VisitingStatus::Approved,
            VisitingStatus::Denied,
            VisitingStatus::Checkin,
            VisitingStatus::Checkout,
        ] {
            let err = validate_transition(Some(status), status, frequent()).unwrap_err();
            match err {
                VisitError::DuplicateTransition { status: s } => assert_eq!(s, status),
                other => panic!("Expected DuplicateTransition, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_denied_is_terminal() {
        use VisitingStatus::*;
        for next in [Pending, Approved, Checkin, Checkout] {
            assert!(validate_transition(Some(Denied), next, frequent()).is_err());
        }
    }

    #[test]
    fn test_checkout_is_terminal_for_one_off() {
        let err = validate_transition(
            Some(VisitingStatus::Checkout),
            VisitingStatus::Checkin,
            one_off(),
        )
        .unwrap_err();
        assert!(matches!(err, VisitError::InvalidTransition { .. }));
    }

    #[test]
    fn test_frequent_pass_reenters_after_checkout() {
        assert!(validate_transition(
            Some(VisitingStatus::Checkout),
            VisitingStatus::Checkin,
            frequent()
        )
        .is_ok());
    }

    #[test]
    fn test_cannot_skip_approval() {
        let err = validate_transition(
            Some(VisitingStatus::Pending),
            VisitingStatus::Checkin,
            one_off(),
        )
        .unwrap_err();
        match err {
            VisitError::InvalidTransition { from, to } => {
                assert_eq!(from, "pending");
                assert_eq!(to, VisitingStatus::Checkin);
            }
            other => panic!("Expected InvalidTransition, got {:?}", other),
        }
    }

    #[test]
    fn test_cannot_decide_from_empty_ledger() {
        use VisitingStatus::*;
        for next in [Approved, Denied, Checkout] {
            assert!(validate_transition(None, next, frequent()).is_err());
        }
    }
}
