//! Domain error taxonomy for the visiting lifecycle.
//!
//! Every operation in this crate and in the persistence layer surfaces one
//! of these variants. Storage failures are translated at the boundary:
//! serialization failures and deadlocks become [`VisitError::TransientStore`],
//! which is safe to retry at the transaction boundary; everything else maps
//! to a non-retryable variant.

use thiserror::Error;

use crate::models::status::VisitingStatus;

#[derive(Debug, Error)]
pub enum VisitError {
    /// The preapproval time range failed validation.
    #[error("Invalid window: {0}")]
    InvalidWindow(String),

    /// The requested status is not one of the enumerated values.
    #[error("Invalid status: {0}")]
    InvalidStatus(String),

    /// Caller-fixable input problem (blank name, bad headcount, ...).
    #[error("Validation failed: {0}")]
    Validation(String),

    /// The visiting is already in the requested status.
    #[error("Visiting is already {status}")]
    DuplicateTransition { status: VisitingStatus },

    /// A decision was requested on a visiting that has moved past PENDING.
    /// Carries the current status so clients can show who got there first.
    #[error("Visiting already handled: current status is {current}")]
    AlreadyDecided { current: VisitingStatus },

    /// The requested transition edge does not exist in the state machine.
    #[error("Cannot transition from {from} to {to}")]
    InvalidTransition { from: String, to: VisitingStatus },

    /// The gate keeper's assigned buildings do not cover the destination.
    #[error("Destination is outside the gate keeper's assigned buildings")]
    Unauthorized,

    #[error("Not found: {0}")]
    NotFound(String),

    /// Retry-safe storage failure (serialization conflict, deadlock, pool
    /// exhaustion).
    #[error("Transient store failure: {0}")]
    TransientStore(#[source] sqlx::Error),

    /// Non-retryable storage failure.
    #[error("Store failure: {0}")]
    Store(#[source] sqlx::Error),
}

impl VisitError {
    /// Whether retrying the whole transaction may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, VisitError::TransientStore(_))
    }

    /// Stable machine-readable code for API responses and logs.
    pub fn code(&self) -> &'static str {
        match self {
            VisitError::InvalidWindow(_) => "invalid_window",
            VisitError::InvalidStatus(_) => "invalid_status",
            VisitError::Validation(_) => "validation_error",
            VisitError::DuplicateTransition { .. } => "duplicate_transition",
            VisitError::AlreadyDecided { .. } => "already_decided",
            VisitError::InvalidTransition { .. } => "invalid_transition",
            VisitError::Unauthorized => "unauthorized_post",
            VisitError::NotFound(_) => "not_found",
            VisitError::TransientStore(_) => "transient_store_error",
            VisitError::Store(_) => "store_error",
        }
    }
}

impl From<sqlx::Error> for VisitError {
    fn from(err: sqlx::Error) -> Self {
        if matches!(err, sqlx::Error::RowNotFound) {
            return VisitError::NotFound("row not found".into());
        }

        let transient = match &err {
            // 40001 = serialization_failure, 40P01 = deadlock_detected
            sqlx::Error::Database(db_err) => {
                matches!(db_err.code().as_deref(), Some("40001") | Some("40P01"))
            }
            sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) => true,
            _ => false,
        };

        if transient {
            VisitError::TransientStore(err)
        } else {
            VisitError::Store(err)
        }
    }
}

impl From<validator::ValidationError> for VisitError {
    fn from(err: validator::ValidationError) -> Self {
        let message = err
            .message
            .map(|m| m.to_string())
            .unwrap_or_else(|| err.code.to_string());
        VisitError::Validation(message)
    }
}
