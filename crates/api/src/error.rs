use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use domain::VisitError;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Rate limited")]
    RateLimited,

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Domain failure carrying its own taxonomy and code.
    #[error(transparent)]
    Visit(#[from] VisitError),
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match &self {
            ApiError::Unauthorized(msg) => {
                (StatusCode::UNAUTHORIZED, "unauthorized", msg.clone())
            }
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, "forbidden", msg.clone()),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg.clone()),
            ApiError::Validation(msg) => (StatusCode::BAD_REQUEST, "validation_error", msg.clone()),
            ApiError::RateLimited => (
                StatusCode::TOO_MANY_REQUESTS,
                "rate_limited",
                "Too many requests. Please try again later.".into(),
            ),
            ApiError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".into(),
                )
            }
            ApiError::ServiceUnavailable(msg) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "service_unavailable",
                msg.clone(),
            ),
            ApiError::Visit(err) => (visit_status(err), err.code(), visit_message(err)),
        };

        let body = ErrorBody {
            error: error_code.into(),
            message,
        };

        (status, Json(body)).into_response()
    }
}

/// HTTP status for each domain error class.
///
/// State conflicts land on 409 with distinct codes so clients can show
/// "someone already acted" instead of a generic failure; transient store
/// errors surface as 503 and are the only retry-safe class.
fn visit_status(err: &VisitError) -> StatusCode {
    match err {
        VisitError::InvalidWindow(_)
        | VisitError::InvalidStatus(_)
        | VisitError::Validation(_) => StatusCode::BAD_REQUEST,
        VisitError::DuplicateTransition { .. }
        | VisitError::AlreadyDecided { .. }
        | VisitError::InvalidTransition { .. } => StatusCode::CONFLICT,
        VisitError::Unauthorized => StatusCode::FORBIDDEN,
        VisitError::NotFound(_) => StatusCode::NOT_FOUND,
        VisitError::TransientStore(_) => StatusCode::SERVICE_UNAVAILABLE,
        VisitError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn visit_message(err: &VisitError) -> String {
    match err {
        // Storage details stay in the logs
        VisitError::Store(_) => {
            tracing::error!(error = %err, "Store failure");
            "An internal error occurred".into()
        }
        VisitError::TransientStore(_) => {
            tracing::warn!(error = %err, "Transient store failure");
            "Temporary storage contention, retry the request".into()
        }
        other => other.to_string(),
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let details: Vec<String> = errors
            .field_errors()
            .iter()
            .flat_map(|(field, errors)| {
                errors.iter().map(move |e| {
                    format!(
                        "{}: {}",
                        field,
                        e.message.clone().map(|m| m.to_string()).unwrap_or_default()
                    )
                })
            })
            .collect();

        ApiError::Validation(details.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use domain::models::VisitingStatus;

    #[test]
    fn test_api_error_unauthorized() {
        let error = ApiError::Unauthorized("test message".to_string());
        let response = error.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_api_error_not_found() {
        let error = ApiError::NotFound("resource not found".to_string());
        let response = error.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_api_error_validation() {
        let error = ApiError::Validation("invalid input".to_string());
        let response = error.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_api_error_rate_limited() {
        let error = ApiError::RateLimited;
        let response = error.into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[test]
    fn test_duplicate_transition_is_conflict() {
        let error = ApiError::Visit(VisitError::DuplicateTransition {
            status: VisitingStatus::Checkin,
        });
        let response = error.into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn test_already_decided_is_conflict() {
        let error = ApiError::Visit(VisitError::AlreadyDecided {
            current: VisitingStatus::Approved,
        });
        let response = error.into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn test_domain_unauthorized_is_forbidden() {
        let error = ApiError::Visit(VisitError::Unauthorized);
        let response = error.into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_invalid_window_is_bad_request() {
        let error = ApiError::Visit(VisitError::InvalidWindow("backdated".into()));
        let response = error.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_transient_store_is_service_unavailable() {
        let error = ApiError::Visit(VisitError::TransientStore(sqlx::Error::PoolTimedOut));
        let response = error.into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_store_error_hides_details() {
        let err = VisitError::Store(sqlx::Error::WorkerCrashed);
        assert_eq!(visit_message(&err), "An internal error occurred");
    }
}
