//! Service-token authentication middleware.
//!
//! The surrounding platform owns user accounts; this service only needs to
//! tell the three caller groups apart. Each route group requires the
//! matching token in the `X-Api-Token` header, compared by SHA-256 digest.

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use shared::crypto::{sha256_hex, token_matches};

use crate::app::AppState;

/// Header carrying the caller's service token.
pub const API_TOKEN_HEADER: &str = "X-Api-Token";

/// Caller role resolved from the presented token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallerRole {
    Gate,
    Resident,
    Admin,
}

/// Resolved caller role, stored in request extensions for rate limiting.
#[derive(Debug, Clone)]
pub struct CallerAuth {
    pub role: CallerRole,
    /// Digest of the presented token, used as the rate-limit key.
    pub token_digest: String,
}

fn resolve_role(state: &AppState, presented: &str) -> Option<CallerRole> {
    let security = &state.config.security;
    for (role, token) in [
        (CallerRole::Gate, &security.gate_token),
        (CallerRole::Resident, &security.resident_token),
        (CallerRole::Admin, &security.admin_token),
    ] {
        if token_matches(presented, &sha256_hex(token)) {
            return Some(role);
        }
    }
    None
}

async fn require_role(
    state: AppState,
    mut req: Request<Body>,
    next: Next,
    allowed: &[CallerRole],
) -> Response {
    let presented = req
        .headers()
        .get(API_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok());

    let presented = match presented {
        Some(token) => token.to_string(),
        None => return unauthorized_response("Invalid or missing service token"),
    };

    match resolve_role(&state, &presented) {
        Some(role) if allowed.contains(&role) => {
            req.extensions_mut().insert(CallerAuth {
                role,
                token_digest: sha256_hex(&presented),
            });
            next.run(req).await
        }
        Some(_) => forbidden_response("Token does not grant access to this route"),
        None => unauthorized_response("Invalid or missing service token"),
    }
}

/// Middleware for gate-keeper routes.
pub async fn require_gate(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    require_role(state, req, next, &[CallerRole::Gate]).await
}

/// Middleware for resident routes.
pub async fn require_resident(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    require_role(state, req, next, &[CallerRole::Resident]).await
}

/// Middleware for admin routes.
pub async fn require_admin(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    require_role(state, req, next, &[CallerRole::Admin]).await
}

/// Middleware for read routes shared by every authenticated caller.
pub async fn require_any(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    require_role(
        state,
        req,
        next,
        &[CallerRole::Gate, CallerRole::Resident, CallerRole::Admin],
    )
    .await
}

/// Helper to create unauthorized response.
fn unauthorized_response(message: &str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({
            "error": "unauthorized",
            "message": message
        })),
    )
        .into_response()
}

/// Helper to create forbidden response.
fn forbidden_response(message: &str) -> Response {
    (
        StatusCode::FORBIDDEN,
        Json(json!({
            "error": "forbidden",
            "message": message
        })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unauthorized_response() {
        let response = unauthorized_response("Invalid or missing service token");
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_forbidden_response() {
        let response = forbidden_response("Token does not grant access to this route");
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_caller_role_equality() {
        assert_eq!(CallerRole::Gate, CallerRole::Gate);
        assert_ne!(CallerRole::Gate, CallerRole::Admin);
    }
}
