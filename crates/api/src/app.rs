use axum::{
    middleware,
    routing::{get, patch, post},
    Router,
};
use domain::services::Notifier;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::Config;
use crate::middleware::{
    metrics_handler, metrics_middleware, rate_limit_middleware, require_admin, require_any,
    require_gate, require_resident, security_headers_middleware, trace_id, RateLimiterState,
};
use crate::routes::{destinations, health, sweep, visitings, visitors};

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<Config>,
    pub notifier: Arc<dyn Notifier>,
    pub rate_limiter: Option<Arc<RateLimiterState>>,
}

pub fn create_app(config: Config, pool: PgPool, notifier: Arc<dyn Notifier>) -> Router {
    let config = Arc::new(config);

    // Rate limiter is active when rate_limit_per_minute > 0
    let rate_limiter = if config.security.rate_limit_per_minute > 0 {
        Some(Arc::new(RateLimiterState::new(
            config.security.rate_limit_per_minute,
        )))
    } else {
        None
    };

    let state = AppState {
        pool,
        config: config.clone(),
        notifier,
        rate_limiter,
    };

    // Build CORS layer based on configuration
    let cors = if config.security.cors_origins.is_empty() {
        // Default: allow any origin (for development)
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        use tower_http::cors::AllowOrigin;
        let origins: Vec<_> = config
            .security
            .cors_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods(Any)
            .allow_headers(Any)
    };

    // Gate-keeper routes
    // Middleware order: auth runs first, then rate limiting (which needs
    // the caller identity from auth)
    let gate_routes = Router::new()
        .route("/api/v1/visitings/walk-in", post(visitings::create_walk_in))
        .route(
            "/api/v1/visitings/walk-in/batch",
            post(visitings::create_walk_in_batch),
        )
        .route("/api/v1/visitings/lookup", get(visitings::lookup_by_code))
        .route(
            "/api/v1/visitings/:id/transition",
            post(visitings::submit_transition),
        )
        .route(
            "/api/v1/visitings/:id/visitor",
            patch(visitings::update_visitor_details),
        )
        .route("/api/v1/visitors", post(visitors::upsert_visitor))
        .route("/api/v1/visitors/lookup", get(visitors::lookup_visitor))
        .route(
            "/api/v1/gate-keepers/:id/destinations",
            get(destinations::assigned_destinations),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit_middleware,
        ))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_gate));

    // Resident routes
    let resident_routes = Router::new()
        .route(
            "/api/v1/visitings/preapproved",
            post(visitings::create_preapproved),
        )
        .route(
            "/api/v1/visitings/:id/preapproval",
            patch(visitings::update_preapproval).delete(visitings::delete_preapproval),
        )
        .route(
            "/api/v1/visitings/:id/decision",
            post(visitings::submit_decision),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit_middleware,
        ))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_resident,
        ));

    // Reads shared by every authenticated caller
    let read_routes = Router::new()
        .route("/api/v1/visitings/:id", get(visitings::get_visiting))
        .route(
            "/api/v1/visitings/:id/status",
            get(visitings::get_current_status),
        )
        .route("/api/v1/visitings/:id/events", get(visitings::get_history))
        .route(
            "/api/v1/destinations/:id/visitings",
            get(destinations::visiting_feed),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit_middleware,
        ))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_any));

    // Operational trigger for the sweep (admin token)
    let admin_routes = Router::new()
        .route("/api/v1/admin/sweep", post(sweep::trigger_sweep))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit_middleware,
        ))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_admin));

    // Public routes (no authentication required)
    let public_routes = Router::new()
        .route("/api/health", get(health::health_check))
        .route("/api/health/ready", get(health::ready))
        .route("/api/health/live", get(health::live))
        .route("/metrics", get(metrics_handler));

    // Merge all routes
    Router::new()
        .merge(public_routes)
        .merge(gate_routes)
        .merge(resident_routes)
        .merge(read_routes)
        .merge(admin_routes)
        // Global middleware (order matters: bottom layers run first)
        .layer(middleware::from_fn(security_headers_middleware))
        .layer(CompressionLayer::new())
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.server.request_timeout_secs,
        )))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(trace_id))
        .layer(cors)
        .with_state(state)
}
