//! API layer - HTTP handlers and routing
//!
//! Everything is served under `/api/v1`:
//! - Reader endpoints: posts, comments, live feeds, visit registration
//! - Auth endpoints: sign-up, login, logout, current user
//! - Dashboard endpoints: post editing and analytics (authenticated)

pub mod analytics;
pub mod auth;
pub mod comments;
pub mod middleware;
pub mod posts;
pub mod visits;

use axum::{
    http::{header, HeaderName, HeaderValue, Method},
    middleware as axum_middleware,
    routing::post,
    Router,
};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub use middleware::{ApiError, AppState};

/// Build the main API router
pub fn build_api_router(state: AppState) -> Router<AppState> {
    // Protected routes (need a signed-in user)
    let protected_routes = Router::new()
        .nest("/auth", auth::protected_router())
        .nest("/admin/posts", posts::admin_router())
        .nest("/admin/analytics", analytics::router())
        .route_layer(axum_middleware::from_fn_with_state(
            state,
            middleware::require_auth,
        ));

    // Public routes
    Router::new()
        .nest("/posts", posts::public_router().merge(comments::router()))
        .route("/visits", post(visits::register_visit))
        .nest("/auth", auth::public_router())
        .merge(protected_routes)
}

/// Build the complete router with middleware
pub fn build_router(state: AppState, cors_origin: &str) -> anyhow::Result<Router> {
    let origin = cors_origin
        .parse::<HeaderValue>()
        .map_err(|e| anyhow::anyhow!("Invalid CORS origin '{}': {}", cors_origin, e))?;

    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            header::COOKIE,
            HeaderName::from_static(visits::VISIT_SESSION_HEADER),
        ])
        .allow_credentials(true);

    Ok(Router::new()
        .nest("/api/v1", build_api_router(state.clone()))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state))
}
