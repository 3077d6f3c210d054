//! Shared API state, error envelope and authentication middleware

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::cache::Cache;
use crate::config::{AnalyticsConfig, Config};
use crate::db::repositories::{
    SqlxCommentRepository, SqlxMetricsRepository, SqlxPostRepository, SqlxVisitClaimRepository,
};
use crate::db::DynDatabasePool;
use crate::services::{
    AnalyticsService, AuthContext, AuthError, ChangeBus, CommentService, IdentityProvider,
    PostFeed, PostService, ServiceError, VisitCounter,
};

/// Message shown when a write could not reach the store
pub const SUBMIT_RETRY_MESSAGE: &str = "Failed to submit. Please try again.";

/// Application state shared by all handlers
#[derive(Clone)]
pub struct AppState {
    pub posts: Arc<PostService>,
    pub comments: Arc<CommentService>,
    pub visits: Arc<VisitCounter>,
    pub analytics: Arc<AnalyticsService>,
    pub feed: Arc<PostFeed>,
    pub identity: Arc<dyn IdentityProvider>,
    pub analytics_config: AnalyticsConfig,
    /// Lifetime of the `visit_session` cookie
    pub visit_session_ttl_seconds: u64,
}

impl AppState {
    /// Wire repositories and services over one pool and cache
    pub fn new(
        pool: DynDatabasePool,
        cache: Arc<Cache>,
        identity: Arc<dyn IdentityProvider>,
        config: &Config,
    ) -> Self {
        let changes = ChangeBus::new();
        let post_repo = SqlxPostRepository::boxed(pool.clone());
        let comment_repo = SqlxCommentRepository::boxed(pool.clone());
        let metrics_repo = SqlxMetricsRepository::boxed(pool.clone());
        let claim_repo = SqlxVisitClaimRepository::boxed(pool);

        let posts = Arc::new(PostService::new(
            post_repo.clone(),
            comment_repo.clone(),
            changes.clone(),
        ));
        let comments = Arc::new(CommentService::new(
            post_repo.clone(),
            comment_repo,
            changes.clone(),
        ));
        let visits = Arc::new(VisitCounter::new(
            cache,
            claim_repo,
            metrics_repo,
            Duration::from_secs(config.cache.session_ttl_seconds),
        ));
        let analytics = Arc::new(AnalyticsService::new(
            post_repo,
            visits.clone(),
            config.analytics.clone(),
        ));
        let feed = Arc::new(PostFeed::new(posts.clone(), changes));

        Self {
            posts,
            comments,
            visits,
            analytics,
            feed,
            identity,
            analytics_config: config.analytics.clone(),
            visit_session_ttl_seconds: config.cache.session_ttl_seconds,
        }
    }
}

/// Error response for API errors
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiErrorDetail {
    pub code: String,
    pub message: String,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ApiErrorDetail {
                code: code.into(),
                message: message.into(),
            },
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new("UNAUTHORIZED", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("NOT_FOUND", message)
    }

    pub fn validation_error(message: impl Into<String>) -> Self {
        Self::new("VALIDATION_ERROR", message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new("CONFLICT", message)
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new("RATE_LIMIT", message)
    }

    pub fn store_unavailable(message: impl Into<String>) -> Self {
        Self::new("STORE_UNAVAILABLE", message)
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new("INTERNAL_ERROR", message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.error.code.as_str() {
            "UNAUTHORIZED" => StatusCode::UNAUTHORIZED,
            "NOT_FOUND" => StatusCode::NOT_FOUND,
            "VALIDATION_ERROR" => StatusCode::BAD_REQUEST,
            "CONFLICT" => StatusCode::CONFLICT,
            "RATE_LIMIT" => StatusCode::TOO_MANY_REQUESTS,
            "STORE_UNAVAILABLE" => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (status, Json(self)).into_response()
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::NotFound(what) => ApiError::not_found(format!("{} not found", what)),
            ServiceError::ValidationError(msg) => ApiError::validation_error(msg),
            ServiceError::StoreUnavailable(e) => {
                tracing::error!("Store unavailable: {:#}", e);
                ApiError::store_unavailable(SUBMIT_RETRY_MESSAGE)
            }
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        let message = err.to_string();
        match err {
            AuthError::UserNotFound | AuthError::WrongPassword | AuthError::Unauthenticated => {
                ApiError::unauthorized(message)
            }
            AuthError::InvalidEmail | AuthError::WeakPassword(_) => {
                ApiError::validation_error(message)
            }
            AuthError::EmailInUse => ApiError::conflict(message),
            AuthError::TooManyAttempts => ApiError::rate_limited(message),
            AuthError::Internal(e) => {
                tracing::error!("Identity provider failure: {:#}", e);
                ApiError::internal_error(message)
            }
        }
    }
}

/// Value of the named cookie, if present
pub fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    let cookie_header = headers.get(header::COOKIE)?.to_str().ok()?;
    cookie_header.split(';').find_map(|cookie| {
        let (key, value) = cookie.trim().split_once('=')?;
        (key == name && !value.is_empty()).then(|| value.to_string())
    })
}

/// Session token from `Authorization: Bearer` or the `session` cookie
pub fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(String::from);

    bearer.or_else(|| cookie_value(headers, "session"))
}

/// Authentication middleware
///
/// Resolves the request's token into an [`AuthContext`] and stores it in the
/// request extensions. Requests without a valid session are rejected.
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_session_token(request.headers())
        .ok_or_else(|| ApiError::unauthorized("Missing authentication token"))?;

    let ctx = AuthContext::resolve(state.identity.clone(), Some(token)).await?;
    if !ctx.is_authenticated() {
        return Err(ApiError::unauthorized("Invalid or expired session"));
    }

    request.extensions_mut().insert(ctx);
    Ok(next.run(request).await)
}

impl<S> FromRequestParts<S> for AuthContext
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthContext>()
            .cloned()
            .ok_or_else(|| ApiError::unauthorized("Authentication required"))
    }
}
