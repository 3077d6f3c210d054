//! Authentication API endpoints
//!
//! - POST /api/v1/auth/signup - Create an account and sign in
//! - POST /api/v1/auth/login - Sign in
//! - POST /api/v1/auth/logout - Sign out (authenticated)
//! - GET /api/v1/auth/me - Current user (authenticated)

use axum::{
    extract::State,
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::api::middleware::{ApiError, AppState};
use crate::models::{Credentials, User};
use crate::services::{AuthContext, AuthSession};

/// Response for successful authentication
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub user: User,
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Build protected auth routes (requires auth middleware)
pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/logout", post(logout))
        .route("/me", get(get_current_user))
}

/// Build public auth routes (no auth required)
pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/signup", post(signup))
        .route("/login", post(login))
}

/// `Set-Cookie` header carrying the session token until it expires
fn session_cookie(session: &AuthSession) -> Result<HeaderMap, ApiError> {
    let max_age = (session.expires_at - Utc::now()).num_seconds().max(0);
    let cookie = format!(
        "session={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        session.token, max_age
    );

    let mut headers = HeaderMap::new();
    headers.insert(
        header::SET_COOKIE,
        HeaderValue::from_str(&cookie)
            .map_err(|e| ApiError::internal_error(format!("Invalid session cookie: {}", e)))?,
    );
    Ok(headers)
}

fn auth_response(session: AuthSession) -> AuthResponse {
    AuthResponse {
        user: session.user,
        token: session.token,
        expires_at: session.expires_at,
    }
}

/// POST /api/v1/auth/signup
async fn signup(
    State(state): State<AppState>,
    Json(body): Json<Credentials>,
) -> Result<impl IntoResponse, ApiError> {
    let session = state.identity.sign_up(&body.email, &body.password).await?;
    let headers = session_cookie(&session)?;
    Ok((StatusCode::CREATED, headers, Json(auth_response(session))))
}

/// POST /api/v1/auth/login
async fn login(
    State(state): State<AppState>,
    Json(body): Json<Credentials>,
) -> Result<impl IntoResponse, ApiError> {
    let mut ctx = AuthContext::resolve(state.identity.clone(), None).await?;
    let session = ctx.login(&body.email, &body.password).await?;
    let headers = session_cookie(&session)?;
    Ok((headers, Json(auth_response(session))))
}

/// POST /api/v1/auth/logout
async fn logout(mut ctx: AuthContext) -> Result<impl IntoResponse, ApiError> {
    ctx.logout().await?;

    let mut headers = HeaderMap::new();
    headers.insert(
        header::SET_COOKIE,
        HeaderValue::from_static("session=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0"),
    );
    Ok((StatusCode::NO_CONTENT, headers))
}

/// GET /api/v1/auth/me
async fn get_current_user(ctx: AuthContext) -> Result<Json<User>, ApiError> {
    Ok(Json(ctx.require_user()?.clone()))
}
