//! Visit API endpoints
//!
//! - POST /api/v1/visits - Count this reader session once
//! - GET /api/v1/admin/analytics/visits - Total counted visits (authenticated)
//!
//! The reader's session token comes from the `X-Visit-Session` header or the
//! `visit_session` cookie. A request with neither gets a fresh token back as
//! a cookie.

use axum::{
    extract::State,
    http::{header, HeaderMap, HeaderValue},
    response::IntoResponse,
    Json,
};
use serde::Serialize;
use uuid::Uuid;

use crate::api::middleware::{cookie_value, ApiError, AppState};
use crate::models::VisitOutcome;

pub const VISIT_SESSION_HEADER: &str = "x-visit-session";
pub const VISIT_SESSION_COOKIE: &str = "visit_session";

#[derive(Debug, Serialize)]
pub struct VisitResponse {
    pub outcome: VisitOutcome,
    pub session: String,
}

#[derive(Debug, Serialize)]
pub struct VisitCountResponse {
    pub total_visits: u64,
}

fn visit_session(headers: &HeaderMap) -> Option<String> {
    headers
        .get(VISIT_SESSION_HEADER)
        .and_then(|h| h.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .or_else(|| cookie_value(headers, VISIT_SESSION_COOKIE))
}

/// POST /api/v1/visits
pub async fn register_visit(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let (session, issued) = match visit_session(&headers) {
        Some(session) => (session, false),
        None => (Uuid::new_v4().to_string(), true),
    };

    let outcome = state.visits.register_visit(&session).await?;

    let mut response_headers = HeaderMap::new();
    if issued {
        let cookie = format!(
            "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
            VISIT_SESSION_COOKIE, session, state.visit_session_ttl_seconds
        );
        response_headers.insert(
            header::SET_COOKIE,
            HeaderValue::from_str(&cookie)
                .map_err(|e| ApiError::internal_error(format!("Invalid visit cookie: {}", e)))?,
        );
    }

    Ok((response_headers, Json(VisitResponse { outcome, session })))
}

/// GET /api/v1/admin/analytics/visits
pub async fn visit_count(State(state): State<AppState>) -> Json<VisitCountResponse> {
    Json(VisitCountResponse {
        total_visits: state.visits.visit_count().await,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_wins_over_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(VISIT_SESSION_HEADER, HeaderValue::from_static("from-header"));
        headers.insert(header::COOKIE, HeaderValue::from_static("visit_session=from-cookie"));
        assert_eq!(visit_session(&headers).as_deref(), Some("from-header"));
    }

    #[test]
    fn test_blank_header_falls_back_to_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(VISIT_SESSION_HEADER, HeaderValue::from_static("  "));
        headers.insert(header::COOKIE, HeaderValue::from_static("visit_session=from-cookie"));
        assert_eq!(visit_session(&headers).as_deref(), Some("from-cookie"));
        assert!(visit_session(&HeaderMap::new()).is_none());
    }
}
