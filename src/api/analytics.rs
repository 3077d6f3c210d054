//! Dashboard analytics endpoints (authenticated)
//!
//! Page views, bounce rates and traffic breakdowns are simulated from the
//! real visit total; every such figure carries `"simulated": true`.

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::middleware::{ApiError, AppState};
use crate::api::visits;
use crate::models::{AnalyticsSummary, PageStat, TagStat, TrafficPeriod, TrafficSample};

#[derive(Debug, Deserialize)]
pub struct TrafficQuery {
    pub period: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TrafficResponse {
    pub period: TrafficPeriod,
    pub samples: Vec<TrafficSample>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/summary", get(summary))
        .route("/tags", get(tag_stats))
        .route("/top-pages", get(top_pages))
        .route("/traffic", get(traffic))
        .route("/visits", get(visits::visit_count))
}

async fn summary(State(state): State<AppState>) -> Json<AnalyticsSummary> {
    Json(state.analytics.summary().await)
}

async fn tag_stats(State(state): State<AppState>) -> Json<Vec<TagStat>> {
    Json(state.analytics.tag_stats().await)
}

async fn top_pages(State(state): State<AppState>) -> Json<Vec<PageStat>> {
    Json(state.analytics.top_pages().await)
}

/// GET /api/v1/admin/analytics/traffic?period=week|month|year
async fn traffic(
    State(state): State<AppState>,
    Query(query): Query<TrafficQuery>,
) -> Result<Json<TrafficResponse>, ApiError> {
    let period = match query.period.as_deref() {
        None => TrafficPeriod::default(),
        Some(raw) => raw
            .parse::<TrafficPeriod>()
            .map_err(|e| ApiError::validation_error(e))?,
    };

    Ok(Json(TrafficResponse {
        period,
        samples: state.analytics.traffic(period).await,
    }))
}
