//! Post API endpoints
//!
//! Reader routes:
//! - GET /api/v1/posts - Latest posts
//! - GET /api/v1/posts/{id} - Post with comments and reading time
//! - GET /api/v1/posts/{id}/related - Latest posts other than this one
//! - GET /api/v1/posts/live - Latest posts as a server-sent event stream
//! - GET /api/v1/posts/{id}/live - One post as a server-sent event stream
//!
//! Dashboard routes (authenticated):
//! - POST /api/v1/admin/posts
//! - PUT /api/v1/admin/posts/{id}
//! - DELETE /api/v1/admin/posts/{id}

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse,
    },
    routing::{get, put},
    Json, Router,
};
use futures::stream::{self, Stream};
use serde::Deserialize;
use std::convert::Infallible;

use crate::api::middleware::{ApiError, AppState};
use crate::models::{BlogPost, CreatePostInput, PostDetail, PostSummary, UpdatePostInput};
use crate::services::{AuthContext, LiveQuery, ServiceError, Subscription};

const DEFAULT_LIMIT: usize = 10;
const MAX_LIMIT: usize = 100;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub limit: Option<usize>,
}

impl ListQuery {
    fn limit(&self) -> usize {
        self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
    }
}

/// Public post routes
pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_posts))
        .route("/live", get(live_latest))
        .route("/{id}", get(get_post))
        .route("/{id}/related", get(related_posts))
        .route("/{id}/live", get(live_post))
}

/// Dashboard post routes; mount behind `require_auth`
pub fn admin_router() -> Router<AppState> {
    Router::new()
        .route("/", axum::routing::post(create_post))
        .route("/{id}", put(update_post).delete(delete_post))
}

async fn list_posts(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Json<Vec<PostSummary>> {
    Json(state.posts.latest(query.limit()).await)
}

async fn get_post(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<PostDetail>, ApiError> {
    match state.posts.get(id).await {
        Ok(detail) => Ok(Json(detail)),
        Err(ServiceError::StoreUnavailable(e)) => {
            tracing::error!("Failed to load post {}: {:#}", id, e);
            Err(ApiError::store_unavailable(
                "Failed to load post. Please try again.",
            ))
        }
        Err(e) => Err(e.into()),
    }
}

async fn related_posts(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Json<Vec<PostSummary>> {
    let limit = state.analytics_config.related_posts;
    Json(state.posts.related(id, limit).await)
}

/// Turn a feed subscription into an SSE stream; the subscription is
/// dropped (and its listener stopped) when the client disconnects
fn snapshot_stream(sub: Subscription) -> impl Stream<Item = Result<Event, Infallible>> {
    stream::unfold(sub, |mut sub| async move {
        let snapshot = sub.next().await?;
        let event = match Event::default().event("snapshot").json_data(&snapshot) {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!("Failed to encode live snapshot: {}", e);
                Event::default().event("error").data("encoding failed")
            }
        };
        Some((Ok(event), sub))
    })
}

async fn live_latest(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let sub = state.feed.watch(LiveQuery::Latest(query.limit()));
    Sse::new(snapshot_stream(sub)).keep_alive(KeepAlive::default())
}

async fn live_post(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let sub = state.feed.watch(LiveQuery::Post(id));
    Sse::new(snapshot_stream(sub)).keep_alive(KeepAlive::default())
}

async fn create_post(
    State(state): State<AppState>,
    ctx: AuthContext,
    Json(input): Json<CreatePostInput>,
) -> Result<impl IntoResponse, ApiError> {
    let post = state.posts.create(input).await?;
    if let Some(user) = ctx.current_user() {
        tracing::info!("Post {} created by user {}", post.id, user.id);
    }
    Ok((StatusCode::CREATED, Json(post)))
}

async fn update_post(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(input): Json<UpdatePostInput>,
) -> Result<Json<BlogPost>, ApiError> {
    Ok(Json(state.posts.update(id, input).await?))
}

async fn delete_post(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.posts.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
