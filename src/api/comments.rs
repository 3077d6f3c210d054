//! Comment API endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Serialize;

use crate::api::middleware::{ApiError, AppState};
use crate::models::{Comment, CreateCommentInput};

#[derive(Debug, Serialize)]
pub struct CommentListResponse {
    pub comments: Vec<Comment>,
}

/// Comment routes, nested under `/posts`
pub fn router() -> Router<AppState> {
    Router::new().route("/{id}/comments", get(list_comments).post(create_comment))
}

/// GET /api/v1/posts/{id}/comments - Comments, newest first
async fn list_comments(
    State(state): State<AppState>,
    Path(post_id): Path<i64>,
) -> Result<Json<CommentListResponse>, ApiError> {
    let comments = state.comments.list(post_id).await?;
    Ok(Json(CommentListResponse { comments }))
}

/// POST /api/v1/posts/{id}/comments - Append a comment
async fn create_comment(
    State(state): State<AppState>,
    Path(post_id): Path<i64>,
    Json(input): Json<CreateCommentInput>,
) -> Result<impl IntoResponse, ApiError> {
    let comment = state
        .comments
        .append(post_id, &input.title, &input.message)
        .await?;
    Ok((StatusCode::CREATED, Json(comment)))
}
