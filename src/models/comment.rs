//! Comment model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Longest accepted comment message, in characters
pub const MAX_MESSAGE_CHARS: usize = 1000;

/// A reader comment attached to one post. Never edited once stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    /// UUID v4, unique within the post
    pub id: String,
    pub post_id: i64,
    pub title: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

impl Comment {
    pub fn new(post_id: i64, title: String, message: String) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            post_id,
            title,
            message,
            created_at: Utc::now(),
        }
    }
}

/// Comment submission body
#[derive(Debug, Clone, Deserialize)]
pub struct CreateCommentInput {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub message: String,
}
