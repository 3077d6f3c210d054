//! Comment ledger
//!
//! Readers append comments to a post; nothing edits or removes them
//! afterwards (except deleting the post itself).

use std::sync::Arc;

use crate::db::repositories::{CommentRepository, PostRepository};
use crate::models::{Comment, MAX_MESSAGE_CHARS};
use crate::services::feed::{ChangeBus, ChangeEvent};
use crate::services::ServiceError;

/// Fresh ids tried before an append is reported as failed
const APPEND_ATTEMPTS: usize = 3;

pub struct CommentService {
    posts: Arc<dyn PostRepository>,
    comments: Arc<dyn CommentRepository>,
    changes: ChangeBus,
}

impl CommentService {
    pub fn new(
        posts: Arc<dyn PostRepository>,
        comments: Arc<dyn CommentRepository>,
        changes: ChangeBus,
    ) -> Self {
        Self {
            posts,
            comments,
            changes,
        }
    }

    async fn ensure_post_exists(&self, post_id: i64) -> Result<(), ServiceError> {
        if self.posts.exists(post_id).await? {
            Ok(())
        } else {
            Err(ServiceError::not_found(format!("Post {}", post_id)))
        }
    }

    /// Append a comment to `post_id`.
    ///
    /// Title and message are trimmed and must be non-empty; the message is
    /// capped at [`MAX_MESSAGE_CHARS`].
    pub async fn append(
        &self,
        post_id: i64,
        title: &str,
        message: &str,
    ) -> Result<Comment, ServiceError> {
        let title = title.trim();
        let message = message.trim();

        if title.is_empty() || message.is_empty() {
            return Err(ServiceError::validation("Please fill in all fields"));
        }
        if message.chars().count() > MAX_MESSAGE_CHARS {
            return Err(ServiceError::validation(format!(
                "Message must be at most {} characters",
                MAX_MESSAGE_CHARS
            )));
        }

        self.ensure_post_exists(post_id).await?;

        for _ in 0..APPEND_ATTEMPTS {
            let comment = Comment::new(post_id, title.to_string(), message.to_string());
            if self.comments.append(&comment).await? {
                tracing::debug!("Appended comment {} to post {}", comment.id, post_id);
                self.changes.publish(ChangeEvent::CommentAdded(post_id));
                return Ok(comment);
            }
            // id already taken on this post; draw a new one
            tracing::warn!("Comment id {} already present on post {}", comment.id, post_id);
        }

        Err(ServiceError::StoreUnavailable(anyhow::anyhow!(
            "Comment was not stored after {} attempts",
            APPEND_ATTEMPTS
        )))
    }

    /// Comments on `post_id`, newest first
    pub async fn list(&self, post_id: i64) -> Result<Vec<Comment>, ServiceError> {
        self.ensure_post_exists(post_id).await?;
        Ok(self.comments.list_by_post(post_id).await?)
    }
}
