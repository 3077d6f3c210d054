//! Post service
//!
//! Read model for the blog reader (post detail, latest listing, related posts)
//! and the create/update/delete operations behind the admin dashboard.
//!
//! Listing reads degrade to empty results when the store is unreachable.
//! A single-post read instead reports [`ServiceError::StoreUnavailable`] so
//! the reader can tell "missing" apart from "try again".

use chrono::Utc;
use std::sync::Arc;

use crate::db::repositories::{CommentRepository, PostRepository};
use crate::models::{BlogPost, CreatePostInput, PostDetail, PostSummary, UpdatePostInput};
use crate::services::feed::{ChangeBus, ChangeEvent};
use crate::services::{reading_time, ServiceError};

pub struct PostService {
    posts: Arc<dyn PostRepository>,
    comments: Arc<dyn CommentRepository>,
    changes: ChangeBus,
}

fn summarize(post: BlogPost) -> PostSummary {
    let reading_time = reading_time::estimate(&post.content);
    PostSummary { post, reading_time }
}

impl PostService {
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

    /// A post with its comments (newest first) and reading time
    pub async fn get(&self, id: i64) -> Result<PostDetail, ServiceError> {
        let post = self
            .posts
            .get_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::not_found(format!("Post {}", id)))?;
        let comments = self.comments.list_by_post(id).await?;
        let reading_time = reading_time::estimate(&post.content);

        Ok(PostDetail {
            post,
            comments,
            reading_time,
        })
    }

    /// Up to `limit` posts, most recently published first
    pub async fn latest(&self, limit: usize) -> Vec<PostSummary> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        match self.posts.list_latest(limit).await {
            Ok(posts) => posts.into_iter().map(summarize).collect(),
            Err(e) => {
                tracing::warn!("Failed to list latest posts: {:#}", e);
                Vec::new()
            }
        }
    }

    /// The latest `limit` posts other than `id`
    pub async fn related(&self, id: i64, limit: usize) -> Vec<PostSummary> {
        let mut posts = self.latest(limit.saturating_add(1)).await;
        posts.retain(|p| p.post.id != id);
        posts.truncate(limit);
        posts
    }

    /// Number of posts; 0 when the store is unreachable
    pub async fn count(&self) -> u64 {
        match self.posts.count().await {
            Ok(count) => count,
            Err(e) => {
                tracing::warn!("Failed to count posts: {:#}", e);
                0
            }
        }
    }

    pub async fn create(&self, input: CreatePostInput) -> Result<BlogPost, ServiceError> {
        if input.id <= 0 {
            return Err(ServiceError::validation("Post id must be a positive number"));
        }
        validate_title(&input.title)?;

        let now = Utc::now();
        let post = BlogPost {
            id: input.id,
            title: input.title.trim().to_string(),
            content: input.content,
            tags: input.tags,
            author_name: input.author_name,
            author_email: input.author_email,
            image_url: input.image_url,
            published_at: input.published_at.unwrap_or(now),
            created_at: now,
            updated_at: now,
        };

        // duplicate ids are rejected by the insert
        let created = self.posts.create(&post).await?.ok_or_else(|| {
            ServiceError::validation(format!("A post with id {} already exists", post.id))
        })?;
        tracing::info!("Created post {} (tags: {})", created.id, created.tags);
        self.changes.publish(ChangeEvent::PostChanged(created.id));
        Ok(created)
    }

    pub async fn update(&self, id: i64, input: UpdatePostInput) -> Result<BlogPost, ServiceError> {
        if let Some(title) = &input.title {
            validate_title(title)?;
        }

        let mut post = self
            .posts
            .get_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::not_found(format!("Post {}", id)))?;
        if input.is_empty() {
            return Ok(post);
        }
        input.apply_to(&mut post);
        post.title = post.title.trim().to_string();

        let updated = self
            .posts
            .update(&post)
            .await?
            .ok_or_else(|| ServiceError::not_found(format!("Post {}", id)))?;
        self.changes.publish(ChangeEvent::PostChanged(id));
        Ok(updated)
    }

    pub async fn delete(&self, id: i64) -> Result<(), ServiceError> {
        if !self.posts.delete(id).await? {
            return Err(ServiceError::not_found(format!("Post {}", id)));
        }
        tracing::info!("Deleted post {}", id);
        self.changes.publish(ChangeEvent::PostRemoved(id));
        Ok(())
    }
}

fn validate_title(title: &str) -> Result<(), ServiceError> {
    if title.trim().is_empty() {
        return Err(ServiceError::validation("Title cannot be empty"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{SqlxCommentRepository, SqlxPostRepository};
    use crate::db::{create_test_pool, migrations};
    use crate::models::{Comment, TagSet};
    use chrono::{Duration, TimeZone};

    struct Fixture {
        service: PostService,
        comments: Arc<dyn CommentRepository>,
        bus: ChangeBus,
    }

    async fn setup_test_service() -> Fixture {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        let comments = SqlxCommentRepository::boxed(pool.clone());
        let bus = ChangeBus::new();
        let service = PostService::new(
            SqlxPostRepository::boxed(pool),
            comments.clone(),
            bus.clone(),
        );
        Fixture {
            service,
            comments,
            bus,
        }
    }

    fn input(id: i64, content: &str) -> CreatePostInput {
        let base = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        CreatePostInput {
            id,
            title: format!("Post {}", id),
            content: content.to_string(),
            tags: TagSet::parse_delimited("rust, web"),
            author_name: None,
            author_email: None,
            image_url: None,
            published_at: Some(base + Duration::days(id)),
        }
    }

    #[tokio::test]
    async fn test_get_includes_comments_and_reading_time() {
        let f = setup_test_service().await;
        let body = vec!["word"; 401].join(" ");
        f.service.create(input(1, &body)).await.unwrap();
        f.comments
            .append(&Comment::new(1, "T".to_string(), "M".to_string()))
            .await
            .unwrap();

        let detail = f.service.get(1).await.unwrap();
        assert_eq!(detail.reading_time, 3);
        assert_eq!(detail.comments.len(), 1);
        assert_eq!(detail.post.tags.to_string(), "rust, web");
    }

    #[tokio::test]
    async fn test_get_missing_post() {
        let f = setup_test_service().await;
        let err = f.service.get(5).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_create_validation() {
        let f = setup_test_service().await;

        let err = f.service.create(input(0, "x")).await.unwrap_err();
        assert!(matches!(err, ServiceError::ValidationError(_)));

        let mut untitled = input(2, "x");
        untitled.title = "  ".to_string();
        let err = f.service.create(untitled).await.unwrap_err();
        assert!(matches!(err, ServiceError::ValidationError(_)));

        f.service.create(input(3, "x")).await.unwrap();
        let err = f.service.create(input(3, "x")).await.unwrap_err();
        assert!(matches!(err, ServiceError::ValidationError(_)));
    }

    #[tokio::test]
    async fn test_concurrent_creates_same_id() {
        let f = setup_test_service().await;
        let service = Arc::new(f.service);

        let mut handles = Vec::new();
        for n in 0..4 {
            let service = service.clone();
            handles.push(tokio::spawn(async move {
                service.create(input(9, &format!("body {}", n))).await
            }));
        }

        let mut created = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => created += 1,
                Err(err) => assert!(matches!(err, ServiceError::ValidationError(_))),
            }
        }
        assert_eq!(created, 1);
        assert_eq!(service.count().await, 1);
    }

    #[tokio::test]
    async fn test_latest_and_related() {
        let f = setup_test_service().await;
        for id in 1..=5 {
            f.service.create(input(id, "text")).await.unwrap();
        }

        let latest: Vec<i64> = f.service.latest(4).await.iter().map(|p| p.post.id).collect();
        assert_eq!(latest, vec![5, 4, 3, 2]);

        let related: Vec<i64> = f.service.related(4, 3).await.iter().map(|p| p.post.id).collect();
        assert_eq!(related, vec![5, 3, 2]);

        let related: Vec<i64> = f.service.related(1, 3).await.iter().map(|p| p.post.id).collect();
        assert_eq!(related, vec![5, 4, 3]);

        assert_eq!(f.service.count().await, 5);
    }

    #[tokio::test]
    async fn test_update_changes_only_given_fields() {
        let f = setup_test_service().await;
        f.service.create(input(1, "old body")).await.unwrap();

        let updated = f
            .service
            .update(
                1,
                UpdatePostInput {
                    content: Some("new body".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.title, "Post 1");
        assert_eq!(updated.content, "new body");

        let err = f
            .service
            .update(9, UpdatePostInput::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_delete_and_change_events() {
        let f = setup_test_service().await;
        let mut rx = f.bus.subscribe();

        f.service.create(input(1, "x")).await.unwrap();
        f.service.delete(1).await.unwrap();
        assert_eq!(rx.recv().await.unwrap(), ChangeEvent::PostChanged(1));
        assert_eq!(rx.recv().await.unwrap(), ChangeEvent::PostRemoved(1));

        let err = f.service.delete(1).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }
}
