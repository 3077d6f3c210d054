//! Post repository
//!
//! Database operations for blog posts.
//!
//! Tags are stored as a JSON array in a text column and normalized into a
//! [`TagSet`] whenever a row is read, so older rows holding a plain
//! comma-delimited string still decode.

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{BlogPost, TagSet};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

const POST_COLUMNS: &str = "id, title, content, tags, author_name, author_email, image_url, \
                            published_at, created_at, updated_at";

/// Post repository trait
#[async_trait]
pub trait PostRepository: Send + Sync {
    /// Insert a post under its externally assigned id; returns `None` when
    /// the id is already taken
    async fn create(&self, post: &BlogPost) -> Result<Option<BlogPost>>;

    async fn get_by_id(&self, id: i64) -> Result<Option<BlogPost>>;

    async fn exists(&self, id: i64) -> Result<bool>;

    /// Most recently published first
    async fn list_latest(&self, limit: i64) -> Result<Vec<BlogPost>>;

    /// Every post, most recently published first
    async fn list_all(&self) -> Result<Vec<BlogPost>>;

    /// Overwrite all mutable fields; returns `None` when the post is gone
    async fn update(&self, post: &BlogPost) -> Result<Option<BlogPost>>;

    /// Returns whether a row was removed
    async fn delete(&self, id: i64) -> Result<bool>;

    async fn count(&self) -> Result<u64>;
}

/// SQLx-based post repository
pub struct SqlxPostRepository {
    pool: DynDatabasePool,
}

impl SqlxPostRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn PostRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl PostRepository for SqlxPostRepository {
    async fn create(&self, post: &BlogPost) -> Result<Option<BlogPost>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => create_post_sqlite(self.pool.sqlite()?, post).await,
            DatabaseDriver::Mysql => create_post_mysql(self.pool.mysql()?, post).await,
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<BlogPost>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_post_by_id_sqlite(self.pool.sqlite()?, id).await,
            DatabaseDriver::Mysql => get_post_by_id_mysql(self.pool.mysql()?, id).await,
        }
    }

    async fn exists(&self, id: i64) -> Result<bool> {
        let sql = "SELECT COUNT(*) FROM posts WHERE id = ?";
        let count: i64 = match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query_scalar(sql)
                    .bind(id)
                    .fetch_one(self.pool.sqlite()?)
                    .await
            }
            DatabaseDriver::Mysql => {
                sqlx::query_scalar(sql)
                    .bind(id)
                    .fetch_one(self.pool.mysql()?)
                    .await
            }
        }
        .context("Failed to check post existence")?;
        Ok(count > 0)
    }

    async fn list_latest(&self, limit: i64) -> Result<Vec<BlogPost>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => list_posts_sqlite(self.pool.sqlite()?, Some(limit)).await,
            DatabaseDriver::Mysql => list_posts_mysql(self.pool.mysql()?, Some(limit)).await,
        }
    }

    async fn list_all(&self) -> Result<Vec<BlogPost>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => list_posts_sqlite(self.pool.sqlite()?, None).await,
            DatabaseDriver::Mysql => list_posts_mysql(self.pool.mysql()?, None).await,
        }
    }

    async fn update(&self, post: &BlogPost) -> Result<Option<BlogPost>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => update_post_sqlite(self.pool.sqlite()?, post).await,
            DatabaseDriver::Mysql => update_post_mysql(self.pool.mysql()?, post).await,
        }
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let sql = "DELETE FROM posts WHERE id = ?";
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(id)
                .execute(self.pool.sqlite()?)
                .await
                .map(|r| r.rows_affected()),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(id)
                .execute(self.pool.mysql()?)
                .await
                .map(|r| r.rows_affected()),
        }
        .context("Failed to delete post")?;
        Ok(affected > 0)
    }

    async fn count(&self) -> Result<u64> {
        let sql = "SELECT COUNT(*) FROM posts";
        let count: i64 = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query_scalar(sql).fetch_one(self.pool.sqlite()?).await,
            DatabaseDriver::Mysql => sqlx::query_scalar(sql).fetch_one(self.pool.mysql()?).await,
        }
        .context("Failed to count posts")?;
        Ok(count.max(0) as u64)
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_post_sqlite(pool: &SqlitePool, post: &BlogPost) -> Result<Option<BlogPost>> {
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        INSERT INTO posts (id, title, content, tags, author_name, author_email, image_url,
                           published_at, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(post.id)
    .bind(&post.title)
    .bind(&post.content)
    .bind(post.tags.to_storage())
    .bind(&post.author_name)
    .bind(&post.author_email)
    .bind(&post.image_url)
    .bind(post.published_at)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await;

    match result {
        Ok(_) => Ok(Some(BlogPost {
            created_at: now,
            updated_at: now,
            ..post.clone()
        })),
        Err(e) if is_unique_violation(&e) => Ok(None),
        Err(e) => Err(anyhow::Error::new(e).context("Failed to create post")),
    }
}

async fn get_post_by_id_sqlite(pool: &SqlitePool, id: i64) -> Result<Option<BlogPost>> {
    let row = sqlx::query(&format!("SELECT {} FROM posts WHERE id = ?", POST_COLUMNS))
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get post by ID")?;

    row.as_ref().map(row_to_post_sqlite).transpose()
}

async fn list_posts_sqlite(pool: &SqlitePool, limit: Option<i64>) -> Result<Vec<BlogPost>> {
    let rows = match limit {
        Some(limit) => {
            sqlx::query(&format!(
                "SELECT {} FROM posts ORDER BY published_at DESC, id DESC LIMIT ?",
                POST_COLUMNS
            ))
            .bind(limit.max(0))
            .fetch_all(pool)
            .await
        }
        None => {
            sqlx::query(&format!(
                "SELECT {} FROM posts ORDER BY published_at DESC, id DESC",
                POST_COLUMNS
            ))
            .fetch_all(pool)
            .await
        }
    }
    .context("Failed to list posts")?;

    rows.iter().map(row_to_post_sqlite).collect()
}

async fn update_post_sqlite(pool: &SqlitePool, post: &BlogPost) -> Result<Option<BlogPost>> {
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        UPDATE posts
        SET title = ?, content = ?, tags = ?, author_name = ?, author_email = ?,
            image_url = ?, published_at = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&post.title)
    .bind(&post.content)
    .bind(post.tags.to_storage())
    .bind(&post.author_name)
    .bind(&post.author_email)
    .bind(&post.image_url)
    .bind(post.published_at)
    .bind(now)
    .bind(post.id)
    .execute(pool)
    .await
    .context("Failed to update post")?;

    if result.rows_affected() == 0 {
        return Ok(None);
    }
    Ok(Some(BlogPost {
        updated_at: now,
        ..post.clone()
    }))
}

fn row_to_post_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<BlogPost> {
    let tags: String = row.try_get("tags").context("Missing tags column")?;

    Ok(BlogPost {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        content: row.try_get("content")?,
        tags: TagSet::from_storage(&tags),
        author_name: row.try_get("author_name")?,
        author_email: row.try_get("author_email")?,
        image_url: row.try_get("image_url")?,
        published_at: row.try_get("published_at")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_post_mysql(pool: &MySqlPool, post: &BlogPost) -> Result<Option<BlogPost>> {
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        INSERT INTO posts (id, title, content, tags, author_name, author_email, image_url,
                           published_at, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(post.id)
    .bind(&post.title)
    .bind(&post.content)
    .bind(post.tags.to_storage())
    .bind(&post.author_name)
    .bind(&post.author_email)
    .bind(&post.image_url)
    .bind(post.published_at)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await;

    match result {
        Ok(_) => Ok(Some(BlogPost {
            created_at: now,
            updated_at: now,
            ..post.clone()
        })),
        Err(e) if is_unique_violation(&e) => Ok(None),
        Err(e) => Err(anyhow::Error::new(e).context("Failed to create post")),
    }
}

async fn get_post_by_id_mysql(pool: &MySqlPool, id: i64) -> Result<Option<BlogPost>> {
    let row = sqlx::query(&format!("SELECT {} FROM posts WHERE id = ?", POST_COLUMNS))
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get post by ID")?;

    row.as_ref().map(row_to_post_mysql).transpose()
}

async fn list_posts_mysql(pool: &MySqlPool, limit: Option<i64>) -> Result<Vec<BlogPost>> {
    let rows = match limit {
        Some(limit) => {
            sqlx::query(&format!(
                "SELECT {} FROM posts ORDER BY published_at DESC, id DESC LIMIT ?",
                POST_COLUMNS
            ))
            .bind(limit.max(0))
            .fetch_all(pool)
            .await
        }
        None => {
            sqlx::query(&format!(
                "SELECT {} FROM posts ORDER BY published_at DESC, id DESC",
                POST_COLUMNS
            ))
            .fetch_all(pool)
            .await
        }
    }
    .context("Failed to list posts")?;

    rows.iter().map(row_to_post_mysql).collect()
}

async fn update_post_mysql(pool: &MySqlPool, post: &BlogPost) -> Result<Option<BlogPost>> {
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        UPDATE posts
        SET title = ?, content = ?, tags = ?, author_name = ?, author_email = ?,
            image_url = ?, published_at = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&post.title)
    .bind(&post.content)
    .bind(post.tags.to_storage())
    .bind(&post.author_name)
    .bind(&post.author_email)
    .bind(&post.image_url)
    .bind(post.published_at)
    .bind(now)
    .bind(post.id)
    .execute(pool)
    .await
    .context("Failed to update post")?;

    // MySQL reports matched-but-unchanged rows as 0 affected
    if result.rows_affected() == 0 && get_post_by_id_mysql(pool, post.id).await?.is_none() {
        return Ok(None);
    }
    Ok(Some(BlogPost {
        updated_at: now,
        ..post.clone()
    }))
}

fn row_to_post_mysql(row: &sqlx::mysql::MySqlRow) -> Result<BlogPost> {
    let tags: String = row.try_get("tags").context("Missing tags column")?;

    Ok(BlogPost {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        content: row.try_get("content")?,
        tags: TagSet::from_storage(&tags),
        author_name: row.try_get("author_name")?,
        author_email: row.try_get("author_email")?,
        image_url: row.try_get("image_url")?,
        published_at: row.try_get("published_at")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};
    use chrono::{Duration, TimeZone};

    async fn setup_test_repo() -> (DynDatabasePool, SqlxPostRepository) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        let repo = SqlxPostRepository::new(pool.clone());
        (pool, repo)
    }

    /// Post `id` published `id` days after a fixed epoch
    pub(crate) fn sample_post(id: i64, tags: &str) -> BlogPost {
        let base = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        BlogPost {
            id,
            title: format!("Post {}", id),
            content: "one two three".to_string(),
            tags: TagSet::parse_delimited(tags),
            author_name: Some("Ada".to_string()),
            author_email: Some("ada@example.com".to_string()),
            image_url: None,
            published_at: base + Duration::days(id),
            created_at: base,
            updated_at: base,
        }
    }

    #[tokio::test]
    async fn test_create_and_get_post() {
        let (_pool, repo) = setup_test_repo().await;
        repo.create(&sample_post(42, "rust, web")).await.unwrap();

        let found = repo.get_by_id(42).await.unwrap().expect("post should exist");
        assert_eq!(found.title, "Post 42");
        assert_eq!(found.tags.to_string(), "rust, web");
        assert_eq!(found.author_name.as_deref(), Some("Ada"));
        assert!(repo.exists(42).await.unwrap());
        assert!(!repo.exists(43).await.unwrap());
    }

    #[tokio::test]
    async fn test_get_missing_post() {
        let (_pool, repo) = setup_test_repo().await;
        assert!(repo.get_by_id(999).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_id_rejected() {
        let (_pool, repo) = setup_test_repo().await;
        assert!(repo.create(&sample_post(1, "")).await.unwrap().is_some());
        assert!(repo.create(&sample_post(1, "")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_latest_orders_by_published_at() {
        let (_pool, repo) = setup_test_repo().await;
        for id in [3, 1, 2, 5, 4] {
            repo.create(&sample_post(id, "")).await.unwrap();
        }

        let ids: Vec<i64> = repo
            .list_latest(3)
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(ids, vec![5, 4, 3]);

        assert_eq!(repo.list_all().await.unwrap().len(), 5);
        assert_eq!(repo.count().await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_legacy_delimited_tags_decode() {
        let (pool, repo) = setup_test_repo().await;
        pool.execute(
            "INSERT INTO posts (id, title, content, tags, published_at) \
             VALUES (9, 'Old', 'body', ' a ,b,, a', CURRENT_TIMESTAMP)",
        )
        .await
        .unwrap();

        let post = repo.get_by_id(9).await.unwrap().unwrap();
        assert_eq!(Vec::from(post.tags), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_update_and_delete_post() {
        let (_pool, repo) = setup_test_repo().await;
        let mut post = repo.create(&sample_post(7, "a")).await.unwrap().unwrap();

        post.title = "Renamed".to_string();
        post.tags = TagSet::parse_delimited("b, c");
        let updated = repo.update(&post).await.unwrap().expect("post should exist");
        assert_eq!(updated.title, "Renamed");

        let stored = repo.get_by_id(7).await.unwrap().unwrap();
        assert_eq!(stored.tags.to_string(), "b, c");

        assert!(repo.delete(7).await.unwrap());
        assert!(!repo.delete(7).await.unwrap());
        assert!(repo.update(&post).await.unwrap().is_none());
    }
}
