//! Comment repository
//!
//! Comments are append-only. An append is an insert-if-absent keyed on
//! `(post_id, id)`, so concurrent appends to the same post never overwrite
//! one another and a retried append is a no-op.

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::Comment;
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

#[async_trait]
pub trait CommentRepository: Send + Sync {
    /// Add a comment unless one with the same id already exists on the post.
    /// Returns whether a row was written.
    async fn append(&self, comment: &Comment) -> Result<bool>;

    /// Comments of a post, newest first
    async fn list_by_post(&self, post_id: i64) -> Result<Vec<Comment>>;
}

pub struct SqlxCommentRepository {
    pool: DynDatabasePool,
}

impl SqlxCommentRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn CommentRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl CommentRepository for SqlxCommentRepository {
    async fn append(&self, comment: &Comment) -> Result<bool> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => append_comment_sqlite(self.pool.sqlite()?, comment).await,
            DatabaseDriver::Mysql => append_comment_mysql(self.pool.mysql()?, comment).await,
        }
    }

    async fn list_by_post(&self, post_id: i64) -> Result<Vec<Comment>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => list_comments_sqlite(self.pool.sqlite()?, post_id).await,
            DatabaseDriver::Mysql => list_comments_mysql(self.pool.mysql()?, post_id).await,
        }
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn append_comment_sqlite(pool: &SqlitePool, comment: &Comment) -> Result<bool> {
    let result = sqlx::query(
        r#"
        INSERT OR IGNORE INTO comments (id, post_id, title, message, created_at)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(&comment.id)
    .bind(comment.post_id)
    .bind(&comment.title)
    .bind(&comment.message)
    .bind(comment.created_at)
    .execute(pool)
    .await
    .context("Failed to append comment")?;

    Ok(result.rows_affected() > 0)
}

async fn list_comments_sqlite(pool: &SqlitePool, post_id: i64) -> Result<Vec<Comment>> {
    let rows = sqlx::query(
        r#"
        SELECT id, post_id, title, message, created_at
        FROM comments
        WHERE post_id = ?
        ORDER BY created_at DESC, id DESC
        "#,
    )
    .bind(post_id)
    .fetch_all(pool)
    .await
    .context("Failed to list comments")?;

    rows.iter()
        .map(|row| {
            Ok(Comment {
                id: row.try_get("id")?,
                post_id: row.try_get("post_id")?,
                title: row.try_get("title")?,
                message: row.try_get("message")?,
                created_at: row.try_get("created_at")?,
            })
        })
        .collect()
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn append_comment_mysql(pool: &MySqlPool, comment: &Comment) -> Result<bool> {
    let result = sqlx::query(
        r#"
        INSERT IGNORE INTO comments (id, post_id, title, message, created_at)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(&comment.id)
    .bind(comment.post_id)
    .bind(&comment.title)
    .bind(&comment.message)
    .bind(comment.created_at)
    .execute(pool)
    .await
    .context("Failed to append comment")?;

    Ok(result.rows_affected() > 0)
}

async fn list_comments_mysql(pool: &MySqlPool, post_id: i64) -> Result<Vec<Comment>> {
    let rows = sqlx::query(
        r#"
        SELECT id, post_id, title, message, created_at
        FROM comments
        WHERE post_id = ?
        ORDER BY created_at DESC, id DESC
        "#,
    )
    .bind(post_id)
    .fetch_all(pool)
    .await
    .context("Failed to list comments")?;

    rows.iter()
        .map(|row| {
            Ok(Comment {
                id: row.try_get("id")?,
                post_id: row.try_get("post_id")?,
                title: row.try_get("title")?,
                message: row.try_get("message")?,
                created_at: row.try_get("created_at")?,
            })
        })
        .collect()
}
