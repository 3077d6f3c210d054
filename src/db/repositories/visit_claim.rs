//! Visit claim repository
//!
//! One row per reader session that has been counted, kept until the row's
//! `expires_at`. Claiming is an insert-if-absent on the session key, so two
//! concurrent claims for the same session never both succeed.

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{MySqlPool, SqlitePool};
use std::sync::Arc;

#[async_trait]
pub trait VisitClaimRepository: Send + Sync {
    /// Claim `session` until `expires_at`. An expired claim is replaced.
    /// Returns whether this call took the claim.
    async fn claim(&self, session: &str, expires_at: DateTime<Utc>) -> Result<bool>;

    /// Drop the claim for `session`
    async fn release(&self, session: &str) -> Result<()>;

    /// Delete expired claims; returns how many were removed
    async fn delete_expired(&self) -> Result<u64>;
}

pub struct SqlxVisitClaimRepository {
    pool: DynDatabasePool,
}

impl SqlxVisitClaimRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn VisitClaimRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl VisitClaimRepository for SqlxVisitClaimRepository {
    async fn claim(&self, session: &str, expires_at: DateTime<Utc>) -> Result<bool> {
        let now = Utc::now();
        match self.pool.driver() {
            DatabaseDriver::Sqlite => claim_sqlite(self.pool.sqlite()?, session, expires_at, now).await,
            DatabaseDriver::Mysql => claim_mysql(self.pool.mysql()?, session, expires_at, now).await,
        }
        .with_context(|| format!("Failed to claim visit session {}", session))
    }

    async fn release(&self, session: &str) -> Result<()> {
        let sql = "DELETE FROM visit_claims WHERE session = ?";
        match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(session)
                .execute(self.pool.sqlite()?)
                .await
                .map(|_| ()),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(session)
                .execute(self.pool.mysql()?)
                .await
                .map(|_| ()),
        }
        .context("Failed to release visit claim")
    }

    async fn delete_expired(&self) -> Result<u64> {
        let now = Utc::now();
        let sql = "DELETE FROM visit_claims WHERE expires_at <= ?";
        match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(now)
                .execute(self.pool.sqlite()?)
                .await
                .map(|r| r.rows_affected()),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(now)
                .execute(self.pool.mysql()?)
                .await
                .map(|r| r.rows_affected()),
        }
        .context("Failed to delete expired visit claims")
    }
}

// ============================================================================
// SQLite implementation
// ============================================================================

async fn claim_sqlite(
    pool: &SqlitePool,
    session: &str,
    expires_at: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Result<bool> {
    sqlx::query("DELETE FROM visit_claims WHERE session = ? AND expires_at <= ?")
        .bind(session)
        .bind(now)
        .execute(pool)
        .await?;

    let result = sqlx::query("INSERT OR IGNORE INTO visit_claims (session, expires_at) VALUES (?, ?)")
        .bind(session)
        .bind(expires_at)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() == 1)
}

// ============================================================================
// MySQL implementation
// ============================================================================

async fn claim_mysql(
    pool: &MySqlPool,
    session: &str,
    expires_at: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Result<bool> {
    sqlx::query("DELETE FROM visit_claims WHERE session = ? AND expires_at <= ?")
        .bind(session)
        .bind(now)
        .execute(pool)
        .await?;

    let result = sqlx::query("INSERT IGNORE INTO visit_claims (session, expires_at) VALUES (?, ?)")
        .bind(session)
        .bind(expires_at)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() == 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};
    use chrono::Duration;

    async fn setup_test_repo() -> SqlxVisitClaimRepository {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        SqlxVisitClaimRepository::new(pool)
    }

    #[tokio::test]
    async fn test_claim_is_taken_once() {
        let repo = setup_test_repo().await;
        let until = Utc::now() + Duration::hours(1);

        assert!(repo.claim("s1", until).await.unwrap());
        assert!(!repo.claim("s1", until).await.unwrap());
        assert!(repo.claim("s2", until).await.unwrap());
    }

    #[tokio::test]
    async fn test_expired_claim_can_be_retaken() {
        let repo = setup_test_repo().await;

        assert!(repo.claim("s1", Utc::now() - Duration::seconds(1)).await.unwrap());
        assert!(repo.claim("s1", Utc::now() + Duration::hours(1)).await.unwrap());
        assert!(!repo.claim("s1", Utc::now() + Duration::hours(1)).await.unwrap());
    }

    #[tokio::test]
    async fn test_release_and_cleanup() {
        let repo = setup_test_repo().await;
        let until = Utc::now() + Duration::hours(1);

        repo.claim("s1", until).await.unwrap();
        repo.release("s1").await.unwrap();
        assert!(repo.claim("s1", until).await.unwrap());

        repo.claim("stale", Utc::now() - Duration::seconds(1)).await.unwrap();
        assert_eq!(repo.delete_expired().await.unwrap(), 1);
        assert!(!repo.claim("s1", until).await.unwrap());
    }
}
