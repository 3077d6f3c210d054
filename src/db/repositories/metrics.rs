//! Metrics repository
//!
//! Named counters. The only one in use today is the site-wide `visits`
//! counter.

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::sync::Arc;

#[async_trait]
pub trait MetricsRepository: Send + Sync {
    /// Current value, or `None` if the counter was never created
    async fn get(&self, name: &str) -> Result<Option<u64>>;

    /// Create the counter with `initial` unless it exists.
    /// Returns whether this call created it.
    async fn create_if_absent(&self, name: &str, initial: u64) -> Result<bool>;

    /// Add `delta` to an existing counter. Returns false if it does not exist.
    async fn increment(&self, name: &str, delta: u64) -> Result<bool>;
}

pub struct SqlxMetricsRepository {
    pool: DynDatabasePool,
}

impl SqlxMetricsRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn MetricsRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl MetricsRepository for SqlxMetricsRepository {
    async fn get(&self, name: &str) -> Result<Option<u64>> {
        let sql = "SELECT count FROM metrics WHERE name = ?";
        let count: Option<i64> = match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query_scalar(sql)
                    .bind(name)
                    .fetch_optional(self.pool.sqlite()?)
                    .await
            }
            DatabaseDriver::Mysql => {
                sqlx::query_scalar(sql)
                    .bind(name)
                    .fetch_optional(self.pool.mysql()?)
                    .await
            }
        }
        .with_context(|| format!("Failed to read metric {}", name))?;

        Ok(count.map(|c| c.max(0) as u64))
    }

    async fn create_if_absent(&self, name: &str, initial: u64) -> Result<bool> {
        let initial = i64::try_from(initial).context("Initial metric value out of range")?;
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(
                "INSERT OR IGNORE INTO metrics (name, count) VALUES (?, ?)",
            )
            .bind(name)
            .bind(initial)
            .execute(self.pool.sqlite()?)
            .await
            .map(|r| r.rows_affected()),
            DatabaseDriver::Mysql => sqlx::query(
                "INSERT IGNORE INTO metrics (name, count) VALUES (?, ?)",
            )
            .bind(name)
            .bind(initial)
            .execute(self.pool.mysql()?)
            .await
            .map(|r| r.rows_affected()),
        }
        .with_context(|| format!("Failed to create metric {}", name))?;

        Ok(affected > 0)
    }

    async fn increment(&self, name: &str, delta: u64) -> Result<bool> {
        let delta = i64::try_from(delta).context("Metric delta out of range")?;
        let sql = "UPDATE metrics SET count = count + ? WHERE name = ?";
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(delta)
                .bind(name)
                .execute(self.pool.sqlite()?)
                .await
                .map(|r| r.rows_affected()),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(delta)
                .bind(name)
                .execute(self.pool.mysql()?)
                .await
                .map(|r| r.rows_affected()),
        }
        .with_context(|| format!("Failed to increment metric {}", name))?;

        Ok(affected > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};

    async fn setup() -> SqlxMetricsRepository {
        let pool = create_test_pool().await.unwrap();
        migrations::run_migrations(&pool).await.unwrap();
        SqlxMetricsRepository::new(pool)
    }

    #[tokio::test]
    async fn test_missing_metric_is_none() {
        let repo = setup().await;
        assert_eq!(repo.get("visits").await.unwrap(), None);
        assert!(!repo.increment("visits", 1).await.unwrap());
    }

    #[tokio::test]
    async fn test_create_if_absent_only_once() {
        let repo = setup().await;
        assert!(repo.create_if_absent("visits", 1).await.unwrap());
        assert!(!repo.create_if_absent("visits", 1).await.unwrap());
        assert_eq!(repo.get("visits").await.unwrap(), Some(1));
    }

    #[tokio::test]
    async fn test_increment_adds_delta() {
        let repo = setup().await;
        repo.create_if_absent("visits", 1).await.unwrap();
        assert!(repo.increment("visits", 1).await.unwrap());
        assert!(repo.increment("visits", 3).await.unwrap());
        assert_eq!(repo.get("visits").await.unwrap(), Some(5));
    }
}
