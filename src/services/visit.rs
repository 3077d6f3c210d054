//! Visit counter
//!
//! Counts each reader session at most once into the shared `visits` metric.
//! The authoritative "already counted" record is a claim row in the document
//! store, taken with a single insert-if-absent. The cache only remembers
//! sessions known to be counted, so repeat visits skip the store; losing a
//! cache entry costs a store round trip, never a second count.

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;

use crate::cache::{Cache, CacheLayer};
use crate::db::repositories::{MetricsRepository, VisitClaimRepository};
use crate::models::{VisitOutcome, VISITS_METRIC};
use crate::services::ServiceError;

/// Longest accepted visit session token
pub const MAX_SESSION_LEN: usize = 128;

pub struct VisitCounter {
    cache: Arc<Cache>,
    claims: Arc<dyn VisitClaimRepository>,
    metrics: Arc<dyn MetricsRepository>,
    session_ttl: Duration,
}

impl VisitCounter {
    pub fn new(
        cache: Arc<Cache>,
        claims: Arc<dyn VisitClaimRepository>,
        metrics: Arc<dyn MetricsRepository>,
        session_ttl: Duration,
    ) -> Self {
        Self {
            cache,
            claims,
            metrics,
            session_ttl,
        }
    }

    fn flag_key(session: &str) -> String {
        format!("visit:{}", session)
    }

    async fn known_counted(&self, key: &str) -> bool {
        match self.cache.get::<bool>(key).await {
            Ok(flag) => flag.unwrap_or(false),
            Err(e) => {
                tracing::warn!("Failed to read visit flag: {:#}", e);
                false
            }
        }
    }

    /// Count a visit for `session` unless it was already counted.
    ///
    /// If the store write fails the claim is released, so a later call for
    /// the same session can try again.
    pub async fn register_visit(&self, session: &str) -> Result<VisitOutcome, ServiceError> {
        let session = session.trim();
        if session.is_empty() {
            return Err(ServiceError::validation("Visit session token is required"));
        }
        if session.len() > MAX_SESSION_LEN {
            return Err(ServiceError::validation(format!(
                "Visit session token must be at most {} characters",
                MAX_SESSION_LEN
            )));
        }

        let key = Self::flag_key(session);
        if self.known_counted(&key).await {
            return Ok(VisitOutcome::AlreadyCounted);
        }

        let expires_at = chrono::Duration::from_std(self.session_ttl)
            .ok()
            .and_then(|ttl| Utc::now().checked_add_signed(ttl))
            .ok_or_else(|| ServiceError::validation("Visit session lifetime is out of range"))?;
        let claimed = self
            .claims
            .claim(session, expires_at)
            .await
            .map_err(|e| {
                tracing::warn!("Failed to claim visit session: {:#}", e);
                ServiceError::StoreUnavailable(e)
            })?;
        if !claimed {
            return Ok(VisitOutcome::AlreadyCounted);
        }

        if let Err(e) = self.bump().await {
            tracing::warn!("Failed to record visit: {:#}", e);
            if let Err(release) = self.claims.release(session).await {
                tracing::warn!("Failed to release visit claim: {:#}", release);
            }
            return Err(ServiceError::StoreUnavailable(e));
        }

        if let Err(e) = self.cache.set_if_absent(&key, &true, self.session_ttl).await {
            tracing::warn!("Failed to cache visit flag: {:#}", e);
        }
        Ok(VisitOutcome::Counted)
    }

    /// Create the counter at 1 or add 1 to it.
    ///
    /// Concurrent first visits race on creation; the loser increments.
    async fn bump(&self) -> anyhow::Result<()> {
        match self.metrics.get(VISITS_METRIC).await? {
            Some(_) => {
                self.metrics.increment(VISITS_METRIC, 1).await?;
            }
            None => {
                if !self.metrics.create_if_absent(VISITS_METRIC, 1).await? {
                    self.metrics.increment(VISITS_METRIC, 1).await?;
                }
            }
        }
        Ok(())
    }

    /// Total counted visits; 0 when the counter is missing or unreadable
    pub async fn visit_count(&self) -> u64 {
        match self.metrics.get(VISITS_METRIC).await {
            Ok(count) => count.unwrap_or(0),
            Err(e) => {
                tracing::warn!("Failed to read visit count: {:#}", e);
                0
            }
        }
    }

    /// Drop expired session claims
    pub async fn cleanup(&self) -> Result<u64, ServiceError> {
        Ok(self.claims.delete_expired().await?)
    }
}
