//! Live post feed
//!
//! Writers publish a [`ChangeEvent`] on the [`ChangeBus`] after every
//! successful mutation. [`PostFeed::watch`] turns a query into a
//! [`Subscription`]: an initial snapshot followed by a fresh full snapshot
//! after each change that concerns the query.
//!
//! Each subscription owns one listener task. Dropping the subscription (or
//! calling [`Subscription::unsubscribe`]) aborts it.

use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use crate::models::{PostDetail, PostSummary};
use crate::services::{PostService, ServiceError};

const CHANGE_CAPACITY: usize = 256;
const SNAPSHOT_BUFFER: usize = 16;

/// A mutation that may invalidate live queries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeEvent {
    /// Post created or edited
    PostChanged(i64),
    PostRemoved(i64),
    CommentAdded(i64),
}

impl ChangeEvent {
    fn concerns(&self, query: &LiveQuery) -> bool {
        match (query, self) {
            (LiveQuery::Post(id), ChangeEvent::PostChanged(p))
            | (LiveQuery::Post(id), ChangeEvent::PostRemoved(p))
            | (LiveQuery::Post(id), ChangeEvent::CommentAdded(p)) => id == p,
            (LiveQuery::Latest(_), ChangeEvent::PostChanged(_))
            | (LiveQuery::Latest(_), ChangeEvent::PostRemoved(_)) => true,
            (LiveQuery::Latest(_), ChangeEvent::CommentAdded(_)) => false,
        }
    }
}

/// Fan-out channel for change events
#[derive(Clone)]
pub struct ChangeBus {
    tx: broadcast::Sender<ChangeEvent>,
}

impl ChangeBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANGE_CAPACITY);
        Self { tx }
    }

    pub fn publish(&self, event: ChangeEvent) {
        // no receivers just means nobody is watching
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.tx.subscribe()
    }
}

impl Default for ChangeBus {
    fn default() -> Self {
        Self::new()
    }
}

/// What a subscriber is watching
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiveQuery {
    /// One post with its comments
    Post(i64),
    /// The latest N posts
    Latest(usize),
}

/// Full result of a live query at one point in time
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Snapshot {
    /// `post` is `None` once the post no longer exists
    Post { post: Option<PostDetail> },
    Latest { posts: Vec<PostSummary> },
}

/// Handle to a running live query
pub struct Subscription {
    rx: mpsc::Receiver<Snapshot>,
    task: JoinHandle<()>,
}

impl Subscription {
    /// Next snapshot; `None` once the feed has shut down
    pub async fn next(&mut self) -> Option<Snapshot> {
        self.rx.recv().await
    }

    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}

pub struct PostFeed {
    posts: Arc<PostService>,
    changes: ChangeBus,
}

impl PostFeed {
    pub fn new(posts: Arc<PostService>, changes: ChangeBus) -> Self {
        Self { posts, changes }
    }

    /// Start watching `query`
    pub fn watch(&self, query: LiveQuery) -> Subscription {
        let (tx, rx) = mpsc::channel(SNAPSHOT_BUFFER);
        // subscribe before the initial snapshot so no change slips between
        let mut changes = self.changes.subscribe();
        let posts = self.posts.clone();

        let task = tokio::spawn(async move {
            if !send_snapshot(&posts, query, &tx).await {
                return;
            }
            loop {
                match changes.recv().await {
                    Ok(event) if event.concerns(&query) => {}
                    Ok(_) => continue,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::debug!("Live feed lagged by {} events, resyncing", skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
                if !send_snapshot(&posts, query, &tx).await {
                    break;
                }
            }
        });

        Subscription { rx, task }
    }
}

/// Load and deliver a snapshot. Returns false once the subscriber is gone.
async fn send_snapshot(posts: &PostService, query: LiveQuery, tx: &mpsc::Sender<Snapshot>) -> bool {
    let snapshot = match query {
        LiveQuery::Post(id) => match posts.get(id).await {
            Ok(detail) => Snapshot::Post { post: Some(detail) },
            Err(ServiceError::NotFound(_)) => Snapshot::Post { post: None },
            Err(e) => {
                tracing::warn!("Skipping live snapshot for post {}: {}", id, e);
                return !tx.is_closed();
            }
        },
        LiveQuery::Latest(limit) => Snapshot::Latest {
            posts: posts.latest(limit).await,
        },
    };
    tx.send(snapshot).await.is_ok()
}
