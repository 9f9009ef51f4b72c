use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

use crate::storage::{Database, DatabaseError, Feed};

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("feed {0} no longer exists")]
    FeedNotFound(i64),
    #[error("ledger storage failed: {0}")]
    Storage(#[from] DatabaseError),
}

/// The two storage operations the scraper depends on.
///
/// Implementations own ordering and timestamps, and must accept concurrent
/// calls for distinct feeds; the scraper holds no locks of its own.
#[async_trait]
pub trait FetchLedger: Send + Sync + 'static {
    /// Up to `limit` feeds, least recently fetched first, never-fetched before
    /// all others. No feed appears twice. An empty result is not an error.
    async fn select_due(&self, limit: usize) -> Result<Vec<Feed>, LedgerError>;

    /// Set the feed's last-fetched timestamp to now and return the updated
    /// feed. The timestamp never decreases.
    async fn mark_fetched(&self, feed_id: i64) -> Result<Feed, LedgerError>;
}

/// [`FetchLedger`] over the SQLite store.
#[derive(Clone)]
pub struct FeedLedger {
    db: Database,
    min_refresh_age: Duration,
}

impl FeedLedger {
    pub fn new(db: Database) -> Self {
        Self {
            db,
            min_refresh_age: Duration::ZERO,
        }
    }

    /// Feeds fetched less than `age` ago are not due. Zero makes every feed
    /// due on every cycle.
    pub fn with_min_refresh_age(mut self, age: Duration) -> Self {
        self.min_refresh_age = age;
        self
    }

    fn fetched_before(&self) -> Option<i64> {
        if self.min_refresh_age.is_zero() {
            return None;
        }
        let age = i64::try_from(self.min_refresh_age.as_millis()).unwrap_or(i64::MAX);
        Some(chrono::Utc::now().timestamp_millis().saturating_sub(age))
    }
}

#[async_trait]
impl FetchLedger for FeedLedger {
    async fn select_due(&self, limit: usize) -> Result<Vec<Feed>, LedgerError> {
        Ok(self
            .db
            .get_next_feeds_to_fetch(limit, self.fetched_before())
            .await?)
    }

    async fn mark_fetched(&self, feed_id: i64) -> Result<Feed, LedgerError> {
        self.db
            .mark_feed_fetched(feed_id)
            .await
            .map_err(|e| match e {
                DatabaseError::NotFound(_) => LedgerError::FeedNotFound(feed_id),
                other => LedgerError::Storage(other),
            })
    }
}
