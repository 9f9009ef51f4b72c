use super::schema::{now_millis, Database};
use super::types::{DatabaseError, Feed};

const FEED_COLUMNS: &str = "id, created_at, updated_at, name, url, user_id, last_fetched_at";

impl Database {
    // ========================================================================
    // Feed Operations
    // ========================================================================

    /// Insert a feed owned by `user_id`.
    ///
    /// # Errors
    ///
    /// `DatabaseError::Conflict` if the URL is already registered or the user
    /// does not exist.
    pub async fn create_feed(
        &self,
        name: &str,
        url: &str,
        user_id: i64,
    ) -> Result<Feed, DatabaseError> {
        let now = now_millis();
        let feed = sqlx::query_as::<_, Feed>(&format!(
            r#"
            INSERT INTO feeds (created_at, updated_at, name, url, user_id)
            VALUES (?, ?, ?, ?, ?)
            RETURNING {FEED_COLUMNS}
        "#
        ))
        .bind(now)
        .bind(now)
        .bind(name)
        .bind(url)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        tracing::info!(feed_id = feed.id, url = %feed.url, user_id, "Created feed");
        Ok(feed)
    }

    /// Get every registered feed, oldest first.
    pub async fn get_all_feeds(&self) -> Result<Vec<Feed>, DatabaseError> {
        let feeds = sqlx::query_as::<_, Feed>(&format!(
            "SELECT {FEED_COLUMNS} FROM feeds ORDER BY created_at, id"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(feeds)
    }

    pub async fn get_feed(&self, feed_id: i64) -> Result<Feed, DatabaseError> {
        sqlx::query_as::<_, Feed>(&format!("SELECT {FEED_COLUMNS} FROM feeds WHERE id = ?"))
            .bind(feed_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(DatabaseError::NotFound("feed"))
    }

    // ========================================================================
    // Scrape Scheduling
    // ========================================================================

    /// Select up to `limit` feeds in least-recently-fetched order.
    ///
    /// Never-fetched feeds come first, then ascending `last_fetched_at`, ties
    /// broken by id. When `fetched_before` is set, feeds fetched after that
    /// instant (unix millis) are not due and are left out.
    pub async fn get_next_feeds_to_fetch(
        &self,
        limit: usize,
        fetched_before: Option<i64>,
    ) -> Result<Vec<Feed>, DatabaseError> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let feeds = sqlx::query_as::<_, Feed>(&format!(
            r#"
            SELECT {FEED_COLUMNS}
            FROM feeds
            WHERE last_fetched_at IS NULL OR last_fetched_at <= ?
            ORDER BY last_fetched_at ASC NULLS FIRST, id ASC
            LIMIT ?
        "#
        ))
        .bind(fetched_before.unwrap_or(i64::MAX))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(feeds)
    }

    /// Advance a feed's `last_fetched_at` to now and return the updated row.
    ///
    /// The stored timestamp never moves backwards, even if the wall clock does.
    /// Single-statement update, so concurrent calls for different feeds never
    /// observe each other.
    pub async fn mark_feed_fetched(&self, feed_id: i64) -> Result<Feed, DatabaseError> {
        let now = now_millis();
        sqlx::query_as::<_, Feed>(&format!(
            r#"
            UPDATE feeds
            SET last_fetched_at = MAX(COALESCE(last_fetched_at, 0), ?),
                updated_at = ?
            WHERE id = ?
            RETURNING {FEED_COLUMNS}
        "#
        ))
        .bind(now)
        .bind(now)
        .bind(feed_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(DatabaseError::NotFound("feed"))
    }
}
