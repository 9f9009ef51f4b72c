use super::schema::{now_millis, Database};
use super::types::{DatabaseError, FeedFollow};

impl Database {
    // ========================================================================
    // Feed Follow Operations
    // ========================================================================

    /// Make `user_id` follow `feed_id`.
    ///
    /// # Errors
    ///
    /// `DatabaseError::Conflict` if the follow already exists or either side
    /// does not exist.
    pub async fn create_feed_follow(
        &self,
        user_id: i64,
        feed_id: i64,
    ) -> Result<FeedFollow, DatabaseError> {
        let now = now_millis();
        sqlx::query_as::<_, FeedFollow>(
            r#"
            INSERT INTO feed_follows (created_at, updated_at, user_id, feed_id)
            VALUES (?, ?, ?, ?)
            RETURNING id, created_at, updated_at, user_id, feed_id
        "#,
        )
        .bind(now)
        .bind(now)
        .bind(user_id)
        .bind(feed_id)
        .fetch_one(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    pub async fn get_feed_follows_for_user(
        &self,
        user_id: i64,
    ) -> Result<Vec<FeedFollow>, DatabaseError> {
        let follows = sqlx::query_as::<_, FeedFollow>(
            r#"
            SELECT id, created_at, updated_at, user_id, feed_id
            FROM feed_follows
            WHERE user_id = ?
            ORDER BY created_at, id
        "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(follows)
    }

    /// Delete a follow, scoped to its owner so users cannot remove each other's.
    pub async fn delete_feed_follow(
        &self,
        follow_id: i64,
        user_id: i64,
    ) -> Result<(), DatabaseError> {
        let result = sqlx::query("DELETE FROM feed_follows WHERE id = ? AND user_id = ?")
            .bind(follow_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound("feed follow"));
        }
        Ok(())
    }
}
