use sha2::{Digest, Sha256};

use super::schema::{now_millis, Database};
use super::types::{DatabaseError, User};

/// 64 hex characters: SHA-256 over 16 random bytes.
fn generate_api_key() -> String {
    let seed = uuid::Uuid::new_v4();
    let hash = Sha256::digest(seed.as_bytes());
    format!("{:x}", hash)
}

impl Database {
    // ========================================================================
    // User Operations
    // ========================================================================

    /// Register a user and issue a fresh API key.
    pub async fn create_user(&self, name: &str) -> Result<User, DatabaseError> {
        let now = now_millis();
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (created_at, updated_at, name, api_key)
            VALUES (?, ?, ?, ?)
            RETURNING id, created_at, updated_at, name, api_key
        "#,
        )
        .bind(now)
        .bind(now)
        .bind(name)
        .bind(generate_api_key())
        .fetch_one(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        tracing::info!(user_id = user.id, name = %user.name, "Created user");
        Ok(user)
    }

    /// Look up the user owning `api_key`.
    pub async fn get_user_by_api_key(&self, api_key: &str) -> Result<User, DatabaseError> {
        sqlx::query_as::<_, User>(
            "SELECT id, created_at, updated_at, name, api_key FROM users WHERE api_key = ?",
        )
        .bind(api_key)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(DatabaseError::NotFound("user"))
    }
}
