//! User repository for gator.

use chrono::Utc;

use super::user::User;
use super::DbPool;
use crate::datetime::{format_timestamp, parse_timestamp};
use crate::error::map_insert_error;
use crate::{GatorError, Result};

/// Row type for a user from the database.
#[derive(Debug, Clone, sqlx::FromRow)]
struct UserRow {
    id: i64,
    name: String,
    created_at: String,
    updated_at: String,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: row.id,
            name: row.name,
            created_at: parse_timestamp(&row.created_at).unwrap_or_else(Utc::now),
            updated_at: parse_timestamp(&row.updated_at).unwrap_or_else(Utc::now),
        }
    }
}

/// Repository for user operations.
pub struct UserRepository<'a> {
    pool: &'a DbPool,
}

impl<'a> UserRepository<'a> {
    /// Create a new UserRepository with the given pool reference.
    pub fn new(pool: &'a DbPool) -> Self {
        Self { pool }
    }

    /// Create a new user.
    ///
    /// Returns [`GatorError::Conflict`] if the name is taken.
    pub async fn create(&self, name: &str) -> Result<User> {
        let now = format_timestamp(&Utc::now());
        let result = sqlx::query("INSERT INTO users (name, created_at, updated_at) VALUES (?, ?, ?)")
            .bind(name)
            .bind(&now)
            .bind(&now)
            .execute(self.pool)
            .await
            .map_err(|e| map_insert_error(e, &format!("user {name}")))?;

        self.get_by_id(result.last_insert_rowid())
            .await?
            .ok_or_else(|| GatorError::NotFound("user".to_string()))
    }

    /// Get a user by ID.
    pub async fn get_by_id(&self, id: i64) -> Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, name, created_at, updated_at FROM users WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| GatorError::Database(e.to_string()))?;

        Ok(row.map(User::from))
    }

    /// Get a user by name.
    pub async fn get_by_name(&self, name: &str) -> Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, name, created_at, updated_at FROM users WHERE name = ?",
        )
        .bind(name)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| GatorError::Database(e.to_string()))?;

        Ok(row.map(User::from))
    }

    /// List all users in registration order.
    pub async fn list(&self) -> Result<Vec<User>> {
        let rows = sqlx::query_as::<_, UserRow>(
            "SELECT id, name, created_at, updated_at FROM users ORDER BY id ASC",
        )
        .fetch_all(self.pool)
        .await
        .map_err(|e| GatorError::Database(e.to_string()))?;

        Ok(rows.into_iter().map(User::from).collect())
    }

    /// Delete every user.
    ///
    /// Feeds, follows and posts cascade with their owners.
    pub async fn delete_all(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM users")
            .execute(self.pool)
            .await
            .map_err(|e| GatorError::Database(e.to_string()))?;

        Ok(result.rows_affected())
    }
}
