//! User model for gator.

use chrono::{DateTime, Utc};

/// A registered user.
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    /// Unique user ID.
    pub id: i64,
    /// User name (unique).
    pub name: String,
    /// Account creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}
