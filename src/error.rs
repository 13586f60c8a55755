//! Error types for gator.

use thiserror::Error;

/// Common error type for gator.
#[derive(Error, Debug)]
pub enum GatorError {
    /// Database error.
    ///
    /// Errors from sqlx are converted into this variant, except unique
    /// constraint violations on insert, which become [`GatorError::Conflict`].
    #[error("database error: {0}")]
    Database(String),

    /// A row with the same unique key already exists.
    #[error("already exists: {0}")]
    Conflict(String),

    /// Fetching or parsing a remote feed failed.
    #[error("fetch failed: {0}")]
    Fetch(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Validation error for user input.
    #[error("validation error: {0}")]
    Validation(String),

    /// Resource not found.
    #[error("{0} not found")]
    NotFound(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

impl GatorError {
    /// Whether this error is a benign unique-key conflict.
    pub fn is_conflict(&self) -> bool {
        matches!(self, GatorError::Conflict(_))
    }
}

// Conversion from sqlx errors
impl From<sqlx::Error> for GatorError {
    fn from(e: sqlx::Error) -> Self {
        GatorError::Database(e.to_string())
    }
}

/// Map a sqlx error from an INSERT, turning unique violations into conflicts.
pub(crate) fn map_insert_error(e: sqlx::Error, what: &str) -> GatorError {
    match &e {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            GatorError::Conflict(what.to_string())
        }
        _ => GatorError::Database(e.to_string()),
    }
}

/// Result type alias for gator operations.
pub type Result<T> = std::result::Result<T, GatorError>;
