use thiserror::Error;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A SQLite operation failed.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// The requested row does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// A required field was missing or blank.
    #[error("invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },

    /// A foreign key or uniqueness rule rejected the write
    /// (e.g. deleting an API key still linked to a persona).
    #[error("constraint violated: {0}")]
    Constraint(String),
}

impl StoreError {
    pub(crate) fn blank(field: &'static str) -> Self {
        StoreError::Invalid {
            field,
            reason: "must not be empty".to_string(),
        }
    }

    /// Split constraint violations out of generic SQLite failures.
    pub(crate) fn from_write(e: rusqlite::Error) -> Self {
        if e.sqlite_error_code() == Some(rusqlite::ErrorCode::ConstraintViolation) {
            StoreError::Constraint(e.to_string())
        } else {
            StoreError::Database(e)
        }
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
