//! Error types for the isuwitter migrations
//!
//! - `thiserror` for the error definitions
//! - Variants grouped by concern (configuration, database, data)
//! - `sqlx::Error` classified on conversion so callers can match on
//!   duplicate edges and pool exhaustion without digging into driver errors

use std::borrow::Cow;
use thiserror::Error;

/// Result type alias for migration operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the migrations
#[derive(Debug, Error)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    #[error("Configuration error: {message}")]
    Config {
        message: Cow<'static, str>,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Missing required environment variable: {var}")]
    MissingEnvVar { var: &'static str },

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidConfig {
        key: &'static str,
        message: Cow<'static, str>,
    },

    #[error("Invalid SQL identifier: {name:?}")]
    InvalidIdentifier { name: String },

    // ========================================================================
    // Database Errors
    // ========================================================================
    #[error("Database error: {message}")]
    Database {
        message: Cow<'static, str>,
        #[source]
        source: Option<sqlx::Error>,
    },

    #[error("Database connection pool exhausted")]
    PoolExhausted,

    #[error("Entity not found: {entity_type} with id {id}")]
    NotFound {
        entity_type: &'static str,
        id: String,
    },

    #[error("Friendship edge ({owner}, {friend}) already exists")]
    DuplicateEdge { owner: String, friend: String },

    #[error("Constraint violation: {message}")]
    ConstraintViolation { message: Cow<'static, str> },

    // ========================================================================
    // Serialization Errors
    // ========================================================================
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create a configuration error
    pub fn config(message: impl Into<Cow<'static, str>>) -> Self {
        Self::Config {
            message: message.into(),
            source: None,
        }
    }

    /// Create a database error with source
    pub fn database_with_source(
        message: impl Into<Cow<'static, str>>,
        source: sqlx::Error,
    ) -> Self {
        Self::Database {
            message: message.into(),
            source: Some(source),
        }
    }

    /// Create a not found error
    pub fn not_found(entity_type: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type,
            id: id.into(),
        }
    }

    /// Returns true if the error came from a unique or primary key violation
    pub fn is_duplicate(&self) -> bool {
        matches!(self, Error::DuplicateEdge { .. })
    }

    /// Stable label written to the log when the process exits on this error
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::Config { .. }
            | Error::MissingEnvVar { .. }
            | Error::InvalidConfig { .. }
            | Error::InvalidIdentifier { .. } => "CONFIG_ERROR",
            Error::Database { .. } | Error::PoolExhausted => "DATABASE_ERROR",
            Error::NotFound { .. } => "NOT_FOUND",
            Error::DuplicateEdge { .. } => "DUPLICATE_KEY",
            Error::ConstraintViolation { .. } => "CONSTRAINT_VIOLATION",
            Error::Json(_) => "SERIALIZATION_ERROR",
        }
    }
}

// ============================================================================
// From implementations for external error types
// ============================================================================

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => Error::NotFound {
                entity_type: "record",
                id: "unknown".to_string(),
            },
            sqlx::Error::PoolTimedOut => Error::PoolExhausted,
            sqlx::Error::Database(db_err) => {
                if db_err.is_unique_violation() {
                    return Error::ConstraintViolation {
                        message: format!(
                            "Unique constraint '{}' violated: {}",
                            db_err.constraint().unwrap_or("primary key"),
                            db_err.message()
                        )
                        .into(),
                    };
                }
                if let Some(constraint) = db_err.constraint() {
                    return Error::ConstraintViolation {
                        message: format!("Constraint '{}' violated", constraint).into(),
                    };
                }
                Error::Database {
                    message: db_err.message().to_string().into(),
                    source: Some(err),
                }
            }
            _ => Error::Database {
                message: err.to_string().into(),
                source: Some(err),
            },
        }
    }
}
