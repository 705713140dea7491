//! Error types for loading into PostgreSQL.

use fhirbase_bundle::BundleError;
use fhirbase_transform::TransformError;
use sqlx_core::error::Error as SqlxError;

/// PostgreSQL error code for undefined table (42P01).
pub const PG_UNDEFINED_TABLE: &str = "42P01";

/// Checks if a sqlx error has a specific PostgreSQL error code.
pub fn has_pg_error_code(err: &SqlxError, code: &str) -> bool {
    if let SqlxError::Database(db_err) = err {
        db_err.code().as_deref() == Some(code)
    } else {
        false
    }
}

/// Checks if a sqlx error is "undefined table" (42P01).
pub fn is_undefined_table(err: &SqlxError) -> bool {
    has_pg_error_code(err, PG_UNDEFINED_TABLE)
}

#[derive(Debug, thiserror::Error)]
pub enum LoaderError {
    #[error("Database error: {0}")]
    Database(#[from] SqlxError),

    /// COPY into one table failed.
    #[error("Error copying data to {table}: {source}")]
    Copy {
        table: String,
        #[source]
        source: SqlxError,
    },

    /// A batch of INSERT statements failed.
    #[error("Error sending batch of {statements} statements: {source}")]
    Batch {
        statements: usize,
        #[source]
        source: SqlxError,
    },

    #[error("Error retrieving next resource: {0}")]
    Bundle(#[from] BundleError),

    #[error(transparent)]
    Transform(#[from] TransformError),

    #[error("Error serializing resource: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid resource: {0}")]
    Resource(#[from] fhirbase_core::CoreError),

    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl LoaderError {
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Hint shown to users when the target tables are missing.
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::Copy { source, .. } | Self::Batch { source, .. } | Self::Database(source)
                if is_undefined_table(source) =>
            {
                Some("the table does not exist; initialize the fhirbase schema for this FHIR version first")
            }
            _ => None,
        }
    }
}

/// Result type alias for loader operations.
pub type Result<T> = std::result::Result<T, LoaderError>;
