//! Typed error handling for the API
//!
//! Errors are grouped by the layer that raises them so callers can match on
//! the precise failure instead of inspecting strings.
//!
//! # Error Categories
//!
//! - [`StorageError`]: the query executor or the connection pool failed
//! - [`LoadError`]: a batched loader could not produce a value for one key
//! - [`QueryBuildError`]: a service handed the query builder a filter it
//!   does not know how to translate (a programming error)
//! - [`ApiError`]: the umbrella type returned to the resolver and HTTP layers
//!
//! # Example
//!
//! ```rust,ignore
//! match loaders.country.load(42).await {
//!     Ok(country) => println!("{}", country.name),
//!     Err(LoadError::NotFound { entity_type, key }) => println!("no {entity_type} {key}"),
//!     Err(LoadError::BatchFetch(cause)) => eprintln!("database unavailable: {cause}"),
//! }
//! ```

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use std::sync::Arc;

// =============================================================================
// Storage Errors
// =============================================================================

/// Failures reported by the query executor.
///
/// Pool exhaustion is kept apart from statement failures so that operators can
/// tell an overloaded database from a broken query.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// No connection could be checked out (pool timed out or was closed)
    #[error("connection pool exhausted: {0}")]
    PoolExhausted(String),

    /// The statement was rejected or failed while running
    #[error("query failed: {0}")]
    Query(#[source] sqlx::Error),

    /// A parameter could not be encoded for the wire
    #[error("failed to bind query parameter: {0}")]
    Bind(String),

    /// A row could not be mapped onto the target record
    #[error("failed to decode row: {0}")]
    Decode(String),

    /// A multi-statement write failed and was rolled back
    #[error("transaction rolled back: {0}")]
    Transaction(#[source] Box<StorageError>),
}

impl StorageError {
    /// Whether this failure came from connection acquisition rather than the query
    pub fn is_pool_exhausted(&self) -> bool {
        match self {
            StorageError::PoolExhausted(_) => true,
            StorageError::Transaction(inner) => inner.is_pool_exhausted(),
            _ => false,
        }
    }
}

impl From<sqlx::Error> for StorageError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
                StorageError::PoolExhausted(err.to_string())
            }
            sqlx::Error::ColumnDecode { .. }
            | sqlx::Error::ColumnNotFound(_)
            | sqlx::Error::Decode(_)
            | sqlx::Error::TypeNotFound { .. } => StorageError::Decode(err.to_string()),
            other => StorageError::Query(other),
        }
    }
}

// =============================================================================
// Load Errors
// =============================================================================

/// Per-key outcome of a batched load.
///
/// Cloneable: one batch failure is handed to every caller waiting on it.
#[derive(Debug, Clone, thiserror::Error)]
pub enum LoadError {
    /// The key was part of the batch but no row came back for it
    #[error("{entity_type} with key '{key}' not found")]
    NotFound {
        entity_type: &'static str,
        key: String,
    },

    /// The batch query itself failed
    #[error("batch fetch failed: {0}")]
    BatchFetch(Arc<StorageError>),

    /// The dispatch task ended without settling this key (runtime shutdown)
    #[error("batch for {entity_type} was abandoned before completing")]
    Aborted { entity_type: &'static str },
}

impl LoadError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, LoadError::NotFound { .. })
    }
}

// =============================================================================
// Query Build Errors
// =============================================================================

/// Raised while assembling SQL, before anything is sent to the database.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueryBuildError {
    /// A filter name has no column mapping for the table
    #[error("filter '{filter}' is not mapped to a column of '{table}'")]
    UnknownFilter { table: String, filter: String },

    /// An insert or update carried no columns
    #[error("no columns to write into '{table}'")]
    EmptyAssignment { table: String },
}

// =============================================================================
// API Errors
// =============================================================================

/// The error type surfaced to resolvers and HTTP handlers
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    QueryBuild(#[from] QueryBuildError),

    /// Input rejected before reaching storage
    #[error("invalid input: {0}")]
    Validation(String),

    /// Internal errors (should not happen in normal operation)
    #[error("internal error: {0}")]
    Internal(String),
}

/// Error response structure for HTTP responses
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error code for programmatic handling
    pub code: String,
    /// Human-readable error message
    pub message: String,
}

impl ApiError {
    /// Shorthand for a not-found error outside of a loader
    pub fn not_found(entity_type: &'static str, key: impl ToString) -> Self {
        ApiError::Load(LoadError::NotFound {
            entity_type,
            key: key.to_string(),
        })
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Load(LoadError::NotFound { .. }) => StatusCode::NOT_FOUND,
            ApiError::Load(LoadError::BatchFetch(cause)) => storage_status(cause),
            ApiError::Load(LoadError::Aborted { .. }) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Storage(cause) => storage_status(cause),
            ApiError::QueryBuild(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error code for this error
    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::Load(LoadError::NotFound { .. }) => "NOT_FOUND",
            ApiError::Load(LoadError::BatchFetch(cause)) => storage_code(cause),
            ApiError::Load(LoadError::Aborted { .. }) => "LOAD_ABORTED",
            ApiError::Storage(cause) => storage_code(cause),
            ApiError::QueryBuild(_) => "QUERY_BUILD_ERROR",
            ApiError::Validation(_) => "VALIDATION_ERROR",
            ApiError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Convert to an error response
    pub fn to_response(&self) -> ErrorResponse {
        ErrorResponse {
            code: self.error_code().to_string(),
            message: self.to_string(),
        }
    }
}

fn storage_status(err: &StorageError) -> StatusCode {
    if err.is_pool_exhausted() {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

fn storage_code(err: &StorageError) -> &'static str {
    match err {
        StorageError::Transaction(_) => "TRANSACTION_FAILED",
        e if e.is_pool_exhausted() => "DATABASE_UNAVAILABLE",
        _ => "STORAGE_ERROR",
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        ApiError::Validation(errors.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(self.to_response());
        (status, body).into_response()
    }
}

impl async_graphql::ErrorExtensions for ApiError {
    fn extend(&self) -> async_graphql::Error {
        let code = self.error_code();
        async_graphql::Error::new(self.to_string()).extend_with(|_, ext| ext.set("code", code))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_errors_are_distinguished() {
        let err = StorageError::from(sqlx::Error::PoolTimedOut);
        assert!(err.is_pool_exhausted());

        let err = StorageError::from(sqlx::Error::RowNotFound);
        assert!(!err.is_pool_exhausted());
        assert!(matches!(err, StorageError::Query(_)));
    }

    #[test]
    fn test_transaction_keeps_cause() {
        let err = StorageError::Transaction(Box::new(StorageError::PoolExhausted(
            "timed out".into(),
        )));
        assert!(err.is_pool_exhausted());
        assert!(err.to_string().contains("timed out"));
    }

    #[test]
    fn test_load_error_display() {
        let err = LoadError::NotFound {
            entity_type: "country",
            key: "7".into(),
        };
        assert_eq!(err.to_string(), "country with key '7' not found");
        assert!(err.is_not_found());
    }
}
