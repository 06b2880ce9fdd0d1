//! Tests for the typed error handling system
//!
//! These tests verify that:
//! - Errors return correct HTTP status codes
//! - Error responses carry a stable code and a message
//! - Conversions from lower layers keep the failure category
//! - GraphQL errors expose the same code as an extension

use async_graphql::ErrorExtensions;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use murkylook::prelude::*;
use std::sync::Arc;
use validator::Validate;

fn not_found() -> ApiError {
    ApiError::not_found("country", 42)
}

fn pool_exhausted() -> StorageError {
    StorageError::from(sqlx::Error::PoolTimedOut)
}

// =============================================================================
// HTTP Status Code Tests
// =============================================================================

mod status_code_tests {
    use super::*;

    #[test]
    fn test_not_found_returns_404() {
        assert_eq!(not_found().status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_pool_exhaustion_returns_503() {
        let err = ApiError::Storage(pool_exhausted());
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_batch_failure_status_follows_its_cause() {
        let err = ApiError::Load(LoadError::BatchFetch(Arc::new(pool_exhausted())));
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);

        let err = ApiError::Load(LoadError::BatchFetch(Arc::new(StorageError::from(
            sqlx::Error::RowNotFound,
        ))));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_query_build_error_returns_500() {
        let err = ApiError::QueryBuild(QueryBuildError::UnknownFilter {
            table: "countries".into(),
            filter: "altitude".into(),
        });
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_validation_error_returns_400() {
        let err = ApiError::Validation("name is empty".into());
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }
}

// =============================================================================
// Error Code Tests
// =============================================================================

mod error_code_tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(not_found().error_code(), "NOT_FOUND");
        assert_eq!(
            ApiError::Storage(pool_exhausted()).error_code(),
            "DATABASE_UNAVAILABLE"
        );
        assert_eq!(
            ApiError::Storage(StorageError::Bind("bad".into())).error_code(),
            "STORAGE_ERROR"
        );
        assert_eq!(
            ApiError::Load(LoadError::Aborted {
                entity_type: "visit"
            })
            .error_code(),
            "LOAD_ABORTED"
        );
        assert_eq!(ApiError::Internal("x".into()).error_code(), "INTERNAL_ERROR");
    }

    #[test]
    fn test_rolled_back_transaction_code() {
        let err = ApiError::Storage(StorageError::Transaction(Box::new(StorageError::from(
            sqlx::Error::RowNotFound,
        ))));
        assert_eq!(err.error_code(), "TRANSACTION_FAILED");
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}

// =============================================================================
// Error Response Tests
// =============================================================================

mod error_response_tests {
    use super::*;

    #[test]
    fn test_error_response_has_code_and_message() {
        let response = not_found().to_response();
        assert_eq!(response.code, "NOT_FOUND");
        assert_eq!(response.message, "country with key '42' not found");
    }

    #[test]
    fn test_into_response_status() {
        let response = not_found().into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = ApiError::Storage(pool_exhausted()).into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_graphql_extension_carries_code() {
        let err = not_found().extend();
        let extensions = err.extensions.expect("code extension is set");
        assert_eq!(
            extensions.get("code"),
            Some(&async_graphql::Value::from("NOT_FOUND"))
        );
    }
}

// =============================================================================
// Error Conversion Tests
// =============================================================================

mod error_conversion_tests {
    use super::*;

    #[test]
    fn test_sqlx_errors_are_categorized() {
        assert!(matches!(
            StorageError::from(sqlx::Error::PoolClosed),
            StorageError::PoolExhausted(_)
        ));
        assert!(matches!(
            StorageError::from(sqlx::Error::ColumnNotFound("slug".into())),
            StorageError::Decode(_)
        ));
        assert!(matches!(
            StorageError::from(sqlx::Error::RowNotFound),
            StorageError::Query(_)
        ));
    }

    #[test]
    fn test_layers_convert_into_api_error() {
        let err: ApiError = LoadError::NotFound {
            entity_type: "visit",
            key: "3".into(),
        }
        .into();
        assert!(matches!(err, ApiError::Load(_)));

        let err: ApiError = QueryBuildError::EmptyAssignment {
            table: "visits".into(),
        }
        .into();
        assert!(matches!(err, ApiError::QueryBuild(_)));
    }

    #[test]
    fn test_validator_errors_become_validation() {
        #[derive(Validate)]
        struct Input {
            #[validate(length(min = 1))]
            name: String,
        }

        let errors = Input {
            name: String::new(),
        }
        .validate()
        .unwrap_err();
        let err = ApiError::from(errors);
        assert!(matches!(err, ApiError::Validation(ref msg) if msg.contains("name")));
        assert_eq!(err.error_code(), "VALIDATION_ERROR");
    }
}

// =============================================================================
// Error Matching Tests
// =============================================================================

mod error_matching_tests {
    use super::*;

    #[test]
    fn test_can_match_not_found_without_strings() {
        let err = not_found();
        match err {
            ApiError::Load(LoadError::NotFound { entity_type, key }) => {
                assert_eq!(entity_type, "country");
                assert_eq!(key, "42");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_load_errors_clone_with_shared_cause() {
        let err = LoadError::BatchFetch(Arc::new(pool_exhausted()));
        let copy = err.clone();
        let (LoadError::BatchFetch(a), LoadError::BatchFetch(b)) = (&err, &copy) else {
            panic!("clone changed the variant");
        };
        assert!(Arc::ptr_eq(a, b));
    }
}
