//! # Error Types
//!
//! Error types recorded by the store.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  atrium-core errors (this file)                                        │
//! │  └── StoreError     - Fetch failures and store anomalies               │
//! │                                                                         │
//! │  atrium-client errors (separate crate)                                 │
//! │  └── ClientError    - Config and construction failures                 │
//! │                                                                         │
//! │  Flow: reqwest::Error → StoreError → cache entry `error` + Err(..)     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Why Clone + Serialize?
//! A `StoreError` is not only returned to the caller, it is also stored in
//! the cache entry that failed (`CacheEntry::error`) so UI code can render
//! an error indicator next to stale data. Entries are cloned whenever the
//! reducer copies a partition, so the error must be cheap to clone.

use serde::{Deserialize, Serialize};
use thiserror::Error;

// =============================================================================
// Store Error
// =============================================================================

/// Errors produced while fetching into, or dispatching against, the store.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "type", content = "detail", rename_all = "snake_case")]
pub enum StoreError {
    /// Backend answered with a non-success HTTP status.
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// Request never produced a response (DNS, connect, timeout).
    #[error("Network error: {0}")]
    Network(String),

    /// Backend answered successfully but without a `results` payload.
    ///
    /// ## When This Occurs
    /// - Endpoint returned `{}` or `{ "results": null }`
    /// - Proxy swallowed the body
    #[error("No results returned from {path}")]
    NoResults { path: String },

    /// Response body could not be decoded into the expected shape.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Model name is not part of the registry.
    #[error("Unknown model: {0}")]
    UnknownModel(String),

    /// Entity has neither `_id` nor `id`, so it cannot be indexed.
    #[error("{model} entity has no identifier")]
    MissingId { model: String },

    /// Identifier cannot address a single resource (empty, `.` or `..`).
    #[error("{model} identifier {id:?} cannot be used in a request path")]
    InvalidId { model: String, id: String },

    /// Action kind name is not one of the known kinds.
    #[error("Unknown action kind: {0}")]
    UnknownAction(String),
}

impl StoreError {
    /// Returns true if the same request might succeed when issued again.
    ///
    /// ## Retryable Errors
    /// - Network failures
    /// - 5xx and 429 responses
    pub fn is_retryable(&self) -> bool {
        match self {
            StoreError::Network(_) => true,
            StoreError::Http { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with StoreError.
pub type StoreResult<T> = Result<T, StoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = StoreError::Http {
            status: 404,
            message: "not found".to_string(),
        };
        assert_eq!(err.to_string(), "HTTP 404: not found");

        let err = StoreError::NoResults {
            path: "/booking".to_string(),
        };
        assert_eq!(err.to_string(), "No results returned from /booking");

        let err = StoreError::InvalidId {
            model: "booking".to_string(),
            id: "..".to_string(),
        };
        assert_eq!(
            err.to_string(),
            r#"booking identifier ".." cannot be used in a request path"#
        );
    }

    #[test]
    fn test_retryable_errors() {
        assert!(StoreError::Network("reset".into()).is_retryable());
        assert!(StoreError::Http {
            status: 503,
            message: String::new()
        }
        .is_retryable());
        assert!(StoreError::Http {
            status: 429,
            message: String::new()
        }
        .is_retryable());

        assert!(!StoreError::Http {
            status: 400,
            message: String::new()
        }
        .is_retryable());
        assert!(!StoreError::UnknownModel("nope".into()).is_retryable());
    }

    #[test]
    fn test_error_serializes_with_type_tag() {
        let err = StoreError::Network("timed out".into());
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["type"], "network");
    }
}
