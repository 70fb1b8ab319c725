//! # Client Error Types
//!
//! Errors raised while wiring the store up: configuration, URL parsing and
//! HTTP client construction. Failures of individual fetches are
//! [`StoreError`]s, since those are recorded in cached state as well.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Client Error Categories                            │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │  Configuration  │  │   Construction  │  │     Store               │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  InvalidConfig  │  │  HttpClient     │  │  Store(StoreError)      │ │
//! │  │  InvalidUrl     │  │                 │  │  (fetch, decode, ...)   │ │
//! │  │  ConfigLoad/Save│  │                 │  │                         │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use atrium_core::StoreError;
use thiserror::Error;

/// Result type alias for client setup operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Client error type.
#[derive(Debug, Error)]
pub enum ClientError {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Invalid client configuration.
    #[error("Invalid client configuration: {0}")]
    InvalidConfig(String),

    /// Invalid API base URL.
    #[error("Invalid API URL: {0}")]
    InvalidUrl(String),

    /// Failed to load config file.
    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    /// Failed to save config file.
    #[error("Failed to save config: {0}")]
    ConfigSaveFailed(String),

    // =========================================================================
    // Construction Errors
    // =========================================================================
    /// The underlying HTTP client could not be built.
    #[error("HTTP client error: {0}")]
    HttpClient(String),

    // =========================================================================
    // Store Errors
    // =========================================================================
    #[error(transparent)]
    Store(#[from] StoreError),
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<url::ParseError> for ClientError {
    fn from(err: url::ParseError) -> Self {
        ClientError::InvalidUrl(err.to_string())
    }
}

impl From<std::io::Error> for ClientError {
    fn from(err: std::io::Error) -> Self {
        ClientError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for ClientError {
    fn from(err: toml::de::Error) -> Self {
        ClientError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::ser::Error> for ClientError {
    fn from(err: toml::ser::Error) -> Self {
        ClientError::ConfigSaveFailed(err.to_string())
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        ClientError::HttpClient(err.to_string())
    }
}

/// Maps a reqwest failure onto the store's error taxonomy.
///
/// `StoreError` lives in `atrium-core`, which knows nothing about reqwest,
/// so this is a function rather than a `From` impl.
pub(crate) fn request_error(err: reqwest::Error) -> StoreError {
    if err.is_timeout() {
        StoreError::Network(format!("request timed out: {}", err))
    } else if err.is_connect() {
        StoreError::Network(format!("connection failed: {}", err))
    } else if err.is_decode() {
        StoreError::InvalidResponse(err.to_string())
    } else if let Some(status) = err.status() {
        StoreError::Http {
            status: status.as_u16(),
            message: err.to_string(),
        }
    } else {
        StoreError::Network(err.to_string())
    }
}

// =============================================================================
// Error Categorization
// =============================================================================

impl ClientError {
    /// Returns true if this error indicates a configuration problem.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            ClientError::InvalidConfig(_)
                | ClientError::InvalidUrl(_)
                | ClientError::ConfigLoadFailed(_)
                | ClientError::ConfigSaveFailed(_)
        )
    }

    /// Returns true if retrying the failed operation may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            ClientError::Store(err) => err.is_retryable(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_errors() {
        assert!(ClientError::InvalidConfig("bad".into()).is_config_error());
        assert!(ClientError::InvalidUrl("ftp://x".into()).is_config_error());
        assert!(!ClientError::HttpClient("tls".into()).is_config_error());
    }

    #[test]
    fn test_store_errors_pass_through() {
        let err: ClientError = StoreError::Network("refused".into()).into();
        assert!(err.is_retryable());
        assert!(err.to_string().contains("refused"));

        let err: ClientError = StoreError::UnknownModel("spaceship".into()).into();
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_url_parse_error_conversion() {
        let err: ClientError = url::Url::parse("not a url").unwrap_err().into();
        assert!(matches!(err, ClientError::InvalidUrl(_)));
    }
}
