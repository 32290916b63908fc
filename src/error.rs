//! Error types for fetch-dispatch
//!
//! Two layers of errors exist in this crate:
//! - [`Error`] covers failures that stop a batch before it starts (invalid
//!   configuration, unreadable config file, an HTTP client that cannot be built).
//! - [`FetchError`] covers failures of a single work item. These never unwind
//!   past the dispatcher; they are delivered as data inside
//!   [`Outcome::Failure`](crate::types::Outcome::Failure).

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Result type alias for fetch-dispatch operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for fetch-dispatch
///
/// Every variant is a pre-flight failure: when one of these is returned, no
/// fetch of the batch has been started.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "concurrency")
        key: Option<String>,
    },

    /// I/O error (reading a config file)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error (parsing a config file)
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The HTTP client could not be constructed from the given settings
    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),
}

impl Error {
    /// Shorthand for a [`Error::Config`] naming the offending key
    pub fn config(key: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.into()),
        }
    }

    /// Machine-readable error code
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::Config { .. } => "config_error",
            Error::Io(_) => "io_error",
            Error::Serialization(_) => "serialization_error",
            Error::HttpClient(_) => "http_client_error",
        }
    }
}

/// Coarse classification of a [`FetchError`], suitable for events and counters
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Input string was not a fetchable URL
    InvalidUrl,
    /// Transport failure or rejected HTTP status
    Network,
    /// Per-request deadline exceeded
    Timeout,
    /// Batch was cancelled before the item started
    Cancelled,
    /// Batch was cancelled while the item was in flight
    Interrupted,
    /// The fetch task panicked
    Internal,
}

/// Failure of a single work item
///
/// Each variant carries the URL string exactly as it was submitted so the
/// caller can account for every input.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FetchError {
    /// The input could not be parsed as a URL, or uses a scheme the fetcher cannot handle
    #[error("invalid URL {url:?}: {reason}")]
    InvalidUrl {
        /// The submitted input
        url: String,
        /// Why it was rejected
        reason: String,
    },

    /// Transport failure (connection refused, DNS, reset) or a rejected HTTP status
    #[error("network error fetching {url}: {cause}")]
    Network {
        /// The URL being fetched
        url: String,
        /// HTTP status, when a response was received
        status: Option<u16>,
        /// Underlying cause
        cause: String,
    },

    /// The request exceeded the per-request timeout
    #[error("timed out fetching {url} after {:.2}s", .after.as_secs_f64())]
    Timeout {
        /// The URL being fetched
        url: String,
        /// The deadline that was exceeded
        after: Duration,
    },

    /// The batch was cancelled before this item was started
    #[error("cancelled before fetching {url}")]
    Cancelled {
        /// The URL that was never fetched
        url: String,
    },

    /// The batch was cancelled while this item was in flight
    #[error("interrupted while fetching {url}")]
    Interrupted {
        /// The URL whose fetch was dropped
        url: String,
    },

    /// The fetch task panicked
    #[error("internal error fetching {url}: {message}")]
    Internal {
        /// The URL being fetched
        url: String,
        /// Panic or join error description
        message: String,
    },
}

impl FetchError {
    /// Build a [`FetchError::Network`] from any displayable cause
    pub fn network(url: impl Into<String>, cause: impl std::fmt::Display) -> Self {
        FetchError::Network {
            url: url.into(),
            status: None,
            cause: cause.to_string(),
        }
    }

    /// The URL this failure belongs to
    pub fn url(&self) -> &str {
        match self {
            FetchError::InvalidUrl { url, .. }
            | FetchError::Network { url, .. }
            | FetchError::Timeout { url, .. }
            | FetchError::Cancelled { url }
            | FetchError::Interrupted { url }
            | FetchError::Internal { url, .. } => url,
        }
    }

    /// Replace the URL with the string the caller submitted.
    ///
    /// Fetchers see the parsed URL, whose string form may be normalized
    /// (e.g. a trailing `/` added).
    pub(crate) fn with_url(mut self, submitted: &str) -> Self {
        match &mut self {
            FetchError::InvalidUrl { url, .. }
            | FetchError::Network { url, .. }
            | FetchError::Timeout { url, .. }
            | FetchError::Cancelled { url }
            | FetchError::Interrupted { url }
            | FetchError::Internal { url, .. } => {
                url.clear();
                url.push_str(submitted);
            }
        }
        self
    }

    /// Coarse classification
    pub fn kind(&self) -> ErrorKind {
        match self {
            FetchError::InvalidUrl { .. } => ErrorKind::InvalidUrl,
            FetchError::Network { .. } => ErrorKind::Network,
            FetchError::Timeout { .. } => ErrorKind::Timeout,
            FetchError::Cancelled { .. } => ErrorKind::Cancelled,
            FetchError::Interrupted { .. } => ErrorKind::Interrupted,
            FetchError::Internal { .. } => ErrorKind::Internal,
        }
    }

    /// Machine-readable error code
    pub fn error_code(&self) -> &'static str {
        match self.kind() {
            ErrorKind::InvalidUrl => "invalid_url",
            ErrorKind::Network => "network_error",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::Interrupted => "interrupted",
            ErrorKind::Internal => "internal_error",
        }
    }

    /// True when the item never reached the fetcher because of cancellation
    pub fn is_cancelled(&self) -> bool {
        matches!(self, FetchError::Cancelled { .. })
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn all_fetch_errors() -> Vec<(FetchError, ErrorKind, &'static str)> {
        let url = "https://example.com/a".to_string();
        vec![
            (
                FetchError::InvalidUrl {
                    url: url.clone(),
                    reason: "relative URL without a base".into(),
                },
                ErrorKind::InvalidUrl,
                "invalid_url",
            ),
            (
                FetchError::Network {
                    url: url.clone(),
                    status: Some(503),
                    cause: "HTTP 503".into(),
                },
                ErrorKind::Network,
                "network_error",
            ),
            (
                FetchError::Timeout {
                    url: url.clone(),
                    after: Duration::from_millis(1500),
                },
                ErrorKind::Timeout,
                "timeout",
            ),
            (
                FetchError::Cancelled { url: url.clone() },
                ErrorKind::Cancelled,
                "cancelled",
            ),
            (
                FetchError::Interrupted { url: url.clone() },
                ErrorKind::Interrupted,
                "interrupted",
            ),
            (
                FetchError::Internal {
                    url,
                    message: "task panicked".into(),
                },
                ErrorKind::Internal,
                "internal_error",
            ),
        ]
    }

    #[test]
    fn every_fetch_error_maps_to_kind_and_code() {
        for (error, kind, code) in all_fetch_errors() {
            assert_eq!(error.kind(), kind, "wrong kind for {error}");
            assert_eq!(error.error_code(), code, "wrong code for {error}");
        }
    }

    #[test]
    fn every_fetch_error_keeps_its_url() {
        for (error, _, _) in all_fetch_errors() {
            assert_eq!(error.url(), "https://example.com/a");
        }
    }

    #[test]
    fn only_cancelled_reports_is_cancelled() {
        let cancelled: Vec<_> = all_fetch_errors()
            .into_iter()
            .filter(|(e, _, _)| e.is_cancelled())
            .map(|(_, kind, _)| kind)
            .collect();
        assert_eq!(cancelled, vec![ErrorKind::Cancelled]);
    }

    #[test]
    fn timeout_message_includes_deadline() {
        let err = FetchError::Timeout {
            url: "https://example.com".into(),
            after: Duration::from_millis(250),
        };
        assert_eq!(
            err.to_string(),
            "timed out fetching https://example.com after 0.25s"
        );
    }

    #[test]
    fn network_helper_has_no_status() {
        let err = FetchError::network("https://example.com", "connection refused");
        assert_eq!(
            err,
            FetchError::Network {
                url: "https://example.com".into(),
                status: None,
                cause: "connection refused".into(),
            }
        );
    }

    #[test]
    fn error_kind_serializes_snake_case() {
        let json = serde_json::to_string(&ErrorKind::InvalidUrl).unwrap();
        assert_eq!(json, "\"invalid_url\"");
    }

    #[test]
    fn config_helper_records_key() {
        let err = Error::config("concurrency", "must be at least 1");
        match &err {
            Error::Config { key, message } => {
                assert_eq!(key.as_deref(), Some("concurrency"));
                assert_eq!(message, "must be at least 1");
            }
            other => panic!("expected Config, got {other:?}"),
        }
        assert_eq!(err.error_code(), "config_error");
        assert_eq!(err.to_string(), "configuration error: must be at least 1");
    }
}
