//! The fetch capability injected into the dispatcher.
//!
//! - [`Fetcher`] - one request in, one body or typed failure out
//! - [`HttpFetcher`] - production implementation backed by a shared reqwest client

mod http;

pub use http::HttpFetcher;

use crate::error::FetchError;
use bytes::Bytes;
use url::Url;

/// Abstraction over a single outbound fetch, enabling testability.
///
/// Implementations perform exactly one request per call: no retries, no
/// caching. Transport failures are returned as [`FetchError::Network`]; they
/// must never panic or abort the process. The dispatcher has already parsed
/// the URL, so implementations only see well-formed input.
#[async_trait::async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch `url` and return the raw response body
    async fn fetch(&self, url: &Url) -> Result<Bytes, FetchError>;
}
