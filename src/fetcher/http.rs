//! reqwest-backed fetcher.

use std::error::Error as _;

use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use url::Url;

use super::Fetcher;
use crate::config::HttpConfig;
use crate::error::{Error, FetchError, Result};

/// Production [`Fetcher`] issuing `GET` requests through one shared reqwest client.
///
/// The client owns the connection pool, so one `HttpFetcher` should be built
/// per process (or per batch family) and shared behind an `Arc`.
#[derive(Clone, Debug)]
pub struct HttpFetcher {
    client: reqwest::Client,
    error_for_status: bool,
}

impl HttpFetcher {
    /// Build a client from [`HttpConfig`].
    ///
    /// Fails with [`Error::Config`] for header names or values that are not
    /// valid HTTP, and with [`Error::HttpClient`] if reqwest cannot build the
    /// client (e.g. the TLS backend fails to initialize).
    pub fn new(config: &HttpConfig) -> Result<Self> {
        let mut headers = HeaderMap::with_capacity(config.headers.len());
        for (name, value) in &config.headers {
            let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
                Error::config("headers", format!("invalid header name {name:?}: {e}"))
            })?;
            let header_value = HeaderValue::from_str(value).map_err(|e| {
                Error::config("headers", format!("invalid value for header {name:?}: {e}"))
            })?;
            headers.insert(header_name, header_value);
        }

        let mut builder = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .connect_timeout(config.connect_timeout)
            .default_headers(headers);
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            client: builder.build()?,
            error_for_status: config.error_for_status,
        })
    }

    /// Wrap an existing client
    pub fn with_client(client: reqwest::Client, error_for_status: bool) -> Self {
        Self {
            client,
            error_for_status,
        }
    }
}

#[async_trait::async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &Url) -> std::result::Result<Bytes, FetchError> {
        if !matches!(url.scheme(), "http" | "https") {
            return Err(FetchError::InvalidUrl {
                url: url.to_string(),
                reason: format!("unsupported scheme {:?}", url.scheme()),
            });
        }

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| transport_error(url, &e))?;

        let status = response.status();
        if self.error_for_status && !status.is_success() {
            tracing::debug!(url = %url, status = status.as_u16(), "Rejected HTTP status");
            return Err(FetchError::Network {
                url: url.to_string(),
                status: Some(status.as_u16()),
                cause: format!("HTTP status {status}"),
            });
        }

        response.bytes().await.map_err(|e| transport_error(url, &e))
    }
}

/// Flatten a reqwest error and its source chain into a [`FetchError::Network`].
fn transport_error(url: &Url, err: &reqwest::Error) -> FetchError {
    let mut cause = err.to_string();
    let mut source = err.source();
    while let Some(inner) = source {
        cause.push_str(": ");
        cause.push_str(&inner.to_string());
        source = inner.source();
    }
    FetchError::Network {
        url: url.to_string(),
        status: err.status().map(|s| s.as_u16()),
        cause,
    }
}
