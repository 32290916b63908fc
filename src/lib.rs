//! # fetch-dispatch
//!
//! Bounded-concurrency fetch dispatcher: give it a list of URLs and a
//! concurrency ceiling, and it fetches every URL through an injected
//! [`Fetcher`], never running more than the ceiling at once, and accounts for
//! every input with exactly one [`Outcome`].
//!
//! ## Design Philosophy
//!
//! - **Failure isolation** - a failing URL becomes a `Failure` outcome; it never aborts the batch
//! - **One code path** - sequential, bounded-pool and unbounded fetching are the same
//!   dispatcher with a different ceiling
//! - **Injected transport** - the HTTP client is an explicit [`Fetcher`] capability,
//!   replaceable with a stub in tests
//! - **Observable completion** - batches resolve only after every outcome is delivered
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use fetch_dispatch::{DispatchConfig, Dispatcher, HttpConfig, HttpFetcher};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let fetcher = Arc::new(HttpFetcher::new(&HttpConfig::default())?);
//!     let dispatcher = Dispatcher::new(fetcher, DispatchConfig::bounded(10))?;
//!
//!     let urls = vec!["https://example.com/"; 11];
//!     let report = dispatcher.run_batch(urls).await;
//!
//!     for outcome in &report.outcomes {
//!         match outcome.length() {
//!             Some(length) => println!("#{}: {} bytes", outcome.index(), length),
//!             None => println!("#{}: {:?}", outcome.index(), outcome.error()),
//!         }
//!     }
//!     println!("peak concurrency: {}", report.summary.peak_in_flight);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

/// Configuration types
pub mod config;
/// Batch dispatcher
pub mod dispatcher;
/// Error types
pub mod error;
/// Fetch capability and HTTP implementation
pub mod fetcher;
/// Outcome consumers
pub mod sink;
/// Core types and events
pub mod types;

// Re-export commonly used types
pub use config::{Config, DispatchConfig, HttpConfig};
pub use dispatcher::Dispatcher;
pub use error::{Error, ErrorKind, FetchError, Result};
pub use fetcher::{Fetcher, HttpFetcher};
pub use sink::{ChannelSink, CollectingSink, FnSink, LoggingSink, ResultSink};
pub use types::{BatchReport, BatchSummary, Event, Outcome, WorkItem};

/// Fetch every URL with at most `concurrency` requests in flight.
///
/// Returns one outcome per input, in submission order. Fails with
/// [`Error::Config`] before any fetch starts if `concurrency` is 0.
pub async fn run_batch<I, S>(
    urls: I,
    concurrency: usize,
    fetcher: Arc<dyn Fetcher>,
) -> Result<Vec<Outcome>>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let dispatcher = Dispatcher::new(fetcher, DispatchConfig::bounded(concurrency))?;
    Ok(dispatcher.run_batch(urls).await.outcomes)
}

/// Cancel `token` when the process receives a termination signal.
///
/// Listens for Ctrl+C everywhere, plus SIGTERM on Unix.
///
/// Returns early without cancelling if the token is cancelled by someone else.
///
/// # Example
///
/// ```no_run
/// use fetch_dispatch::{Config, Dispatcher, cancel_on_shutdown_signal};
/// use tokio_util::sync::CancellationToken;
///
/// # async fn example() -> fetch_dispatch::Result<()> {
/// let dispatcher = Dispatcher::from_config(&Config::default())?;
/// let cancel = CancellationToken::new();
/// tokio::spawn(cancel_on_shutdown_signal(cancel.clone()));
///
/// let report = dispatcher
///     .run_batch_cancellable(["https://example.com/"], cancel)
///     .await;
/// # Ok(())
/// # }
/// ```
pub async fn cancel_on_shutdown_signal(token: CancellationToken) {
    tokio::select! {
        _ = wait_for_signal() => {
            tracing::info!("Cancelling batch, no new fetches will start");
            token.cancel();
        }
        _ = token.cancelled() => {}
    }
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            tokio::select! {
                _ = sigterm.recv() => tracing::info!("Received SIGTERM signal"),
                _ = ctrl_c() => {}
            }
        }
        Err(e) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, listening for Ctrl+C only");
            ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    ctrl_c().await;
}

/// Resolves on Ctrl+C. Never resolves if the handler cannot be installed.
async fn ctrl_c() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Received Ctrl+C signal"),
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
            std::future::pending::<()>().await;
        }
    }
}
