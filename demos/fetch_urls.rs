//! Fetch a list of URLs with a bounded worker pool
//!
//! Fetches eleven copies of the same search URL with at most ten requests in
//! flight, logging each response length. Press Ctrl+C to stop admitting new
//! requests.
//!
//! ```bash
//! RUST_LOG=fetch_dispatch=debug cargo run --example fetch_urls
//! RUST_LOG=debug cargo run --example fetch_urls -- config.json
//! ```

use std::sync::Arc;

use fetch_dispatch::{
    Config, Dispatcher, Event, HttpFetcher, LoggingSink, cancel_on_shutdown_signal,
};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

const URL: &str = "https://google.com/?q=sample";
const URL_COUNT: usize = 11;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")),
        )
        .init();

    // Optional JSON config file as the first argument
    let config = match std::env::args().nth(1) {
        Some(path) => Config::load(path)?,
        None => {
            let mut config = Config::default();
            config.dispatch.concurrency = 10;
            config
        }
    };

    let fetcher = HttpFetcher::new(&config.http)?;
    let dispatcher = Dispatcher::new(Arc::new(fetcher), config.dispatch.clone())?;

    let mut events = dispatcher.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            if let Event::FetchStarted { index, .. } = event {
                tracing::trace!(index, "Worker picked up item");
            }
        }
    });

    let cancel = CancellationToken::new();
    tokio::spawn(cancel_on_shutdown_signal(cancel.clone()));

    tracing::debug!("Starting fetching...");
    let urls = vec![URL; URL_COUNT];
    let summary = dispatcher
        .run_streaming(urls, &mut LoggingSink, cancel.clone())
        .await;
    // Stop the signal listener
    cancel.cancel();

    println!(
        "{} fetched, {} failed, {} cancelled, peak {} in flight, {:.2}s",
        summary.succeeded,
        summary.failed,
        summary.cancelled,
        summary.peak_in_flight,
        summary.elapsed.as_secs_f64()
    );
    Ok(())
}
