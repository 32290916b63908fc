//! Live fetches against the public internet.
//!
//! # Running the tests
//!
//! ```bash
//! cargo test --features live-tests --test live_fetch -- --nocapture
//! ```

#![cfg(feature = "live-tests")]
#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::time::Duration;

use fetch_dispatch::{Config, Dispatcher, Outcome};

#[tokio::test]
async fn eleven_google_queries_at_ceiling_ten() {
    let mut config = Config::default();
    config.dispatch.concurrency = 10;
    config.dispatch.request_timeout = Some(Duration::from_secs(30));

    let dispatcher = Dispatcher::from_config(&config).unwrap();
    let urls = vec!["https://google.com/?q=sample"; 11];

    let report = dispatcher.run_batch(urls).await;

    for outcome in &report.outcomes {
        match outcome {
            Outcome::Success { length, .. } => println!("#{}: {} bytes", outcome.index(), length),
            Outcome::Failure { error, .. } => println!("#{}: {}", outcome.index(), error),
        }
    }
    assert_eq!(report.outcomes.len(), 11);
    assert!(report.summary.peak_in_flight <= 10);
    assert!(
        report.outcomes.iter().any(Outcome::is_success),
        "no request succeeded; is the network reachable?"
    );
}
