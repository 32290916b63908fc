//! End-to-end tests: `Dispatcher` driving the real `HttpFetcher` against a
//! local mock server.
//!
//! # Running the tests
//!
//! ```bash
//! cargo test --test dispatch_http
//! ```

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;
use std::time::{Duration, Instant};

use fetch_dispatch::{
    Config, DispatchConfig, Dispatcher, ErrorKind, Event, FetchError, HttpConfig, HttpFetcher,
    Outcome, ResultSink,
};
use futures::StreamExt;
use tokio_test::assert_ok;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Helper to build a dispatcher over a default-configured HTTP fetcher
fn http_dispatcher(dispatch: DispatchConfig) -> Dispatcher {
    let fetcher = assert_ok!(HttpFetcher::new(&HttpConfig::default()));
    assert_ok!(Dispatcher::new(Arc::new(fetcher), dispatch))
}

async fn mount_page(server: &MockServer, route: &str, body: &str, delay: Duration) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(body)
                .set_delay(delay),
        )
        .mount(server)
        .await;
}

#[tokio::test]
async fn mixed_batch_yields_one_outcome_per_url() {
    let server = MockServer::start().await;
    mount_page(&server, "/ok", "hello", Duration::ZERO).await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let urls = vec![
        format!("{}/ok", server.uri()),
        "definitely not a url".to_string(),
        format!("{}/missing", server.uri()),
        format!("{}/ok", server.uri()),
    ];

    let report = http_dispatcher(DispatchConfig::bounded(2))
        .run_batch(urls.clone())
        .await;

    let kinds: Vec<_> = report.outcomes.iter().map(Outcome::error_kind).collect();
    assert_eq!(
        kinds,
        vec![
            None,
            Some(ErrorKind::InvalidUrl),
            Some(ErrorKind::Network),
            None
        ]
    );
    assert_eq!(report.outcomes[0].length(), Some(5));
    match report.outcomes[2].error() {
        Some(FetchError::Network { url, status, .. }) => {
            assert_eq!(url, &urls[2]);
            assert_eq!(*status, Some(404));
        }
        other => panic!("expected Network error, got {other:?}"),
    }
    assert_eq!(report.summary.succeeded, 2);
    assert_eq!(report.summary.failed, 2);
    assert_eq!(report.summary.total_bytes, 10);
}

#[tokio::test]
async fn ceiling_bounds_concurrent_requests() {
    let server = MockServer::start().await;
    mount_page(&server, "/slow", "body", Duration::from_millis(100)).await;

    let urls = vec![format!("{}/slow", server.uri()); 8];
    let start = Instant::now();
    let report = http_dispatcher(DispatchConfig::bounded(4))
        .run_batch(urls)
        .await;
    let elapsed = start.elapsed();

    assert!(report.outcomes.iter().all(Outcome::is_success));
    assert_eq!(report.summary.peak_in_flight, 4);
    // Two waves of four
    assert!(
        elapsed >= Duration::from_millis(200),
        "eight 100ms requests at ceiling 4 finished in {elapsed:?}"
    );
    assert_eq!(server.received_requests().await.unwrap().len(), 8);
}

#[tokio::test]
async fn request_timeout_applies_per_url() {
    let server = MockServer::start().await;
    mount_page(&server, "/stalled", "late", Duration::from_secs(10)).await;
    mount_page(&server, "/quick", "on time", Duration::ZERO).await;

    let config = DispatchConfig::bounded(2).with_request_timeout(Duration::from_millis(200));
    let report = http_dispatcher(config)
        .run_batch([
            format!("{}/stalled", server.uri()),
            format!("{}/quick", server.uri()),
        ])
        .await;

    assert_eq!(report.outcomes[0].error_kind(), Some(ErrorKind::Timeout));
    assert!(report.outcomes[1].is_success());
}

#[tokio::test]
async fn dispatcher_from_config_uses_http_settings() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/teapot"))
        .respond_with(ResponseTemplate::new(418).set_body_string("short and stout"))
        .mount(&server)
        .await;

    let mut config = Config::default();
    config.dispatch.concurrency = 3;
    config.http.error_for_status = false;

    let dispatcher = assert_ok!(Dispatcher::from_config(&config));
    assert_eq!(dispatcher.config().concurrency, 3);

    let report = dispatcher
        .run_batch([format!("{}/teapot", server.uri())])
        .await;
    assert_eq!(report.outcomes[0].length(), Some("short and stout".len()));
}

#[tokio::test]
async fn stream_and_events_cover_whole_batch() {
    let server = MockServer::start().await;
    mount_page(&server, "/page", "content", Duration::from_millis(10)).await;

    let dispatcher = http_dispatcher(DispatchConfig::bounded(3));
    let mut events = dispatcher.subscribe();

    let urls = vec![format!("{}/page", server.uri()); 5];
    let outcomes: Vec<Outcome> = dispatcher
        .stream(urls, CancellationToken::new())
        .collect()
        .await;
    assert_eq!(outcomes.len(), 5);

    let finished = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match events.recv().await.unwrap() {
                Event::BatchFinished { summary } => break summary,
                _ => continue,
            }
        }
    })
    .await
    .expect("BatchFinished event");
    assert_eq!(finished.total, 5);
    assert_eq!(finished.succeeded, 5);
}

/// Sink that cancels the batch after the first delivered outcome
struct CancelAfterFirst {
    cancel: CancellationToken,
    seen: usize,
}

#[async_trait::async_trait]
impl ResultSink for CancelAfterFirst {
    async fn accept(&mut self, _outcome: Outcome) {
        self.seen += 1;
        self.cancel.cancel();
    }
}

#[tokio::test]
async fn sequential_batch_stops_after_cancellation() {
    let server = MockServer::start().await;
    mount_page(&server, "/item", "x", Duration::from_millis(50)).await;

    let cancel = CancellationToken::new();
    let mut sink = CancelAfterFirst {
        cancel: cancel.clone(),
        seen: 0,
    };

    let summary = http_dispatcher(DispatchConfig::sequential())
        .run_streaming(
            vec![format!("{}/item", server.uri()); 4],
            &mut sink,
            cancel,
        )
        .await;

    // The next item may already be admitted while the first outcome is delivered
    assert_eq!(sink.seen, 4);
    assert!(summary.succeeded >= 1 && summary.succeeded <= 2);
    assert_eq!(summary.succeeded + summary.cancelled, 4);
    assert_eq!(
        server.received_requests().await.unwrap().len(),
        summary.succeeded,
        "cancelled items never reach the server"
    );
}
