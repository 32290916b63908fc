//! Per-item admission: cancellation check, URL parsing, the fetch itself
//! (with deadline and interruption), and outcome reporting.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::FetchError;
use crate::fetcher::Fetcher;
use crate::types::{Event, Outcome, WorkItem};

/// Shared state for every item of one batch.
pub(super) struct AdmissionContext {
    pub(super) fetcher: Arc<dyn Fetcher>,
    pub(super) event_tx: broadcast::Sender<Event>,
    pub(super) in_flight: Arc<InFlight>,
    /// Caller-controlled batch cancellation
    pub(super) cancel: CancellationToken,
    /// Fired when the batch future is dropped before completion
    pub(super) abandon: CancellationToken,
    pub(super) request_timeout: Option<Duration>,
    pub(super) interrupt_in_flight: bool,
}

/// Count of fetcher invocations currently outstanding, with its high-water mark.
#[derive(Debug, Default)]
pub(super) struct InFlight {
    current: AtomicUsize,
    peak: AtomicUsize,
}

impl InFlight {
    fn enter(self: &Arc<Self>) -> InFlightGuard {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        InFlightGuard(Arc::clone(self))
    }

    pub(super) fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

/// Releases one in-flight slot on drop, including when the fetch panics.
struct InFlightGuard(Arc<InFlight>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.current.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Resolve one work item to exactly one outcome.
///
/// Items admitted after cancellation never reach the fetcher. The fetch runs
/// on its own task so it keeps making progress while the delivery loop is
/// busy with a slow sink, and so a panicking fetcher is contained to its item.
pub(super) async fn admit(ctx: Arc<AdmissionContext>, item: WorkItem) -> Outcome {
    if ctx.cancel.is_cancelled() || ctx.abandon.is_cancelled() {
        let error = FetchError::Cancelled {
            url: item.url().to_string(),
        };
        return ctx.report(Outcome::failure(item, error));
    }

    let url = match Url::parse(item.url()) {
        Ok(url) => url,
        Err(e) => {
            let error = FetchError::InvalidUrl {
                url: item.url().to_string(),
                reason: e.to_string(),
            };
            return ctx.report(Outcome::failure(item, error));
        }
    };

    let fallback = item.clone();
    let task_ctx = Arc::clone(&ctx);
    let outcome = match tokio::spawn(async move { task_ctx.fetch(item, url).await }).await {
        Ok(outcome) => outcome,
        Err(e) => {
            tracing::error!(index = fallback.index(), url = fallback.url(), error = %e, "Fetch task panicked");
            let error = FetchError::Internal {
                url: fallback.url().to_string(),
                message: e.to_string(),
            };
            Outcome::failure(fallback, error)
        }
    };
    ctx.report(outcome)
}

impl AdmissionContext {
    async fn fetch(&self, item: WorkItem, url: Url) -> Outcome {
        let _slot = self.in_flight.enter();
        tracing::debug!(index = item.index(), url = item.url(), "Fetching");
        self.event_tx
            .send(Event::FetchStarted {
                index: item.index(),
                url: item.url().to_string(),
            })
            .ok();

        let request = self.fetcher.fetch(&url);
        let deadline = async {
            match self.request_timeout {
                Some(limit) => match tokio::time::timeout(limit, request).await {
                    Ok(result) => result,
                    Err(_) => Err(FetchError::Timeout {
                        url: item.url().to_string(),
                        after: limit,
                    }),
                },
                None => request.await,
            }
        };

        let result = tokio::select! {
            biased;
            result = deadline => result,
            _ = self.cancel.cancelled(), if self.interrupt_in_flight => {
                Err(FetchError::Interrupted { url: item.url().to_string() })
            }
            _ = self.abandon.cancelled() => {
                Err(FetchError::Interrupted { url: item.url().to_string() })
            }
        };

        match result {
            Ok(body) => Outcome::success(item, body),
            Err(e) => {
                let error = e.with_url(item.url());
                Outcome::failure(item, error)
            }
        }
    }

    /// Log and broadcast an outcome on its way to the sink.
    fn report(&self, outcome: Outcome) -> Outcome {
        let event = match &outcome {
            Outcome::Success { item, length, .. } => {
                tracing::debug!(index = item.index(), url = item.url(), length, "Fetch completed");
                Event::FetchCompleted {
                    index: item.index(),
                    url: item.url().to_string(),
                    length: *length,
                }
            }
            Outcome::Failure { item, error } => {
                if error.is_cancelled() {
                    tracing::debug!(index = item.index(), url = item.url(), "Skipped, batch cancelled");
                } else {
                    tracing::warn!(index = item.index(), url = item.url(), error = %error, "Fetch failed");
                }
                Event::FetchFailed {
                    index: item.index(),
                    url: item.url().to_string(),
                    kind: error.kind(),
                    error: error.to_string(),
                }
            }
        };
        self.event_tx.send(event).ok();
        outcome
    }
}
