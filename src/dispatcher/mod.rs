//! Bounded-concurrency dispatcher.
//!
//! Split into focused submodules:
//! - [`admission`] - per-item cancellation check, URL parsing, deadline, outcome reporting
//!
//! Admission is a sliding window: at most `concurrency` items are in flight,
//! and as soon as one resolves the next pending item (FIFO) is started. Every
//! item yields exactly one [`Outcome`]; a failing item never affects another.
//!
//! Delivery to the [`ResultSink`] is a separate serialized loop fed by a
//! queue, so admission keeps going while the sink is busy.

mod admission;


use std::sync::Arc;
use std::time::Instant;

use futures::stream::{self, StreamExt};
use tokio::sync::{broadcast, mpsc};
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;

use crate::config::{Config, DispatchConfig};
use crate::error::Result;
use crate::fetcher::{Fetcher, HttpFetcher};
use crate::sink::{ChannelSink, CollectingSink, ResultSink};
use crate::types::{BatchReport, BatchSummary, Event, Outcome, WorkItem};

use admission::{AdmissionContext, InFlight, admit};

/// Runs batches of URLs through a [`Fetcher`] under a fixed concurrency ceiling.
///
/// The dispatcher is cheap to clone; clones share the fetcher and the event
/// channel. Each `run_*` call is an independent batch with its own in-flight
/// accounting.
///
/// # Example
///
/// ```no_run
/// use fetch_dispatch::{Config, Dispatcher};
///
/// # async fn example() -> fetch_dispatch::Result<()> {
/// let dispatcher = Dispatcher::from_config(&Config::default())?;
/// let report = dispatcher
///     .run_batch(["https://example.com/", "https://example.org/"])
///     .await;
/// for outcome in &report.outcomes {
///     println!("{} -> {:?}", outcome.item().url(), outcome.length());
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Dispatcher {
    fetcher: Arc<dyn Fetcher>,
    config: Arc<DispatchConfig>,
    event_tx: broadcast::Sender<Event>,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("config", &self.config)
            .field("subscribers", &self.event_tx.receiver_count())
            .finish_non_exhaustive()
    }
}

impl Dispatcher {
    /// Create a dispatcher around an injected fetcher.
    ///
    /// Fails with [`Error::Config`](crate::Error::Config) if the settings are
    /// invalid (e.g. a concurrency of 0); no work can start with them.
    pub fn new(fetcher: Arc<dyn Fetcher>, config: DispatchConfig) -> Result<Self> {
        config.validate()?;
        let (event_tx, _) = broadcast::channel(config.event_channel_capacity);
        Ok(Self {
            fetcher,
            config: Arc::new(config),
            event_tx,
        })
    }

    /// Create a dispatcher backed by an [`HttpFetcher`] built from `config.http`.
    pub fn from_config(config: &Config) -> Result<Self> {
        config.validate()?;
        let fetcher = HttpFetcher::new(&config.http)?;
        Self::new(Arc::new(fetcher), config.dispatch.clone())
    }

    /// The active dispatch settings
    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// Subscribe to per-fetch and end-of-batch [`Event`]s.
    ///
    /// Events are broadcast; a receiver that falls behind by more than
    /// `event_channel_capacity` events observes a `Lagged` error.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Fetch every URL and return one outcome per input, in submission order.
    pub async fn run_batch<I, S>(&self, urls: I) -> BatchReport
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.run_batch_cancellable(urls, CancellationToken::new())
            .await
    }

    /// Like [`run_batch`](Self::run_batch), stopping admission when `cancel` fires.
    ///
    /// Items that never started are reported as
    /// [`FetchError::Cancelled`](crate::FetchError::Cancelled).
    pub async fn run_batch_cancellable<I, S>(&self, urls: I, cancel: CancellationToken) -> BatchReport
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let items = WorkItem::from_urls(urls);
        let mut sink = CollectingSink::submission_order(items.len());
        let summary = self.dispatch(items, &mut sink, cancel).await;
        BatchReport {
            outcomes: sink.into_outcomes(),
            summary,
        }
    }

    /// Deliver outcomes to `sink` in completion order.
    ///
    /// Calls to the sink are serialized. `finish` is called once after the
    /// last outcome, and the future resolves only after that.
    pub async fn run_streaming<I, S, K>(
        &self,
        urls: I,
        sink: &mut K,
        cancel: CancellationToken,
    ) -> BatchSummary
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        K: ResultSink + ?Sized,
    {
        self.dispatch(WorkItem::from_urls(urls), sink, cancel).await
    }

    /// Run the batch on a background task and expose outcomes as a stream.
    ///
    /// The stream ends after the last outcome. Dropping the stream does not
    /// cancel the batch; use `cancel` for that. Must be called from within a
    /// tokio runtime.
    pub fn stream<I, S>(&self, urls: I, cancel: CancellationToken) -> ReceiverStream<Outcome>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let items = WorkItem::from_urls(urls);
        let (tx, rx) = mpsc::channel(self.config.sink_channel_capacity);
        let dispatcher = self.clone();
        tokio::spawn(async move {
            let mut sink = ChannelSink::new(tx);
            dispatcher.dispatch(items, &mut sink, cancel).await;
        });
        ReceiverStream::new(rx)
    }

    async fn dispatch<K>(
        &self,
        items: Vec<WorkItem>,
        sink: &mut K,
        cancel: CancellationToken,
    ) -> BatchSummary
    where
        K: ResultSink + ?Sized,
    {
        let started = Instant::now();
        let mut summary = BatchSummary::new(items.len());
        let abandon = CancellationToken::new();
        let _abandon_on_drop = abandon.clone().drop_guard();

        tracing::debug!(
            items = items.len(),
            concurrency = self.config.concurrency,
            "Starting batch"
        );

        let ctx = Arc::new(AdmissionContext {
            fetcher: Arc::clone(&self.fetcher),
            event_tx: self.event_tx.clone(),
            in_flight: Arc::new(InFlight::default()),
            cancel,
            abandon,
            request_timeout: self.config.request_timeout,
            interrupt_in_flight: self.config.interrupt_in_flight,
        });

        // Admission keeps refilling slots while the sink is busy; outcomes
        // queue until the delivery loop takes them.
        let (outcome_tx, mut outcome_rx) = mpsc::unbounded_channel();
        let window_ctx = Arc::clone(&ctx);
        let concurrency = self.config.concurrency;
        let admission = async move {
            let mut outcomes = stream::iter(items)
                .map(move |item| admit(Arc::clone(&window_ctx), item))
                .buffer_unordered(concurrency);
            while let Some(outcome) = outcomes.next().await {
                if outcome_tx.send(outcome).is_err() {
                    break;
                }
            }
        };
        let delivery = async {
            while let Some(outcome) = outcome_rx.recv().await {
                summary.record(&outcome);
                sink.accept(outcome).await;
            }
        };
        tokio::join!(admission, delivery);

        summary.peak_in_flight = ctx.in_flight.peak();
        summary.elapsed = started.elapsed();
        sink.finish(&summary).await;

        tracing::debug!(
            total = summary.total,
            succeeded = summary.succeeded,
            failed = summary.failed,
            cancelled = summary.cancelled,
            peak_in_flight = summary.peak_in_flight,
            elapsed_ms = summary.elapsed.as_millis() as u64,
            "Batch finished"
        );
        self.event_tx
            .send(Event::BatchFinished {
                summary: summary.clone(),
            })
            .ok();

        summary
    }
}
