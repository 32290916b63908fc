//! Outcome consumers.
//!
//! The dispatcher delivers outcomes through a single loop, so a sink is only
//! ever called from one task at a time and needs no internal locking.

use crate::types::{BatchSummary, Outcome};
use tokio::sync::mpsc;

/// Receives every outcome of a batch in completion order, then an end-of-batch signal.
#[async_trait::async_trait]
pub trait ResultSink: Send {
    /// Called exactly once per work item
    async fn accept(&mut self, outcome: Outcome);

    /// Called once after the last `accept`
    async fn finish(&mut self, _summary: &BatchSummary) {}
}

/// Collects outcomes in memory, either in completion order or slotted by item index.
#[derive(Debug, Default)]
pub struct CollectingSink {
    slots: Vec<Option<Outcome>>,
    arrived: Vec<Outcome>,
    ordered: bool,
}

impl CollectingSink {
    /// Keep outcomes in the order they complete
    pub fn completion_order() -> Self {
        Self::default()
    }

    /// Reorder outcomes by item index; `len` is the batch size
    pub fn submission_order(len: usize) -> Self {
        Self {
            slots: std::iter::repeat_with(|| None).take(len).collect(),
            arrived: Vec::new(),
            ordered: true,
        }
    }

    /// Number of outcomes received so far
    pub fn len(&self) -> usize {
        if self.ordered {
            self.slots.iter().filter(|s| s.is_some()).count()
        } else {
            self.arrived.len()
        }
    }

    /// True when nothing has been received
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Consume the sink and return the collected outcomes
    pub fn into_outcomes(self) -> Vec<Outcome> {
        if self.ordered {
            self.slots.into_iter().flatten().collect()
        } else {
            self.arrived
        }
    }
}

#[async_trait::async_trait]
impl ResultSink for CollectingSink {
    async fn accept(&mut self, outcome: Outcome) {
        if !self.ordered {
            self.arrived.push(outcome);
            return;
        }
        let index = outcome.index();
        match self.slots.get_mut(index) {
            Some(slot) if slot.is_none() => *slot = Some(outcome),
            Some(_) => {
                tracing::error!(index, "Duplicate outcome for work item, keeping the first");
            }
            None => {
                tracing::error!(index, len = self.slots.len(), "Outcome index out of range");
            }
        }
    }
}

/// Forwards outcomes into a bounded channel.
///
/// A slow receiver applies backpressure to delivery. A dropped receiver is
/// logged once and later outcomes are discarded; the batch still runs to
/// completion.
#[derive(Debug)]
pub struct ChannelSink {
    tx: mpsc::Sender<Outcome>,
    closed: bool,
}

impl ChannelSink {
    /// Wrap a sender
    pub fn new(tx: mpsc::Sender<Outcome>) -> Self {
        Self { tx, closed: false }
    }
}

#[async_trait::async_trait]
impl ResultSink for ChannelSink {
    async fn accept(&mut self, outcome: Outcome) {
        if self.closed {
            return;
        }
        if let Err(e) = self.tx.send(outcome).await {
            tracing::warn!(index = e.0.index(), "Outcome receiver dropped, discarding remaining outcomes");
            self.closed = true;
        }
    }
}

/// Logs each outcome through `tracing` and keeps nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingSink;

#[async_trait::async_trait]
impl ResultSink for LoggingSink {
    async fn accept(&mut self, outcome: Outcome) {
        match &outcome {
            Outcome::Success { item, length, .. } => {
                tracing::debug!(index = item.index(), url = item.url(), length, "Got response");
            }
            Outcome::Failure { item, error } => {
                tracing::debug!(index = item.index(), url = item.url(), error = %error, "No response");
            }
        }
    }

    async fn finish(&mut self, summary: &BatchSummary) {
        tracing::debug!(
            total = summary.total,
            succeeded = summary.succeeded,
            failed = summary.failed,
            cancelled = summary.cancelled,
            total_bytes = summary.total_bytes,
            elapsed_ms = summary.elapsed.as_millis() as u64,
            "Done fetching"
        );
    }
}

/// Adapts a closure into a sink; the end-of-batch signal is ignored.
pub struct FnSink<F>(pub F);

#[async_trait::async_trait]
impl<F> ResultSink for FnSink<F>
where
    F: FnMut(Outcome) + Send,
{
    async fn accept(&mut self, outcome: Outcome) {
        (self.0)(outcome)
    }
}
