//! Core types: work items, outcomes, batch summaries and events

use crate::error::{ErrorKind, FetchError};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// One unit of input: a URL string and its position in the submitted order
///
/// Immutable once created. The string is kept exactly as submitted; it is
/// parsed only when the item is admitted.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkItem {
    index: usize,
    url: String,
}

impl WorkItem {
    /// Create a work item
    pub fn new(index: usize, url: impl Into<String>) -> Self {
        Self {
            index,
            url: url.into(),
        }
    }

    /// Number the inputs in submission order
    pub fn from_urls<I, S>(urls: I) -> Vec<WorkItem>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        urls.into_iter()
            .enumerate()
            .map(|(index, url)| WorkItem::new(index, url))
            .collect()
    }

    /// Position in the submitted order
    pub fn index(&self) -> usize {
        self.index
    }

    /// The URL exactly as submitted
    pub fn url(&self) -> &str {
        &self.url
    }
}

/// Terminal result of one [`WorkItem`]
#[derive(Clone, Debug)]
pub enum Outcome {
    /// The body was fetched
    Success {
        /// The item that was fetched
        item: WorkItem,
        /// Raw response body
        body: Bytes,
        /// Body length in bytes
        length: usize,
    },
    /// The item failed; siblings are unaffected
    Failure {
        /// The item that failed
        item: WorkItem,
        /// Why it failed
        error: FetchError,
    },
}

impl Outcome {
    pub(crate) fn success(item: WorkItem, body: Bytes) -> Self {
        let length = body.len();
        Outcome::Success { item, body, length }
    }

    pub(crate) fn failure(item: WorkItem, error: FetchError) -> Self {
        Outcome::Failure { item, error }
    }

    /// The item this outcome belongs to
    pub fn item(&self) -> &WorkItem {
        match self {
            Outcome::Success { item, .. } | Outcome::Failure { item, .. } => item,
        }
    }

    /// Shorthand for `self.item().index()`
    pub fn index(&self) -> usize {
        self.item().index()
    }

    /// True for [`Outcome::Success`]
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success { .. })
    }

    /// Body length for successes
    pub fn length(&self) -> Option<usize> {
        match self {
            Outcome::Success { length, .. } => Some(*length),
            Outcome::Failure { .. } => None,
        }
    }

    /// The failure, if any
    pub fn error(&self) -> Option<&FetchError> {
        match self {
            Outcome::Success { .. } => None,
            Outcome::Failure { error, .. } => Some(error),
        }
    }

    /// The failure classification, if any
    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.error().map(FetchError::kind)
    }
}

/// Aggregate accounting of a finished batch
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    /// Number of work items submitted
    pub total: usize,
    /// Items that produced a body
    pub succeeded: usize,
    /// Items that failed for any reason other than cancellation
    pub failed: usize,
    /// Items never started because the batch was cancelled
    pub cancelled: usize,
    /// Sum of all successful body lengths
    pub total_bytes: u64,
    /// Highest number of fetches observed in flight at once
    pub peak_in_flight: usize,
    /// When the batch started
    pub started_at: DateTime<Utc>,
    /// Wall-clock duration of the batch
    pub elapsed: Duration,
}

impl BatchSummary {
    pub(crate) fn new(total: usize) -> Self {
        Self {
            total,
            succeeded: 0,
            failed: 0,
            cancelled: 0,
            total_bytes: 0,
            peak_in_flight: 0,
            started_at: Utc::now(),
            elapsed: Duration::ZERO,
        }
    }

    /// Account for one delivered outcome
    pub(crate) fn record(&mut self, outcome: &Outcome) {
        match outcome {
            Outcome::Success { length, .. } => {
                self.succeeded += 1;
                self.total_bytes += *length as u64;
            }
            Outcome::Failure { error, .. } if error.is_cancelled() => self.cancelled += 1,
            Outcome::Failure { .. } => self.failed += 1,
        }
    }

    /// Number of outcomes accounted for so far
    pub fn delivered(&self) -> usize {
        self.succeeded + self.failed + self.cancelled
    }

    /// True when every submitted item has an outcome
    pub fn is_complete(&self) -> bool {
        self.delivered() == self.total
    }
}

/// Result of an order-preserving batch
#[derive(Clone, Debug)]
pub struct BatchReport {
    /// One outcome per submitted item, in submission order
    pub outcomes: Vec<Outcome>,
    /// Aggregate accounting
    pub summary: BatchSummary,
}

/// Observability events broadcast by the dispatcher
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A fetch was admitted and handed to the fetcher
    FetchStarted {
        /// Item position
        index: usize,
        /// Item URL
        url: String,
    },

    /// A fetch produced a body
    FetchCompleted {
        /// Item position
        index: usize,
        /// Item URL
        url: String,
        /// Body length in bytes
        length: usize,
    },

    /// An item failed (including cancellation)
    FetchFailed {
        /// Item position
        index: usize,
        /// Item URL
        url: String,
        /// Failure classification
        kind: ErrorKind,
        /// Error message
        error: String,
    },

    /// Every item has an outcome
    BatchFinished {
        /// Final accounting
        summary: BatchSummary,
    },
}
