//! Configuration types for fetch-dispatch

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, path::Path, time::Duration};

/// Dispatcher behavior (concurrency ceiling, deadlines, cancellation policy)
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Maximum number of fetches in flight at once (default: 10)
    ///
    /// `1` degenerates to sequential fetching. Unbounded fetching is expressed
    /// as a ceiling equal to the number of items, see [`DispatchConfig::unbounded_for`].
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Per-request deadline (None = no deadline)
    ///
    /// An overrun is reported as a `Timeout` failure for that item and frees
    /// its concurrency slot immediately.
    #[serde(default, with = "optional_duration_serde")]
    pub request_timeout: Option<Duration>,

    /// Drop in-flight fetches when the batch is cancelled (default: false)
    ///
    /// When false, fetches that already started are allowed to finish and
    /// report their real outcome. When true, they are abandoned and reported
    /// as `Interrupted`.
    #[serde(default)]
    pub interrupt_in_flight: bool,

    /// Capacity of the broadcast channel used for [`Event`](crate::types::Event)s (default: 1024)
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,

    /// Buffer size of the channel behind [`Dispatcher::stream`](crate::Dispatcher::stream) (default: 64)
    #[serde(default = "default_sink_channel_capacity")]
    pub sink_channel_capacity: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            request_timeout: None,
            interrupt_in_flight: false,
            event_channel_capacity: default_event_channel_capacity(),
            sink_channel_capacity: default_sink_channel_capacity(),
        }
    }
}

impl DispatchConfig {
    /// One fetch at a time, in submission order
    pub fn sequential() -> Self {
        Self::bounded(1)
    }

    /// A fixed-size pool of `concurrency` workers
    pub fn bounded(concurrency: usize) -> Self {
        Self {
            concurrency,
            ..Self::default()
        }
    }

    /// Every item admitted at once (ceiling = item count, at least 1)
    pub fn unbounded_for(item_count: usize) -> Self {
        Self::bounded(item_count.max(1))
    }

    /// Set the per-request deadline
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Check the settings before any work starts
    pub fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            return Err(Error::config("concurrency", "concurrency must be at least 1"));
        }
        if self.request_timeout.is_some_and(|t| t.is_zero()) {
            return Err(Error::config(
                "request_timeout",
                "request_timeout must be greater than zero",
            ));
        }
        if self.event_channel_capacity == 0 {
            return Err(Error::config(
                "event_channel_capacity",
                "event_channel_capacity must be at least 1",
            ));
        }
        if self.sink_channel_capacity == 0 {
            return Err(Error::config(
                "sink_channel_capacity",
                "sink_channel_capacity must be at least 1",
            ));
        }
        Ok(())
    }
}

/// Settings for the reqwest-backed [`HttpFetcher`](crate::fetcher::HttpFetcher)
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HttpConfig {
    /// User-Agent header sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// TCP connect timeout (default: 10 seconds)
    #[serde(default = "default_connect_timeout", with = "duration_serde")]
    pub connect_timeout: Duration,

    /// Whole-request timeout applied by the client itself (None = none)
    ///
    /// Independent of [`DispatchConfig::request_timeout`]; a client timeout
    /// surfaces as a network error rather than a dispatcher timeout.
    #[serde(default, with = "optional_duration_serde")]
    pub request_timeout: Option<Duration>,

    /// Treat non-2xx responses as failures (default: true)
    ///
    /// When false, the body of any response is returned as a success.
    #[serde(default = "default_true")]
    pub error_for_status: bool,

    /// Extra headers sent with every request
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            connect_timeout: default_connect_timeout(),
            request_timeout: None,
            error_for_status: true,
            headers: HashMap::new(),
        }
    }
}

/// Main configuration
///
/// Fields are organized into sub-configs:
/// - [`dispatch`](DispatchConfig): concurrency ceiling, deadlines, cancellation
/// - [`http`](HttpConfig): transport settings for the default fetcher
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Dispatcher settings
    #[serde(default)]
    pub dispatch: DispatchConfig,

    /// HTTP transport settings
    #[serde(default)]
    pub http: HttpConfig,
}

impl Config {
    /// Load a JSON configuration file. Missing fields take their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&contents)?;
        config.validate()?;
        tracing::debug!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Validate every sub-config
    pub fn validate(&self) -> Result<()> {
        self.dispatch.validate()?;
        if self.http.connect_timeout.is_zero() {
            return Err(Error::config(
                "connect_timeout",
                "connect_timeout must be greater than zero",
            ));
        }
        Ok(())
    }
}

// Default value functions
fn default_concurrency() -> usize {
    10
}

fn default_event_channel_capacity() -> usize {
    1024
}

fn default_sink_channel_capacity() -> usize {
    64
}

fn default_user_agent() -> String {
    concat!("fetch-dispatch/", env!("CARGO_PKG_VERSION")).to_string()
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_true() -> bool {
    true
}

// Duration serialization helper (as seconds)
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_f64(duration.as_secs_f64())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}

// Optional Duration serialization helper
mod optional_duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match duration {
            Some(d) => serializer.serialize_some(&d.as_secs_f64()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = Option::<f64>::deserialize(deserializer)?;
        secs.map(|s| Duration::try_from_secs_f64(s).map_err(serde::de::Error::custom))
            .transpose()
    }
}
