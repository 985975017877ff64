//! Collector configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// What the scrape loop does when a tick fails with a transport error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportErrorPolicy {
    /// Log the error, sleep the backoff interval, keep scraping. The last
    /// good snapshot stays published.
    #[default]
    Backoff,
    /// Log the error and stop the loop.
    Terminate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectorConfig {
    /// Interval between scrape ticks.
    #[serde(default = "default_scrape_interval_ms")]
    pub scrape_interval_ms: u64,

    /// Ceiling on the byte size of one contiguous read group.
    #[serde(default = "default_max_group_size_bytes")]
    pub max_group_size_bytes: usize,

    /// Number of read channels (queue pairs) to spread groups across.
    #[serde(default = "default_num_channels")]
    pub num_channels: usize,

    #[serde(default)]
    pub on_transport_error: TransportErrorPolicy,

    /// Sleep after a failed tick under the backoff policy.
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,

    /// How long `stop` waits for the worker to finish its current tick.
    #[serde(default = "default_stop_timeout_ms")]
    pub stop_timeout_ms: u64,
}

fn default_scrape_interval_ms() -> u64 {
    100
}
fn default_max_group_size_bytes() -> usize {
    64 * 1024
}
fn default_num_channels() -> usize {
    1
}
fn default_backoff_ms() -> u64 {
    1000
}
fn default_stop_timeout_ms() -> u64 {
    5000
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            scrape_interval_ms: default_scrape_interval_ms(),
            max_group_size_bytes: default_max_group_size_bytes(),
            num_channels: default_num_channels(),
            on_transport_error: TransportErrorPolicy::default(),
            backoff_ms: default_backoff_ms(),
            stop_timeout_ms: default_stop_timeout_ms(),
        }
    }
}

impl CollectorConfig {
    pub fn scrape_interval(&self) -> Duration {
        Duration::from_millis(self.scrape_interval_ms)
    }

    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }
}
