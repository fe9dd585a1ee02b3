//! Configuration for a sweep run

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Runtime knobs for the cleanup orchestrator.
///
/// Plain data; callers build it from their own CLI/config layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepOptions {
    /// Deadline per dependency node in seconds; on expiry the node is
    /// marked degraded-done so the graph still drains. 0 disables the
    /// deadline.
    pub node_timeout_secs: u64,
    /// How many times one item's delete is attempted before its failure
    /// is recorded. Only retryable errors (conflict, throttling) are
    /// retried.
    pub max_delete_attempts: u32,
    /// Initial delay between delete retries, in milliseconds.
    pub retry_initial_delay_ms: u64,
    /// Maximum delay between delete retries, in milliseconds.
    pub retry_max_delay_ms: u64,
}

impl Default for SweepOptions {
    fn default() -> Self {
        Self {
            node_timeout_secs: 600,
            max_delete_attempts: 3,
            retry_initial_delay_ms: 200,
            retry_max_delay_ms: 2_000,
        }
    }
}

impl SweepOptions {
    /// The per-node deadline, `None` when disabled.
    pub fn node_deadline(&self) -> Option<Duration> {
        (self.node_timeout_secs > 0).then(|| Duration::from_secs(self.node_timeout_secs))
    }

    pub fn retry_initial_delay(&self) -> Duration {
        Duration::from_millis(self.retry_initial_delay_ms)
    }

    pub fn retry_max_delay(&self) -> Duration {
        Duration::from_millis(self.retry_max_delay_ms)
    }
}
