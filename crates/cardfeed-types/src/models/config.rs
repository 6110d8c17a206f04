//! Engine configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::contract::{FEED_READ_PERM, FEED_WRITE_PERM};
use crate::error::ConfigError;

/// Capability tags a source must advertise to be eligible.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityConfig {
    pub read: String,
    pub write: String,
}

impl Default for CapabilityConfig {
    fn default() -> Self {
        Self { read: FEED_READ_PERM.to_string(), write: FEED_WRITE_PERM.to_string() }
    }
}

/// A remote source reachable over HTTP, as listed in the config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceEndpointConfig {
    pub source_id: String,
    pub base_url: String,
    #[serde(default)]
    pub read_permission: Option<String>,
    #[serde(default)]
    pub write_permission: Option<String>,
}

/// Full engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    /// Capacity of the change dispatcher queue
    pub queue_capacity: usize,
    /// Per-fetch timeout in seconds
    pub fetch_timeout_secs: u64,
    /// Listener calls slower than this are logged
    pub listener_warn_ms: u64,
    /// Required capability pair
    pub capabilities: CapabilityConfig,
    /// Remote sources for the HTTP provider
    pub sources: Vec<SourceEndpointConfig>,
}

impl FeedConfig {
    pub fn new() -> Self {
        Self {
            queue_capacity: 256,
            fetch_timeout_secs: 10,
            listener_warn_ms: 250,
            capabilities: CapabilityConfig::default(),
            sources: Vec::new(),
        }
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn listener_warn_threshold(&self) -> Duration {
        Duration::from_millis(self.listener_warn_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.queue_capacity == 0 {
            return Err(ConfigError::ValidationError {
                field: "queue_capacity".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.fetch_timeout_secs == 0 {
            return Err(ConfigError::ValidationError {
                field: "fetch_timeout_secs".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if let Some(entry) = self.sources.iter().find(|s| s.source_id.trim().is_empty()) {
            return Err(ConfigError::ValidationError {
                field: "sources.source_id".to_string(),
                message: format!("empty source id for {}", entry.base_url),
            });
        }
        Ok(())
    }
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self::new()
    }
}
