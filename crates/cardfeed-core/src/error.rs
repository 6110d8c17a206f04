//! Unified error types for Cardfeed Core.

use cardfeed_types::{ConfigError, SourceError};
use serde::Serialize;
use thiserror::Error;

/// Main error type for all engine operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum FeedError {
    /// A source could not be queried or subscribed to.
    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    /// Configuration loading or validation failed.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The referenced source is not registered.
    #[error("Unknown source: {0}")]
    UnknownSource(String),

    /// An item notification carried no usable local id.
    #[error("No item id in {0}")]
    MissingItemId(String),

    /// HTTP client could not be constructed.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}

impl Serialize for FeedError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.to_string().as_str())
    }
}

/// Result type alias for engine operations.
pub type FeedResult<T> = Result<T, FeedError>;
