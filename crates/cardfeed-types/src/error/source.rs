//! Data source errors.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while talking to a card source.
#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "details")]
pub enum SourceError {
    /// Source could not be reached (process gone, connection refused)
    #[error("Source {source_id} unreachable: {message}")]
    Unreachable {
        /// Source that failed to answer
        source_id: String,
        /// Transport-level description
        message: String,
    },

    /// Source did not answer within the fetch timeout
    #[error("Source {source_id} timed out after {after_ms}ms")]
    Timeout {
        /// Source that timed out
        source_id: String,
        /// Elapsed budget in milliseconds
        after_ms: u64,
    },

    /// Row returned by a source does not match the contract
    #[error("Malformed row: column {column}: {message}")]
    Malformed {
        /// Offending column
        column: String,
        /// What was wrong with it
        message: String,
    },

    /// Source answered with a non-success HTTP status
    #[error("Source {source_id} returned HTTP {status}")]
    Http {
        /// Source that answered
        source_id: String,
        /// HTTP status code
        status: u16,
    },

    /// Resource reference cannot be served by this source
    #[error("Unsupported resource: {uri}")]
    Unsupported {
        /// The rejected resource reference
        uri: String,
    },

    /// Subscription registration failed
    #[error("Subscription failed for {source_id}: {message}")]
    Subscription {
        /// Source the subscription targeted
        source_id: String,
        /// Failure description
        message: String,
    },

    /// Candidate could not be enumerated during discovery
    #[error("Discovery failed for candidate {candidate}: {message}")]
    Discovery {
        /// Identifier of the candidate, as far as it is known
        candidate: String,
        /// Failure description
        message: String,
    },
}

impl SourceError {
    /// Shorthand for a malformed-column error.
    pub fn malformed(column: &str, message: impl Into<String>) -> Self {
        Self::Malformed { column: column.to_string(), message: message.into() }
    }
}
