//! Config file errors.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while loading, validating or saving the cardfeed config file.
#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "details")]
pub enum ConfigError {
    /// No config file at the given path
    #[error("Config not found: {path}")]
    NotFound {
        /// Path that was looked up
        path: String,
    },

    /// The file exists but could not be read
    #[error("Cannot read config {path}: {message}")]
    ReadFailed {
        /// Path being read
        path: String,
        /// Underlying I/O failure
        message: String,
    },

    /// The file is not a valid cardfeed config document
    #[error("Config parse error in {path}: {message}")]
    ParseError {
        /// Path being parsed
        path: String,
        /// serde_json's description of the failure
        message: String,
    },

    /// A field holds a value the engine cannot run with
    #[error("Config validation error for {field}: {message}")]
    ValidationError {
        /// Name of the field that failed validation
        field: String,
        /// Description of the validation failure
        message: String,
    },

    /// Writing the config (or its temp file) failed
    #[error("Cannot write config {path}: {message}")]
    WriteFailed {
        /// Path being written
        path: String,
        /// Underlying I/O or encoding failure
        message: String,
    },
}

impl ConfigError {
    pub fn read_failed(path: &Path, e: &std::io::Error) -> Self {
        Self::ReadFailed { path: path.display().to_string(), message: e.to_string() }
    }

    pub fn parse_failed(path: &Path, e: &serde_json::Error) -> Self {
        Self::ParseError { path: path.display().to_string(), message: e.to_string() }
    }

    pub fn write_failed(path: &Path, e: &dyn std::fmt::Display) -> Self {
        Self::WriteFailed { path: path.display().to_string(), message: e.to_string() }
    }

    /// Path the failure refers to, when there is one.
    pub fn path(&self) -> Option<&str> {
        match self {
            Self::NotFound { path }
            | Self::ReadFailed { path, .. }
            | Self::ParseError { path, .. }
            | Self::WriteFailed { path, .. } => Some(path),
            Self::ValidationError { .. } => None,
        }
    }
}
