//! # Cardfeed Types
//!
//! Core types, contract constants, and error definitions for Cardfeed.
//!
//! This crate provides the foundational type system for the Cardfeed engine:
//!
//! - **`contract`** - Column names, URI paths and capability tags shared with sources
//! - **`error`** - Typed error hierarchy for sources and configuration
//! - **`models`** - Domain models (Card, CardImage, GlobalId, notifications, config)
//!
//! ## Architecture Role
//!
//! `cardfeed-types` sits at the bottom of the dependency graph:
//!
//! ```text
//!                cardfeed-types (this crate)
//!                        │
//!                        ▼
//!                  cardfeed-core
//!                        │
//!                        ▼
//!                 cardfeed-server
//! ```
//!
//! All types are designed to be:
//! - **Serializable** via serde for the HTTP API
//! - **Clone** for cheap sharing across async boundaries
//! - **PartialEq** for testing and comparison

pub mod contract;
pub mod error;
pub mod models;

// Re-export error types for convenience
pub use error::{ConfigError, SourceError};

// Re-export core model types
pub use models::{
    sort_default, Card, CardAction, CardEvent, CardImage, Collection, FeedConfig, GlobalId,
    RawNotification, ResourceUri, Row, SourceDescriptor,
};
