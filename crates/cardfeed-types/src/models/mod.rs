//! Core domain models for Cardfeed.
//!
//! This module contains all shared data structures used across the Cardfeed crates.

mod card;
mod config;
mod global_id;
mod notification;
mod source;
mod uri;

pub use card::{sort_default, Card, CardAction, CardImage, Row};
pub use config::{CapabilityConfig, FeedConfig, SourceEndpointConfig};
pub use global_id::GlobalId;
pub use notification::{CardEvent, RawNotification};
pub use source::SourceDescriptor;
pub use uri::{Collection, ResourceUri};
