//! # Cardfeed Core
//!
//! Aggregates card records published by independently discovered sources into
//! one in-memory cache and keeps it in sync through pushed change
//! notifications.
//!
//! ## Architecture
//!
//! ```text
//! SourceProvider ──▶ SourceRegistry          (discovery by capability)
//!                          │
//! DataSource ──notify──▶ Dispatcher          (single worker, ordered queue)
//!                          │
//!                          ▼
//!                    Synchronizer ──▶ CardStore   (source id -> local id -> card)
//!                          │
//!                          ▼
//!                    ListenerSlot ──▶ CardFeedListener
//! ```
//!
//! The dispatcher worker is the only writer of the store after startup; reads
//! go straight to the store from any thread.

#![allow(
    clippy::significant_drop_tightening,
    reason = "Lock guards in async code require careful lifetime management"
)]
#![cfg_attr(
    test,
    allow(clippy::panic, clippy::needless_collect, clippy::assertions_on_result_states)
)]

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod listener;
pub mod manager;
pub mod registry;
pub mod routes;
pub mod source;
pub mod store;
pub mod synchronizer;

pub use dispatcher::{DispatcherStatsSnapshot, NotificationSink};
pub use error::{FeedError, FeedResult};
pub use listener::{BroadcastListener, CardFeedListener, ListenerSlot};
pub use manager::{CardFeedManager, FeedStats};
pub use registry::{RegisteredSource, SourceRegistry};
pub use source::{
    DataSource, HttpDataSource, HttpSourceProvider, MemorySource, NotificationHub, QueryRequest,
    SourceCandidate, SourceProvider, StaticSourceProvider, Subscription,
};
pub use store::CardStore;
pub use synchronizer::{ReconcileSummary, Synchronizer};
