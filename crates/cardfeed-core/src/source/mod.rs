//! Data source collaborator boundary.
//!
//! A source publishes two collections (cards and card images) that can be
//! queried, and pushes change notifications to subscribers. Sources are found
//! through a [`SourceProvider`], which only enumerates candidates; eligibility
//! is decided by the registry.

mod http;
mod hub;
mod memory;

pub use http::{HttpDataSource, HttpSourceProvider};
pub use hub::NotificationHub;
pub use memory::MemorySource;

use async_trait::async_trait;
use cardfeed_types::contract::{data_card, data_card_image};
use cardfeed_types::{Collection, ResourceUri, Row, SourceDescriptor, SourceError};
use std::fmt;
use std::sync::Arc;

use crate::dispatcher::NotificationSink;

pub type SourceResult<T> = Result<T, SourceError>;

/// Ascending order on one column; every sort in the data contract is ascending.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortOrder {
    pub column: &'static str,
}

impl SortOrder {
    pub const fn asc(column: &'static str) -> Self {
        Self { column }
    }

    /// Cards: priority ascending.
    pub const fn cards_default() -> Self {
        Self::asc(data_card::SORT_DEFAULT_COL)
    }

    /// Images: owning card id ascending.
    pub const fn images_default() -> Self {
        Self::asc(data_card_image::SORT_DEFAULT_COL)
    }

    /// Used for single-card fetches.
    pub const fn by_created() -> Self {
        Self::asc(data_card::DATE_CREATED_COL)
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ASC", self.column)
    }
}

/// `query(projection, filter = none, sort)` against one collection or item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryRequest {
    pub uri: ResourceUri,
    pub projection: &'static [&'static str],
    pub sort: SortOrder,
}

impl QueryRequest {
    pub fn all_cards(descriptor: &SourceDescriptor) -> Self {
        Self {
            uri: descriptor.cards_uri.clone(),
            projection: data_card::PROJECTION_ALL,
            sort: SortOrder::cards_default(),
        }
    }

    pub fn all_images(descriptor: &SourceDescriptor) -> Self {
        Self {
            uri: descriptor.images_uri.clone(),
            projection: data_card_image::PROJECTION_ALL,
            sort: SortOrder::images_default(),
        }
    }

    pub fn card_item(uri: ResourceUri) -> Self {
        Self { uri, projection: data_card::PROJECTION_ALL, sort: SortOrder::by_created() }
    }

    pub fn image_item(uri: ResourceUri) -> Self {
        Self { uri, projection: data_card_image::PROJECTION_ALL, sort: SortOrder::images_default() }
    }
}

/// Client for one source.
#[async_trait]
pub trait DataSource: Send + Sync {
    /// Rows at `request.uri`, restricted to the projection and ordered by `sort`.
    /// An item URI yields at most one row; zero rows means the item is gone.
    async fn query(&self, request: &QueryRequest) -> SourceResult<Vec<Row>>;

    /// Register `sink` for notifications on `collection` and its items.
    async fn subscribe(
        &self,
        collection: Collection,
        sink: NotificationSink,
    ) -> SourceResult<Subscription>;
}

/// Registration handle returned by [`DataSource::subscribe`].
///
/// Released explicitly with [`Subscription::unsubscribe`] or on drop.
pub struct Subscription {
    source_id: String,
    collection: Collection,
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new(
        source_id: impl Into<String>,
        collection: Collection,
        release: impl FnOnce() + Send + 'static,
    ) -> Self {
        Self { source_id: source_id.into(), collection, release: Some(Box::new(release)) }
    }

    pub fn source_id(&self) -> &str {
        &self.source_id
    }

    pub fn collection(&self) -> Collection {
        self.collection
    }

    pub fn unsubscribe(mut self) {
        self.release_now();
    }

    fn release_now(&mut self) {
        if let Some(release) = self.release.take() {
            tracing::debug!("Unsubscribing from {} {:?}", self.source_id, self.collection);
            release();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release_now();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("source_id", &self.source_id)
            .field("collection", &self.collection)
            .field("active", &self.release.is_some())
            .finish()
    }
}

/// A component that might be a card source, with the capabilities it advertises.
#[derive(Clone)]
pub struct SourceCandidate {
    pub source_id: String,
    pub read_capability: Option<String>,
    pub write_capability: Option<String>,
    pub client: Arc<dyn DataSource>,
}

impl fmt::Debug for SourceCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceCandidate")
            .field("source_id", &self.source_id)
            .field("read_capability", &self.read_capability)
            .field("write_capability", &self.write_capability)
            .finish_non_exhaustive()
    }
}

/// Discovery strategy: lists candidates, one result per candidate so that a
/// single broken candidate does not hide the others.
#[async_trait]
pub trait SourceProvider: Send + Sync {
    async fn enumerate(&self) -> Vec<SourceResult<SourceCandidate>>;
}

/// Provider over a fixed candidate list.
#[derive(Default, Clone)]
pub struct StaticSourceProvider {
    candidates: Vec<SourceResult<SourceCandidate>>,
}

impl StaticSourceProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, candidate: SourceCandidate) -> Self {
        self.candidates.push(Ok(candidate));
        self
    }

    /// Add a candidate whose enumeration fails.
    pub fn with_failure(mut self, error: SourceError) -> Self {
        self.candidates.push(Err(error));
        self
    }
}

#[async_trait]
impl SourceProvider for StaticSourceProvider {
    async fn enumerate(&self) -> Vec<SourceResult<SourceCandidate>> {
        self.candidates.clone()
    }
}
