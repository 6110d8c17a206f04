//! Synchronizer: applies classified changes to the cache store.
//!
//! Every method runs on the dispatcher worker. Each one fetches what it needs
//! from the originating source, commits to the store, then emits the matching
//! listener event. Fetch failures leave the store untouched.

use cardfeed_types::{Card, CardEvent, CardImage, GlobalId, ResourceUri, Row, SourceError};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

use crate::error::{FeedError, FeedResult};
use crate::listener::ListenerSlot;
use crate::registry::{RegisteredSource, SourceRegistry};
use crate::source::QueryRequest;
use crate::store::CardStore;

/// Outcome of reconciling a source after a collection-level change.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileSummary {
    pub upserted: usize,
    pub deleted: usize,
    pub unchanged: usize,
}

pub struct Synchronizer {
    registry: Arc<SourceRegistry>,
    store: Arc<CardStore>,
    listeners: Arc<ListenerSlot>,
    fetch_timeout: Duration,
}

impl Synchronizer {
    pub fn new(
        registry: Arc<SourceRegistry>,
        store: Arc<CardStore>,
        listeners: Arc<ListenerSlot>,
        fetch_timeout: Duration,
    ) -> Self {
        Self { registry, store, listeners, fetch_timeout }
    }

    /// Fetch the single card at `item_uri` and cache it.
    ///
    /// Zero rows means a later delete already won the race: nothing changes.
    pub async fn on_item_upsert(
        &self,
        source_id: &str,
        item_uri: &ResourceUri,
    ) -> FeedResult<Option<GlobalId>> {
        let source = self.source(source_id)?;
        let rows = self.fetch(&source, QueryRequest::card_item(item_uri.clone())).await?;
        let Some(row) = rows.first() else {
            tracing::debug!("{} is gone, skipping upsert", item_uri);
            return Ok(None);
        };

        let mut card = Card::from_row(source_id, row)?;
        card.images = self.store.images_for_card(source_id, card.id);
        Ok(Some(self.commit_upsert(card)))
    }

    /// Drop the card named by the trailing id of `item_uri`.
    ///
    /// The emitted id is taken from the removed card. Unknown ids are a no-op.
    pub async fn on_item_delete(
        &self,
        source_id: &str,
        item_uri: &ResourceUri,
    ) -> FeedResult<Option<GlobalId>> {
        let local_id =
            item_uri.last_id().ok_or_else(|| FeedError::MissingItemId(item_uri.to_string()))?;

        let Some(prior) = self.store.delete(source_id, local_id) else {
            tracing::debug!("Delete for unknown card {}/{}", source_id, local_id);
            return Ok(None);
        };
        self.store.remove_images_for_card(source_id, local_id);

        let global_id = prior.global_id();
        self.listeners.emit(&CardEvent::Delete { global_id: global_id.clone() });
        Ok(Some(global_id))
    }

    /// Fetch one image, index it and refresh the card(s) it belongs to.
    ///
    /// Returns the ids of the cached cards that changed.
    pub async fn on_image_upsert(
        &self,
        source_id: &str,
        item_uri: &ResourceUri,
    ) -> FeedResult<Vec<GlobalId>> {
        let source = self.source(source_id)?;
        let rows = self.fetch(&source, QueryRequest::image_item(item_uri.clone())).await?;
        let Some(row) = rows.first() else {
            tracing::debug!("{} is gone, skipping image upsert", item_uri);
            return Ok(Vec::new());
        };

        let image = CardImage::from_row(row)?;
        let owner = image.data_card_id;
        let prior = self.store.upsert_image(source_id, image);

        let mut owners = BTreeSet::from([owner]);
        if let Some(prior) = prior {
            owners.insert(prior.data_card_id);
        }
        Ok(owners.into_iter().filter_map(|card_id| self.reattach(source_id, card_id)).collect())
    }

    /// Remove one image from the index and refresh its card.
    pub async fn on_image_delete(
        &self,
        source_id: &str,
        item_uri: &ResourceUri,
    ) -> FeedResult<Vec<GlobalId>> {
        let image_id =
            item_uri.last_id().ok_or_else(|| FeedError::MissingItemId(item_uri.to_string()))?;

        let Some(prior) = self.store.delete_image(source_id, image_id) else {
            return Ok(Vec::new());
        };
        Ok(self.reattach(source_id, prior.data_card_id).into_iter().collect())
    }

    /// Full load of one source into its partition. Emits no events.
    pub async fn initial_load(&self, source_id: &str) -> FeedResult<usize> {
        let source = self.source(source_id)?;
        let (cards, images) = self.load(&source).await?;
        let count = cards.len();

        self.store.replace_images(source_id, images);
        self.store.replace_partition(source_id, cards);
        Ok(count)
    }

    /// Re-fetch both collections of a source and apply only the differences.
    ///
    /// New or changed cards emit insert-or-update, vanished cards emit delete.
    /// Entries are replaced one at a time so readers never see the partition
    /// empty.
    pub async fn on_collection_changed(&self, source_id: &str) -> FeedResult<ReconcileSummary> {
        let source = self.source(source_id)?;
        let (cards, images) = self.load(&source).await?;

        let mut previous = self.store.partition_snapshot(source_id);
        self.store.replace_images(source_id, images);

        let mut summary = ReconcileSummary::default();
        for card in cards {
            match previous.remove(&card.id) {
                Some(old) if old == card => summary.unchanged += 1,
                _ => {
                    self.commit_upsert(card);
                    summary.upserted += 1;
                },
            }
        }

        let mut vanished: Vec<u64> = previous.into_keys().collect();
        vanished.sort_unstable();
        for local_id in vanished {
            if let Some(prior) = self.store.delete(source_id, local_id) {
                self.listeners.emit(&CardEvent::Delete { global_id: prior.global_id() });
                summary.deleted += 1;
            }
        }

        tracing::info!(
            "Reconciled {}: {} upserted, {} deleted, {} unchanged",
            source_id,
            summary.upserted,
            summary.deleted,
            summary.unchanged
        );
        Ok(summary)
    }

    fn source(&self, source_id: &str) -> FeedResult<RegisteredSource> {
        self.registry.get(source_id).ok_or_else(|| FeedError::UnknownSource(source_id.to_string()))
    }

    async fn fetch(&self, source: &RegisteredSource, request: QueryRequest) -> FeedResult<Vec<Row>> {
        match tokio::time::timeout(self.fetch_timeout, source.client.query(&request)).await {
            Ok(rows) => Ok(rows?),
            Err(_) => Err(SourceError::Timeout {
                source_id: source.source_id().to_string(),
                after_ms: u64::try_from(self.fetch_timeout.as_millis()).unwrap_or(u64::MAX),
            }
            .into()),
        }
    }

    /// Both collections, parsed, with images attached. Malformed rows are
    /// skipped so one bad record cannot block a whole source.
    async fn load(&self, source: &RegisteredSource) -> FeedResult<(Vec<Card>, Vec<CardImage>)> {
        let source_id = source.source_id();
        let card_rows = self.fetch(source, QueryRequest::all_cards(&source.descriptor)).await?;
        let image_rows = self.fetch(source, QueryRequest::all_images(&source.descriptor)).await?;

        let mut images: Vec<CardImage> = image_rows
            .iter()
            .filter_map(|row| match CardImage::from_row(row) {
                Ok(image) => Some(image),
                Err(e) => {
                    tracing::warn!("Skipping image row from {}: {}", source_id, e);
                    None
                },
            })
            .collect();
        images.sort_by_key(|image| image.id);

        let mut by_card: BTreeMap<u64, Vec<CardImage>> = BTreeMap::new();
        for image in &images {
            by_card.entry(image.data_card_id).or_default().push(image.clone());
        }

        let cards = card_rows
            .iter()
            .filter_map(|row| match Card::from_row(source_id, row) {
                Ok(mut card) => {
                    card.images = by_card.get(&card.id).cloned().unwrap_or_default();
                    Some(card)
                },
                Err(e) => {
                    tracing::warn!("Skipping card row from {}: {}", source_id, e);
                    None
                },
            })
            .collect();

        Ok((cards, images))
    }

    fn commit_upsert(&self, card: Card) -> GlobalId {
        let global_id = card.global_id();
        let source_id = card.source_id.clone();
        self.store.upsert(&source_id, card);
        self.listeners.emit(&CardEvent::InsertOrUpdate { global_id: global_id.clone() });
        global_id
    }

    /// Refresh the image list of a cached card. `None` if the card is not cached.
    fn reattach(&self, source_id: &str, card_id: u64) -> Option<GlobalId> {
        let mut card = self.store.get(source_id, card_id)?;
        card.images = self.store.images_for_card(source_id, card_id);
        Some(self.commit_upsert(card))
    }
}

#[cfg(test)]
#[path = "synchronizer_tests.rs"]
mod synchronizer_tests;
