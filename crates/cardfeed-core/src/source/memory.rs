//! In-process source backed by row maps.
//!
//! Behaves like a content provider: every mutation notifies the subscribers of
//! the touched collection. Used for embedding and throughout the test suites.

use async_trait::async_trait;
use cardfeed_types::contract::{FEED_READ_PERM, FEED_WRITE_PERM};
use cardfeed_types::{Card, CardImage, Collection, RawNotification, ResourceUri, Row, SourceError};
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::Duration;

use super::{DataSource, QueryRequest, SourceCandidate, SourceResult, Subscription};
use crate::dispatcher::NotificationSink;
use crate::routes::{match_route, Route};

type Subscribers = Arc<Mutex<Vec<(u64, Collection, NotificationSink)>>>;

pub struct MemorySource {
    source_id: String,
    cards: RwLock<BTreeMap<u64, Row>>,
    images: RwLock<BTreeMap<u64, Row>>,
    subscribers: Subscribers,
    next_key: AtomicU64,
    self_originated: AtomicBool,
    failing: AtomicBool,
    latency: Mutex<Option<Duration>>,
    queries: AtomicUsize,
}

impl MemorySource {
    pub fn new(source_id: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            source_id: source_id.into(),
            cards: RwLock::new(BTreeMap::new()),
            images: RwLock::new(BTreeMap::new()),
            subscribers: Arc::new(Mutex::new(Vec::new())),
            next_key: AtomicU64::new(0),
            self_originated: AtomicBool::new(false),
            failing: AtomicBool::new(false),
            latency: Mutex::new(None),
            queries: AtomicUsize::new(0),
        })
    }

    pub fn source_id(&self) -> &str {
        &self.source_id
    }

    /// Candidate advertising both feed capabilities.
    pub fn candidate(self: &Arc<Self>) -> SourceCandidate {
        self.candidate_with(Some(FEED_READ_PERM), Some(FEED_WRITE_PERM))
    }

    pub fn candidate_with(
        self: &Arc<Self>,
        read: Option<&str>,
        write: Option<&str>,
    ) -> SourceCandidate {
        SourceCandidate {
            source_id: self.source_id.clone(),
            read_capability: read.map(String::from),
            write_capability: write.map(String::from),
            client: Arc::clone(self) as Arc<dyn DataSource>,
        }
    }

    // Seeding: no notifications.

    pub fn seed_card(&self, card: &Card) {
        self.cards.write().insert(card.id, card.to_row());
    }

    pub fn seed_image(&self, image: &CardImage) {
        self.images.write().insert(image.id, image.to_row());
    }

    /// Store an arbitrary row under `key`, bypassing the record model.
    pub fn seed_row(&self, collection: Collection, key: u64, row: Row) {
        self.rows(collection).write().insert(key, row);
    }

    // Mutations: notify subscribers like a provider would.

    pub async fn put_card(&self, card: &Card) {
        self.seed_card(card);
        if let Some(uri) = self.uri(Collection::Cards) {
            self.emit(Collection::Cards, uri.item(card.id)).await;
        }
    }

    pub async fn remove_card(&self, id: u64) {
        self.cards.write().remove(&id);
        if let Some(uri) = self.uri(Collection::Cards) {
            self.emit(Collection::Cards, uri.delete_item(id)).await;
        }
    }

    pub async fn put_image(&self, image: &CardImage) {
        self.seed_image(image);
        if let Some(uri) = self.uri(Collection::Images) {
            self.emit(Collection::Images, uri.item(image.id)).await;
        }
    }

    pub async fn remove_image(&self, id: u64) {
        self.images.write().remove(&id);
        if let Some(uri) = self.uri(Collection::Images) {
            self.emit(Collection::Images, uri.delete_item(id)).await;
        }
    }

    /// Bulk replace of the cards collection, announced as a collection change.
    pub async fn replace_all_cards(&self, cards: &[Card]) {
        *self.cards.write() = cards.iter().map(|card| (card.id, card.to_row())).collect();
        if let Some(uri) = self.uri(Collection::Cards) {
            self.emit(Collection::Cards, uri).await;
        }
    }

    /// Deliver `uri` verbatim to the subscribers of `collection`.
    pub async fn notify_raw(&self, collection: Collection, uri: &str, self_originated: bool) {
        for sink in self.sinks(collection) {
            sink.notify(RawNotification::new(uri, self_originated)).await;
        }
    }

    /// Mark subsequent notifications as caused by our own writes.
    pub fn emit_self_originated(&self, on: bool) {
        self.self_originated.store(on, AtomicOrdering::SeqCst);
    }

    /// Make every query fail as unreachable.
    pub fn set_failing(&self, on: bool) {
        self.failing.store(on, AtomicOrdering::SeqCst);
    }

    /// Delay every query by `latency`.
    pub fn set_latency(&self, latency: Option<Duration>) {
        *self.latency.lock() = latency;
    }

    pub fn query_count(&self) -> usize {
        self.queries.load(AtomicOrdering::SeqCst)
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }

    fn rows(&self, collection: Collection) -> &RwLock<BTreeMap<u64, Row>> {
        match collection {
            Collection::Cards => &self.cards,
            Collection::Images => &self.images,
        }
    }

    fn uri(&self, collection: Collection) -> Option<ResourceUri> {
        ResourceUri::collection(&self.source_id, collection).ok()
    }

    fn sinks(&self, collection: Collection) -> Vec<NotificationSink> {
        self.subscribers
            .lock()
            .iter()
            .filter(|(_, c, _)| *c == collection)
            .map(|(_, _, sink)| sink.clone())
            .collect()
    }

    async fn emit(&self, collection: Collection, uri: ResourceUri) {
        let self_originated = self.self_originated.load(AtomicOrdering::SeqCst);
        self.notify_raw(collection, uri.as_str(), self_originated).await;
    }

    fn select(&self, route: Route) -> Vec<Row> {
        let pick = |rows: &RwLock<BTreeMap<u64, Row>>, id: Option<u64>| -> Vec<Row> {
            let rows = rows.read();
            match id {
                Some(id) => rows.get(&id).cloned().into_iter().collect(),
                None => rows.values().cloned().collect(),
            }
        };

        match route {
            Route::CardsCollection => pick(&self.cards, None),
            Route::CardItem(id) => pick(&self.cards, Some(id)),
            Route::ImagesCollection => pick(&self.images, None),
            Route::ImageItem(id) => pick(&self.images, Some(id)),
            Route::CardDelete(_) | Route::ImageDelete(_) => Vec::new(),
        }
    }
}

#[async_trait]
impl DataSource for MemorySource {
    async fn query(&self, request: &QueryRequest) -> SourceResult<Vec<Row>> {
        self.queries.fetch_add(1, AtomicOrdering::SeqCst);

        let latency = *self.latency.lock();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        if self.failing.load(AtomicOrdering::SeqCst) {
            return Err(SourceError::Unreachable {
                source_id: self.source_id.clone(),
                message: "source is down".to_string(),
            });
        }

        let unsupported = || SourceError::Unsupported { uri: request.uri.to_string() };
        if request.uri.authority() != self.source_id {
            return Err(unsupported());
        }
        let route = match match_route(&request.uri) {
            Some(Route::CardDelete(_) | Route::ImageDelete(_)) | None => {
                return Err(unsupported());
            },
            Some(route) => route,
        };

        let mut rows: Vec<Row> = self
            .select(route)
            .into_iter()
            .map(|row| project(row, request.projection))
            .collect();

        let column = request.sort.column;
        rows.sort_by(|a, b| compare_values(a.get(column), b.get(column)));

        Ok(rows)
    }

    async fn subscribe(
        &self,
        collection: Collection,
        sink: NotificationSink,
    ) -> SourceResult<Subscription> {
        let key = self.next_key.fetch_add(1, AtomicOrdering::SeqCst);
        self.subscribers.lock().push((key, collection, sink));

        let subscribers = Arc::clone(&self.subscribers);
        Ok(Subscription::new(self.source_id.clone(), collection, move || {
            subscribers.lock().retain(|(k, _, _)| *k != key);
        }))
    }
}

impl std::fmt::Debug for MemorySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemorySource")
            .field("source_id", &self.source_id)
            .field("cards", &self.cards.read().len())
            .field("images", &self.images.read().len())
            .finish_non_exhaustive()
    }
}

fn project(row: Row, projection: &[&str]) -> Row {
    row.into_iter().filter(|(column, _)| projection.contains(&column.as_str())).collect()
}

/// Nulls first, then numbers, then strings.
fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    fn rank(value: Option<&Value>) -> u8 {
        match value {
            None | Some(Value::Null) => 0,
            Some(Value::Number(_)) => 1,
            Some(Value::String(_)) => 2,
            Some(_) => 3,
        }
    }

    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let x = x.as_f64().unwrap_or_default();
            let y = y.as_f64().unwrap_or_default();
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        },
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}
