//! `CardFeedManager`: the boundary callers use.
//!
//! Owns the registry, store, listener slot and, while running, the dispatcher
//! and the one-shot startup task.

use cardfeed_types::{sort_default, Card, Collection, FeedConfig, SourceDescriptor};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;

use crate::dispatcher::{Dispatcher, DispatcherHandle, DispatcherStats, DispatcherStatsSnapshot};
use crate::error::FeedResult;
use crate::listener::{CardFeedListener, ListenerSlot};
use crate::registry::SourceRegistry;
use crate::source::{SourceProvider, Subscription};
use crate::store::CardStore;
use crate::synchronizer::Synchronizer;

type Subscriptions = Arc<parking_lot::Mutex<Vec<Subscription>>>;

/// Point-in-time view of the engine.
#[derive(Debug, Clone, Serialize)]
pub struct FeedStats {
    pub running: bool,
    pub sources: usize,
    pub cards: usize,
    pub listener_registered: bool,
    pub dispatcher: DispatcherStatsSnapshot,
}

struct Running {
    dispatcher: Dispatcher,
    startup: JoinHandle<()>,
    started: watch::Receiver<bool>,
    subscriptions: Subscriptions,
}

pub struct CardFeedManager {
    config: FeedConfig,
    provider: Arc<dyn SourceProvider>,
    registry: Arc<SourceRegistry>,
    store: Arc<CardStore>,
    listeners: Arc<ListenerSlot>,
    stats: Arc<DispatcherStats>,
    running: Mutex<Option<Running>>,
}

impl CardFeedManager {
    pub fn new(provider: Arc<dyn SourceProvider>, config: FeedConfig) -> Self {
        Self {
            registry: Arc::new(SourceRegistry::new(config.capabilities.clone())),
            store: Arc::new(CardStore::new()),
            listeners: Arc::new(ListenerSlot::new(config.listener_warn_threshold())),
            stats: Arc::new(DispatcherStats::default()),
            running: Mutex::new(None),
            provider,
            config,
        }
    }

    /// Start the dispatcher and kick off discovery, subscription and initial
    /// load in the background. Calling it again while running does nothing.
    pub async fn initialize(&self) -> FeedResult<()> {
        self.config.validate()?;

        let mut running = self.running.lock().await;
        if running.is_some() {
            tracing::debug!("Card feed already initialized");
            return Ok(());
        }

        let synchronizer = Arc::new(Synchronizer::new(
            Arc::clone(&self.registry),
            Arc::clone(&self.store),
            Arc::clone(&self.listeners),
            self.config.fetch_timeout(),
        ));
        let dispatcher = Dispatcher::spawn(
            self.config.queue_capacity,
            synchronizer,
            Arc::clone(&self.registry),
            Arc::clone(&self.stats),
        );

        let subscriptions: Subscriptions = Arc::default();
        let (started_tx, started) = watch::channel(false);
        let startup = tokio::spawn(startup(
            Arc::clone(&self.provider),
            Arc::clone(&self.registry),
            dispatcher.handle(),
            Arc::clone(&subscriptions),
            started_tx,
        ));

        tracing::info!("Card feed initializing");
        *running = Some(Running { dispatcher, startup, started, subscriptions });
        Ok(())
    }

    /// Wait until startup has finished and everything it queued (initial
    /// loads included) has been applied. Returns immediately when not running.
    pub async fn ready(&self) {
        let Some((handle, mut started)) = self.handle_and_started().await else {
            return;
        };
        // Err means the startup task went away (teardown); nothing to wait for.
        let _ = started.wait_for(|done| *done).await;
        handle.barrier().await;
    }

    /// Wait until every notification queued so far has been applied.
    /// Returns `false` when the dispatcher is not running.
    pub async fn flush(&self) -> bool {
        match self.handle_and_started().await {
            Some((handle, _)) => handle.barrier().await,
            None => false,
        }
    }

    /// Stop accepting notifications, let the one in progress finish, release
    /// every subscription, then drop registry and cache state.
    pub async fn teardown(&self) {
        let Some(running) = self.running.lock().await.take() else {
            return;
        };

        running.startup.abort();
        if let Err(e) = running.startup.await {
            if !e.is_cancelled() {
                tracing::error!("Card feed startup task failed: {}", e);
            }
        }

        running.dispatcher.shutdown().await;

        let subscriptions: Vec<Subscription> = running.subscriptions.lock().drain(..).collect();
        let released = subscriptions.len();
        for subscription in subscriptions {
            subscription.unsubscribe();
        }

        self.registry.clear();
        self.store.clear();
        tracing::info!("Card feed torn down ({} subscription(s) released)", released);
    }

    pub async fn is_running(&self) -> bool {
        self.running.lock().await.is_some()
    }

    pub fn has_card(&self, source_id: &str, local_id: u64) -> bool {
        self.store.has(source_id, local_id)
    }

    pub fn get_card(&self, source_id: &str, local_id: u64) -> Option<Card> {
        self.store.get(source_id, local_id)
    }

    pub fn get_card_by_global_id(&self, global_id: &str) -> Option<Card> {
        self.store.get_by_global_id(global_id)
    }

    /// Every cached card, in no particular order.
    pub fn get_all_cards(&self) -> Vec<Card> {
        self.store.all()
    }

    /// Every cached card, priority ascending.
    pub fn get_all_cards_sorted(&self) -> Vec<Card> {
        let mut cards = self.store.all();
        sort_default(&mut cards);
        cards
    }

    pub fn set_listener(&self, listener: Option<Arc<dyn CardFeedListener>>) {
        self.listeners.set(listener);
    }

    pub fn sources(&self) -> Vec<SourceDescriptor> {
        self.registry.descriptors()
    }

    pub async fn stats(&self) -> FeedStats {
        FeedStats {
            running: self.is_running().await,
            sources: self.registry.len(),
            cards: self.store.len(),
            listener_registered: self.listeners.is_set(),
            dispatcher: self.stats.snapshot(),
        }
    }

    async fn handle_and_started(&self) -> Option<(DispatcherHandle, watch::Receiver<bool>)> {
        let running = self.running.lock().await;
        running.as_ref().map(|r| (r.dispatcher.handle(), r.started.clone()))
    }
}

/// Discovery, then per source: queue the initial load, then subscribe.
///
/// The load is queued first so the worker applies it before any notification
/// for that source.
async fn startup(
    provider: Arc<dyn SourceProvider>,
    registry: Arc<SourceRegistry>,
    handle: DispatcherHandle,
    subscriptions: Subscriptions,
    started: watch::Sender<bool>,
) {
    let discovered = registry.discover_sources(provider.as_ref()).await;
    registry.replace_all(discovered);

    for (source_id, source) in registry.snapshot().iter() {
        if !handle.enqueue_initial_load(source_id).await {
            tracing::warn!("Dispatcher stopped during startup");
            return;
        }

        for collection in Collection::ALL {
            match source.client.subscribe(collection, handle.sink()).await {
                Ok(subscription) => subscriptions.lock().push(subscription),
                Err(e) => tracing::warn!("Could not subscribe to {}: {}", source_id, e),
            }
        }
    }

    let _ = started.send(true);
}
