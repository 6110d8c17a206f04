//! Change dispatcher: a single worker draining an ordered, bounded queue.
//!
//! Everything that mutates the cache after startup goes through this queue,
//! so notifications are applied strictly in arrival order. Per-event failures
//! are logged and counted; they never stop the worker.

use cardfeed_types::{RawNotification, ResourceUri};
use futures::FutureExt;
use serde::Serialize;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

use crate::registry::SourceRegistry;
use crate::routes::{classify, Route};
use crate::synchronizer::Synchronizer;

pub(crate) enum Command {
    Notify(RawNotification),
    InitialLoad(String),
    Barrier(oneshot::Sender<()>),
}

/// Handle sources use to push change notifications into the dispatcher.
#[derive(Clone)]
pub struct NotificationSink {
    tx: mpsc::Sender<Command>,
}

impl NotificationSink {
    /// Queue a notification, waiting for room if the queue is full.
    /// Returns `false` once the dispatcher has stopped.
    pub async fn notify(&self, notification: RawNotification) -> bool {
        self.tx.send(Command::Notify(notification)).await.is_ok()
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    #[cfg(test)]
    pub(crate) fn detached(capacity: usize) -> (Self, mpsc::Receiver<Command>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }
}

impl std::fmt::Debug for NotificationSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationSink").field("closed", &self.tx.is_closed()).finish()
    }
}

/// Counters kept by the worker.
#[derive(Debug, Default)]
pub struct DispatcherStats {
    processed: AtomicU64,
    echo_suppressed: AtomicU64,
    unclassified: AtomicU64,
    failed: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DispatcherStatsSnapshot {
    pub processed: u64,
    pub echo_suppressed: u64,
    pub unclassified: u64,
    pub failed: u64,
}

impl DispatcherStats {
    pub fn snapshot(&self) -> DispatcherStatsSnapshot {
        DispatcherStatsSnapshot {
            processed: self.processed.load(Ordering::Relaxed),
            echo_suppressed: self.echo_suppressed.load(Ordering::Relaxed),
            unclassified: self.unclassified.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }

    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Cloneable front of a running dispatcher.
#[derive(Clone)]
pub(crate) struct DispatcherHandle {
    tx: mpsc::Sender<Command>,
}

impl DispatcherHandle {
    pub(crate) fn sink(&self) -> NotificationSink {
        NotificationSink { tx: self.tx.clone() }
    }

    pub(crate) async fn enqueue_initial_load(&self, source_id: &str) -> bool {
        self.tx.send(Command::InitialLoad(source_id.to_string())).await.is_ok()
    }

    /// Resolves once every command queued before it has been handled.
    pub(crate) async fn barrier(&self) -> bool {
        let (done_tx, done_rx) = oneshot::channel();
        if self.tx.send(Command::Barrier(done_tx)).await.is_err() {
            return false;
        }
        done_rx.await.is_ok()
    }
}

pub(crate) struct Dispatcher {
    handle: DispatcherHandle,
    shutdown_tx: watch::Sender<bool>,
    worker: JoinHandle<()>,
}

impl Dispatcher {
    pub(crate) fn spawn(
        capacity: usize,
        synchronizer: Arc<Synchronizer>,
        registry: Arc<SourceRegistry>,
        stats: Arc<DispatcherStats>,
    ) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let worker = Worker { synchronizer, registry, stats };
        let worker = tokio::spawn(worker.run(rx, shutdown_rx));
        tracing::debug!("Change dispatcher started (capacity: {})", capacity);
        Self { handle: DispatcherHandle { tx }, shutdown_tx, worker }
    }

    pub(crate) fn handle(&self) -> DispatcherHandle {
        self.handle.clone()
    }

    /// Stop accepting work, let the command in progress finish, then join the worker.
    pub(crate) async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        if let Err(e) = self.worker.await {
            tracing::error!("Change dispatcher worker ended abnormally: {}", e);
        }
        tracing::debug!("Change dispatcher stopped");
    }
}

struct Worker {
    synchronizer: Arc<Synchronizer>,
    registry: Arc<SourceRegistry>,
    stats: Arc<DispatcherStats>,
}

impl Worker {
    async fn run(self, mut rx: mpsc::Receiver<Command>, mut shutdown_rx: watch::Receiver<bool>) {
        loop {
            tokio::select! {
                biased;
                _ = shutdown_rx.changed() => break,
                command = rx.recv() => {
                    let Some(command) = command else { break };
                    self.handle(command).await;
                }
            }
        }
    }

    async fn handle(&self, command: Command) {
        match command {
            Command::Barrier(done) => {
                let _ = done.send(());
            },
            Command::InitialLoad(source_id) => {
                let outcome = AssertUnwindSafe(self.synchronizer.initial_load(&source_id))
                    .catch_unwind()
                    .await;
                match outcome {
                    Ok(Ok(count)) => {
                        tracing::info!("Loaded {} card(s) from {}", count, source_id);
                    },
                    Ok(Err(e)) => {
                        DispatcherStats::bump(&self.stats.failed);
                        tracing::error!("Initial load of {} failed: {}", source_id, e);
                    },
                    Err(_) => {
                        DispatcherStats::bump(&self.stats.failed);
                        tracing::error!("Initial load of {} panicked", source_id);
                    },
                }
            },
            Command::Notify(notification) => {
                let uri = notification.uri.clone();
                if AssertUnwindSafe(self.handle_notification(notification))
                    .catch_unwind()
                    .await
                    .is_err()
                {
                    DispatcherStats::bump(&self.stats.failed);
                    tracing::error!("Handling notification {} panicked", uri);
                }
            },
        }
    }

    async fn handle_notification(&self, notification: RawNotification) {
        if notification.self_originated {
            DispatcherStats::bump(&self.stats.echo_suppressed);
            tracing::trace!("Dropping self-originated notification {}", notification.uri);
            return;
        }

        let Some((source_id, uri, route)) = self.resolve(&notification.uri) else {
            DispatcherStats::bump(&self.stats.unclassified);
            tracing::warn!("Unsupported change notification: {}", notification.uri);
            return;
        };

        tracing::debug!("Dispatching {:?} for {}", route, uri);
        let sync = &self.synchronizer;
        let result = match route {
            Route::CardItem(_) => sync.on_item_upsert(&source_id, &uri).await.map(drop),
            Route::CardDelete(_) => sync.on_item_delete(&source_id, &uri).await.map(drop),
            Route::ImageItem(_) => sync.on_image_upsert(&source_id, &uri).await.map(drop),
            Route::ImageDelete(_) => sync.on_image_delete(&source_id, &uri).await.map(drop),
            Route::CardsCollection | Route::ImagesCollection => {
                sync.on_collection_changed(&source_id).await.map(drop)
            },
        };

        match result {
            Ok(()) => DispatcherStats::bump(&self.stats.processed),
            Err(e) => {
                DispatcherStats::bump(&self.stats.failed);
                tracing::warn!("Dropped notification {}: {}", uri, e);
            },
        }
    }

    fn resolve(&self, raw: &str) -> Option<(String, ResourceUri, Route)> {
        let uri = ResourceUri::parse(raw)?;
        let route = classify(&uri, &self.registry)?;
        Some((uri.authority().to_string(), uri, route))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::listener::ListenerSlot;
    use crate::registry::RegisteredSource;
    use crate::source::MemorySource;
    use crate::store::CardStore;
    use cardfeed_types::models::CapabilityConfig;
    use cardfeed_types::{Card, SourceDescriptor};
    use std::collections::BTreeMap;
    use std::time::Duration;

    fn spawn(source: &Arc<MemorySource>) -> (Dispatcher, Arc<CardStore>, Arc<DispatcherStats>) {
        let registry = Arc::new(SourceRegistry::new(CapabilityConfig::default()));
        registry.replace_all(BTreeMap::from([(
            source.source_id().to_string(),
            RegisteredSource {
                descriptor: SourceDescriptor::new(source.source_id()).unwrap(),
                client: source.clone(),
            },
        )]));
        let store = Arc::new(CardStore::new());
        let synchronizer = Arc::new(Synchronizer::new(
            Arc::clone(&registry),
            Arc::clone(&store),
            Arc::new(ListenerSlot::new(Duration::from_secs(1))),
            Duration::from_secs(5),
        ));
        let stats = Arc::new(DispatcherStats::default());
        (Dispatcher::spawn(4, synchronizer, registry, Arc::clone(&stats)), store, stats)
    }

    #[tokio::test]
    async fn test_applies_in_arrival_order_and_counts() {
        let source = MemorySource::new("s");
        source.seed_card(&Card::new("s", 1));
        let (dispatcher, store, stats) = spawn(&source);
        let sink = dispatcher.handle().sink();

        assert!(sink.notify(RawNotification::external("content://s/datacard/1")).await);
        assert!(sink.notify(RawNotification::external("content://s/datacard/delete/1")).await);
        assert!(sink.notify(RawNotification::new("content://s/datacard/1", true)).await);
        assert!(sink.notify(RawNotification::external("content://s/elsewhere")).await);
        assert!(dispatcher.handle().barrier().await);

        assert!(!store.has("s", 1));
        assert_eq!(
            stats.snapshot(),
            DispatcherStatsSnapshot { processed: 2, echo_suppressed: 1, unclassified: 1, failed: 0 }
        );
        dispatcher.shutdown().await;
    }

    #[tokio::test]
    async fn test_initial_load_runs_on_worker() {
        let source = MemorySource::new("s");
        source.seed_card(&Card::new("s", 3));
        let (dispatcher, store, _) = spawn(&source);

        assert!(dispatcher.handle().enqueue_initial_load("s").await);
        assert!(dispatcher.handle().barrier().await);
        assert!(store.has("s", 3));
        dispatcher.shutdown().await;
    }

    #[tokio::test]
    async fn test_shutdown_closes_the_queue() {
        let source = MemorySource::new("s");
        let (dispatcher, _, _) = spawn(&source);
        let handle = dispatcher.handle();
        let sink = handle.sink();

        dispatcher.shutdown().await;

        assert!(sink.is_closed());
        assert!(!sink.notify(RawNotification::external("content://s/datacard/1")).await);
        assert!(!handle.barrier().await);
    }
}
