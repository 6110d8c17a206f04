//! Listener fan-out: at most one consumer of card events.

use cardfeed_types::{CardEvent, GlobalId};
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;

/// Consumer of semantic card events.
///
/// Called on the dispatcher worker after the cache mutation has committed.
/// Implementations must return quickly; hand heavy work off (see
/// [`BroadcastListener`]).
pub trait CardFeedListener: Send + Sync {
    fn on_insert_or_update(&self, global_id: &GlobalId);
    fn on_delete(&self, global_id: &GlobalId);
}

/// Holder of the registered listener.
pub struct ListenerSlot {
    listener: RwLock<Option<Arc<dyn CardFeedListener>>>,
    warn_after: Duration,
}

impl ListenerSlot {
    pub fn new(warn_after: Duration) -> Self {
        Self { listener: RwLock::new(None), warn_after }
    }

    /// Replace the listener. `None` unregisters.
    pub fn set(&self, listener: Option<Arc<dyn CardFeedListener>>) {
        *self.listener.write() = listener;
    }

    pub fn is_set(&self) -> bool {
        self.listener.read().is_some()
    }

    pub fn emit(&self, event: &CardEvent) {
        // Clone out so a listener can re-register without deadlocking.
        let Some(listener) = self.listener.read().clone() else {
            return;
        };

        let started = Instant::now();
        match event {
            CardEvent::InsertOrUpdate { global_id } => listener.on_insert_or_update(global_id),
            CardEvent::Delete { global_id } => listener.on_delete(global_id),
        }

        let elapsed = started.elapsed();
        if elapsed > self.warn_after {
            tracing::warn!(
                "Listener took {}ms for {} (threshold {}ms)",
                elapsed.as_millis(),
                event.global_id(),
                self.warn_after.as_millis()
            );
        }
    }
}

/// Listener that republishes events on a broadcast channel.
///
/// Never blocks the worker. Slow receivers lag and lose the oldest events;
/// delivery is at-least-once only for receivers that keep up.
#[derive(Clone)]
pub struct BroadcastListener {
    tx: broadcast::Sender<CardEvent>,
}

impl BroadcastListener {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CardEvent> {
        self.tx.subscribe()
    }

    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }

    fn publish(&self, event: CardEvent) {
        // No receivers is fine.
        let _ = self.tx.send(event);
    }
}

impl CardFeedListener for BroadcastListener {
    fn on_insert_or_update(&self, global_id: &GlobalId) {
        self.publish(CardEvent::InsertOrUpdate { global_id: global_id.clone() });
    }

    fn on_delete(&self, global_id: &GlobalId) {
        self.publish(CardEvent::Delete { global_id: global_id.clone() });
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<CardEvent>>,
    }

    impl CardFeedListener for Recorder {
        fn on_insert_or_update(&self, global_id: &GlobalId) {
            self.events.lock().push(CardEvent::InsertOrUpdate { global_id: global_id.clone() });
        }

        fn on_delete(&self, global_id: &GlobalId) {
            self.events.lock().push(CardEvent::Delete { global_id: global_id.clone() });
        }
    }

    fn upsert(id: u64) -> CardEvent {
        CardEvent::InsertOrUpdate { global_id: GlobalId::new("s", id) }
    }

    #[test]
    fn test_emit_without_listener_is_noop() {
        let slot = ListenerSlot::new(Duration::from_millis(250));
        assert!(!slot.is_set());
        slot.emit(&upsert(1));
    }

    #[test]
    fn test_emit_routes_by_kind() {
        let slot = ListenerSlot::new(Duration::from_millis(250));
        let recorder = Arc::new(Recorder::default());
        slot.set(Some(recorder.clone()));

        slot.emit(&upsert(1));
        slot.emit(&CardEvent::Delete { global_id: GlobalId::new("s", 1) });
        assert_eq!(recorder.events.lock().len(), 2);
        assert!(matches!(recorder.events.lock()[1], CardEvent::Delete { .. }));

        slot.set(None);
        slot.emit(&upsert(2));
        assert_eq!(recorder.events.lock().len(), 2);
    }

    #[tokio::test]
    async fn test_broadcast_listener_hands_off() {
        let listener = BroadcastListener::new(8);
        let mut rx = listener.subscribe();

        listener.on_insert_or_update(&GlobalId::new("s", 7));
        listener.on_delete(&GlobalId::new("s", 7));

        assert_eq!(rx.recv().await.unwrap(), upsert(7));
        assert_eq!(rx.recv().await.unwrap().global_id().to_string(), "s/7");
    }
}
