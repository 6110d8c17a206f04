//! Routes externally delivered notifications to the subscribed sink.
//!
//! Remote sources cannot call into the process; they POST their change
//! notifications to the daemon, which hands them to the hub. The hub keeps one
//! sink per `(source id, collection)`, registered through
//! [`DataSource::subscribe`](super::DataSource::subscribe).

use cardfeed_types::{Collection, RawNotification, ResourceUri};
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::Subscription;
use crate::dispatcher::NotificationSink;

type Key = (String, Collection);

#[derive(Default)]
struct HubInner {
    routes: DashMap<Key, (u64, NotificationSink)>,
    next_token: AtomicU64,
}

#[derive(Clone, Default)]
pub struct NotificationHub {
    inner: Arc<HubInner>,
}

impl NotificationHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Route notifications for `(source_id, collection)` to `sink`.
    /// A newer registration for the same key replaces the older one; releasing
    /// the older handle afterwards leaves the newer route in place.
    pub fn register(
        &self,
        source_id: &str,
        collection: Collection,
        sink: NotificationSink,
    ) -> Subscription {
        let token = self.inner.next_token.fetch_add(1, Ordering::Relaxed);
        let key = (source_id.to_string(), collection);
        self.inner.routes.insert(key.clone(), (token, sink));

        let inner = Arc::clone(&self.inner);
        Subscription::new(source_id, collection, move || {
            inner.routes.remove_if(&key, |_, (current, _)| *current == token);
        })
    }

    /// Forward a notification to the sink subscribed for its source and
    /// collection. Returns `false` when nobody is subscribed or the dispatcher
    /// has stopped.
    pub async fn deliver(&self, notification: RawNotification) -> bool {
        let Some(key) = route_key(&notification.uri) else {
            tracing::debug!("Hub: no route for {}", notification.uri);
            return false;
        };

        // Clone the sink out; never hold a map guard across the await.
        let sink = self.inner.routes.get(&key).map(|entry| entry.value().1.clone());
        match sink {
            Some(sink) => sink.notify(notification).await,
            None => {
                tracing::debug!("Hub: nobody subscribed to {} {:?}", key.0, key.1);
                false
            },
        }
    }

    pub fn is_subscribed(&self, source_id: &str, collection: Collection) -> bool {
        self.inner.routes.contains_key(&(source_id.to_string(), collection))
    }

    pub fn route_count(&self) -> usize {
        self.inner.routes.len()
    }
}

fn route_key(raw: &str) -> Option<Key> {
    let uri = ResourceUri::parse(raw)?;
    let collection = Collection::from_path(uri.segments().first()?)?;
    Some((uri.authority().to_string(), collection))
}
