//! Application State
//!
//! Holds the card feed manager, the notification hub remote sources post to,
//! the broadcast fan-out feeding the event stream and the shutdown flag that
//! closes those streams.

use std::future::Future;
use std::sync::Arc;
use tokio::sync::watch;

use cardfeed_core::{BroadcastListener, CardFeedManager, NotificationHub};

const EVENT_BUFFER: usize = 1024;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

pub struct AppStateInner {
    pub manager: Arc<CardFeedManager>,
    pub hub: NotificationHub,
    pub events: BroadcastListener,
    pub shutdown: watch::Sender<bool>,
}

impl AppState {
    /// Wire the broadcast listener into `manager`.
    pub fn new(manager: Arc<CardFeedManager>, hub: NotificationHub) -> Self {
        let events = BroadcastListener::new(EVENT_BUFFER);
        manager.set_listener(Some(Arc::new(events.clone())));
        let (shutdown, _) = watch::channel(false);
        Self { inner: Arc::new(AppStateInner { manager, hub, events, shutdown }) }
    }

    pub fn manager(&self) -> &CardFeedManager {
        &self.inner.manager
    }

    pub fn hub(&self) -> &NotificationHub {
        &self.inner.hub
    }

    pub fn events(&self) -> &BroadcastListener {
        &self.inner.events
    }

    /// Ask long-lived responses (the event stream) to finish.
    pub fn begin_shutdown(&self) {
        self.inner.shutdown.send_replace(true);
    }

    /// Resolves once `begin_shutdown` has been called, even if that happened earlier.
    pub fn shutdown_requested(&self) -> impl Future<Output = ()> + Send + 'static {
        let mut rx = self.inner.shutdown.subscribe();
        async move {
            let _ = rx.wait_for(|stopping| *stopping).await;
        }
    }
}
