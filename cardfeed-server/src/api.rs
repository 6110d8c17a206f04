//! API Routes
//!
//! Read access to the card cache, the notification webhook for remote sources
//! and a server-sent event stream of card changes.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        Json,
    },
    routing::{get, post},
    Router,
};
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use tokio_stream::wrappers::BroadcastStream;

use cardfeed_core::FeedStats;
use cardfeed_types::{Card, CardEvent, RawNotification, SourceDescriptor};

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        // Status
        .route("/status", get(get_status))
        // Sources
        .route("/sources", get(list_sources))
        // Cards
        .route("/cards", get(list_cards))
        .route("/cards/:source_id/:local_id", get(get_card))
        .route("/card", get(get_card_by_global_id))
        // Change notifications from remote sources
        .route("/notifications", post(post_notification))
        // Event stream
        .route("/events", get(stream_events))
}

// ============ Status ============

#[derive(Serialize)]
struct StatusResponse {
    version: String,
    #[serde(flatten)]
    stats: FeedStats,
    event_subscribers: usize,
}

async fn get_status(State(state): State<AppState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        version: env!("CARGO_PKG_VERSION").to_string(),
        stats: state.manager().stats().await,
        event_subscribers: state.events().receiver_count(),
    })
}

// ============ Sources ============

async fn list_sources(State(state): State<AppState>) -> Json<Vec<SourceDescriptor>> {
    Json(state.manager().sources())
}

// ============ Cards ============

async fn list_cards(State(state): State<AppState>) -> Json<Vec<Card>> {
    Json(state.manager().get_all_cards_sorted())
}

async fn get_card(
    State(state): State<AppState>,
    Path((source_id, local_id)): Path<(String, u64)>,
) -> Result<Json<Card>, (StatusCode, String)> {
    state
        .manager()
        .get_card(&source_id, local_id)
        .map(Json)
        .ok_or_else(|| (StatusCode::NOT_FOUND, format!("No card {}/{}", source_id, local_id)))
}

#[derive(Deserialize)]
struct GlobalIdQuery {
    global_id: String,
}

async fn get_card_by_global_id(
    State(state): State<AppState>,
    Query(query): Query<GlobalIdQuery>,
) -> Result<Json<Card>, (StatusCode, String)> {
    state
        .manager()
        .get_card_by_global_id(&query.global_id)
        .map(Json)
        .ok_or_else(|| (StatusCode::NOT_FOUND, format!("No card {}", query.global_id)))
}

// ============ Notifications ============

async fn post_notification(
    State(state): State<AppState>,
    Json(notification): Json<RawNotification>,
) -> Result<StatusCode, (StatusCode, String)> {
    let uri = notification.uri.clone();
    if state.hub().deliver(notification).await {
        Ok(StatusCode::ACCEPTED)
    } else {
        tracing::debug!("Rejected notification {}", uri);
        Err((StatusCode::NOT_FOUND, format!("No subscription for {}", uri)))
    }
}

// ============ Events ============

async fn stream_events(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    // Graceful shutdown waits for open connections, so the stream must end on its own.
    let stream = BroadcastStream::new(state.events().subscribe())
        .filter_map(|item| async move {
            match item {
                Ok(event) => to_sse(&event).map(Ok),
                Err(e) => {
                    tracing::warn!("Event stream lagged: {}", e);
                    None
                },
            }
        })
        .take_until(state.shutdown_requested());
    Sse::new(stream).keep_alive(KeepAlive::default())
}

fn to_sse(event: &CardEvent) -> Option<Event> {
    let kind = match event {
        CardEvent::InsertOrUpdate { .. } => "insert_or_update",
        CardEvent::Delete { .. } => "delete",
    };
    Event::default().event(kind).json_data(event).ok()
}

#[cfg(test)]
#[path = "api_tests.rs"]
mod api_tests;
