//! HTTP endpoint handlers

use std::{convert::Infallible, sync::Arc};

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        Json,
    },
};
use futures::Stream;
use serde_json::Value;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};

use crate::{
    error::CommandError,
    protocol::{Broadcast, Command, Reply, TimerSnapshot},
    state::{AppState, StatsRecord},
};
use super::responses::HealthResponse;

/// Handle POST /message - Dispatch a command message to the timer authority
pub async fn message_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<Value>, JsonRejection>,
) -> (StatusCode, Json<Reply>) {
    let message = match payload {
        Ok(Json(message)) => message,
        Err(rejection) => {
            warn!("Rejected unreadable message: {}", rejection.body_text());
            let err = CommandError::Malformed(rejection.body_text());
            return (StatusCode::BAD_REQUEST, Json(err.into()));
        }
    };

    match Command::parse(message) {
        Ok(command) => {
            debug!("Received {} message", command.name());
            (StatusCode::OK, Json(state.handle(command).await))
        }
        Err(err) => {
            warn!("Rejected message: {}", err);
            (StatusCode::BAD_REQUEST, Json(err.into()))
        }
    }
}

/// Handle GET /events - Stream broadcasts as server-sent events
///
/// The current state is sent first so a new view does not wait for a tick.
pub async fn events_handler(
    State(state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let mut events = state.subscribe();
    let initial = Broadcast::TimerUpdate(state.snapshot());
    debug!("View subscribed to broadcasts");

    let stream = async_stream::stream! {
        if let Some(event) = to_event(&initial) {
            yield Ok(event);
        }
        loop {
            match events.recv().await {
                Ok(message) => {
                    if let Some(event) = to_event(&message) {
                        yield Ok(event);
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    debug!("Slow view skipped {} broadcast(s)", skipped);
                }
                Err(RecvError::Closed) => break,
            }
        }
    };

    Sse::new(stream).keep_alive(KeepAlive::default())
}

fn to_event(message: &Broadcast) -> Option<Event> {
    Event::default().json_data(message).ok()
}

/// Handle GET /state - Current timer snapshot
pub async fn state_handler(State(state): State<Arc<AppState>>) -> Json<TimerSnapshot> {
    Json(state.snapshot())
}

/// Handle GET /stats - Current focus statistics
pub async fn stats_handler(State(state): State<Arc<AppState>>) -> Json<StatsRecord> {
    Json(state.stats())
}

/// Handle GET /health - Health check endpoint
pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse::ok(state.uptime(), state.last_action()))
}
