//! HTTP API module
//!
//! The message channel between views and the timer authority: commands go
//! in through `POST /message`, broadcasts come out of `GET /events`.

pub mod handlers;
pub mod responses;

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::state::AppState;
use handlers::*;

/// Create the HTTP router with all endpoints
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/message", post(message_handler))
        .route("/events", get(events_handler))
        .route("/state", get(state_handler))
        .route("/stats", get(stats_handler))
        .route("/health", get(health_handler))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
