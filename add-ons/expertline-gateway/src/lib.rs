//! Axum-based call gateway for Expertline: routes one caller utterance
//! through transcription, expert routing, persona generation, and speech
//! synthesis, and streams the result as NDJSON events.
//!
//! Library surface exists so the binary and the integration tests share the
//! router construction.

pub mod events;
pub mod handlers;
pub mod state;
pub mod turn;

pub use state::AppState;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};

/// Build the full API router over the given state.
pub fn api_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/v1/health", get(handlers::health::health))
        .route("/api/v1/call/start", post(handlers::call::start))
        .route("/api/v1/call/message", post(handlers::call::message))
        .route("/api/v1/call/end", post(handlers::call::end))
        .route("/api/v1/transcribe", post(handlers::speech::transcribe))
        .route("/api/v1/speak", post(handlers::speech::speak))
        .layer(cors)
        .with_state(state)
}
