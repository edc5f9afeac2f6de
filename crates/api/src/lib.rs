//! `api` crate — inbound webhook receiver.
//!
//! Exposes:
//!   GET    /health
//!   POST   /webhook
//!
//! Accepted deliveries are reshaped into [`WebhookEvent`]s and pushed onto
//! the channel held in [`AppState`].

pub mod error;
pub mod events;
pub mod handlers;
pub mod signature;

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tokio::sync::mpsc;
use tower_http::trace::TraceLayer;
use tracing::info;

pub use error::ApiError;
pub use events::{EventName, WebhookEvent};

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    /// HMAC key for `x-ledgers-signature`. `None` accepts unsigned deliveries.
    pub signing_secret: Option<Arc<str>>,
    /// Where accepted records go.
    pub events: mpsc::Sender<WebhookEvent>,
}

impl AppState {
    /// Build state plus the receiving end of the event channel.
    pub fn new(
        signing_secret: Option<String>,
        capacity: usize,
    ) -> (Self, mpsc::Receiver<WebhookEvent>) {
        let (tx, rx) = mpsc::channel(capacity);
        let state = Self {
            signing_secret: signing_secret
                .filter(|s| !s.is_empty())
                .map(Arc::from),
            events: tx,
        };
        (state, rx)
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health::health))
        .route("/webhook", post(handlers::webhooks::handle_webhook))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind `addr` and serve until the process is stopped.
pub async fn serve(addr: &str, state: AppState) -> Result<(), ApiError> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("webhook receiver listening on {}", listener.local_addr()?);
    axum::serve(listener, router(state)).await?;
    Ok(())
}

#[cfg(test)]
mod webhooks_tests;
