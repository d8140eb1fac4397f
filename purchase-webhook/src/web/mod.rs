//! Web server module for the payment webhook.
//!
//! This module provides:
//! - The Stripe webhook endpoint and a health check
//! - Stripe signature verification
//! - The router wiring both to shared state

pub mod handlers;
pub mod signature;

use axum::{
    routing::{any, get},
    Router,
};
use tower_http::trace::TraceLayer;

pub use handlers::{
    handle_checkout_completed, health, stripe_webhook, AppState, HealthResponse, WebhookResponse,
};
pub use signature::{verify_stripe_signature, SignatureError};

/// Build the application router.
pub fn router(state: AppState) -> Router {
    let webhook_path = state.config.webhook_path.clone();

    Router::new()
        .route("/health", get(health))
        .route(&webhook_path, any(stripe_webhook))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
