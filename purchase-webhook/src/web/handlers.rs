//! Webhook endpoint handlers.
//!
//! The Stripe handler:
//! 1. Rejects anything but POST (405)
//! 2. Verifies the signature over the raw body (400 on failure)
//! 3. Records checkout purchases and emails the buyer
//! 4. Returns 200 for everything else, even when storage or email fails
//!
//! Stripe retries any non-2xx response, so collaborator failures are logged
//! and swallowed instead of surfaced.

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    extract::{Request, State},
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::{error, info, warn};

use crate::event::{CheckoutSession, StripeEvent};
use crate::mailer::Mailer;
use crate::purchase::{NotificationRequest, PurchaseRecord};
use crate::storage::PurchaseStore;
use crate::web::signature::{verify_stripe_signature, SIGNATURE_HEADER};
use crate::Config;

/// Largest event body accepted.
const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<dyn PurchaseStore>,
    pub mailer: Arc<dyn Mailer>,
}

impl AppState {
    pub fn new(config: Config, store: Arc<dyn PurchaseStore>, mailer: Arc<dyn Mailer>) -> Self {
        Self {
            config: Arc::new(config),
            store,
            mailer,
        }
    }
}

// =============================================================================
// Health Check
// =============================================================================

/// Health check response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// Health check endpoint.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

// =============================================================================
// Stripe Webhook
// =============================================================================

/// Acknowledgement body.
#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    pub received: bool,
}

fn acknowledge() -> Response {
    (StatusCode::OK, Json(WebhookResponse { received: true })).into_response()
}

fn reject(message: impl std::fmt::Display) -> Response {
    (StatusCode::BAD_REQUEST, format!("Webhook Error: {}", message)).into_response()
}

/// Stripe webhook endpoint.
///
/// Mounted for every method so that non-POST requests get a bare 405.
pub async fn stripe_webhook(State(state): State<AppState>, request: Request) -> Response {
    if request.method() != Method::POST {
        warn!(method = %request.method(), "stripe_webhook_invalid_method");
        return (StatusCode::METHOD_NOT_ALLOWED, Body::empty()).into_response();
    }

    let signature = request
        .headers()
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    // The signature covers the exact bytes sent, so the body is never re-encoded
    let body = match to_bytes(request.into_body(), MAX_BODY_BYTES).await {
        Ok(body) => body,
        Err(e) => {
            warn!(error = %e, "stripe_webhook_body_read_failed");
            return reject(e);
        }
    };

    info!(
        body_length = body.len(),
        has_signature = signature.is_some(),
        "stripe_webhook_received"
    );

    if let Err(e) = verify_stripe_signature(
        &state.config.stripe_webhook_secret,
        &body,
        signature.as_deref(),
        state.config.signature_tolerance_secs,
    ) {
        warn!(error = %e, "stripe_signature_invalid");
        return reject(e);
    }

    let event: StripeEvent = match serde_json::from_slice(&body) {
        Ok(event) => event,
        Err(e) => {
            warn!(error = %e, "stripe_event_parse_failed");
            return reject(e);
        }
    };

    info!(event_id = %event.id, event_type = %event.event_type, "stripe_event_verified");

    if !event.is_checkout_completed() {
        info!(event_type = %event.event_type, "stripe_event_ignored");
        return acknowledge();
    }

    match event.checkout_session() {
        Ok(session) => handle_checkout_completed(&state, &session).await,
        Err(e) => {
            error!(event_id = %event.id, error = %e, "checkout_session_parse_failed");
        }
    }

    acknowledge()
}

/// Persist the purchase and send the confirmation email.
///
/// Neither step can fail the request.
pub async fn handle_checkout_completed(state: &AppState, session: &CheckoutSession) {
    let record = PurchaseRecord::from_session(
        session,
        &state.config.field_keys,
        &state.config.purchase_source,
    );

    let purchase_id = match state.store.insert(&record).await {
        Ok(stored) => {
            info!(
                external_reference = %record.external_reference,
                purchase_id = ?stored.id,
                "purchase_insert_succeeded"
            );
            stored.id
        }
        Err(e) => {
            error!(
                external_reference = %record.external_reference,
                error = %e,
                "purchase_insert_failed"
            );
            None
        }
    };

    let Some(email) =
        NotificationRequest::for_purchase(&record, &state.config.email, purchase_id.as_deref())
    else {
        warn!(
            external_reference = %record.external_reference,
            "confirmation_email_skipped_no_recipient"
        );
        return;
    };

    let outcome = state.mailer.send(&email).await;

    match outcome.error {
        None => info!(
            to = %email.to,
            email_id = ?outcome.id,
            "confirmation_email_sent"
        ),
        Some(e) => error!(to = %email.to, error = %e, "confirmation_email_failed"),
    }
}
