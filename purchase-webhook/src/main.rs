//! Purchase webhook server.
//!
//! Loads configuration, builds the storage and email collaborators once, and
//! serves the Stripe webhook until SIGINT/SIGTERM.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use reqwest::Client;
use tokio::{net::TcpListener, signal};
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use purchase_webhook::{router, AppState, Config, ResendMailer, SupabaseStore};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize structured JSON logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().json().flatten_event(true))
        .init();

    info!("web_server_starting");

    // Missing credentials stop the process here
    let config = Config::from_env().context("Invalid configuration")?;
    info!(
        port = config.port,
        webhook_path = %config.webhook_path,
        supabase_host = ?config.supabase_url.host_str(),
        purchases_table = %config.purchases_table,
        deduplicate_purchases = config.deduplicate_purchases,
        signature_tolerance_secs = config.signature_tolerance_secs,
        email_from = %config.email.from,
        "config_loaded"
    );

    let client = Client::builder()
        .timeout(config.request_timeout())
        .build()
        .context("Failed to create HTTP client")?;

    let store = SupabaseStore::new(
        client.clone(),
        config.supabase_url.clone(),
        config.supabase_key.clone(),
        config.purchases_table.clone(),
        config.deduplicate_purchases,
    );

    let mailer = ResendMailer::new(
        client,
        config.resend_base_url.clone(),
        config.resend_api_key.clone(),
    );

    let port = config.port;
    let state = AppState::new(config, Arc::new(store), Arc::new(mailer));
    let app = router(state);

    // Bind to address
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    info!(address = %addr, "web_server_listening");

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("web_server_shutdown_complete");

    Ok(())
}

/// Create a future that completes when a shutdown signal is received.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "ctrl_c_handler_failed");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "sigterm_handler_failed");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT"),
        _ = terminate => info!("Received SIGTERM"),
    }

    info!("web_server_shutting_down");
}
