//! Backline office server
//!
//! This binary:
//! - Connects the `PostgreSQL` record store and runs migrations
//! - Installs the Prometheus exporter on the metrics port
//! - Wires the hosted auth provider and the chat agent client
//! - Serves the HTTP API until Ctrl+C
//!
//! # Usage
//!
//! ```bash
//! docker compose up -d
//! cargo run --bin server
//! ```

use backline_agent::{ChatAgent, HttpChatAgent};
use backline_auth::{AuthEvent, AuthProvider, GoTrueAuthProvider};
use backline_core::environment::{Clock, SystemClock};
use backline_core::record_store::RecordStore;
use backline_office::{AppState, Config, build_router, metrics};
use backline_postgres::PostgresRecordStore;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    let _ = dotenvy::dotenv();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,backline_office=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Backline office server...");

    let config = Config::from_env();
    tracing::info!(
        database = %config.database.url,
        auth = %config.auth.url,
        agent = %config.agent.url,
        "Configuration loaded"
    );

    // Metrics
    let metrics_addr: SocketAddr = config.metrics_address().parse()?;
    PrometheusBuilder::new()
        .with_http_listener(metrics_addr)
        .install()?;
    metrics::register_business_metrics();
    tracing::info!(%metrics_addr, "Prometheus exporter listening");

    // Record store
    let postgres = PostgresRecordStore::connect(
        &config.database.url,
        config.database.max_connections,
        config.database.connect_timeout,
    )
    .await?;
    postgres.migrate().await?;
    tracing::info!("✓ Migrations applied");
    let store: Arc<dyn RecordStore> = Arc::new(postgres);

    // External services
    let auth: Arc<dyn AuthProvider> = Arc::new(GoTrueAuthProvider::new(
        config.auth.url.clone(),
        config.auth.api_key.clone(),
    ));
    let agent: Arc<dyn ChatAgent> = Arc::new(HttpChatAgent::new(
        config.agent.url.clone(),
        Duration::from_secs(config.agent.timeout_secs),
    )?);
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    spawn_auth_logger(auth.as_ref());

    let state = AppState::new(store, auth, agent, clock, config.band.clone());
    let app = build_router(state);

    let address = config.server_address();
    let listener = tokio::net::TcpListener::bind(&address).await?;
    tracing::info!(%address, "✓ HTTP server listening");
    tracing::info!("Press Ctrl+C to shutdown");

    let shutdown_timeout = Duration::from_secs(config.server.shutdown_timeout);
    let server = axum::serve(listener, app).with_graceful_shutdown(async {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("Shutting down gracefully...");
    });

    // Bound the drain once the signal has fired.
    let mut server = std::pin::pin!(server.into_future());
    tokio::select! {
        result = &mut server => result?,
        () = async {
            let _ = tokio::signal::ctrl_c().await;
            tokio::time::sleep(shutdown_timeout).await;
        } => {
            tracing::warn!(?shutdown_timeout, "Shutdown timed out; dropping open connections");
        },
    }

    tracing::info!("Server stopped");
    Ok(())
}

/// Log sign-ins and sign-outs as they happen.
fn spawn_auth_logger(auth: &dyn AuthProvider) {
    let mut events = auth.subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(AuthEvent::SignedIn(session)) => {
                    tracing::info!(user_id = %session.user.id, email = %session.user.email, "Admin signed in");
                },
                Ok(AuthEvent::SignedOut { user_id }) => {
                    tracing::info!(%user_id, "Admin signed out");
                },
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Auth event logger lagged");
                },
                Err(RecvError::Closed) => break,
            }
        }
    });
}
