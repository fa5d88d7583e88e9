//! Payment gateway aggregator HTTP entrypoint.
//!
//! This binary launches an Axum-based HTTP server exposing the merchant
//! facade in front of the `standard_bank_pay`, `cpay`, `cardgate`, and
//! `mpesa` provider adapters.
//!
//! Endpoints:
//! - `POST /api/v1/payments/initialize` — initiate a payment
//! - `POST /api/v1/payments/{id}/verify` — pull-reconcile a transaction
//! - `POST /api/v1/payments/{id}/refund` — refund a completed transaction
//! - `GET /api/v1/payments/{id}` — fetch a transaction
//! - `GET /api/v1/payments` — list transactions
//! - `POST /api/v1/webhooks/{provider}` — inbound provider webhook
//! - `POST /api/v1/merchants/signup`, `/login` — merchant onboarding
//!
//! This server includes:
//! - OpenTelemetry tracing via `TraceLayer`
//! - CORS support for cross-origin clients
//! - Postgres-backed persistence via `sqlx`
//!
//! Environment:
//! - `.env` values loaded at startup
//! - `DATABASE_URL`, `HOST`, `PORT` control the database and bind address
//! - `OTEL_*` variables enable tracing export to systems like Honeycomb

use axum::Router;
use axum::http::Method;
use dotenvy::dotenv;
use std::net::SocketAddr;
use std::time::Duration;
use tower_http::cors;

use paygate::config::Config;
use paygate::sig_down::SigDown;
use paygate::state::AppState;
use paygate::telemetry::Telemetry;
use paygate::{handlers, state};

/// Initializes the payment gateway server.
///
/// - Loads `.env` variables.
/// - Initializes OpenTelemetry tracing.
/// - Connects to Postgres and applies pending migrations.
/// - Starts an Axum HTTP server with the merchant-facing handlers.
/// - Spawns the webhook retry driver on a fixed interval.
///
/// Binds to the address specified by the `HOST` and `PORT` env vars.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    rustls::crypto::CryptoProvider::install_default(rustls::crypto::ring::default_provider())
        .expect("failed to initialize rustls crypto provider");

    dotenv().ok();

    let telemetry = Telemetry::new();

    let config = Config::load();

    let pool = paygate_store::connect(&config.database_url, config.database_max_connections).await?;
    paygate_store::run_migrations(&pool).await?;

    let app_state = AppState::new(pool, &config);
    spawn_webhook_retry_driver(app_state.clone());

    let http_endpoints = Router::new().merge(handlers::routes()).with_state(app_state).layer(telemetry.http_tracing()).layer(
        cors::CorsLayer::new()
            .allow_origin(cors::Any)
            .allow_methods([Method::GET, Method::POST])
            .allow_headers(cors::Any),
    );

    let addr = SocketAddr::new(config.host, config.port);
    tracing::info!("Starting server at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap_or_else(|e| {
        tracing::error!("Failed to bind to {}: {}", addr, e);
        std::process::exit(1);
    });

    let sig_down = SigDown::try_new()?;
    let axum_cancellation_token = sig_down.cancellation_token();
    let axum_graceful_shutdown = async move { axum_cancellation_token.cancelled().await };
    axum::serve(listener, http_endpoints.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(axum_graceful_shutdown)
        .await?;

    Ok(())
}

/// Drives the webhook pipeline's `retry_due` on a fixed interval. The
/// pipeline itself owns no clock or scheduler; this binary supplies the
/// simplest one — a background `tokio::spawn` loop — since there's no
/// separate cron/queue-worker process in scope here.
fn spawn_webhook_retry_driver(state: state::AppState) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(30));
        loop {
            interval.tick().await;
            match state.webhooks.retry_due(chrono::Utc::now()).await {
                Ok(count) if count > 0 => tracing::info!(processed = count, "webhook retry sweep"),
                Ok(_) => {}
                Err(e) => tracing::warn!(error = %e, "webhook retry sweep failed"),
            }
        }
    });
}
