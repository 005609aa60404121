//! dispatch-server: order economics and dispatch core
//!
//! Long-running service that:
//! - Prices checkouts (delivery fee, coupons) and creates orders
//! - Drives the order lifecycle, payment callbacks and settlement
//! - Keeps the commission and supplier payables ledgers
//! - Relays live rider positions to dispatch consoles over WebSocket

mod api;
mod auth;
mod commission;
mod config;
mod coupons;
mod db;
mod error;
mod ledger;
mod live;
mod orders;
mod payment;
mod pricing;
mod services;
mod settings;
mod state;

use config::Config;
use state::AppState;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Registry entries older than this are forgotten
const LOCATION_RETENTION_HOURS: i64 = 24;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    // Load .env file
    let _ = dotenvy::dotenv();

    let config = Config::from_env()?;

    // Initialize tracing
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "dispatch_server=info,tower_http=info".into());
    if config.log_format.as_deref() == Some("json") {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    tracing::info!("Starting dispatch-server (env: {})", config.environment);

    // Initialize application state
    let state = AppState::new(&config).await?;

    // Prepay sweep
    let prepay = state.prepay.clone();
    let sweep_every = config.prepay_sweep_interval;
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(sweep_every);
        loop {
            interval.tick().await;
            let dropped = prepay.sweep(chrono::Utc::now());
            if dropped > 0 {
                tracing::info!(dropped, remaining = prepay.len(), "Expired prepay entries swept");
            }
        }
    });

    // Rider registry prune (hourly)
    let riders = state.riders.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(3600));
        loop {
            interval.tick().await;
            let dropped = riders.prune(
                chrono::Utc::now(),
                chrono::Duration::hours(LOCATION_RETENTION_HOURS),
            );
            if dropped > 0 {
                tracing::info!(dropped, "Stale rider locations pruned");
            }
        }
    });

    let app = api::create_router(state);

    let http_addr = format!("0.0.0.0:{}", config.http_port);
    let listener = tokio::net::TcpListener::bind(&http_addr).await?;
    tracing::info!("dispatch-server HTTP listening on {http_addr}");

    axum::serve(listener, app).await?;
    Ok(())
}
