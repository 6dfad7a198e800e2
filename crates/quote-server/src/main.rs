//! quote-server
//!
//! Axum-based server exposing merged CoinMarketCap exchange rates.
//!
//! All quote traffic goes through one process-wide `QuoteClient`, so its cache
//! protects the rate-limited upstream across every concurrent request.

mod handlers;
mod state;

use std::sync::Arc;
use std::time::Duration;

use axum::{routing::get, Router};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crypto_quotes::{CoinMarketCapConfig, CurrencyConfig, QuoteClient};

use crate::handlers::{exchange_rates, health_check};
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load environment
    dotenvy::dotenv().ok();

    let provider_config = CoinMarketCapConfig::from_env()?;
    let currencies = CurrencyConfig::from_env();
    let client = QuoteClient::from_config(&provider_config)?;

    tracing::info!(
        base_url = %provider_config.base_url,
        tier = provider_config.tier.as_str(),
        "✓ CoinMarketCap client configured"
    );
    tracing::info!("  Default fiat currencies: {}", currencies.default_fiat_symbols.join(", "));

    let request_timeout = std::env::var("REQUEST_TIMEOUT_SECS")
        .ok()
        .and_then(|s| s.parse().ok())
        .map_or(Duration::from_secs(30), Duration::from_secs);

    let state = AppState {
        quotes: Arc::new(client),
        currencies: Arc::new(currencies),
    };

    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Build router
    let app = Router::new()
        .route("/health", get(health_check))
        .route("/api/1.0/crypto/exchange-rates", get(exchange_rates))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors)
                .layer(TimeoutLayer::new(request_timeout)),
        )
        .with_state(state);

    // Start server
    let addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("quote-server running on http://{}", addr);
    tracing::info!("Endpoints:");
    tracing::info!("  GET  /health                          - Health check");
    tracing::info!("  GET  /api/1.0/crypto/exchange-rates   - Latest exchange rates");

    axum::serve(listener, app).await?;

    tracing::info!("stopped");
    Ok(())
}
