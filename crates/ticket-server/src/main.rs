//! Ticket checkout HTTP server
//!
//! Axum-based server that opens Stripe payment intents, receives Stripe
//! webhooks and hands out QR-coded tickets once payment is confirmed.

mod config;
mod error;
mod handlers;
mod routes;
mod state;

use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ticket_payments::{MemoryOrderStore, StripeClient, SvgQrRenderer};

use crate::config::ServerConfig;
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Missing Stripe secrets abort startup
    let config = ServerConfig::from_env().context("invalid configuration")?;

    // Orders live in memory and are lost on restart
    let order_store = Arc::new(MemoryOrderStore::new());

    let state = AppState::new(
        Arc::new(StripeClient::new(&config.stripe_secret_key)),
        order_store,
        Arc::new(SvgQrRenderer::default()),
        config.prices.clone(),
        &config.stripe_webhook_secret,
    );

    let prices = state.checkout.prices();
    tracing::info!(
        female_price = %prices.female_price,
        male_price = %prices.male_price,
        fee_rate = %prices.fee_rate,
        "Ticket prices loaded"
    );

    let cors = routes::cors_layer(&config.allowed_origin)?;
    let app = routes::router(state, cors);

    // Start server
    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    tracing::info!("ticket-server running on http://{}", addr);
    tracing::info!("Endpoints:");
    tracing::info!("  GET  /health                               - Health check");
    tracing::info!("  POST /api/payment-intents                  - Create payment intent");
    tracing::info!("  POST /api/webhooks/stripe                  - Stripe webhook");
    tracing::info!("  GET  /api/orders/{{payment_intent_id}}/token - Poll for ticket");
    tracing::info!(allowed_origin = %config.allowed_origin, "CORS configured");

    axum::serve(listener, app).await?;

    Ok(())
}
