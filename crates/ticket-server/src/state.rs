//! Application State

use std::sync::Arc;

use ticket_payments::{
    Checkout, OrderStore, PaymentProcessor, PriceList, QrRenderer, WebhookHandler,
    WebhookVerifier,
};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Prices tickets and opens payment intents
    pub checkout: Arc<Checkout>,

    /// Orders keyed by payment intent ID
    pub order_store: Arc<dyn OrderStore>,

    /// Verifies and applies Stripe notifications
    pub webhooks: Arc<WebhookHandler<dyn OrderStore>>,

    /// Renders access tokens as QR codes
    pub qr: Arc<dyn QrRenderer>,
}

impl AppState {
    pub fn new(
        processor: Arc<dyn PaymentProcessor>,
        order_store: Arc<dyn OrderStore>,
        qr: Arc<dyn QrRenderer>,
        prices: PriceList,
        webhook_secret: &str,
    ) -> Self {
        Self {
            checkout: Arc::new(Checkout::new(processor, prices)),
            webhooks: Arc::new(WebhookHandler::new(
                order_store.clone(),
                WebhookVerifier::new(webhook_secret),
            )),
            order_store,
            qr,
        }
    }
}
