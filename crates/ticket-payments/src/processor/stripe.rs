//! Stripe PaymentIntents

use async_trait::async_trait;
use std::collections::HashMap;
use stripe::{Client, CreatePaymentIntent, Currency, PaymentIntent};

use super::{CreatedIntent, PaymentProcessor};
use crate::error::{PaymentError, Result};

/// Stripe client wrapper
pub struct StripeClient {
    client: Client,
    currency: Currency,
}

impl StripeClient {
    /// Create a new Stripe client charging in USD
    pub fn new(secret_key: &str) -> Self {
        Self {
            client: Client::new(secret_key),
            currency: Currency::USD,
        }
    }
}

#[async_trait]
impl PaymentProcessor for StripeClient {
    async fn create_payment_intent(
        &self,
        amount_cents: i64,
        metadata: HashMap<String, String>,
    ) -> Result<CreatedIntent> {
        let mut params = CreatePaymentIntent::new(amount_cents, self.currency);
        params.description = Some("Event tickets");
        params.metadata = Some(metadata);

        let intent = PaymentIntent::create(&self.client, params)
            .await
            .map_err(|e| PaymentError::PaymentService(e.to_string()))?;

        let client_secret = intent.client_secret.ok_or_else(|| {
            PaymentError::PaymentService("No client secret returned".into())
        })?;

        Ok(CreatedIntent {
            id: intent.id.to_string(),
            client_secret,
        })
    }

    fn name(&self) -> &str {
        "stripe"
    }
}
