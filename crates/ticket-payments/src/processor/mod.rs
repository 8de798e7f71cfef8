//! Payment Processor Integration
//!
//! Abstraction over the service that opens payment intents.

mod mock;
mod stripe;

pub use self::mock::{MockPaymentProcessor, RecordedIntent};
pub use self::stripe::StripeClient;

use async_trait::async_trait;
use std::collections::HashMap;

use crate::error::Result;

/// An intent opened with the processor
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CreatedIntent {
    /// Processor intent ID (pi_...)
    pub id: String,

    /// Secret the browser uses to confirm the payment
    pub client_secret: String,
}

/// Payment processor trait
///
/// Implemented by the Stripe client and by an in-memory mock for tests.
#[async_trait]
pub trait PaymentProcessor: Send + Sync {
    /// Open a payment intent for `amount_cents` (USD minor units)
    async fn create_payment_intent(
        &self,
        amount_cents: i64,
        metadata: HashMap<String, String>,
    ) -> Result<CreatedIntent>;

    /// Processor name
    fn name(&self) -> &str;
}
