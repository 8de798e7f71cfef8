//! # ticket-payments
//!
//! Ticket pricing, Stripe payment intents and webhook reconciliation.
//!
//! ## Flow
//!
//! ```text
//! ┌──────────┐  intent   ┌──────────┐  confirm  ┌──────────┐
//! │  Client  │──────────▶│ Checkout │──────────▶│  Stripe  │
//! └────┬─────┘           └──────────┘           └────┬─────┘
//!      │                                             │ webhook (signed)
//!      │ poll            ┌──────────┐  record_once  ┌▼─────────┐
//!      └────────────────▶│  Orders  │◀──────────────│ Webhook  │
//!                        └──────────┘               └──────────┘
//! ```
//!
//! The order only exists once Stripe reports `payment_intent.succeeded`.
//! Until then a query for the intent answers "pending".
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use ticket_payments::{Checkout, IntentRequest, PriceList, StripeClient, TicketQuantities};
//!
//! let checkout = Checkout::new(Arc::new(StripeClient::new("sk_test_xxx")), PriceList::default());
//!
//! let intent = checkout.create_intent(IntentRequest {
//!     quantities: TicketQuantities::new(2, 1),
//!     language: "en".into(),
//! }).await?;
//!
//! // Hand intent.client_secret to Stripe.js
//! ```

mod checkout;
mod error;
mod order;
mod pricing;
mod processor;
mod token;
mod webhook;

pub use checkout::{
    Checkout, CreateIntentBody, DEFAULT_LANGUAGE, IntentRequest, IntentResponse,
    MAX_TICKETS_PER_CATEGORY, metadata_keys,
};
pub use error::{FieldError, PaymentError, Result};
pub use order::{MemoryOrderStore, Order, OrderStatus, OrderStore};
pub use pricing::{PriceBreakdown, PriceList, TicketQuantities};
pub use processor::{
    CreatedIntent, MockPaymentProcessor, PaymentProcessor, RecordedIntent, StripeClient,
};
pub use token::{AccessToken, QrRenderer, SvgQrRenderer, TOKEN_BYTES};
pub use webhook::{
    EventData, SIGNATURE_HEADER, StripeEvent, TIMESTAMP_TOLERANCE_SECS, WebhookEvent, WebhookHandler,
    WebhookOutcome, WebhookVerifier,
};
