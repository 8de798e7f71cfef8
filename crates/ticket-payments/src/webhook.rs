//! Stripe Webhook Handling
//!
//! Verifies signed notifications and turns `payment_intent.succeeded` into
//! exactly one order per payment intent.
//!
//! ```text
//!   raw body + stripe-signature
//!            │
//!            ▼
//!   ┌─────────────────┐  bad   ┌──────────────────────┐
//!   │ verify HMAC     │───────▶│ Authentication error │
//!   └────────┬────────┘        └──────────────────────┘
//!            ▼
//!   ┌─────────────────┐  yes   ┌──────────────────────┐
//!   │ processed?      │───────▶│ ack (duplicate)      │
//!   └────────┬────────┘        └──────────────────────┘
//!            ▼ no
//!   ┌─────────────────┐
//!   │ record_once     │  marker + order in one write
//!   └─────────────────┘
//! ```

use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use serde_json::Value;
use sha2::Sha256;
use std::collections::HashMap;
use std::sync::Arc;

use crate::checkout::metadata_keys;
use crate::error::{PaymentError, Result};
use crate::order::{Order, OrderStore};
use crate::pricing::TicketQuantities;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the Stripe signature
pub const SIGNATURE_HEADER: &str = "stripe-signature";

/// Reject signatures older than this
pub const TIMESTAMP_TOLERANCE_SECS: i64 = 300;

/// Clock skew allowed for timestamps in the future
const MAX_FUTURE_SKEW_SECS: i64 = 60;

/// Verifies `t=...,v1=...` signature headers
#[derive(Clone)]
pub struct WebhookVerifier {
    secret: String,
}

impl WebhookVerifier {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Verify against the current clock
    pub fn verify(&self, payload: &[u8], header: &str) -> Result<()> {
        self.verify_at(payload, header, Utc::now().timestamp())
    }

    /// Verify against an explicit clock (unix seconds)
    pub fn verify_at(&self, payload: &[u8], header: &str, now: i64) -> Result<()> {
        let mut timestamp = None;
        let mut signatures = Vec::new();

        for part in header.split(',') {
            if let Some(t) = part.trim().strip_prefix("t=") {
                timestamp = Some(t);
            } else if let Some(s) = part.trim().strip_prefix("v1=") {
                signatures.push(s);
            }
        }

        let timestamp_str = timestamp
            .ok_or_else(|| PaymentError::Authentication("missing timestamp".into()))?;
        if signatures.is_empty() {
            return Err(PaymentError::Authentication("missing v1 signature".into()));
        }

        let timestamp: i64 = timestamp_str
            .parse()
            .map_err(|_| PaymentError::Authentication("invalid timestamp".into()))?;

        let age = now
            .checked_sub(timestamp)
            .ok_or_else(|| PaymentError::Authentication("timestamp out of range".into()))?;
        if age > TIMESTAMP_TOLERANCE_SECS {
            return Err(PaymentError::Authentication(format!(
                "timestamp too old ({age}s)"
            )));
        }
        if age < -MAX_FUTURE_SKEW_SECS {
            return Err(PaymentError::Authentication(format!(
                "timestamp in the future ({}s)",
                age.unsigned_abs()
            )));
        }

        let mac = self.mac(timestamp_str, payload)?;

        // verify_slice compares in constant time
        let matched = signatures
            .iter()
            .filter_map(|s| hex::decode(s).ok())
            .any(|sig| mac.clone().verify_slice(&sig).is_ok());

        if matched {
            Ok(())
        } else {
            Err(PaymentError::Authentication("signature mismatch".into()))
        }
    }

    /// Build a signature header for `payload`, as Stripe would send it
    pub fn sign(&self, payload: &[u8], timestamp: i64) -> Result<String> {
        let timestamp = timestamp.to_string();
        let signature = hex::encode(self.mac(&timestamp, payload)?.finalize().into_bytes());
        Ok(format!("t={timestamp},v1={signature}"))
    }

    fn mac(&self, timestamp: &str, payload: &[u8]) -> Result<HmacSha256> {
        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .map_err(|e| PaymentError::Config(format!("invalid webhook secret: {e}")))?;
        mac.update(timestamp.as_bytes());
        mac.update(b".");
        mac.update(payload);
        Ok(mac)
    }
}

/// Envelope of a Stripe event
#[derive(Clone, Debug, Deserialize)]
pub struct StripeEvent {
    pub id: String,

    #[serde(rename = "type")]
    pub event_type: String,

    pub data: EventData,
}

#[derive(Clone, Debug, Deserialize)]
pub struct EventData {
    pub object: Value,
}

#[derive(Deserialize)]
struct PaymentIntentObject {
    id: String,

    #[serde(default)]
    metadata: HashMap<String, String>,

    #[serde(default)]
    last_payment_error: Option<PaymentErrorObject>,
}

#[derive(Deserialize)]
struct PaymentErrorObject {
    #[serde(default)]
    message: Option<String>,
}

/// Parsed webhook event
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WebhookEvent {
    /// Payment captured - issue the ticket
    PaymentSucceeded {
        payment_intent_id: String,
        quantities: TicketQuantities,
    },

    /// Payment attempt failed - nothing to issue
    PaymentFailed {
        payment_intent_id: String,
        reason: Option<String>,
    },

    /// Unhandled event type
    Other { event_type: String },
}

/// What handling a webhook did
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WebhookOutcome {
    /// A new order was recorded
    OrderCreated { payment_intent_id: String },

    /// The payment intent was already finalized
    Duplicate { payment_intent_id: String },

    /// Acknowledged without state change
    Ignored { event_type: String },
}

impl WebhookOutcome {
    pub fn is_duplicate(&self) -> bool {
        matches!(self, WebhookOutcome::Duplicate { .. })
    }
}

/// Webhook handler
pub struct WebhookHandler<S: OrderStore + ?Sized> {
    order_store: Arc<S>,
    verifier: WebhookVerifier,
}

impl<S: OrderStore + ?Sized> WebhookHandler<S> {
    pub fn new(order_store: Arc<S>, verifier: WebhookVerifier) -> Self {
        Self {
            order_store,
            verifier,
        }
    }

    /// Verify the signature over the raw bytes, then parse the event
    pub fn parse_event(&self, payload: &[u8], signature: &str) -> Result<StripeEvent> {
        self.verifier.verify(payload, signature)?;

        serde_json::from_slice(payload).map_err(|e| PaymentError::WebhookParse(e.to_string()))
    }

    /// Verify, parse and handle in one call
    pub fn receive(&self, payload: &[u8], signature: &str) -> Result<WebhookOutcome> {
        let event = self.parse_event(payload, signature)?;
        self.handle(&event)
    }

    /// Process a verified event
    pub fn handle(&self, event: &StripeEvent) -> Result<WebhookOutcome> {
        tracing::info!(event_id = %event.id, event_type = %event.event_type, "Processing Stripe webhook");

        match parse_webhook_event(event) {
            WebhookEvent::PaymentSucceeded {
                payment_intent_id,
                quantities,
            } => self.finalize(payment_intent_id, quantities),

            WebhookEvent::PaymentFailed {
                payment_intent_id,
                reason,
            } => {
                tracing::warn!(
                    payment_intent_id = %payment_intent_id,
                    reason = ?reason,
                    "Payment failed"
                );
                Ok(WebhookOutcome::Ignored {
                    event_type: event.event_type.clone(),
                })
            }

            WebhookEvent::Other { event_type } => {
                tracing::debug!(event_type = %event_type, "Unhandled webhook event");
                Ok(WebhookOutcome::Ignored { event_type })
            }
        }
    }

    fn finalize(
        &self,
        payment_intent_id: String,
        quantities: TicketQuantities,
    ) -> Result<WebhookOutcome> {
        if self.order_store.is_processed(&payment_intent_id)? {
            tracing::info!(payment_intent_id = %payment_intent_id, "Duplicate payment notification, already processed");
            return Ok(WebhookOutcome::Duplicate { payment_intent_id });
        }

        let order = Order::new(payment_intent_id, quantities);

        if !self.order_store.record_once(&order)? {
            tracing::info!(payment_intent_id = %order.payment_intent_id, "Lost finalization race, already processed");
            return Ok(WebhookOutcome::Duplicate {
                payment_intent_id: order.payment_intent_id,
            });
        }

        tracing::info!(
            payment_intent_id = %order.payment_intent_id,
            female = quantities.female,
            male = quantities.male,
            "Created order"
        );

        Ok(WebhookOutcome::OrderCreated {
            payment_intent_id: order.payment_intent_id,
        })
    }
}

/// Parse Stripe event into our event type
///
/// A payment intent event whose object cannot be read is treated as
/// unhandled: it is logged and acknowledged so Stripe stops redelivering it.
fn parse_webhook_event(event: &StripeEvent) -> WebhookEvent {
    let other = || WebhookEvent::Other {
        event_type: event.event_type.clone(),
    };

    match event.event_type.as_str() {
        "payment_intent.succeeded" => {
            let Some(intent) = payment_intent(event) else {
                return other();
            };
            let quantities = TicketQuantities::new(
                metadata_count(&intent.metadata, metadata_keys::FEMALE_QTY),
                metadata_count(&intent.metadata, metadata_keys::MALE_QTY),
            );

            WebhookEvent::PaymentSucceeded {
                payment_intent_id: intent.id,
                quantities,
            }
        }

        "payment_intent.payment_failed" => match payment_intent(event) {
            Some(intent) => WebhookEvent::PaymentFailed {
                payment_intent_id: intent.id,
                reason: intent.last_payment_error.and_then(|e| e.message),
            },
            None => other(),
        },

        _ => other(),
    }
}

fn payment_intent(event: &StripeEvent) -> Option<PaymentIntentObject> {
    match PaymentIntentObject::deserialize(&event.data.object) {
        Ok(intent) => Some(intent),
        Err(e) => {
            tracing::warn!(
                event_id = %event.id,
                event_type = %event.event_type,
                error = %e,
                "Unreadable payment intent in webhook, acknowledging without action"
            );
            None
        }
    }
}

fn metadata_count(metadata: &HashMap<String, String>, key: &str) -> u32 {
    match metadata.get(key).map(|v| v.parse::<u32>()) {
        Some(Ok(n)) => n,
        Some(Err(_)) => {
            tracing::warn!(key, "Non-numeric ticket quantity in metadata, using 0");
            0
        }
        None => 0,
    }
}
