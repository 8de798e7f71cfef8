//! Payment Intent Checkout
//!
//! Validates a ticket selection, prices it and opens a payment intent.
//! The browser confirms the intent with the returned client secret; the
//! order itself only exists once the webhook reports success.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use validator::{Validate, ValidationError, ValidationErrors};

use crate::error::{FieldError, PaymentError, Result};
use crate::pricing::{PriceBreakdown, PriceList, TicketQuantities};
use crate::processor::PaymentProcessor;

/// Maximum tickets per category in one purchase
pub const MAX_TICKETS_PER_CATEGORY: u32 = 20;

/// Language used when the request omits one
pub const DEFAULT_LANGUAGE: &str = "en";

/// Metadata keys attached to every intent
pub mod metadata_keys {
    pub const FEMALE_QTY: &str = "femaleQty";
    pub const MALE_QTY: &str = "maleQty";
    pub const SUBTOTAL: &str = "subtotal";
    pub const FEE: &str = "fee";
    pub const LANGUAGE: &str = "language";
}

/// Request body for `POST /api/payment-intents`
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateIntentBody {
    #[validate(
        required(message = "is required"),
        range(max = 20, message = "must be at most 20")
    )]
    pub female_qty: Option<u32>,

    #[validate(
        required(message = "is required"),
        range(max = 20, message = "must be at most 20")
    )]
    pub male_qty: Option<u32>,

    #[serde(default)]
    #[validate(custom(function = "validate_language_tag"))]
    pub language: Option<String>,
}

/// A validated request to start checkout
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IntentRequest {
    pub quantities: TicketQuantities,
    pub language: String,
}

impl TryFrom<CreateIntentBody> for IntentRequest {
    type Error = PaymentError;

    /// Reports every invalid field, not just the first.
    fn try_from(body: CreateIntentBody) -> Result<Self> {
        body.validate().map_err(validation_error)?;

        Ok(Self {
            quantities: TicketQuantities::new(
                body.female_qty.unwrap_or_default(),
                body.male_qty.unwrap_or_default(),
            ),
            language: body
                .language
                .map_or_else(|| DEFAULT_LANGUAGE.to_string(), |tag| tag.to_ascii_lowercase()),
        })
    }
}

fn validate_language_tag(tag: &str) -> std::result::Result<(), ValidationError> {
    let valid = (2..=8).contains(&tag.len())
        && tag.starts_with(|c: char| c.is_ascii_alphabetic())
        && tag.chars().all(|c| c.is_ascii_alphanumeric() || c == '-');

    if valid {
        Ok(())
    } else {
        let mut error = ValidationError::new("language_tag");
        error.message = Some("must be a language tag such as \"en\"".into());
        Err(error)
    }
}

/// Wire names in body order
const BODY_FIELDS: [(&str, &str); 3] = [
    ("female_qty", metadata_keys::FEMALE_QTY),
    ("male_qty", metadata_keys::MALE_QTY),
    ("language", metadata_keys::LANGUAGE),
];

fn validation_error(errors: ValidationErrors) -> PaymentError {
    let mut fields: Vec<(usize, FieldError)> = errors
        .field_errors()
        .into_iter()
        .flat_map(|(field, problems)| {
            let (position, wire) = BODY_FIELDS
                .iter()
                .enumerate()
                .find(|(_, (name, _))| *name == &*field)
                .map_or((BODY_FIELDS.len(), field.to_string()), |(i, (_, wire))| {
                    (i, (*wire).to_string())
                });

            problems
                .iter()
                .map(move |problem| {
                    let message = problem
                        .message
                        .as_ref()
                        .map_or_else(|| problem.code.to_string(), ToString::to_string);
                    (position, FieldError::new(wire.clone(), message))
                })
                .collect::<Vec<_>>()
        })
        .collect();

    fields.sort_by_key(|(position, _)| *position);
    PaymentError::Validation(fields.into_iter().map(|(_, field)| field).collect())
}

/// Result of opening a payment intent
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntentResponse {
    pub client_secret: String,
    pub payment_intent_id: String,
    pub pricing: PriceBreakdown,
}

/// Checkout service
pub struct Checkout {
    processor: Arc<dyn PaymentProcessor>,
    prices: PriceList,
}

impl Checkout {
    pub fn new(processor: Arc<dyn PaymentProcessor>, prices: PriceList) -> Self {
        Self { processor, prices }
    }

    pub fn prices(&self) -> &PriceList {
        &self.prices
    }

    /// Price the request and open an intent with the processor
    pub async fn create_intent(&self, request: IntentRequest) -> Result<IntentResponse> {
        let pricing = self.prices.quote(request.quantities)?;

        let metadata = HashMap::from([
            (metadata_keys::FEMALE_QTY.to_string(), request.quantities.female.to_string()),
            (metadata_keys::MALE_QTY.to_string(), request.quantities.male.to_string()),
            (metadata_keys::SUBTOTAL.to_string(), pricing.subtotal.to_string()),
            (metadata_keys::FEE.to_string(), pricing.fee.to_string()),
            (metadata_keys::LANGUAGE.to_string(), request.language.clone()),
        ]);

        let intent = self
            .processor
            .create_payment_intent(pricing.amount_cents, metadata)
            .await?;

        tracing::info!(
            payment_intent_id = %intent.id,
            processor = self.processor.name(),
            amount_cents = pricing.amount_cents,
            tickets = request.quantities.total(),
            "Created payment intent"
        );

        Ok(IntentResponse {
            client_secret: intent.client_secret,
            payment_intent_id: intent.id,
            pricing,
        })
    }
}
