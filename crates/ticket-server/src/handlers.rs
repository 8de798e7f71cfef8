//! HTTP Handlers

use axum::{
    Json,
    body::Bytes,
    extract::{Path, State, rejection::JsonRejection},
    http::HeaderMap,
};
use chrono::{DateTime, Utc};
use serde::Serialize;

use ticket_payments::{
    CreateIntentBody, IntentRequest, IntentResponse, OrderStatus, PaymentError, SIGNATURE_HEADER,
    TicketQuantities,
};

use crate::error::ApiError;
use crate::state::AppState;

/// Stripe payment intent ID prefix
const INTENT_ID_PREFIX: &str = "pi_";
const MAX_INTENT_ID_LEN: usize = 255;

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub received: bool,
    pub duplicate: bool,
}

#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "lowercase", rename_all_fields = "camelCase")]
pub enum OrderTokenResponse {
    /// No order yet; the client should keep polling
    Pending,

    Ready {
        token: String,
        qr_code: String,
        ticket_status: OrderStatus,
        created_at: DateTime<Utc>,
        quantities: TicketQuantities,
    },
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        timestamp: Utc::now(),
    })
}

/// Price the selection and open a Stripe payment intent
pub async fn create_payment_intent(
    State(state): State<AppState>,
    payload: Result<Json<CreateIntentBody>, JsonRejection>,
) -> Result<Json<IntentResponse>, ApiError> {
    // Wrong JSON types fail here, before field validation
    let Json(body) = payload.map_err(|rejection| {
        PaymentError::invalid("body", rejection.body_text())
    })?;

    let request = IntentRequest::try_from(body)?;
    let response = state.checkout.create_intent(request).await?;

    Ok(Json(response))
}

/// Stripe webhook handler
///
/// Takes the body as raw bytes; the signature covers them exactly.
pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookAck>, ApiError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| PaymentError::Authentication("missing Stripe signature".into()))?;

    let outcome = state.webhooks.receive(&body, signature)?;

    Ok(Json(WebhookAck {
        received: true,
        duplicate: outcome.is_duplicate(),
    }))
}

/// Poll for the ticket issued for a payment intent
pub async fn order_token(
    State(state): State<AppState>,
    Path(payment_intent_id): Path<String>,
) -> Result<Json<OrderTokenResponse>, ApiError> {
    validate_intent_id(&payment_intent_id)?;

    let Some(order) = state.order_store.get(&payment_intent_id)? else {
        tracing::debug!(payment_intent_id = %payment_intent_id, "Order pending");
        return Ok(Json(OrderTokenResponse::Pending));
    };

    let qr_code = state.qr.render(&order.access_token)?;

    Ok(Json(OrderTokenResponse::Ready {
        token: order.access_token.as_str().to_string(),
        qr_code,
        ticket_status: order.status,
        created_at: order.created_at,
        quantities: order.quantities,
    }))
}

fn validate_intent_id(id: &str) -> Result<(), PaymentError> {
    let valid = id.len() <= MAX_INTENT_ID_LEN
        && id
            .strip_prefix(INTENT_ID_PREFIX)
            .is_some_and(|rest| {
                !rest.is_empty() && rest.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
            });

    if valid {
        Ok(())
    } else {
        Err(PaymentError::invalid(
            "paymentIntentId",
            "must be a Stripe payment intent ID (pi_...)",
        ))
    }
}
