//! Payment Error Types

use serde::Serialize;
use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, PaymentError>;

/// A single rejected input field
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Payment-related errors
#[derive(Error, Debug)]
pub enum PaymentError {
    /// Client input rejected, one entry per offending field
    #[error("Validation failed: {}", summarize(.0))]
    Validation(Vec<FieldError>),

    /// Webhook signature missing or invalid
    #[error("Webhook authentication failed: {0}")]
    Authentication(String),

    /// Webhook payload parsing failed
    #[error("Webhook parse error: {0}")]
    WebhookParse(String),

    /// Stripe API error
    #[error("Payment service error: {0}")]
    PaymentService(String),

    /// QR code rendering failed
    #[error("Render error: {0}")]
    Render(String),

    /// Storage error
    #[error("Storage error: {0}")]
    Storage(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl PaymentError {
    /// Shorthand for a validation error on one field
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        PaymentError::Validation(vec![FieldError::new(field, message)])
    }

    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(self, PaymentError::PaymentService(_) | PaymentError::Storage(_))
    }

    /// Get user-friendly message
    pub fn user_message(&self) -> &str {
        match self {
            PaymentError::Validation(_) => "Invalid request.",
            PaymentError::Authentication(_) => "Invalid signature.",
            PaymentError::WebhookParse(_) => "Invalid webhook payload.",
            PaymentError::PaymentService(_) => "Payment processing failed. Please try again.",
            PaymentError::Render(_) => "Could not generate ticket code.",
            PaymentError::Config(_) => "Service configuration error.",
            PaymentError::Storage(_) => "An error occurred processing your request.",
        }
    }
}

fn summarize(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|e| format!("{}: {}", e.field, e.message))
        .collect::<Vec<_>>()
        .join(", ")
}
