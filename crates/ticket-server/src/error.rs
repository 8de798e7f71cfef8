//! API Error Responses

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use ticket_payments::{FieldError, PaymentError};

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<FieldError>,
}

/// Handler error; wraps the payments taxonomy
#[derive(Debug)]
pub struct ApiError(pub PaymentError);

impl From<PaymentError> for ApiError {
    fn from(err: PaymentError) -> Self {
        Self(err)
    }
}

impl ApiError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match &self.0 {
            PaymentError::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            PaymentError::Authentication(_) => (StatusCode::BAD_REQUEST, "INVALID_SIGNATURE"),
            PaymentError::WebhookParse(_) => (StatusCode::BAD_REQUEST, "INVALID_PAYLOAD"),
            PaymentError::PaymentService(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "PAYMENT_SERVICE_ERROR")
            }
            PaymentError::Render(_) => (StatusCode::INTERNAL_SERVER_ERROR, "RENDER_ERROR"),
            PaymentError::Storage(_) => (StatusCode::INTERNAL_SERVER_ERROR, "STORAGE_ERROR"),
            PaymentError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "CONFIG_ERROR"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        if status.is_server_error() {
            tracing::error!(code, error = %self.0, "Request failed");
        } else {
            tracing::warn!(code, error = %self.0, "Request rejected");
        }

        let error = self.0.user_message().to_string();
        let details = match self.0 {
            PaymentError::Validation(fields) => fields,
            _ => Vec::new(),
        };

        let body = ErrorResponse {
            error,
            code: code.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}
