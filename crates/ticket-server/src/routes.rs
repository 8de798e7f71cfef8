//! Router

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    routing::{get, post},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use ticket_payments::{PaymentError, Result};

use crate::handlers::{create_payment_intent, health_check, order_token, stripe_webhook};
use crate::state::AppState;

/// CORS restricted to the storefront origin
pub fn cors_layer(allowed_origin: &str) -> Result<CorsLayer> {
    let origin = HeaderValue::from_str(allowed_origin)
        .map_err(|_| PaymentError::Config(format!("invalid ALLOWED_ORIGIN: {allowed_origin}")))?;

    Ok(CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]))
}

pub fn router(state: AppState, cors: CorsLayer) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/payment-intents", post(create_payment_intent))
        .route("/api/webhooks/stripe", post(stripe_webhook))
        .route("/api/orders/{payment_intent_id}/token", get(order_token))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode};
    use chrono::Utc;
    use serde_json::{Value, json};
    use std::sync::Arc;
    use tower::ServiceExt;

    use ticket_payments::{
        AccessToken, MemoryOrderStore, MockPaymentProcessor, OrderStore, PriceList, QrRenderer,
        SvgQrRenderer, WebhookVerifier,
    };

    const WEBHOOK_SECRET: &str = "whsec_test123secret456";

    struct BrokenRenderer;

    impl QrRenderer for BrokenRenderer {
        fn render(&self, _token: &AccessToken) -> ticket_payments::Result<String> {
            Err(PaymentError::Render("encoder exploded".into()))
        }
    }

    struct Harness {
        app: Router,
        store: Arc<MemoryOrderStore>,
        processor: Arc<MockPaymentProcessor>,
    }

    fn harness_with(processor: MockPaymentProcessor, qr: Arc<dyn QrRenderer>) -> Harness {
        let store = Arc::new(MemoryOrderStore::new());
        let processor = Arc::new(processor);
        let state = AppState::new(
            processor.clone(),
            store.clone(),
            qr,
            PriceList::default(),
            WEBHOOK_SECRET,
        );
        let app = router(state, cors_layer("http://localhost:5173").unwrap());

        Harness {
            app,
            store,
            processor,
        }
    }

    fn harness() -> Harness {
        harness_with(MockPaymentProcessor::new(), Arc::new(SvgQrRenderer::default()))
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    fn json_post(uri: &str, body: &Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(body).unwrap()))
            .unwrap()
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn succeeded_event(intent_id: &str) -> Vec<u8> {
        // Pretty-printed on purpose: verification must use the bytes as sent
        serde_json::to_vec_pretty(&json!({
            "id": "evt_test",
            "type": "payment_intent.succeeded",
            "data": { "object": {
                "id": intent_id,
                "metadata": { "femaleQty": "2", "maleQty": "1", "language": "en" }
            } }
        }))
        .unwrap()
    }

    fn webhook(payload: Vec<u8>, secret: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri("/api/webhooks/stripe")
            .header("content-type", "application/json");

        if let Some(secret) = secret {
            let header = WebhookVerifier::new(secret)
                .sign(&payload, Utc::now().timestamp())
                .unwrap();
            builder = builder.header("stripe-signature", header);
        }

        builder.body(Body::from(payload)).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let h = harness();
        let (status, body) = send(&h.app, get_request("/health")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert!(body["timestamp"].is_string());
    }

    #[tokio::test]
    async fn test_create_intent() {
        let h = harness();
        let (status, body) = send(
            &h.app,
            json_post(
                "/api/payment-intents",
                &json!({"femaleQty": 2, "maleQty": 1, "language": "en"}),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["paymentIntentId"], "pi_mock000001");
        assert_eq!(body["clientSecret"], "pi_mock000001_secret_mock");
        assert_eq!(body["pricing"], json!({"subtotal": "4.00", "fee": "0.32", "total": "4.32"}));
        assert_eq!(h.processor.requests().await[0].amount_cents, 432);
    }

    #[tokio::test]
    async fn test_create_intent_validation() {
        let h = harness();

        let (status, body) = send(
            &h.app,
            json_post("/api/payment-intents", &json!({"femaleQty": 0, "maleQty": 0})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "VALIDATION_ERROR");
        assert_eq!(body["details"][0]["field"], "femaleQty");

        let (status, body) = send(
            &h.app,
            json_post(
                "/api/payment-intents",
                &json!({"femaleQty": 21, "maleQty": 25, "language": "es"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            body["details"],
            json!([
                {"field": "femaleQty", "message": "must be at most 20"},
                {"field": "maleQty", "message": "must be at most 20"}
            ])
        );

        let (status, body) = send(
            &h.app,
            json_post("/api/payment-intents", &json!({"femaleQty": "two", "maleQty": -1})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "VALIDATION_ERROR");
        assert_eq!(body["details"][0]["field"], "body");

        let malformed = Request::builder()
            .method("POST")
            .uri("/api/payment-intents")
            .header("content-type", "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let (status, body) = send(&h.app, malformed).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["details"][0]["field"], "body");

        assert!(h.processor.requests().await.is_empty());
    }

    #[tokio::test]
    async fn test_processor_failure_is_generic() {
        let h = harness_with(
            MockPaymentProcessor::failing("Invalid API Key provided: sk_live_****"),
            Arc::new(SvgQrRenderer::default()),
        );

        let (status, body) = send(
            &h.app,
            json_post("/api/payment-intents", &json!({"femaleQty": 1, "maleQty": 0})),
        )
        .await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["code"], "PAYMENT_SERVICE_ERROR");
        assert!(!body.to_string().contains("sk_live"));
    }

    #[tokio::test]
    async fn test_unknown_order_is_pending() {
        let h = harness();
        let (status, body) = send(&h.app, get_request("/api/orders/pi_unknown/token")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"status": "pending"}));
    }

    #[tokio::test]
    async fn test_malformed_order_id_rejected() {
        let h = harness();
        let (status, body) = send(&h.app, get_request("/api/orders/cs_123/token")).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_checkout_to_ticket() {
        let h = harness();

        let (_, intent) = send(
            &h.app,
            json_post("/api/payment-intents", &json!({"femaleQty": 2, "maleQty": 1})),
        )
        .await;
        let intent_id = intent["paymentIntentId"].as_str().unwrap().to_string();
        let token_uri = format!("/api/orders/{intent_id}/token");

        let (_, before) = send(&h.app, get_request(&token_uri)).await;
        assert_eq!(before["status"], "pending");

        let (status, ack) = send(&h.app, webhook(succeeded_event(&intent_id), Some(WEBHOOK_SECRET))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(ack, json!({"received": true, "duplicate": false}));

        let (status, ready) = send(&h.app, get_request(&token_uri)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(ready["status"], "ready");
        assert_eq!(ready["ticketStatus"], "valid");
        assert_eq!(ready["quantities"], json!({"female": 2, "male": 1}));
        assert!(ready["qrCode"].as_str().unwrap().starts_with("data:image/svg+xml;base64,"));

        let stored = h.store.get(&intent_id).unwrap().unwrap();
        assert_eq!(ready["token"], stored.access_token.as_str());
    }

    #[tokio::test]
    async fn test_duplicate_webhook_acknowledged_once() {
        let h = harness();

        let (first, _) = send(&h.app, webhook(succeeded_event("pi_dup"), Some(WEBHOOK_SECRET))).await;
        let token = h.store.get("pi_dup").unwrap().unwrap().access_token;

        let (second, ack) = send(&h.app, webhook(succeeded_event("pi_dup"), Some(WEBHOOK_SECRET))).await;

        assert_eq!(first, StatusCode::OK);
        assert_eq!(second, StatusCode::OK);
        assert_eq!(ack["duplicate"], true);
        assert_eq!(h.store.len(), 1);
        assert_eq!(h.store.get("pi_dup").unwrap().unwrap().access_token, token);
    }

    #[tokio::test]
    async fn test_unsigned_and_missigned_webhooks_rejected() {
        let h = harness();

        let (status, body) = send(&h.app, webhook(succeeded_event("pi_evil"), None)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "INVALID_SIGNATURE");

        let (status, _) = send(&h.app, webhook(succeeded_event("pi_evil"), Some("whsec_wrong"))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        assert!(h.store.get("pi_evil").unwrap().is_none());
        assert!(!h.store.is_processed("pi_evil").unwrap());
    }

    #[tokio::test]
    async fn test_unhandled_event_acknowledged() {
        let h = harness();
        let payload = serde_json::to_vec(&json!({
            "id": "evt_other",
            "type": "customer.created",
            "data": { "object": { "id": "cus_1" } }
        }))
        .unwrap();

        let (status, ack) = send(&h.app, webhook(payload, Some(WEBHOOK_SECRET))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(ack["received"], true);
        assert!(h.store.is_empty());
    }

    #[tokio::test]
    async fn test_succeeded_event_without_intent_id_acknowledged() {
        let h = harness();
        let payload = serde_json::to_vec(&json!({
            "id": "evt_noid",
            "type": "payment_intent.succeeded",
            "data": { "object": {} }
        }))
        .unwrap();

        let (status, ack) = send(&h.app, webhook(payload, Some(WEBHOOK_SECRET))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(ack, json!({"received": true, "duplicate": false}));
        assert!(h.store.is_empty());
    }

    #[tokio::test]
    async fn test_render_failure_is_not_pending() {
        let h = harness_with(MockPaymentProcessor::new(), Arc::new(BrokenRenderer));
        send(&h.app, webhook(succeeded_event("pi_paid"), Some(WEBHOOK_SECRET))).await;

        let (status, body) = send(&h.app, get_request("/api/orders/pi_paid/token")).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["code"], "RENDER_ERROR");
    }

    #[test]
    fn test_invalid_origin_rejected() {
        assert!(cors_layer("http://bad\norigin").is_err());
    }
}
