//! Mock Payment Processor
//!
//! For tests and local demos. Hands out sequential intent IDs and records
//! every request it receives.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Mutex;

use super::{CreatedIntent, PaymentProcessor};
use crate::error::{PaymentError, Result};

/// A recorded create-intent call
#[derive(Clone, Debug)]
pub struct RecordedIntent {
    pub amount_cents: i64,
    pub metadata: HashMap<String, String>,
}

/// Mock processor with optional forced failure
#[derive(Default)]
pub struct MockPaymentProcessor {
    fail_with: Option<String>,
    next_id: AtomicU64,
    requests: Mutex<Vec<RecordedIntent>>,
}

impl MockPaymentProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call fails with a processor error carrying `message`
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            fail_with: Some(message.into()),
            ..Self::default()
        }
    }

    /// Calls received so far
    pub async fn requests(&self) -> Vec<RecordedIntent> {
        self.requests.lock().await.clone()
    }
}

#[async_trait]
impl PaymentProcessor for MockPaymentProcessor {
    async fn create_payment_intent(
        &self,
        amount_cents: i64,
        metadata: HashMap<String, String>,
    ) -> Result<CreatedIntent> {
        if let Some(message) = &self.fail_with {
            return Err(PaymentError::PaymentService(message.clone()));
        }

        self.requests.lock().await.push(RecordedIntent {
            amount_cents,
            metadata,
        });

        let n = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let id = format!("pi_mock{n:06}");
        Ok(CreatedIntent {
            client_secret: format!("{id}_secret_mock"),
            id,
        })
    }

    fn name(&self) -> &str {
        "mock"
    }
}
