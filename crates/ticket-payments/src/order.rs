//! Order Reconciliation
//!
//! Tracks, per payment intent, whether finalization happened and which
//! access token was issued.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use crate::error::{PaymentError, Result};
use crate::pricing::TicketQuantities;
use crate::token::AccessToken;

/// Ticket status
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    #[default]
    Valid,
    Used,
    Cancelled,
}

/// A paid order
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    /// Stripe payment intent ID (pi_...)
    pub payment_intent_id: String,

    /// Secret encoded into the ticket QR code
    pub access_token: AccessToken,

    pub status: OrderStatus,

    pub created_at: DateTime<Utc>,

    pub quantities: TicketQuantities,
}

impl Order {
    /// Create a new order with a freshly generated access token
    pub fn new(payment_intent_id: impl Into<String>, quantities: TicketQuantities) -> Self {
        Self {
            payment_intent_id: payment_intent_id.into(),
            access_token: AccessToken::generate(),
            status: OrderStatus::Valid,
            created_at: Utc::now(),
            quantities,
        }
    }
}

/// Order storage trait
pub trait OrderStore: Send + Sync {
    /// Save or replace an order
    fn save(&self, order: &Order) -> Result<()>;

    /// Get order by payment intent ID
    fn get(&self, payment_intent_id: &str) -> Result<Option<Order>>;

    /// Whether finalization already ran for this payment intent
    fn is_processed(&self, payment_intent_id: &str) -> Result<bool>;

    /// Record that finalization ran for this payment intent
    fn mark_processed(&self, payment_intent_id: &str) -> Result<()>;

    /// Mark processed and save in one step.
    ///
    /// Returns `false` without touching the order map when the payment
    /// intent was already processed. Backends must apply both writes
    /// atomically so a crash can never leave a marker without its order.
    fn record_once(&self, order: &Order) -> Result<bool>;
}

#[derive(Default)]
struct Tables {
    orders: HashMap<String, Order>,
    processed: HashSet<String>,
}

/// In-memory order store (lost on restart)
#[derive(Default)]
pub struct MemoryOrderStore {
    tables: RwLock<Tables>,
}

impl MemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.tables.read().map(|t| t.orders.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn poisoned<T>(_: T) -> PaymentError {
    PaymentError::Storage("order store lock poisoned".into())
}

impl OrderStore for MemoryOrderStore {
    fn save(&self, order: &Order) -> Result<()> {
        let mut tables = self.tables.write().map_err(poisoned)?;
        tables
            .orders
            .insert(order.payment_intent_id.clone(), order.clone());
        Ok(())
    }

    fn get(&self, payment_intent_id: &str) -> Result<Option<Order>> {
        let tables = self.tables.read().map_err(poisoned)?;
        Ok(tables.orders.get(payment_intent_id).cloned())
    }

    fn is_processed(&self, payment_intent_id: &str) -> Result<bool> {
        let tables = self.tables.read().map_err(poisoned)?;
        Ok(tables.processed.contains(payment_intent_id))
    }

    fn mark_processed(&self, payment_intent_id: &str) -> Result<()> {
        let mut tables = self.tables.write().map_err(poisoned)?;
        tables.processed.insert(payment_intent_id.to_string());
        Ok(())
    }

    fn record_once(&self, order: &Order) -> Result<bool> {
        let mut tables = self.tables.write().map_err(poisoned)?;

        if !tables.processed.insert(order.payment_intent_id.clone()) {
            return Ok(false);
        }
        tables
            .orders
            .insert(order.payment_intent_id.clone(), order.clone());

        Ok(true)
    }
}
