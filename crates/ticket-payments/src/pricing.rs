//! Ticket Pricing
//!
//! Turns ticket quantities into a subtotal / fee / total breakdown.
//! All arithmetic is done in `Decimal`; the processor amount is derived last.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::{FieldError, PaymentError, Result};

/// Ticket counts per category
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketQuantities {
    pub female: u32,
    pub male: u32,
}

impl TicketQuantities {
    pub fn new(female: u32, male: u32) -> Self {
        Self { female, male }
    }

    pub fn total(&self) -> u32 {
        self.female.saturating_add(self.male)
    }

    pub fn is_empty(&self) -> bool {
        self.female == 0 && self.male == 0
    }
}

/// Computed price for an order
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceBreakdown {
    pub subtotal: Decimal,
    pub fee: Decimal,
    pub total: Decimal,

    /// Total in the processor's minor unit (cents)
    #[serde(skip)]
    pub amount_cents: i64,
}

/// Unit prices and service fee rate
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PriceList {
    pub female_price: Decimal,
    pub male_price: Decimal,
    pub fee_rate: Decimal,
}

impl Default for PriceList {
    fn default() -> Self {
        Self {
            female_price: dec!(1.00),
            male_price: dec!(2.00),
            fee_rate: dec!(0.08),
        }
    }
}

impl PriceList {
    /// Price a ticket selection.
    ///
    /// Fails with a validation error when no tickets are selected.
    pub fn quote(&self, quantities: TicketQuantities) -> Result<PriceBreakdown> {
        if quantities.is_empty() {
            return Err(PaymentError::Validation(vec![
                FieldError::new("femaleQty", "at least one ticket is required"),
                FieldError::new("maleQty", "at least one ticket is required"),
            ]));
        }

        let subtotal = Decimal::from(quantities.female) * self.female_price
            + Decimal::from(quantities.male) * self.male_price;
        let subtotal = to_money(subtotal);
        let fee = to_money(subtotal * self.fee_rate);
        let total = subtotal + fee;

        let amount_cents = round_half_up(total * dec!(100), 0)
            .to_i64()
            .ok_or_else(|| PaymentError::invalid("amount", "total exceeds supported range"))?;

        Ok(PriceBreakdown {
            subtotal,
            fee,
            total,
            amount_cents,
        })
    }
}

fn round_half_up(value: Decimal, dp: u32) -> Decimal {
    value.round_dp_with_strategy(dp, RoundingStrategy::MidpointAwayFromZero)
}

/// Round to cents and pin the scale so "4" renders as "4.00"
fn to_money(value: Decimal) -> Decimal {
    let mut rounded = round_half_up(value, 2);
    rounded.rescale(2);
    rounded
}
