//! Server Configuration
//!
//! Read once at startup. Missing secrets are fatal.

use rust_decimal::Decimal;
use ticket_payments::{PaymentError, PriceList, Result};

/// Runtime configuration
pub struct ServerConfig {
    pub stripe_secret_key: String,
    pub stripe_webhook_secret: String,
    pub allowed_origin: String,
    pub host: String,
    pub port: u16,
    pub prices: PriceList,
}

impl ServerConfig {
    /// Load from process environment (call `dotenvy::dotenv()` first)
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let required = |key: &str| {
            get(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| PaymentError::Config(format!("{key} not set")))
        };

        let stripe_secret_key = required("STRIPE_SECRET_KEY")?;
        let stripe_webhook_secret = required("STRIPE_WEBHOOK_SECRET")?;

        let port = match get("PORT") {
            Some(raw) => raw
                .parse()
                .map_err(|_| PaymentError::Config(format!("PORT is not a valid port: {raw}")))?,
            None => 3000,
        };

        let defaults = PriceList::default();
        let prices = PriceList {
            female_price: decimal(&get, "TICKET_PRICE_FEMALE", defaults.female_price)?,
            male_price: decimal(&get, "TICKET_PRICE_MALE", defaults.male_price)?,
            fee_rate: decimal(&get, "TICKET_FEE_RATE", defaults.fee_rate)?,
        };
        if prices.fee_rate >= Decimal::ONE {
            return Err(PaymentError::Config("TICKET_FEE_RATE must be below 1".into()));
        }

        Ok(Self {
            stripe_secret_key,
            stripe_webhook_secret,
            allowed_origin: get("ALLOWED_ORIGIN")
                .unwrap_or_else(|| "http://localhost:5173".into()),
            host: get("HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port,
            prices,
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn decimal(get: &impl Fn(&str) -> Option<String>, key: &str, default: Decimal) -> Result<Decimal> {
    let Some(raw) = get(key) else {
        return Ok(default);
    };

    match raw.trim().parse::<Decimal>() {
        Ok(value) if !value.is_sign_negative() => Ok(value),
        _ => Err(PaymentError::Config(format!(
            "{key} must be a non-negative decimal, got {raw:?}"
        ))),
    }
}
