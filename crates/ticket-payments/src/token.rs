//! Access Tokens
//!
//! Random ticket secrets and their QR code rendering.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use qrcode::QrCode;
use qrcode::render::svg;
use rand::RngCore;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};

use crate::error::{PaymentError, Result};

/// Bytes of entropy per token
pub const TOKEN_BYTES: usize = 32;

/// Access token (64 lowercase hex chars)
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccessToken(String);

impl AccessToken {
    /// Generate a new token from the OS RNG
    pub fn generate() -> Self {
        let mut bytes = [0u8; TOKEN_BYTES];
        OsRng.fill_bytes(&mut bytes);
        Self(hex::encode(bytes))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// No `Display` impl: tokens must never reach log output.

/// Renders a token into an embeddable image
pub trait QrRenderer: Send + Sync {
    /// Returns a `data:` URL
    fn render(&self, token: &AccessToken) -> Result<String>;
}

/// SVG QR codes via the `qrcode` crate
#[derive(Clone, Debug)]
pub struct SvgQrRenderer {
    min_size: u32,
}

impl Default for SvgQrRenderer {
    fn default() -> Self {
        Self { min_size: 256 }
    }
}

impl QrRenderer for SvgQrRenderer {
    fn render(&self, token: &AccessToken) -> Result<String> {
        let code = QrCode::new(token.as_str().as_bytes())
            .map_err(|e| PaymentError::Render(e.to_string()))?;

        let image = code
            .render::<svg::Color>()
            .min_dimensions(self.min_size, self.min_size)
            .quiet_zone(true)
            .build();

        Ok(format!(
            "data:image/svg+xml;base64,{}",
            STANDARD.encode(image.as_bytes())
        ))
    }
}
