use rand::RngCore;
use rand::rngs::OsRng;
use thiserror::Error;

use super::subscription::WebhookSecret;

/// Random bytes behind a generated secret (256 bits).
pub const SECRET_BYTES: usize = 32;

#[derive(Debug, Error)]
pub enum SecretError {
    #[error("Entropy source failed: {0}")]
    Entropy(String),
}

/// Generate a shared secret for a new subscription.
///
/// 32 bytes from the operating system CSPRNG, hex-encoded (64 characters).
pub fn generate_secret() -> Result<WebhookSecret, SecretError> {
    let mut bytes = [0u8; SECRET_BYTES];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|e| SecretError::Entropy(e.to_string()))?;

    Ok(WebhookSecret::new(hex::encode(bytes)))
}
