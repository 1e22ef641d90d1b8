use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Signature verification failures
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("Signature is not valid hex: {0}")]
    Malformed(String),

    #[error("Invalid signature")]
    Mismatch,
}

/// HMAC-SHA256 signer for webhook payloads
///
/// The key is the UTF-8 bytes of the shared secret and the message is the raw
/// request body, so receivers can recompute the digest over exactly what they
/// read off the wire.
pub struct HmacSigner {
    secret: Vec<u8>,
}

impl HmacSigner {
    /// New HMAC signer with the given secret
    pub fn new(secret: &str) -> Self {
        Self {
            secret: secret.as_bytes().to_vec(),
        }
    }

    /// Lowercase hex HMAC-SHA256 of `payload`
    pub fn sign(&self, payload: &[u8]) -> String {
        let mac = self.mac_over(payload);
        hex::encode(mac.finalize().into_bytes())
    }

    /// Verify a lowercase or uppercase hex signature in constant time
    pub fn verify(&self, payload: &[u8], signature: &str) -> Result<(), SignatureError> {
        let expected = hex::decode(signature.trim())
            .map_err(|e| SignatureError::Malformed(e.to_string()))?;

        self.mac_over(payload)
            .verify_slice(&expected)
            .map_err(|_| SignatureError::Mismatch)
    }

    fn mac_over(&self, payload: &[u8]) -> HmacSha256 {
        let mut mac = match HmacSha256::new_from_slice(&self.secret) {
            Ok(mac) => mac,
            Err(_) => unreachable!("HMAC key can be of any size, as per crate documentation"),
        };
        mac.update(payload);
        mac
    }
}

/// Sign `payload` with `secret`; the value sent in `X-Webhook-Signature`.
pub fn sign(payload: &[u8], secret: &str) -> String {
    HmacSigner::new(secret).sign(payload)
}

/// Receiver-side check of an `X-Webhook-Signature` value against a raw body.
pub fn verify(payload: &[u8], secret: &str, signature: &str) -> Result<(), SignatureError> {
    HmacSigner::new(secret).verify(payload, signature)
}
