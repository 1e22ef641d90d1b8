// Outbound webhook delivery
//
//   secret       – shared-secret generation for new subscriptions
//   hmac_signer  – HMAC-SHA256 signing and receiver-side verification
//   subscription – subscription model, validation and the redacted read view
//   http_client  – reqwest transport with a per-request timeout
//   dispatcher   – envelope construction, concurrent fan-out and aggregation

pub mod dispatcher;
pub mod hmac_signer;
pub mod http_client;
pub mod secret;
pub mod subscription;

// Re-export commonly used types
pub use dispatcher::{
    DispatchSummary, Dispatcher, EVENT_HEADER, SIGNATURE_HEADER, TIMESTAMP_HEADER,
};
pub use hmac_signer::{HmacSigner, SignatureError, sign, verify};
pub use http_client::{HttpClientError, WebhookHttpClient};
pub use secret::{SecretError, generate_secret};
pub use subscription::{
    NewSubscription, SubscriptionError, SubscriptionView, WebhookSecret, WebhookSubscription,
};
