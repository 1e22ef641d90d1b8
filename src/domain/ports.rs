/*
   This module specifies the API by which the dispatch engine talks to its collaborators:
   subscription persistence on one side and the outbound transport on the other.
*/

use crate::outbound::webhook::subscription::WebhookSubscription;
use async_trait::async_trait;
use erp_events::EventType;
use reqwest::header::HeaderMap;
use uuid::Uuid;

/// Error type for subscription persistence
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Subscription not found: {0}")]
    NotFound(Uuid),

    #[error("Subscription already exists: {0}")]
    AlreadyExists(Uuid),

    #[error("Registry unavailable: {0}")]
    Unavailable(String),
}

/// Resolution of subscribers for an event type.
#[async_trait]
pub trait SubscriptionRegistry: Send + Sync {
    /// Subscriptions with `is_active` set and `event == event`, in no particular order.
    async fn find_active_by_event(
        &self,
        event: EventType,
    ) -> Result<Vec<WebhookSubscription>, RegistryError>;
}

/// Administrative persistence of subscriptions.
#[async_trait]
pub trait SubscriptionStore: SubscriptionRegistry {
    async fn insert(&self, subscription: WebhookSubscription) -> Result<(), RegistryError>;
    async fn list(&self) -> Result<Vec<WebhookSubscription>, RegistryError>;
    async fn get(&self, id: Uuid) -> Result<WebhookSubscription, RegistryError>;
    /// Flip `is_active` and return the updated subscription.
    async fn toggle(&self, id: Uuid) -> Result<WebhookSubscription, RegistryError>;
    /// Hard delete. Delivery logs are left in place.
    async fn delete(&self, id: Uuid) -> Result<(), RegistryError>;
}

/// Normalized result of one outbound POST.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryOutcome {
    /// 0 when no HTTP response was received.
    pub status_code: u16,
    pub response_body: String,
    pub duration_ms: u64,
    pub success: bool,
    /// Set only for transport-level failures.
    pub error_message: Option<String>,
}

impl DeliveryOutcome {
    /// The receiver answered; success is decided by the status code alone.
    pub fn completed(status_code: u16, response_body: String, duration_ms: u64) -> Self {
        Self {
            status_code,
            response_body,
            duration_ms,
            success: (200..300).contains(&status_code),
            error_message: None,
        }
    }

    /// No response was received (DNS, connect, reset, timeout, ...).
    pub fn transport_failure(error_message: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            status_code: 0,
            response_body: String::new(),
            duration_ms,
            success: false,
            error_message: Some(error_message.into()),
        }
    }
}

/// Outbound transport for signed envelopes.
///
/// Implementations never fail: every problem is folded into the outcome.
#[async_trait]
pub trait WebhookTransport: Send + Sync {
    async fn send(&self, url: &str, headers: HeaderMap, body: &[u8]) -> DeliveryOutcome;
}
