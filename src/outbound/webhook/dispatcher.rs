use erp_events::{DeliveryAttempt, DeliveryLogger, Envelope, EventType};
use futures::FutureExt;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use time::OffsetDateTime;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::domain::ports::{
    DeliveryOutcome, RegistryError, SubscriptionRegistry, WebhookTransport,
};
use crate::outbound::webhook::hmac_signer;
use crate::outbound::webhook::subscription::WebhookSubscription;

// Header names are case-insensitive on the wire; `HeaderName` wants lowercase.

/// Event type of the delivery (`X-Webhook-Event`).
pub const EVENT_HEADER: &str = "x-webhook-event";
/// Lowercase hex HMAC-SHA256 of the raw body (`X-Webhook-Signature`).
pub const SIGNATURE_HEADER: &str = "x-webhook-signature";
/// The envelope's `timestamp`, verbatim (`X-Webhook-Timestamp`).
pub const TIMESTAMP_HEADER: &str = "x-webhook-timestamp";

/// Aggregate result of one dispatch call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchSummary {
    pub dispatched: usize,
    pub successful: usize,
    pub failed: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DispatchSummary {
    fn completed(dispatched: usize, successful: usize) -> Self {
        Self {
            dispatched,
            successful,
            failed: dispatched - successful,
            error: None,
        }
    }

    fn aborted(error: String) -> Self {
        Self {
            error: Some(error),
            ..Default::default()
        }
    }
}

/// Faults that stop a dispatch before any delivery starts.
#[derive(Debug, thiserror::Error)]
enum DispatchError {
    #[error("Failed to resolve subscriptions: {0}")]
    Registry(#[from] RegistryError),

    #[error("Failed to serialize envelope: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Failed to format envelope timestamp: {0}")]
    Timestamp(#[from] time::error::Format),
}

/// Envelope serialized once and shared by every delivery of a dispatch.
struct PreparedEnvelope {
    event: EventType,
    timestamp: String,
    body: String,
}

impl PreparedEnvelope {
    fn build(event: EventType, data: Value) -> Result<Self, DispatchError> {
        let envelope = Envelope::new(event, data);
        Ok(Self {
            event,
            timestamp: envelope.timestamp_rfc3339()?,
            body: envelope.to_json()?,
        })
    }
}

/// Fans business events out to every active subscriber.
///
/// Each subscriber is signed, sent and logged on its own task; the call
/// returns once every task has finished and never surfaces a subscriber's
/// failure to the caller.
#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<dyn SubscriptionRegistry>,
    transport: Arc<dyn WebhookTransport>,
    logger: DeliveryLogger,
}

impl Dispatcher {
    pub fn new(
        registry: Arc<dyn SubscriptionRegistry>,
        transport: Arc<dyn WebhookTransport>,
        logger: DeliveryLogger,
    ) -> Self {
        Self {
            registry,
            transport,
            logger,
        }
    }

    /// Deliver `data` to all active subscriptions of `event`.
    pub async fn dispatch(&self, event: EventType, data: Value) -> DispatchSummary {
        match self.try_dispatch(event, data).await {
            Ok(summary) => summary,
            Err(e) => {
                error!(event = %event, error = %e, "Webhook dispatch aborted");
                DispatchSummary::aborted(e.to_string())
            }
        }
    }

    /// Deliver `data` to one subscription under its own event type,
    /// whether or not it is active. Used for synthetic test events.
    pub async fn dispatch_to(
        &self,
        subscription: WebhookSubscription,
        data: Value,
    ) -> DispatchSummary {
        let event = subscription.event;
        match PreparedEnvelope::build(event, data) {
            Ok(prepared) => self.fan_out(prepared, vec![subscription]).await,
            Err(e) => {
                error!(event = %event, error = %e, "Webhook test dispatch aborted");
                DispatchSummary::aborted(e.to_string())
            }
        }
    }

    async fn try_dispatch(
        &self,
        event: EventType,
        data: Value,
    ) -> Result<DispatchSummary, DispatchError> {
        let subscriptions = self.registry.find_active_by_event(event).await?;
        if subscriptions.is_empty() {
            debug!(event = %event, "No active subscriptions");
            return Ok(DispatchSummary::default());
        }

        let prepared = PreparedEnvelope::build(event, data)?;
        Ok(self.fan_out(prepared, subscriptions).await)
    }

    async fn fan_out(
        &self,
        prepared: PreparedEnvelope,
        subscriptions: Vec<WebhookSubscription>,
    ) -> DispatchSummary {
        let dispatched = subscriptions.len();
        let prepared = Arc::new(prepared);

        info!(
            event = %prepared.event,
            subscribers = dispatched,
            "Dispatching webhook"
        );

        let mut set = JoinSet::new();
        for subscription in subscriptions {
            set.spawn(deliver(
                subscription,
                prepared.clone(),
                self.transport.clone(),
                self.logger.clone(),
            ));
        }

        let mut successful = 0usize;
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(true) => successful += 1,
                Ok(false) => {}
                Err(e) => {
                    // Counted as failed through `dispatched - successful`
                    warn!(event = %prepared.event, error = %e, "Delivery task did not complete");
                }
            }
        }

        let summary = DispatchSummary::completed(dispatched, successful);
        info!(
            event = %prepared.event,
            dispatched = summary.dispatched,
            successful = summary.successful,
            failed = summary.failed,
            "Webhook dispatch finished"
        );
        summary
    }
}

/// Sign, send and log one delivery. Returns whether it succeeded.
async fn deliver(
    subscription: WebhookSubscription,
    prepared: Arc<PreparedEnvelope>,
    transport: Arc<dyn WebhookTransport>,
    logger: DeliveryLogger,
) -> bool {
    let body = prepared.body.as_bytes();
    let signature = hmac_signer::sign(body, subscription.secret().expose());
    let headers = delivery_headers(&subscription, &prepared, &signature);

    let sent_at = OffsetDateTime::now_utc();
    let outcome = AssertUnwindSafe(transport.send(subscription.target_url.as_str(), headers, body))
        .catch_unwind()
        .await
        .unwrap_or_else(|_| DeliveryOutcome::transport_failure("Transport panicked", 0));

    if outcome.success {
        info!(
            subscription_id = %subscription.id,
            event = %prepared.event,
            status_code = outcome.status_code,
            duration_ms = outcome.duration_ms,
            "Webhook delivered successfully"
        );
    } else {
        warn!(
            subscription_id = %subscription.id,
            event = %prepared.event,
            status_code = outcome.status_code,
            error = outcome.error_message.as_deref().unwrap_or("non-2xx response"),
            duration_ms = outcome.duration_ms,
            "Webhook delivery failed"
        );
    }

    let attempt = DeliveryAttempt::new(
        subscription.id,
        prepared.event,
        prepared.body.as_str(),
        sent_at,
    )
    .with_duration(outcome.duration_ms);
    let attempt = match &outcome.error_message {
        Some(message) => attempt.with_error(message.clone()),
        None => attempt.with_response(outcome.status_code, &outcome.response_body, outcome.success),
    };
    logger.record(attempt).await;

    outcome.success
}

/// Engine headers first, then the subscription's own headers on top.
fn delivery_headers(
    subscription: &WebhookSubscription,
    prepared: &PreparedEnvelope,
    signature: &str,
) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        HeaderName::from_static(EVENT_HEADER),
        HeaderValue::from_static(prepared.event.as_str()),
    );
    if let Ok(value) = HeaderValue::from_str(signature) {
        headers.insert(HeaderName::from_static(SIGNATURE_HEADER), value);
    }
    if let Ok(value) = HeaderValue::from_str(&prepared.timestamp) {
        headers.insert(HeaderName::from_static(TIMESTAMP_HEADER), value);
    }

    for (name, value) in &subscription.headers {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                headers.insert(name, value);
            }
            _ => warn!(
                subscription_id = %subscription.id,
                header = %name,
                "Skipping invalid subscription header"
            ),
        }
    }

    headers
}
