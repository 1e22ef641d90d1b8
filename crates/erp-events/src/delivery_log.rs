//! # Delivery Attempt Log
use crate::events::EventType;
use crate::traits::{DeliveryLogStore, LogStoreError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use time::OffsetDateTime;
use uuid::Uuid;

/// Longest response body kept in a log record, in characters.
pub const MAX_RESPONSE_CHARS: usize = 1000;

/// Clip a response body to [`MAX_RESPONSE_CHARS`] characters.
pub fn truncate_response(body: &str) -> String {
    match body.char_indices().nth(MAX_RESPONSE_CHARS) {
        Some((cut, _)) => body[..cut].to_string(),
        None => body.to_string(),
    }
}

// ============================================================================
// DeliveryAttempt
// ============================================================================

/// Immutable record of one envelope sent to one subscriber.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryAttempt {
    pub id: Uuid,
    pub subscription_id: Uuid,
    pub event: EventType,
    /// Exact body that was signed and sent.
    pub payload: String,
    pub response: String,
    /// 0 when no HTTP response was received.
    pub status_code: u16,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub duration_ms: u64,
    #[serde(with = "time::serde::rfc3339")]
    pub sent_at: OffsetDateTime,
}

impl DeliveryAttempt {
    /// Start a record for a delivery sent at `sent_at`.
    pub fn new(
        subscription_id: Uuid,
        event: EventType,
        payload: impl Into<String>,
        sent_at: OffsetDateTime,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            subscription_id,
            event,
            payload: payload.into(),
            response: String::new(),
            status_code: 0,
            success: false,
            error_message: None,
            duration_ms: 0,
            sent_at,
        }
    }

    /// Set the HTTP response; the body is truncated.
    pub fn with_response(mut self, status_code: u16, body: &str, success: bool) -> Self {
        self.status_code = status_code;
        self.response = truncate_response(body);
        self.success = success;
        self
    }

    /// Mark as a transport-level failure (no HTTP response).
    pub fn with_error(mut self, message: impl Into<String>) -> Self {
        self.status_code = 0;
        self.success = false;
        self.error_message = Some(message.into());
        self
    }

    pub fn with_duration(mut self, duration_ms: u64) -> Self {
        self.duration_ms = duration_ms;
        self
    }
}

// ============================================================================
// DeliveryLogQuery
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryLogQuery {
    pub subscription_id: Option<Uuid>,
    pub event: Option<EventType>,
    pub success: Option<bool>,
    pub limit: Option<usize>,
}

impl DeliveryLogQuery {
    /// All attempts for one subscription.
    pub fn for_subscription(subscription_id: Uuid) -> Self {
        Self {
            subscription_id: Some(subscription_id),
            ..Default::default()
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Returns `true` if `attempt` matches all set filter criteria.
    pub fn matches(&self, attempt: &DeliveryAttempt) -> bool {
        if let Some(id) = self.subscription_id
            && attempt.subscription_id != id
        {
            return false;
        }
        if let Some(event) = self.event
            && attempt.event != event
        {
            return false;
        }
        if let Some(success) = self.success
            && attempt.success != success
        {
            return false;
        }
        true
    }
}

// ============================================================================
// InMemoryDeliveryLog
// ============================================================================
#[derive(Debug, Default, Clone)]
pub struct InMemoryDeliveryLog {
    attempts: Arc<Mutex<Vec<DeliveryAttempt>>>,
}

impl InMemoryDeliveryLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return a snapshot of all stored attempts in append order (for test assertions).
    pub fn snapshot(&self) -> Vec<DeliveryAttempt> {
        self.attempts
            .lock()
            .expect("InMemoryDeliveryLog lock poisoned")
            .clone()
    }
}

#[async_trait]
impl DeliveryLogStore for InMemoryDeliveryLog {
    async fn append(&self, attempt: &DeliveryAttempt) -> Result<(), LogStoreError> {
        self.attempts
            .lock()
            .map_err(|e| LogStoreError::AppendError(format!("InMemoryDeliveryLog lock poisoned: {e}")))?
            .push(attempt.clone());
        Ok(())
    }

    async fn query(&self, filter: &DeliveryLogQuery) -> Result<Vec<DeliveryAttempt>, LogStoreError> {
        let attempts = self
            .attempts
            .lock()
            .map_err(|e| LogStoreError::QueryError(format!("InMemoryDeliveryLog lock poisoned: {e}")))?
            .clone();

        let mut results: Vec<DeliveryAttempt> =
            attempts.into_iter().filter(|a| filter.matches(a)).collect();
        // Stable sort keeps append order for equal timestamps; reverse gives newest first.
        results.sort_by_key(|a| a.sent_at);
        results.reverse();

        if let Some(limit) = filter.limit {
            results.truncate(limit);
        }
        Ok(results)
    }

    async fn count(&self) -> Result<usize, LogStoreError> {
        Ok(self
            .attempts
            .lock()
            .map_err(|e| LogStoreError::QueryError(format!("InMemoryDeliveryLog lock poisoned: {e}")))?
            .len())
    }
}

// ============================================================================
// Tests
// ============================================================================
