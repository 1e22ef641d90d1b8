use crate::delivery_log::{DeliveryAttempt, DeliveryLogQuery};
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LogStoreError {
    #[error("Failed to append delivery attempt: {0}")]
    AppendError(String),
    #[error("Failed to query delivery attempts: {0}")]
    QueryError(String),
    #[error("Connection error: {0}")]
    ConnectionError(String),
}

/// Append-only sink for delivery attempts.
///
/// Implementations must accept concurrent appends: one writer per subscriber
/// delivery is in flight during a dispatch.
#[async_trait]
pub trait DeliveryLogStore: Send + Sync {
    /// Persist one attempt. Records are never updated afterwards.
    async fn append(&self, attempt: &DeliveryAttempt) -> Result<(), LogStoreError>;

    /// Attempts matching the filter, newest first.
    async fn query(&self, filter: &DeliveryLogQuery) -> Result<Vec<DeliveryAttempt>, LogStoreError>;

    async fn count(&self) -> Result<usize, LogStoreError>;
}
