//! # Delivery Logger
use crate::{delivery_log::DeliveryAttempt, traits::DeliveryLogStore};
use std::sync::Arc;
use tracing::{debug, warn};

// ============================================================================
// DeliveryLogger
// ============================================================================

/// Best-effort writer in front of a [`DeliveryLogStore`].
///
/// A failed write is reported as a warning and swallowed: delivery accounting
/// comes from the transport outcome, never from the log write.
#[derive(Clone)]
pub struct DeliveryLogger {
    store: Arc<dyn DeliveryLogStore>,
}

impl DeliveryLogger {
    pub fn new(store: Arc<dyn DeliveryLogStore>) -> Self {
        Self { store }
    }

    /// Persist one attempt. Returns whether the store accepted it.
    pub async fn record(&self, attempt: DeliveryAttempt) -> bool {
        debug!(
            attempt_id = %attempt.id,
            subscription_id = %attempt.subscription_id,
            event = %attempt.event,
            status_code = attempt.status_code,
            success = attempt.success,
            "Writing delivery attempt"
        );

        match self.store.append(&attempt).await {
            Ok(()) => true,
            Err(e) => {
                warn!(
                    attempt_id = %attempt.id,
                    subscription_id = %attempt.subscription_id,
                    error = %e,
                    "Failed to write delivery attempt"
                );
                false
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
