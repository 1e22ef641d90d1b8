use crate::domain::ports::{RegistryError, SubscriptionRegistry, SubscriptionStore};
use crate::outbound::webhook::subscription::WebhookSubscription;
use async_trait::async_trait;
use erp_events::EventType;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

/// Process-local subscription store
#[derive(Debug, Clone, Default)]
pub struct InMemorySubscriptionStore {
    subscriptions: Arc<RwLock<HashMap<Uuid, WebhookSubscription>>>,
}

impl InMemorySubscriptionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SubscriptionRegistry for InMemorySubscriptionStore {
    async fn find_active_by_event(
        &self,
        event: EventType,
    ) -> Result<Vec<WebhookSubscription>, RegistryError> {
        let subscriptions = self.subscriptions.read().await;
        let matching: Vec<WebhookSubscription> = subscriptions
            .values()
            .filter(|s| s.matches_event(event))
            .cloned()
            .collect();

        debug!(event = %event, count = matching.len(), "Resolved subscriptions");
        Ok(matching)
    }
}

#[async_trait]
impl SubscriptionStore for InMemorySubscriptionStore {
    async fn insert(&self, subscription: WebhookSubscription) -> Result<(), RegistryError> {
        let mut subscriptions = self.subscriptions.write().await;
        if subscriptions.contains_key(&subscription.id) {
            return Err(RegistryError::AlreadyExists(subscription.id));
        }

        info!(
            subscription_id = %subscription.id,
            event = %subscription.event,
            target_url = %subscription.target_url,
            "Subscription created"
        );
        subscriptions.insert(subscription.id, subscription);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<WebhookSubscription>, RegistryError> {
        let subscriptions = self.subscriptions.read().await;
        let mut all: Vec<WebhookSubscription> = subscriptions.values().cloned().collect();
        all.sort_by_key(|s| s.created_at);
        Ok(all)
    }

    async fn get(&self, id: Uuid) -> Result<WebhookSubscription, RegistryError> {
        let subscriptions = self.subscriptions.read().await;
        subscriptions
            .get(&id)
            .cloned()
            .ok_or(RegistryError::NotFound(id))
    }

    async fn toggle(&self, id: Uuid) -> Result<WebhookSubscription, RegistryError> {
        let mut subscriptions = self.subscriptions.write().await;
        let subscription = subscriptions
            .get_mut(&id)
            .ok_or(RegistryError::NotFound(id))?;

        subscription.toggle();
        info!(
            subscription_id = %id,
            is_active = subscription.is_active,
            "Subscription toggled"
        );
        Ok(subscription.clone())
    }

    async fn delete(&self, id: Uuid) -> Result<(), RegistryError> {
        let mut subscriptions = self.subscriptions.write().await;
        subscriptions
            .remove(&id)
            .map(|_| info!(subscription_id = %id, "Subscription deleted"))
            .ok_or(RegistryError::NotFound(id))
    }
}
