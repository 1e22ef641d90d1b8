#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use erp_events::{DeliveryLogger, InMemoryDeliveryLog};
use erp_webhooks::config::Config;
use erp_webhooks::infrastructure::InMemorySubscriptionStore;
use erp_webhooks::outbound::webhook::{Dispatcher, WebhookHttpClient};
use erp_webhooks::server::Server;

pub fn test_config() -> Config {
    let mut config = Config::load().unwrap();
    config.server.host = "localhost".to_string();
    config.server.port = 0;
    config
}

pub async fn spawn_server() -> String {
    spawn_server_with(test_config()).await
}

pub async fn spawn_server_with(config: Config) -> String {
    let server = Server::new(&config).await.unwrap();

    let port = server.port();
    tokio::spawn(server.run());

    format!("http://{}:{}", config.server.host, port)
}

/// Dispatcher over in-memory stores and a real HTTP transport.
pub struct Harness {
    pub store: Arc<InMemorySubscriptionStore>,
    pub log: InMemoryDeliveryLog,
    pub dispatcher: Dispatcher,
}

pub fn harness(timeout: Duration) -> Harness {
    let store = Arc::new(InMemorySubscriptionStore::new());
    let log = InMemoryDeliveryLog::new();
    let transport = WebhookHttpClient::with_timeout(timeout).unwrap();
    let dispatcher = Dispatcher::new(
        store.clone(),
        Arc::new(transport),
        DeliveryLogger::new(Arc::new(log.clone())),
    );

    Harness {
        store,
        log,
        dispatcher,
    }
}
