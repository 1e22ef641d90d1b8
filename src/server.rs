mod handlers;
mod responses;

pub use responses::{ApiError, ResponseBody};

use std::sync::Arc;

use tokio::net::TcpListener;

use crate::config::Config;
use crate::domain::ports::{SubscriptionRegistry, SubscriptionStore, WebhookTransport};
use crate::infrastructure::InMemorySubscriptionStore;
use crate::outbound::webhook::{Dispatcher, WebhookHttpClient};
use crate::server::handlers::deliveries::list_delivery_logs;
use crate::server::handlers::health::health_check;
use crate::server::handlers::webhooks::{
    create_webhook, delete_webhook, get_webhook, list_event_types, list_webhooks, test_webhook,
    toggle_webhook,
};
use axum::http::Method;
use axum::{
    Router,
    routing::{get, patch, post},
};
use color_eyre::eyre::{Context, Result};
use erp_events::{DeliveryLogStore, DeliveryLogger, InMemoryDeliveryLog};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

/// The global application state shared between all request handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn SubscriptionStore>,
    pub delivery_log: Arc<dyn DeliveryLogStore>,
    pub dispatcher: Arc<Dispatcher>,
    pub require_https: bool,
}

impl AppState {
    /// Wire a dispatcher over `store` and `delivery_log`.
    pub fn new<S, L>(
        store: Arc<S>,
        delivery_log: Arc<L>,
        transport: Arc<dyn WebhookTransport>,
        require_https: bool,
    ) -> Self
    where
        S: SubscriptionStore + 'static,
        L: DeliveryLogStore + 'static,
    {
        let registry: Arc<dyn SubscriptionRegistry> = store.clone();
        let delivery_log: Arc<dyn DeliveryLogStore> = delivery_log;
        let dispatcher = Dispatcher::new(
            registry,
            transport,
            DeliveryLogger::new(delivery_log.clone()),
        );

        Self {
            store,
            delivery_log,
            dispatcher: Arc::new(dispatcher),
            require_https,
        }
    }
}

pub struct Server {
    router: Router,
    listener: TcpListener,
    port: u16,
}

impl Server {
    /// Creates a server backed by process-local stores and the HTTP transport.
    pub async fn new(config: &Config) -> Result<Self> {
        let transport = WebhookHttpClient::with_config(
            config.webhook.timeout(),
            &config.webhook.user_agent,
        )
        .wrap_err("Failed to build webhook HTTP client")?;

        let state = AppState::new(
            Arc::new(InMemorySubscriptionStore::new()),
            Arc::new(InMemoryDeliveryLog::new()),
            Arc::new(transport),
            config.webhook.require_https,
        );

        Self::with_state(config, state).await
    }

    /// Creates a server over caller-supplied state.
    pub async fn with_state(config: &Config, state: AppState) -> Result<Self> {
        let trace_layer =
            TraceLayer::new_for_http().make_span_with(|request: &'_ axum::extract::Request<_>| {
                let uri = request.uri().to_string();
                tracing::info_span!("request", method = %request.method(), uri)
            });

        let cors_layer = CorsLayer::new()
            .allow_origin(Any)
            .allow_headers(Any)
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PATCH,
                Method::DELETE,
                Method::OPTIONS,
            ]);

        let router = Router::new()
            .route("/health", get(health_check))
            .route("/webhooks", get(list_webhooks).post(create_webhook))
            .route("/webhooks/events", get(list_event_types))
            .route("/webhooks/{id}", get(get_webhook).delete(delete_webhook))
            .route("/webhooks/{id}/toggle", patch(toggle_webhook))
            .route("/webhooks/{id}/logs", get(list_delivery_logs))
            .route("/webhooks/{id}/test", post(test_webhook))
            .layer(cors_layer)
            .layer(trace_layer)
            .with_state(state);

        let listener = TcpListener::bind(format!("{}:{}", config.server.host, config.server.port))
            .await
            .wrap_err_with(|| format!("Failed to bind to port {}", config.server.port))?;
        let port = listener
            .local_addr()
            .wrap_err("Failed to read bound address")?
            .port();

        Ok(Self {
            router,
            listener,
            port,
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Runs the HTTP server.
    pub async fn run(self) -> Result<()> {
        tracing::info!("Server listening on {}", self.listener.local_addr()?);
        axum::serve(self.listener, self.router).await?;
        Ok(())
    }
}
