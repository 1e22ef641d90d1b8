use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use erp_events::EventType;
use serde_json::json;
use uuid::Uuid;

use crate::outbound::webhook::{
    DispatchSummary, NewSubscription, SubscriptionView, WebhookSubscription,
};
use crate::server::AppState;
use crate::server::responses::{ApiError, ResponseBody};

/// Event type strings a subscription may listen to.
pub async fn list_event_types() -> ResponseBody<Vec<&'static str>> {
    let events = EventType::ALL.iter().map(EventType::as_str).collect();
    ResponseBody::new(StatusCode::OK, events)
}

pub async fn create_webhook(
    State(state): State<AppState>,
    payload: Result<Json<NewSubscription>, JsonRejection>,
) -> Result<ResponseBody<SubscriptionView>, ApiError> {
    let Json(request) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    let subscription = WebhookSubscription::create(request, state.require_https)?;
    let view = SubscriptionView::from(&subscription);
    state.store.insert(subscription).await?;

    Ok(ResponseBody::new(StatusCode::CREATED, view))
}

pub async fn list_webhooks(
    State(state): State<AppState>,
) -> Result<ResponseBody<Vec<SubscriptionView>>, ApiError> {
    let views = state
        .store
        .list()
        .await?
        .iter()
        .map(SubscriptionView::from)
        .collect();
    Ok(ResponseBody::new(StatusCode::OK, views))
}

pub async fn get_webhook(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<ResponseBody<SubscriptionView>, ApiError> {
    let subscription = state.store.get(id).await?;
    Ok(ResponseBody::new(
        StatusCode::OK,
        SubscriptionView::from(&subscription),
    ))
}

pub async fn toggle_webhook(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<ResponseBody<SubscriptionView>, ApiError> {
    let subscription = state.store.toggle(id).await?;
    Ok(ResponseBody::new(
        StatusCode::OK,
        SubscriptionView::from(&subscription),
    ))
}

pub async fn delete_webhook(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state.store.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Send a synthetic event to one subscription through the normal delivery path.
pub async fn test_webhook(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<ResponseBody<DispatchSummary>, ApiError> {
    let subscription = state.store.get(id).await?;
    let data = json!({
        "test": true,
        "message": "This is a test webhook delivery",
        "subscriptionId": id,
    });

    let summary = state.dispatcher.dispatch_to(subscription, data).await;
    Ok(ResponseBody::new(StatusCode::OK, summary))
}
