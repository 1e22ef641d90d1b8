use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use erp_events::{DeliveryAttempt, DeliveryLogQuery};
use serde::Deserialize;
use uuid::Uuid;

use crate::server::AppState;
use crate::server::responses::{ApiError, ResponseBody};

pub const DEFAULT_LOG_LIMIT: usize = 50;

#[derive(Debug, Default, Deserialize)]
pub struct LogParams {
    pub limit: Option<usize>,
    pub success: Option<bool>,
}

/// Delivery attempts for one subscription, newest first.
///
/// Works for deleted subscriptions too; their logs are kept.
pub async fn list_delivery_logs(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(params): Query<LogParams>,
) -> Result<ResponseBody<Vec<DeliveryAttempt>>, ApiError> {
    let mut query =
        DeliveryLogQuery::for_subscription(id).with_limit(params.limit.unwrap_or(DEFAULT_LOG_LIMIT));
    query.success = params.success;

    let attempts = state.delivery_log.query(&query).await?;
    Ok(ResponseBody::new(StatusCode::OK, attempts))
}
