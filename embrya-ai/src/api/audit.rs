//! Audit endpoints: overrides and prediction views

use axum::{extract::State, routing::post, Json, Router};

use crate::error::ApiResult;
use crate::pipeline::{AuditReceipt, OverrideRequest, PredictionViewed};
use crate::AppState;

/// POST /predictions/override
pub async fn record_override(
    State(state): State<AppState>,
    Json(request): Json<OverrideRequest>,
) -> ApiResult<Json<AuditReceipt>> {
    Ok(Json(state.analyzer.record_override(&request)?))
}

/// POST /predictions/viewed
pub async fn record_viewed(
    State(state): State<AppState>,
    Json(viewed): Json<PredictionViewed>,
) -> Json<AuditReceipt> {
    Json(state.analyzer.record_prediction_viewed(&viewed))
}

pub fn audit_routes() -> Router<AppState> {
    Router::new()
        .route("/predictions/override", post(record_override))
        .route("/predictions/viewed", post(record_viewed))
}
