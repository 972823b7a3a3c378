//! Prediction endpoint
//!
//! **[API-PREDICT]** POST /predict with the raw image as the request body.
//! Subject references for the audit trail travel in the query string.

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Query, State},
    routing::post,
    Json, Router,
};
use tracing::error;

use crate::error::{ApiError, ApiResult};
use crate::pipeline::{PredictionContext, PredictionReport};
use crate::AppState;

/// Largest accepted upload
pub const MAX_IMAGE_BYTES: usize = 20 * 1024 * 1024;

/// POST /predict
///
/// Decoding and analysis are CPU-bound and run on the blocking pool.
pub async fn predict(
    State(state): State<AppState>,
    Query(context): Query<PredictionContext>,
    body: Bytes,
) -> ApiResult<Json<PredictionReport>> {
    if body.is_empty() {
        return Err(ApiError::BadRequest("Request body must contain an image".into()));
    }

    let analyzer = state.analyzer.clone();
    let report = tokio::task::spawn_blocking(move || analyzer.analyze(&body, &context))
        .await
        .map_err(|e| {
            error!(error = %e, "Prediction task failed");
            ApiError::Internal(format!("Prediction task failed: {}", e))
        })??;

    Ok(Json(report))
}

pub fn predict_routes() -> Router<AppState> {
    Router::new()
        .route("/predict", post(predict))
        .layer(DefaultBodyLimit::max(MAX_IMAGE_BYTES))
}
