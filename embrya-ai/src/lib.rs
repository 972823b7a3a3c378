//! embrya-ai library interface
//!
//! Embryo viability assessment: image → features → ensemble prediction →
//! derived clinical assessments, served over a thin HTTP API.

pub mod analysis;
pub mod api;
pub mod config;
pub mod ensemble;
pub mod error;
pub mod imaging;
pub mod models;
pub mod pipeline;
pub mod types;

pub use crate::error::{ApiError, ApiResult};
pub use crate::pipeline::{EmbryoAnalyzer, PipelineError, PredictionContext, PredictionReport};

use std::sync::Arc;

use axum::http::HeaderValue;
use axum::Router;
use chrono::{DateTime, Utc};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Pipeline with its immutable model registry and audit sink
    pub analyzer: Arc<EmbryoAnalyzer>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(analyzer: Arc<EmbryoAnalyzer>) -> Self {
        Self {
            analyzer,
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::health_routes())
        .merge(api::predict_routes())
        .merge(api::audit_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// CORS layer for the configured browser origins
///
/// Returns `None` when no valid origin is configured; the API is then
/// same-origin only.
pub fn cors_layer(origins: &[String]) -> Option<CorsLayer> {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    if allowed.is_empty() {
        return None;
    }
    Some(
        CorsLayer::new()
            .allow_origin(allowed)
            .allow_methods(Any)
            .allow_headers(Any),
    )
}
