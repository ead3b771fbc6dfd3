//! Health and metrics endpoints.

use axum::{extract::State, http::StatusCode, Json};
use serde_json::json;

use crate::services::metrics::get_metrics;
use crate::AppState;

/// Liveness/readiness probe; checks database connectivity.
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<serde_json::Value>) {
    match state.db.health_check().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({ "status": "healthy", "service": "billing-service" })),
        ),
        Err(e) => {
            tracing::error!(error = %e, "Health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "status": "unhealthy", "service": "billing-service" })),
            )
        }
    }
}

/// Prometheus scrape endpoint.
pub async fn metrics() -> String {
    get_metrics()
}
