use axum::{routing::get, Router};
use std::sync::Arc;

use super::handlers::{get_country_metrics, health_check, AppState};
use super::trace;

pub fn create_api_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/v1/countries/metrics", get(get_country_metrics))
        .layer(trace::layer())
        .with_state(state)
}
