use axum::{
    extract::State,
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::error;

use crate::config::MetricsWindow;
use crate::metrics::{compute_averaged_metrics, AggregatedResult, MetricsError};
use crate::upstream::{Credential, UpstreamClient, UpstreamError};

pub struct AppState {
    pub upstream: UpstreamClient,
    pub window: MetricsWindow,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SuccessResponse {
    pub message: String,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Missing Authorization header")]
    MissingCredential,
    #[error("Failed to open upstream session")]
    Session(#[source] UpstreamError),
    #[error(transparent)]
    Metrics(#[from] MetricsError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self {
            ApiError::MissingCredential => StatusCode::UNAUTHORIZED,
            ApiError::Session(_) | ApiError::Metrics(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (
            status,
            Json(ErrorResponse {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}

/// Average clicks per country over the configured window, across every link
/// in the caller's default group.
///
/// The `Authorization` header is forwarded untouched to every upstream call.
/// A request without one gets 401 before any upstream call is made; that is
/// the only response not produced by a pipeline stage, which otherwise yields
/// either the full map or a 500 naming the failed stage.
pub async fn get_country_metrics(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<AggregatedResult>, ApiError> {
    let credential = headers
        .get(AUTHORIZATION)
        .cloned()
        .map(Credential::from_header)
        .ok_or(ApiError::MissingCredential)?;

    // Scoped to this request; dropped (and its connections closed) on return
    let session = state.upstream.session(&credential).map_err(|e| {
        error!("Failed to open upstream session: {}", e);
        ApiError::Session(e)
    })?;

    let result = compute_averaged_metrics(&session, state.window).await?;

    Ok(Json(result))
}

/// Health check endpoint
pub async fn health_check() -> Json<SuccessResponse> {
    Json(SuccessResponse {
        message: "OK".to_string(),
    })
}
