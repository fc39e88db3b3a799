//! Health check endpoint.

use axum::{extract::State, http::StatusCode};
use utoipa_axum::{router::OpenApiRouter, routes};

use crate::oauth2::OAuth2State;

/// Tag for OpenAPI documentation.
pub const MISC_TAG: &str = "Miscellaneous";

pub fn router(state: OAuth2State) -> OpenApiRouter {
    OpenApiRouter::new()
        .routes(routes!(health))
        .with_state(state)
}

/// Health check endpoint. Fails when the repository cannot be reached.
#[tracing::instrument(skip_all)]
#[utoipa::path(
    method(get, head),
    path = "/healthz",
    tag = MISC_TAG,
    operation_id = "Health Check",
    summary = "Service health check",
    description = "Returns `ok` when the service accepts requests and its repository answers. \
                   Supports both GET and HEAD for load balancers and liveness probes.",
    responses(
        (status = 200, description = "Service is healthy", body = str, content_type = "text/plain", example = "ok"),
        (status = 503, description = "Repository unavailable", body = str, content_type = "text/plain", example = "unavailable")
    )
)]
pub async fn health(State(state): State<OAuth2State>) -> (StatusCode, &'static str) {
    match state.repo.count_users().await {
        Ok(_) => (StatusCode::OK, "ok"),
        Err(e) => {
            tracing::error!(error = %e, "health check failed");
            (StatusCode::SERVICE_UNAVAILABLE, "unavailable")
        }
    }
}
