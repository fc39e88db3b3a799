//! HTTP transport.
//!
//! - `session` - sign-up, verification, sign-in, client assertions
//! - `grants` - `/authorize` and `/token`
//! - `clients` - client registration
//! - `users` - account management
//! - `health` - health check endpoint (/healthz)
//! - `auth` - extractors running the authentication strategies
//! - `openapi` - OpenAPI/Utoipa configuration

pub mod auth;
pub mod clients;
pub mod grants;
pub mod health;
pub mod openapi;
pub mod session;
pub mod users;

use std::time::Duration;

use axum::{Router, http::StatusCode};
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};
use utoipa::OpenApi;
use utoipa_axum::router::OpenApiRouter;
use utoipa_redoc::{Redoc, Servable};

use crate::config::AppConfig;
use crate::oauth2::OAuth2State;

/// The complete application. Requests running longer than
/// `request_timeout` are dropped and answered with `408 Request Timeout`.
pub fn app(state: OAuth2State, request_timeout: Duration) -> Router {
    let (router, api) = OpenApiRouter::with_openapi(openapi::ApiDoc::openapi())
        .merge(session::router(state.clone()))
        .merge(grants::router(state.clone()))
        .merge(clients::router(state.clone()))
        .merge(users::router(state.clone()))
        .merge(health::router(state))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            request_timeout,
        ))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .split_for_parts();

    router.merge(Redoc::with_url("/api-docs", api))
}

/// Starts the web server with all configured routes.
#[tracing::instrument(skip_all, fields(addr = %config.listen_addr))]
pub async fn start_webserver(state: OAuth2State, config: &AppConfig) -> color_eyre::Result<()> {
    let router = app(state, Duration::from_millis(config.request_timeout_ms));

    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    tracing::info!(addr = %config.listen_addr, "server running");
    axum::serve(listener, router)
        .await
        .map_err(|e| color_eyre::Report::msg(format!("Failed to start server: {e}")))?;

    Ok(())
}
