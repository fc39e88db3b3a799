//! `/authorize` and `/token`.

use axum::{
    Json,
    extract::{Query, State},
    http::{StatusCode, header},
    response::IntoResponse,
};
use utoipa_axum::{router::OpenApiRouter, routes};

use crate::api::auth::{ClientAuth, UserBearer};
use crate::error::{AuthError, ErrorResponse};
use crate::oauth2::authorize::AuthorizeRequest;
use crate::oauth2::token::{TokenRequest, TokenResponse};
use crate::oauth2::{OAUTH2_TAG, OAuth2State};

pub fn router(state: OAuth2State) -> OpenApiRouter {
    OpenApiRouter::new()
        .routes(routes!(authorize))
        .routes(routes!(token))
        .with_state(state)
}

/// OAuth2 authorization endpoint.
#[tracing::instrument(skip_all, fields(user_id = %user.id, client_id = %request.client_id))]
#[utoipa::path(
    get,
    path = "/authorize",
    tag = OAUTH2_TAG,
    operation_id = "OAuth2 Authorize",
    summary = "Grant a client access on behalf of the signed-in user",
    description = "Requires a user session assertion (`Authorization: Bearer`, `session` cookie \
                   or `assertion` query parameter).\n\n\
                   Until the redirect URI is confirmed against the registration, failures are \
                   JSON errors. Afterwards every outcome is a redirect carrying `state`: \
                   `?code=` for `code` clients, `#access_token=` for `token` clients, or \
                   `?error=` on failure.",
    params(AuthorizeRequest),
    responses(
        (status = 302, description = "Redirect to the client's registered URI"),
        (status = 400, description = "Malformed request", body = ErrorResponse),
        (status = 401, description = "Not signed in or redirect URI mismatch", body = ErrorResponse),
        (status = 404, description = "Unknown client", body = ErrorResponse)
    )
)]
pub async fn authorize(
    State(state): State<OAuth2State>,
    UserBearer { user, .. }: UserBearer,
    Query(request): Query<AuthorizeRequest>,
) -> Result<impl IntoResponse, AuthError> {
    let location = state.authorization().authorize(&user, &request).await?;
    Ok((StatusCode::FOUND, [(header::LOCATION, location)]))
}

/// OAuth2 token endpoint.
#[tracing::instrument(skip_all, fields(client_id = %client.client.id, grant_type = %request.grant_type))]
#[utoipa::path(
    post,
    path = "/token",
    tag = OAUTH2_TAG,
    operation_id = "OAuth2 Token",
    summary = "Redeem an authorization code or refresh an access token",
    description = "The client authenticates with `Authorization: Basic base64(id:secret)` or a \
                   `client_assertion` query parameter. Only `code` clients may call this endpoint.\n\n\
                   `refresh_token` grants return the presented refresh token unchanged.",
    params(TokenRequest),
    responses(
        (status = 200, description = "Tokens issued", body = TokenResponse),
        (status = 400, description = "Malformed request or code issued to another client", body = ErrorResponse),
        (status = 401, description = "Client authentication failed, or the grant is unknown or expired", body = ErrorResponse)
    ),
    security(("Basic" = []))
)]
pub async fn token(
    State(state): State<OAuth2State>,
    ClientAuth(client): ClientAuth,
    Query(request): Query<TokenRequest>,
) -> Result<impl IntoResponse, AuthError> {
    let response = state.tokens().exchange(&client.client, &request).await?;
    Ok(([(header::CACHE_CONTROL, "no-store")], Json(response)))
}
