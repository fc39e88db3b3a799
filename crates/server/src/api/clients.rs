//! Client registration endpoints.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use utoipa_axum::{router::OpenApiRouter, routes};

use crate::api::auth::{CreateClients, DeleteClients, ReadClients, ResourceBearer};
use crate::error::{AuthError, ErrorResponse};
use crate::oauth2::clients::NewClient;
use crate::oauth2::{OAUTH2_TAG, OAuth2State};
use crate::store::{ClientApplication, Expiring, ResponseType};

pub fn router(state: OAuth2State) -> OpenApiRouter {
    OpenApiRouter::new()
        .routes(routes!(create_client))
        .routes(routes!(get_client, delete_client))
        .routes(routes!(list_clients))
        .with_state(state)
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct NewClientRequest {
    /// Unique, at most 12 characters
    pub name: String,
    /// At most 150 characters
    #[serde(default)]
    pub description: String,
    /// `code` or `token`
    pub response_type: String,
    /// `https`, or `http` on a loopback host
    pub redirect_uri: String,
    /// `token` clients: `public`; `code` clients: `public` and/or `email`
    pub scope: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RegisteredClientResponse {
    pub id: String,
    /// Shown only once
    pub secret: String,
}

/// Public metadata of a client. Never includes the secret.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ClientResponse {
    pub id: String,
    pub name: String,
    pub description: String,
    pub response_type: ResponseType,
    pub redirect_uri: String,
    pub scope: Vec<String>,
    pub owner: String,
    /// Unix timestamp
    pub created_at: i64,
    /// Unix timestamp of the end of the lease
    pub expires_at: i64,
}

impl From<&ClientApplication> for ClientResponse {
    fn from(client: &ClientApplication) -> Self {
        Self {
            id: client.id.clone(),
            name: client.name.clone(),
            description: client.description.clone(),
            response_type: client.response_type,
            redirect_uri: client.redirect_uri.clone(),
            scope: client.scope.iter().cloned().collect(),
            owner: client.owner.clone(),
            created_at: client.created_at.unix_timestamp(),
            expires_at: client.expires_at().unix_timestamp(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ClientPage {
    pub items: Vec<ClientResponse>,
    pub page: u64,
    pub total: u64,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
#[serde(default)]
pub struct PageQuery {
    /// Zero-based page number, 10 entries per page
    pub page: u64,
}

/// Register a client application.
#[tracing::instrument(skip_all, fields(owner = %bearer.context.user.id, name = %request.name))]
#[utoipa::path(
    post,
    path = "/client",
    tag = OAUTH2_TAG,
    operation_id = "Create Client",
    summary = "Register a client application",
    description = "Requires the `clients.create` scope and realm. The returned secret is not \
                   stored in clear and cannot be retrieved again.",
    request_body = NewClientRequest,
    responses(
        (status = 201, description = "Client registered", body = RegisteredClientResponse),
        (status = 400, description = "Invalid registration or duplicate name", body = ErrorResponse),
        (status = 401, description = "Missing or invalid bearer token", body = ErrorResponse),
        (status = 403, description = "Insufficient scope or realm", body = ErrorResponse)
    ),
    security(("Authorization" = []))
)]
pub async fn create_client(
    State(state): State<OAuth2State>,
    bearer: ResourceBearer<CreateClients>,
    Json(request): Json<NewClientRequest>,
) -> Result<impl IntoResponse, AuthError> {
    let registered = state
        .clients()
        .create(
            &bearer.context.user,
            NewClient {
                name: request.name,
                description: request.description,
                response_type: request.response_type,
                redirect_uri: request.redirect_uri,
                scope: request.scope,
            },
        )
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(RegisteredClientResponse {
            id: registered.id,
            secret: registered.secret,
        }),
    ))
}

/// Public client metadata, e.g. for a consent screen.
#[tracing::instrument(skip(state))]
#[utoipa::path(
    get,
    path = "/client/{id}",
    tag = OAUTH2_TAG,
    operation_id = "Get Client",
    summary = "Look up a client's public metadata",
    params(("id" = String, Path, description = "Client id")),
    responses(
        (status = 200, description = "Client found", body = ClientResponse),
        (status = 404, description = "Unknown, expired or orphaned client", body = ErrorResponse)
    )
)]
pub async fn get_client(
    State(state): State<OAuth2State>,
    Path(id): Path<String>,
) -> Result<Json<ClientResponse>, AuthError> {
    let client = state.clients().find_by_id(&id).await?;
    Ok(Json(ClientResponse::from(&client)))
}

/// Delete a client.
#[tracing::instrument(skip(state, bearer), fields(caller = %bearer.context.user.id))]
#[utoipa::path(
    delete,
    path = "/client/{id}",
    tag = OAUTH2_TAG,
    operation_id = "Delete Client",
    summary = "Delete a client application",
    description = "Requires the `clients.delete` scope. Allowed for the owner or for accounts \
                   holding the `clients.delete` realm.",
    params(("id" = String, Path, description = "Client id")),
    responses(
        (status = 204, description = "Client deleted"),
        (status = 401, description = "Not the owner, or missing bearer token", body = ErrorResponse),
        (status = 403, description = "Insufficient scope", body = ErrorResponse),
        (status = 404, description = "Unknown client", body = ErrorResponse)
    ),
    security(("Authorization" = []))
)]
pub async fn delete_client(
    State(state): State<OAuth2State>,
    bearer: ResourceBearer<DeleteClients>,
    Path(id): Path<String>,
) -> Result<StatusCode, AuthError> {
    state.clients().delete(&id, &bearer.context.user).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Page through registered clients.
#[tracing::instrument(skip(state, _bearer))]
#[utoipa::path(
    get,
    path = "/clients",
    tag = OAUTH2_TAG,
    operation_id = "List Clients",
    summary = "List client applications",
    description = "Requires the `clients.read` scope and realm.",
    params(PageQuery),
    responses(
        (status = 200, description = "One page of clients", body = ClientPage),
        (status = 401, description = "Missing or invalid bearer token", body = ErrorResponse),
        (status = 403, description = "Insufficient scope or realm", body = ErrorResponse)
    ),
    security(("Authorization" = []))
)]
pub async fn list_clients(
    State(state): State<OAuth2State>,
    _bearer: ResourceBearer<ReadClients>,
    Query(query): Query<PageQuery>,
) -> Result<Json<ClientPage>, AuthError> {
    let page = state.clients().list(query.page).await?;
    Ok(Json(ClientPage {
        items: page.items.iter().map(ClientResponse::from).collect(),
        page: page.page,
        total: page.total,
    }))
}
