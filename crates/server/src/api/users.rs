//! Account endpoints: profile, password and the administrative user
//! listing, realm assignment and deletion.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::Response,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use utoipa_axum::{router::OpenApiRouter, routes};

use crate::api::auth::{DeleteUsers, ManageRealms, ModifyUser, ReadUsers, ResourceBearer, UserBearer};
use crate::api::clients::PageQuery;
use crate::api::session::{SessionResponse, session_response};
use crate::error::{AuthError, ErrorResponse};
use crate::oauth2::scopes::SCOPE_EMAIL;
use crate::oauth2::{OAUTH2_TAG, OAuth2State};
use crate::store::UserAccount;

pub fn router(state: OAuth2State) -> OpenApiRouter {
    OpenApiRouter::new()
        .routes(routes!(current_user, update_user))
        .routes(routes!(change_password))
        .routes(routes!(list_users))
        .routes(routes!(update_realms))
        .routes(routes!(delete_user))
        .with_state(state)
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UserResponse {
    pub id: String,
    /// Present for first-party sessions and tokens with the `email` scope
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub realms: Vec<String>,
    /// Unix timestamp
    pub created_at: i64,
}

impl UserResponse {
    pub fn new(user: &UserAccount, with_email: bool) -> Self {
        Self {
            id: user.id.clone(),
            email: with_email.then(|| user.email.clone()),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            realms: user.realms.iter().cloned().collect(),
            created_at: user.created_at.unix_timestamp(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UserPage {
    pub items: Vec<UserResponse>,
    pub page: u64,
    pub total: u64,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ProfileRequest {
    /// 2 to 20 characters
    pub first_name: String,
    /// 2 to 20 characters
    pub last_name: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct PasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RealmsRequest {
    pub realms: Vec<String>,
}

/// The account behind the bearer token.
#[tracing::instrument(skip_all, fields(user_id = %bearer.context.user.id))]
#[utoipa::path(
    get,
    path = "/user",
    tag = OAUTH2_TAG,
    operation_id = "Current User",
    summary = "Read the authenticated account",
    description = "Accepts a first-party session assertion or any access token. The email \
                   address is included only with the `email` scope.",
    responses(
        (status = 200, description = "The account", body = UserResponse),
        (status = 401, description = "Missing or invalid bearer token", body = ErrorResponse)
    ),
    security(("Authorization" = []))
)]
pub async fn current_user(bearer: ResourceBearer) -> Json<UserResponse> {
    let context = bearer.context;
    Json(UserResponse::new(&context.user, context.has_scope(SCOPE_EMAIL)))
}

/// Edit first and last name.
#[tracing::instrument(skip_all, fields(user_id = %bearer.context.user.id))]
#[utoipa::path(
    put,
    path = "/user",
    tag = OAUTH2_TAG,
    operation_id = "Update User",
    summary = "Update the authenticated account's name",
    description = "Requires the `users.modify` scope.",
    request_body = ProfileRequest,
    responses(
        (status = 200, description = "Account updated", body = UserResponse),
        (status = 400, description = "Invalid name", body = ErrorResponse),
        (status = 401, description = "Missing or invalid bearer token", body = ErrorResponse),
        (status = 403, description = "Insufficient scope", body = ErrorResponse)
    ),
    security(("Authorization" = []))
)]
pub async fn update_user(
    State(state): State<OAuth2State>,
    bearer: ResourceBearer<ModifyUser>,
    Json(request): Json<ProfileRequest>,
) -> Result<Json<UserResponse>, AuthError> {
    let context = bearer.context;
    let user = state
        .sessions()
        .update_profile(&context.user, &request.first_name, &request.last_name)
        .await?;
    Ok(Json(UserResponse::new(&user, context.has_scope(SCOPE_EMAIL))))
}

/// Rotate the password.
#[tracing::instrument(skip_all, fields(user_id = %user.id))]
#[utoipa::path(
    put,
    path = "/user/password",
    tag = OAUTH2_TAG,
    operation_id = "Change Password",
    summary = "Change the password of the signed-in account",
    description = "Requires a user session assertion. Every assertion issued before the change \
                   stops working; the response carries a fresh one.",
    request_body = PasswordRequest,
    responses(
        (status = 200, description = "Password changed", body = SessionResponse),
        (status = 400, description = "New password too weak", body = ErrorResponse),
        (status = 401, description = "Not signed in or wrong current password", body = ErrorResponse)
    )
)]
pub async fn change_password(
    State(state): State<OAuth2State>,
    UserBearer { user, .. }: UserBearer,
    Json(request): Json<PasswordRequest>,
) -> Result<Response, AuthError> {
    let session = state
        .sessions()
        .change_password(&user, &request.current_password, &request.new_password)
        .await?;
    Ok(session_response(session))
}

/// Page through accounts.
#[tracing::instrument(skip_all, fields(page = query.page))]
#[utoipa::path(
    get,
    path = "/users",
    tag = OAUTH2_TAG,
    operation_id = "List Users",
    summary = "List accounts",
    description = "Requires the `users.read` scope and realm.",
    params(PageQuery),
    responses(
        (status = 200, description = "One page of accounts", body = UserPage),
        (status = 401, description = "Missing or invalid bearer token", body = ErrorResponse),
        (status = 403, description = "Insufficient scope or realm", body = ErrorResponse)
    ),
    security(("Authorization" = []))
)]
pub async fn list_users(
    State(state): State<OAuth2State>,
    bearer: ResourceBearer<ReadUsers>,
    Query(query): Query<PageQuery>,
) -> Result<Json<UserPage>, AuthError> {
    let with_email = bearer.context.has_scope(SCOPE_EMAIL);
    let page = state.sessions().list_users(query.page).await?;
    Ok(Json(UserPage {
        items: page
            .items
            .iter()
            .map(|user| UserResponse::new(user, with_email))
            .collect(),
        page: page.page,
        total: page.total,
    }))
}

/// Replace an account's realms.
#[tracing::instrument(skip_all, fields(caller = %bearer.context.user.id, %id))]
#[utoipa::path(
    put,
    path = "/user/{id}/realms",
    tag = OAUTH2_TAG,
    operation_id = "Update Realms",
    summary = "Replace the administrative realms of an account",
    description = "Requires the `users.realms` scope and realm.",
    params(("id" = String, Path, description = "User id")),
    request_body = RealmsRequest,
    responses(
        (status = 200, description = "Realms replaced", body = UserResponse),
        (status = 400, description = "Unknown realm", body = ErrorResponse),
        (status = 403, description = "Insufficient scope or realm", body = ErrorResponse),
        (status = 404, description = "Unknown user", body = ErrorResponse)
    ),
    security(("Authorization" = []))
)]
pub async fn update_realms(
    State(state): State<OAuth2State>,
    bearer: ResourceBearer<ManageRealms>,
    Path(id): Path<String>,
    Json(request): Json<RealmsRequest>,
) -> Result<Json<UserResponse>, AuthError> {
    let user = state.sessions().update_realms(&id, request.realms).await?;
    Ok(Json(UserResponse::new(
        &user,
        bearer.context.has_scope(SCOPE_EMAIL),
    )))
}

/// Delete another account.
#[tracing::instrument(skip_all, fields(caller = %bearer.context.user.id, %id))]
#[utoipa::path(
    delete,
    path = "/user/{id}",
    tag = OAUTH2_TAG,
    operation_id = "Delete User",
    summary = "Delete an account",
    description = "Requires the `users.delete` scope and realm. An account cannot delete \
                   itself. Its clients and tokens stop resolving immediately.",
    params(("id" = String, Path, description = "User id")),
    responses(
        (status = 204, description = "Account deleted"),
        (status = 400, description = "Attempt to delete the caller's own account", body = ErrorResponse),
        (status = 403, description = "Insufficient scope or realm", body = ErrorResponse),
        (status = 404, description = "Unknown user", body = ErrorResponse)
    ),
    security(("Authorization" = []))
)]
pub async fn delete_user(
    State(state): State<OAuth2State>,
    bearer: ResourceBearer<DeleteUsers>,
    Path(id): Path<String>,
) -> Result<StatusCode, AuthError> {
    state.sessions().delete_user(&bearer.context.user, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}
