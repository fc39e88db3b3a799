//! Sign-up, verification, sign-in and client assertion endpoints.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::{Deserialize, Serialize};
use time::Duration;
use utoipa::ToSchema;
use utoipa_axum::{router::OpenApiRouter, routes};

use crate::api::auth::SESSION_COOKIE;
use crate::api::users::UserResponse;
use crate::error::{AuthError, ErrorResponse};
use crate::oauth2::session::{Session, SignUp};
use crate::oauth2::{OAUTH2_TAG, OAuth2State};

pub fn router(state: OAuth2State) -> OpenApiRouter {
    OpenApiRouter::new()
        .routes(routes!(signup))
        .routes(routes!(signin))
        .routes(routes!(verify))
        .routes(routes!(client_assertion))
        .with_state(state)
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SignUpRequest {
    pub email: String,
    /// 12 to 64 characters with a letter, a digit and a symbol
    pub password: String,
    pub first_name: String,
    pub last_name: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SignUpResponse {
    /// Always `verification_sent`
    pub status: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SignInRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SessionResponse {
    /// Signed session assertion (JWT)
    pub assertion: String,
    /// Always `bearer`
    pub token_type: String,
    /// Lifetime in seconds
    pub expires_in: i64,
}

impl From<Session> for SessionResponse {
    fn from(session: Session) -> Self {
        Self {
            assertion: session.assertion,
            token_type: "bearer".to_string(),
            expires_in: session.expires_in,
        }
    }
}

/// `HttpOnly` session cookie carrying the assertion.
pub(crate) fn session_cookie(assertion: &str, max_age_secs: i64) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, assertion.to_string()))
        .http_only(true)
        .secure(true)
        .same_site(SameSite::Lax)
        .path("/")
        .max_age(Duration::seconds(max_age_secs))
        .build()
}

/// JSON body plus the session cookie.
pub(crate) fn session_response(session: Session) -> Response {
    let jar = CookieJar::new().add(session_cookie(&session.assertion, session.expires_in));
    (jar, Json(SessionResponse::from(session))).into_response()
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ClientAssertionRequest {
    pub id: String,
    pub secret: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ClientAssertionResponse {
    /// Signed client assertion (JWT), usable as `client_assertion`
    pub assertion: String,
    pub expires_in: i64,
}

/// Start a sign-up.
#[tracing::instrument(skip(state, request), fields(email = %request.email))]
#[utoipa::path(
    post,
    path = "/signup",
    tag = OAUTH2_TAG,
    operation_id = "Sign Up",
    summary = "Register an account pending email verification",
    description = "Stores the sign-up as pending and emails a verification link. \
                   The account exists only once the link is followed.",
    request_body = SignUpRequest,
    responses(
        (status = 202, description = "Verification email sent", body = SignUpResponse),
        (status = 400, description = "Invalid input, email taken or verification already sent", body = ErrorResponse),
        (status = 500, description = "Verification email could not be sent", body = ErrorResponse)
    )
)]
pub async fn signup(
    State(state): State<OAuth2State>,
    Json(request): Json<SignUpRequest>,
) -> Result<impl IntoResponse, AuthError> {
    state
        .sessions()
        .sign_up(SignUp {
            email: request.email,
            password: request.password,
            first_name: request.first_name,
            last_name: request.last_name,
        })
        .await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(SignUpResponse {
            status: "verification_sent".to_string(),
        }),
    ))
}

/// Follow a verification link.
#[tracing::instrument(skip_all)]
#[utoipa::path(
    get,
    path = "/verify/{reference}",
    tag = OAUTH2_TAG,
    operation_id = "Verify Email",
    summary = "Complete a sign-up",
    params(("reference" = String, Path, description = "Reference from the verification email")),
    responses(
        (status = 201, description = "Account created", body = UserResponse),
        (status = 404, description = "Unknown or expired reference", body = ErrorResponse)
    )
)]
pub async fn verify(
    State(state): State<OAuth2State>,
    Path(reference): Path<String>,
) -> Result<impl IntoResponse, AuthError> {
    let user = state.sessions().verify_email(&reference).await?;
    Ok((StatusCode::CREATED, Json(UserResponse::new(&user, true))))
}

/// Exchange email and password for a session assertion.
#[tracing::instrument(skip_all)]
#[utoipa::path(
    post,
    path = "/signin",
    tag = OAUTH2_TAG,
    operation_id = "Sign In",
    summary = "Obtain a user session assertion",
    description = "Returns a short-lived JWT and sets it as an `HttpOnly` `session` cookie. \
                   Changing the password invalidates every assertion issued before.",
    request_body = SignInRequest,
    responses(
        (status = 200, description = "Signed in", body = SessionResponse),
        (status = 401, description = "Email or password is incorrect", body = ErrorResponse)
    )
)]
pub async fn signin(
    State(state): State<OAuth2State>,
    Json(request): Json<SignInRequest>,
) -> Result<Response, AuthError> {
    let session = state
        .sessions()
        .sign_in(&request.email, &request.password)
        .await?;
    Ok(session_response(session))
}

/// Exchange client id and secret for a client assertion.
#[tracing::instrument(skip(state, request), fields(client_id = %request.id))]
#[utoipa::path(
    post,
    path = "/auth/client",
    tag = OAUTH2_TAG,
    operation_id = "Client Assertion",
    summary = "Obtain a signed client assertion",
    description = "The assertion stands in for `Basic` credentials at `/token` \
                   (query parameter `client_assertion`).",
    request_body = ClientAssertionRequest,
    responses(
        (status = 200, description = "Assertion issued", body = ClientAssertionResponse),
        (status = 401, description = "Unknown client or wrong secret", body = ErrorResponse)
    )
)]
pub async fn client_assertion(
    State(state): State<OAuth2State>,
    Json(request): Json<ClientAssertionRequest>,
) -> Result<Json<ClientAssertionResponse>, AuthError> {
    let assertion = state
        .clients()
        .issue_assertion(&request.id, &request.secret)
        .await?;
    Ok(Json(ClientAssertionResponse {
        assertion,
        expires_in: state.settings.session_lifetime,
    }))
}
