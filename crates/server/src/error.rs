//! Error taxonomy shared by every engine and the HTTP adapter.
//!
//! Each [`AuthError`] variant maps through a fixed `match` onto an
//! [`ErrorKind`], an OAuth-style error code and an HTTP status. The JSON
//! envelope is `{"error": code, "error_description": text}`.

use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use crate::store::StoreError;

/// Realm announced in every `WWW-Authenticate` challenge.
pub const CHALLENGE_REALM: &str = "oauth2-authority";

/// Coarse classification of an [`AuthError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Unauthorized,
    Forbidden,
    Expired,
    Internal,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("{0}")]
    InvalidRequest(String),
    #[error("email address is not acceptable")]
    InvalidEmail,
    #[error("{0}")]
    WeakPassword(&'static str),
    #[error("response type must be `code` or `token`")]
    InvalidResponseType,
    #[error("{0}")]
    InvalidScope(String),
    #[error("redirect uri is not acceptable")]
    InvalidRedirectUri,
    #[error("redirect uri does not match the registered one")]
    RedirectMismatch,
    #[error("grant type must be `authorization_code` or `refresh_token`")]
    UnsupportedGrantType,
    #[error("a client named `{0}` already exists")]
    DuplicateName(String),
    #[error("an account with this email address already exists")]
    EmailTaken,
    #[error("a verification email was already sent to this address")]
    VerificationAlreadySent,
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("email or password is incorrect")]
    IncorrectCredentials,
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    InvalidToken(String),
    #[error("{0}")]
    InvalidClient(String),
    #[error("{0}")]
    InsufficientScope(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("authorization code is unknown or expired")]
    TokenExpired,
    #[error("authorization code was issued to another client")]
    GrantWrongClient,
    #[error("refresh token is unknown or expired")]
    InvalidRefreshToken,
    #[error("refresh token was issued to another client")]
    RefreshWrongClient,
    #[error("internal error: {0}")]
    Internal(String),
}

impl AuthError {
    pub fn internal(detail: impl std::fmt::Display) -> Self {
        Self::Internal(detail.to_string())
    }

    pub fn kind(&self) -> ErrorKind {
        use AuthError::*;
        match self {
            InvalidRequest(_)
            | InvalidEmail
            | WeakPassword(_)
            | InvalidResponseType
            | InvalidScope(_)
            | InvalidRedirectUri
            | UnsupportedGrantType
            | DuplicateName(_)
            | EmailTaken
            | VerificationAlreadySent
            | GrantWrongClient => ErrorKind::Validation,
            NotFound(_) => ErrorKind::NotFound,
            IncorrectCredentials
            | Unauthorized(_)
            | InvalidToken(_)
            | InvalidClient(_)
            | RedirectMismatch
            | RefreshWrongClient => ErrorKind::Unauthorized,
            InsufficientScope(_) | Forbidden(_) => ErrorKind::Forbidden,
            TokenExpired | InvalidRefreshToken => ErrorKind::Expired,
            Internal(_) => ErrorKind::Internal,
        }
    }

    /// OAuth-style error code carried in the `error` field.
    pub fn code(&self) -> &'static str {
        use AuthError::*;
        match self {
            InvalidRequest(_) | RedirectMismatch => "invalid_request",
            InvalidEmail => "invalid_email",
            WeakPassword(_) => "weak_password",
            InvalidResponseType => "unsupported_response_type",
            InvalidScope(_) => "invalid_scope",
            InvalidRedirectUri => "invalid_redirect_uri",
            UnsupportedGrantType => "unsupported_grant_type",
            DuplicateName(_) => "duplicate_name",
            EmailTaken => "email_taken",
            VerificationAlreadySent => "verification_already_sent",
            NotFound(_) => "not_found",
            IncorrectCredentials => "incorrect_credentials",
            Unauthorized(_) => "unauthorized",
            InvalidToken(_) => "invalid_token",
            InvalidClient(_) => "invalid_client",
            InsufficientScope(_) => "insufficient_scope",
            Forbidden(_) => "forbidden",
            TokenExpired | InvalidRefreshToken => "invalid_grant",
            GrantWrongClient | RefreshWrongClient => "unauthorized_client",
            Internal(_) => "server_error",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self.kind() {
            ErrorKind::Validation => StatusCode::BAD_REQUEST,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            // Expired grants only surface after client authentication, where
            // a missing record is reported as 401.
            ErrorKind::Unauthorized | ErrorKind::Expired => StatusCode::UNAUTHORIZED,
            ErrorKind::Forbidden => StatusCode::FORBIDDEN,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Human-readable description; internal details stay in the logs.
    pub fn description(&self) -> String {
        match self {
            AuthError::Internal(_) => "the server failed to process the request".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(_) => {
                AuthError::InvalidRequest("a conflicting record already exists".to_string())
            }
            StoreError::Backend(detail) => AuthError::Internal(detail),
        }
    }
}

/// JSON error envelope.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// Error code (e.g. `invalid_request`, `invalid_grant`)
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_description: Option<String>,
}

impl From<&AuthError> for ErrorResponse {
    fn from(err: &AuthError) -> Self {
        Self {
            error: err.code().to_string(),
            error_description: Some(err.description()),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        if let AuthError::Internal(detail) = &self {
            tracing::error!(%detail, "request failed with an internal error");
        }
        (self.status(), Json(ErrorResponse::from(&self))).into_response()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Scheme {
    Basic,
    Bearer,
}

/// `WWW-Authenticate` challenge attached to a middleware rejection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Challenge {
    pub scheme: Scheme,
    pub scopes: Vec<String>,
    pub realms: Vec<String>,
}

impl Challenge {
    pub fn basic() -> Self {
        Self {
            scheme: Scheme::Basic,
            scopes: Vec::new(),
            realms: Vec::new(),
        }
    }

    pub fn bearer(scopes: &[&str], realms: &[&str]) -> Self {
        Self {
            scheme: Scheme::Bearer,
            scopes: scopes.iter().map(|s| s.to_string()).collect(),
            realms: realms.iter().map(|r| r.to_string()).collect(),
        }
    }

    /// Renders the header value, e.g.
    /// `Bearer realm="oauth2-authority", error="insufficient_scope", scope="users.read"`.
    pub fn render(&self, error: &str) -> String {
        let scheme = match self.scheme {
            Scheme::Basic => "Basic",
            Scheme::Bearer => "Bearer",
        };
        let mut value = format!("{scheme} realm=\"{CHALLENGE_REALM}\", error=\"{error}\"");
        if !self.scopes.is_empty() {
            value.push_str(&format!(", scope=\"{}\"", self.scopes.join(" ")));
        }
        if !self.realms.is_empty() {
            value.push_str(&format!(", realms=\"{}\"", self.realms.join(" ")));
        }
        value
    }
}

/// Failure of one of the authenticating strategies.
#[derive(Debug)]
pub struct AuthRejection {
    pub error: AuthError,
    pub challenge: Challenge,
}

impl AuthRejection {
    pub fn new(error: AuthError, challenge: Challenge) -> Self {
        Self { error, challenge }
    }
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        let header_value = self.challenge.render(self.error.code());
        let mut response = self.error.into_response();
        if let Ok(value) = HeaderValue::from_str(&header_value) {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, value);
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn internal_errors_hide_their_detail() {
        let err = AuthError::internal("connection refused by 10.0.0.7");
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.code(), "server_error");
        assert!(!err.description().contains("10.0.0.7"));
    }

    #[test]
    fn grant_errors_follow_oauth_codes() {
        assert_eq!(AuthError::TokenExpired.code(), "invalid_grant");
        assert_eq!(AuthError::TokenExpired.kind(), ErrorKind::Expired);
        assert_eq!(AuthError::TokenExpired.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(AuthError::InvalidRefreshToken.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(AuthError::GrantWrongClient.status(), StatusCode::BAD_REQUEST);
        assert_eq!(AuthError::RefreshWrongClient.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(AuthError::RedirectMismatch.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn store_errors_split_into_validation_and_internal() {
        let err: AuthError = StoreError::Backend("disk full".into()).into();
        assert_eq!(err.kind(), ErrorKind::Internal);
        let err: AuthError = StoreError::Conflict("users.email".into()).into();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn challenge_lists_required_scope_and_realms() {
        let challenge = Challenge::bearer(&["users.read"], &["users.read"]);
        assert_eq!(
            challenge.render("insufficient_scope"),
            "Bearer realm=\"oauth2-authority\", error=\"insufficient_scope\", scope=\"users.read\", realms=\"users.read\""
        );
        assert_eq!(
            Challenge::basic().render("invalid_client"),
            "Basic realm=\"oauth2-authority\", error=\"invalid_client\""
        );
    }

    #[test]
    fn rejection_sets_www_authenticate() {
        let rejection = AuthRejection::new(
            AuthError::InvalidToken("token expired".into()),
            Challenge::bearer(&[], &[]),
        );
        let response = rejection.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let header = response
            .headers()
            .get(header::WWW_AUTHENTICATE)
            .expect("challenge header");
        assert_eq!(
            header.to_str().unwrap(),
            "Bearer realm=\"oauth2-authority\", error=\"invalid_token\""
        );
    }
}
