//! The `/token` endpoint: authorization-code redemption and refresh.
//!
//! The caller is an already authenticated client. Read-then-delete on a code
//! is not atomic; two racing redemptions of one code can both succeed, which
//! bounds the damage to one extra token pair.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::error::AuthError;
use crate::oauth2::OAuth2State;
use crate::store::{ClientApplication, Expiring, Token, TokenKind};

#[derive(Clone, Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
#[serde(default)]
pub struct TokenRequest {
    /// `authorization_code` or `refresh_token`
    pub grant_type: String,
    pub code: Option<String>,
    pub refresh_token: Option<String>,
    pub redirect_uri: Option<String>,
    pub client_id: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct TokenResponse {
    pub access_token: String,
    /// Always `bearer`
    pub token_type: String,
    /// Access token lifetime in seconds
    pub expires_in: i64,
    pub refresh_token: String,
}

impl TokenResponse {
    fn new(access: &Token, refresh: &Token) -> Self {
        Self {
            access_token: access.id.clone(),
            token_type: "bearer".to_string(),
            expires_in: access.ttl,
            refresh_token: refresh.id.clone(),
        }
    }
}

fn required<'r>(value: &'r Option<String>, name: &str) -> Result<&'r str, AuthError> {
    value
        .as_deref()
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AuthError::InvalidRequest(format!("{name} is required")))
}

pub struct TokenExchange<'a> {
    state: &'a OAuth2State,
}

impl<'a> TokenExchange<'a> {
    pub(crate) fn new(state: &'a OAuth2State) -> Self {
        Self { state }
    }

    #[tracing::instrument(skip_all, fields(client_id = %client.id, grant_type = %request.grant_type))]
    pub async fn exchange(
        &self,
        client: &ClientApplication,
        request: &TokenRequest,
    ) -> Result<TokenResponse, AuthError> {
        match request.grant_type.as_str() {
            "authorization_code" => self.redeem_code(client, request).await,
            "refresh_token" => self.refresh(client, request).await,
            _ => Err(AuthError::UnsupportedGrantType),
        }
    }

    async fn redeem_code(
        &self,
        client: &ClientApplication,
        request: &TokenRequest,
    ) -> Result<TokenResponse, AuthError> {
        let code_id = required(&request.code, "code")?;
        let redirect_uri = required(&request.redirect_uri, "redirect_uri")?;
        let client_id = required(&request.client_id, "client_id")?;
        let repo = &self.state.repo;

        let Some(code) = repo.find_token(TokenKind::AuthorizationCode, code_id).await? else {
            return Err(AuthError::TokenExpired);
        };
        // Single use: whatever happens next, the code is gone.
        repo.delete_token(TokenKind::AuthorizationCode, &code.id).await?;

        if code.is_expired() {
            return Err(AuthError::TokenExpired);
        }
        if code.client_id != client_id || code.client_id != client.id {
            tracing::warn!(code_client = %code.client_id, "authorization code presented by another client");
            return Err(AuthError::GrantWrongClient);
        }
        let bound = match self.state.clients().find_by_id(&code.client_id).await {
            Ok(bound) => bound,
            Err(AuthError::NotFound(_)) => {
                return Err(AuthError::InvalidClient("client no longer exists".to_string()));
            }
            Err(e) => return Err(e),
        };
        if bound.redirect_uri != redirect_uri {
            return Err(AuthError::RedirectMismatch);
        }
        if repo.find_user(&code.user_id).await?.is_none() {
            tracing::info!(user_id = %code.user_id, "code owner no longer exists, code discarded");
            return Err(AuthError::TokenExpired);
        }

        let settings = &self.state.settings;
        // A request dropped between the two mints leaves an access token
        // nobody received; it lapses with its own lifetime.
        let access = self
            .state
            .mint_token(
                TokenKind::AccessToken,
                &code.client_id,
                &code.user_id,
                settings.access_token_lifetime,
            )
            .await?;
        let refresh = match self
            .state
            .mint_token(
                TokenKind::RefreshToken,
                &code.client_id,
                &code.user_id,
                settings.refresh_token_lifetime,
            )
            .await
        {
            Ok(refresh) => refresh,
            Err(e) => {
                if let Err(cleanup) = repo.delete_token(TokenKind::AccessToken, &access.id).await {
                    tracing::error!(error = %cleanup, "could not remove unpaired access token");
                } else {
                    tracing::warn!("refresh token minting failed, access token withdrawn");
                }
                return Err(e);
            }
        };
        tracing::info!(user_id = %code.user_id, "authorization code redeemed");
        Ok(TokenResponse::new(&access, &refresh))
    }

    /// Mints a new access token; the refresh token itself is returned
    /// unchanged until its own lifetime ends.
    async fn refresh(
        &self,
        client: &ClientApplication,
        request: &TokenRequest,
    ) -> Result<TokenResponse, AuthError> {
        let refresh_id = required(&request.refresh_token, "refresh_token")?;
        let repo = &self.state.repo;

        let Some(refresh) = repo.find_token(TokenKind::RefreshToken, refresh_id).await? else {
            return Err(AuthError::InvalidRefreshToken);
        };
        if refresh.is_expired() {
            repo.delete_token(TokenKind::RefreshToken, &refresh.id).await?;
            return Err(AuthError::InvalidRefreshToken);
        }
        if refresh.client_id != client.id {
            tracing::warn!(token_client = %refresh.client_id, "refresh token presented by another client");
            return Err(AuthError::RefreshWrongClient);
        }
        if repo.find_user(&refresh.user_id).await?.is_none() {
            repo.delete_token(TokenKind::RefreshToken, &refresh.id).await?;
            tracing::info!(user_id = %refresh.user_id, "refresh token owner no longer exists, token discarded");
            return Err(AuthError::InvalidRefreshToken);
        }

        let access = self
            .state
            .mint_token(
                TokenKind::AccessToken,
                &refresh.client_id,
                &refresh.user_id,
                self.state.settings.access_token_lifetime,
            )
            .await?;
        Ok(TokenResponse::new(&access, &refresh))
    }
}
