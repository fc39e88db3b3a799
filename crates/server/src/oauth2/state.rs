//! Shared state of the authorization server.

use std::sync::Arc;

use time::OffsetDateTime;

use crate::config::{AppConfig, OAuth2Config};
use crate::error::AuthError;
use crate::notify::Notifier;
use crate::oauth2::authorize::AuthorizationEngine;
use crate::oauth2::claims::ClaimsCodec;
use crate::oauth2::clients::ClientRegistry;
use crate::oauth2::guard::Guard;
use crate::oauth2::password::generate_secret;
use crate::oauth2::session::SessionIssuer;
use crate::oauth2::token::TokenExchange;
use crate::store::{Repository, Token, TokenKind};

/// Everything the engines need, cheap to clone into every request.
///
/// Holds no request-spanning mutable state; all of that lives in the
/// repository.
#[derive(Clone)]
pub struct OAuth2State {
    pub repo: Arc<dyn Repository>,
    pub notifier: Arc<dyn Notifier>,
    pub codec: ClaimsCodec,
    pub settings: Arc<OAuth2Config>,
}

impl OAuth2State {
    pub fn new(
        repo: Arc<dyn Repository>,
        notifier: Arc<dyn Notifier>,
        codec: ClaimsCodec,
        settings: OAuth2Config,
    ) -> Self {
        Self {
            repo,
            notifier,
            codec,
            settings: Arc::new(settings),
        }
    }

    pub fn from_config(
        config: &AppConfig,
        repo: Arc<dyn Repository>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self, AuthError> {
        let codec = ClaimsCodec::new(config.jwt_secret.as_bytes())?;
        Ok(Self::new(repo, notifier, codec, config.oauth2.clone()))
    }

    pub fn clients(&self) -> ClientRegistry<'_> {
        ClientRegistry::new(self)
    }

    pub fn sessions(&self) -> SessionIssuer<'_> {
        SessionIssuer::new(self)
    }

    pub fn authorization(&self) -> AuthorizationEngine<'_> {
        AuthorizationEngine::new(self)
    }

    pub fn tokens(&self) -> TokenExchange<'_> {
        TokenExchange::new(self)
    }

    pub fn guard(&self) -> Guard<'_> {
        Guard::new(self)
    }

    /// Persist a fresh token of `kind` bound to `(client_id, user_id)`.
    pub async fn mint_token(
        &self,
        kind: TokenKind,
        client_id: &str,
        user_id: &str,
        ttl: i64,
    ) -> Result<Token, AuthError> {
        let token = Token {
            id: generate_secret()?,
            client_id: client_id.to_string(),
            user_id: user_id.to_string(),
            created_at: OffsetDateTime::now_utc(),
            ttl,
        };
        self.repo.create_token(kind, token.clone()).await?;
        tracing::debug!(%kind, client_id, user_id, "token minted");
        Ok(token)
    }
}
