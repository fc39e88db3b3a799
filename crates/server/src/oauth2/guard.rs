//! The three request-authenticating strategies.
//!
//! * user bearer: a user session assertion, re-checked against the stored
//!   password hash, plus required realms;
//! * client: `Basic` id/secret or a signed client assertion, for `code`
//!   clients only;
//! * resource bearer: a first-party user assertion (all scopes) or an
//!   opaque access token limited by its client's scope.
//!
//! Each returns a typed context or an [`AuthRejection`] carrying the
//! `WWW-Authenticate` challenge.

use base64::Engine;

use crate::error::{AuthError, AuthRejection, Challenge};
use crate::oauth2::OAuth2State;
use crate::oauth2::claims::{Claims, PrincipalKind};
use crate::oauth2::password::{verify_decoy, verify_secret};
use crate::oauth2::scopes::FIRST_PARTY_SCOPES;
use crate::store::{ClientApplication, Expiring, ResponseType, TokenKind, UserAccount};

/// The caller proved to be this user.
#[derive(Clone, Debug)]
pub struct UserContext {
    pub user: UserAccount,
}

/// The caller proved to be this client.
#[derive(Clone, Debug)]
pub struct ClientContext {
    pub client: ClientApplication,
}

/// How a resource request was authorized.
#[derive(Clone, Debug)]
pub enum Grant {
    /// The user's own session assertion.
    FirstParty,
    /// An access token issued to a client.
    Delegated(ClientApplication),
}

#[derive(Clone, Debug)]
pub struct ResourceContext {
    pub user: UserAccount,
    pub grant: Grant,
}

impl ResourceContext {
    pub fn has_scope(&self, scope: &str) -> bool {
        match &self.grant {
            Grant::FirstParty => FIRST_PARTY_SCOPES.contains(&scope),
            Grant::Delegated(client) => client.scope.contains(scope),
        }
    }

    pub fn is_first_party(&self) -> bool {
        matches!(self.grant, Grant::FirstParty)
    }
}

/// Credentials a client may present.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ClientCredentials {
    Basic { id: String, secret: String },
    Assertion(String),
}

impl ClientCredentials {
    /// A `Basic` authorization header wins over a `client_assertion`.
    pub fn from_parts(authorization: Option<&str>, assertion: Option<&str>) -> Option<Self> {
        if let Some((id, secret)) = authorization.and_then(parse_basic) {
            return Some(ClientCredentials::Basic { id, secret });
        }
        assertion
            .filter(|a| !a.is_empty())
            .map(|a| ClientCredentials::Assertion(a.to_string()))
    }
}

fn strip_scheme<'h>(header: &'h str, scheme: &str) -> Option<&'h str> {
    let (given, rest) = header.trim().split_once(' ')?;
    given
        .eq_ignore_ascii_case(scheme)
        .then(|| rest.trim())
        .filter(|rest| !rest.is_empty())
}

/// `Basic base64(id:secret)` → `(id, secret)`.
pub fn parse_basic(header: &str) -> Option<(String, String)> {
    let encoded = strip_scheme(header, "Basic")?;
    let decoded = base64::engine::general_purpose::STANDARD
        .decode(encoded)
        .ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (id, secret) = decoded.split_once(':')?;
    Some((id.to_string(), secret.to_string()))
}

/// `Bearer <token>` → `<token>`.
pub fn bearer_token(header: &str) -> Option<&str> {
    strip_scheme(header, "Bearer")
}

pub struct Guard<'a> {
    state: &'a OAuth2State,
}

impl<'a> Guard<'a> {
    pub(crate) fn new(state: &'a OAuth2State) -> Self {
        Self { state }
    }

    /// Resolve a user assertion to its account and check the fingerprint is
    /// still the stored password hash.
    async fn session_user(&self, claims: &Claims) -> Result<UserAccount, AuthError> {
        if claims.kind != PrincipalKind::User {
            return Err(AuthError::InvalidToken(
                "assertion does not identify a user".to_string(),
            ));
        }
        let Some(user) = self.state.repo.find_user(&claims.sub).await? else {
            return Err(AuthError::InvalidToken("account no longer exists".to_string()));
        };
        if user.password_hash != claims.fingerprint {
            return Err(AuthError::InvalidToken(
                "session was revoked by a password change".to_string(),
            ));
        }
        Ok(user)
    }

    #[tracing::instrument(skip_all, fields(?realms))]
    pub async fn user(
        &self,
        assertion: Option<&str>,
        realms: &[&str],
    ) -> Result<UserContext, AuthRejection> {
        let reject = |error| AuthRejection::new(error, Challenge::bearer(&[], realms));
        let Some(assertion) = assertion.filter(|a| !a.is_empty()) else {
            return Err(reject(AuthError::InvalidToken(
                "a user session assertion is required".to_string(),
            )));
        };
        let Some(claims) = self.state.codec.parse(assertion) else {
            return Err(reject(AuthError::InvalidToken(
                "session assertion is invalid or expired".to_string(),
            )));
        };
        let user = self.session_user(&claims).await.map_err(reject)?;
        if !user.has_realms(realms) {
            return Err(reject(AuthError::InsufficientScope(
                "account lacks a required realm".to_string(),
            )));
        }
        Ok(UserContext { user })
    }

    #[tracing::instrument(skip_all)]
    pub async fn client(
        &self,
        credentials: Option<ClientCredentials>,
    ) -> Result<ClientContext, AuthRejection> {
        let reject = |error| AuthRejection::new(error, Challenge::basic());
        let invalid = || reject(AuthError::InvalidClient("client authentication failed".to_string()));
        let registry = self.state.clients();

        let client = match credentials {
            None => {
                return Err(reject(AuthError::InvalidClient(
                    "client authentication is required".to_string(),
                )));
            }
            Some(ClientCredentials::Basic { id, secret }) => {
                let client = match registry.find_by_id(&id).await {
                    Ok(client) => client,
                    Err(AuthError::NotFound(_)) => {
                        verify_decoy(&secret);
                        return Err(invalid());
                    }
                    Err(e) => return Err(reject(e)),
                };
                if !verify_secret(&secret, &client.secret_hash) {
                    return Err(invalid());
                }
                client
            }
            Some(ClientCredentials::Assertion(token)) => {
                let claims = self
                    .state
                    .codec
                    .parse(&token)
                    .filter(|c| c.kind == PrincipalKind::Client)
                    .ok_or_else(invalid)?;
                let client = match registry.find_by_id(&claims.sub).await {
                    Ok(client) => client,
                    Err(AuthError::NotFound(_)) => return Err(invalid()),
                    Err(e) => return Err(reject(e)),
                };
                if client.secret_hash != claims.fingerprint {
                    return Err(invalid());
                }
                client
            }
        };

        if client.response_type != ResponseType::Code {
            return Err(reject(AuthError::InvalidClient(
                "implicit clients cannot authenticate here".to_string(),
            )));
        }
        Ok(ClientContext { client })
    }

    #[tracing::instrument(skip_all, fields(?scopes, ?realms))]
    pub async fn resource(
        &self,
        authorization: Option<&str>,
        scopes: &[&str],
        realms: &[&str],
    ) -> Result<ResourceContext, AuthRejection> {
        let reject = |error| AuthRejection::new(error, Challenge::bearer(scopes, realms));
        let insufficient = || {
            reject(AuthError::InsufficientScope(
                "token lacks a required scope or realm".to_string(),
            ))
        };
        let Some(token) = authorization.and_then(bearer_token) else {
            return Err(reject(AuthError::InvalidToken(
                "a bearer token is required".to_string(),
            )));
        };

        if let Some(claims) = self.state.codec.parse(token) {
            let user = self.session_user(&claims).await.map_err(reject)?;
            let context = ResourceContext {
                user,
                grant: Grant::FirstParty,
            };
            if !scopes.iter().all(|s| context.has_scope(s)) || !context.user.has_realms(realms) {
                return Err(insufficient());
            }
            return Ok(context);
        }

        let repo = &self.state.repo;
        let unknown = || reject(AuthError::InvalidToken("access token is unknown or expired".to_string()));
        let Some(access) = repo
            .find_token(TokenKind::AccessToken, token)
            .await
            .map_err(|e| reject(e.into()))?
        else {
            return Err(unknown());
        };
        if access.is_expired() {
            repo.delete_token(TokenKind::AccessToken, &access.id)
                .await
                .map_err(|e| reject(e.into()))?;
            return Err(unknown());
        }
        let Some(user) = repo
            .find_user(&access.user_id)
            .await
            .map_err(|e| reject(e.into()))?
        else {
            repo.delete_token(TokenKind::AccessToken, &access.id)
                .await
                .map_err(|e| reject(e.into()))?;
            return Err(unknown());
        };
        let client = match self.state.clients().find_by_id(&access.client_id).await {
            Ok(client) => client,
            Err(AuthError::NotFound(_)) => {
                repo.delete_token(TokenKind::AccessToken, &access.id)
                    .await
                    .map_err(|e| reject(e.into()))?;
                return Err(unknown());
            }
            Err(e) => return Err(reject(e)),
        };

        let context = ResourceContext {
            user,
            grant: Grant::Delegated(client),
        };
        if !scopes.iter().all(|s| context.has_scope(s)) || !context.user.has_realms(realms) {
            return Err(insufficient());
        }
        Ok(context)
    }
}
