//! The `/authorize` decision.
//!
//! Until the redirect URI is confirmed against the registered one, failures
//! are returned as errors (rendered as JSON). After that point every outcome,
//! failures included, is a redirect back to the client carrying `state`.

use serde::Deserialize;
use url::{Url, form_urlencoded};
use utoipa::IntoParams;

use crate::error::AuthError;
use crate::oauth2::OAuth2State;
use crate::store::{ClientApplication, ResponseType, TokenKind, UserAccount, models::parse_set};

#[derive(Clone, Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
#[serde(default)]
pub struct AuthorizeRequest {
    /// `code` or `token`; must match the client's registration.
    pub response_type: String,
    pub client_id: String,
    /// Must equal the registered redirect URI once percent-decoded.
    pub redirect_uri: String,
    /// Opaque value echoed on every redirect.
    pub state: String,
    /// Optional space-separated subset of the client's scope.
    pub scope: Option<String>,
}

pub struct AuthorizationEngine<'a> {
    state: &'a OAuth2State,
}

fn with_query(base: &str, pairs: &[(&str, &str)]) -> Result<String, AuthError> {
    let mut url = Url::parse(base).map_err(AuthError::internal)?;
    url.query_pairs_mut().extend_pairs(pairs);
    Ok(url.into())
}

fn with_fragment(base: &str, pairs: &[(&str, &str)]) -> Result<String, AuthError> {
    let mut url = Url::parse(base).map_err(AuthError::internal)?;
    let fragment = form_urlencoded::Serializer::new(String::new())
        .extend_pairs(pairs)
        .finish();
    url.set_fragment(Some(&fragment));
    Ok(url.into())
}

/// `R?error=...&state=...`
pub fn error_redirect(redirect_uri: &str, error: &str, state: &str) -> Result<String, AuthError> {
    with_query(redirect_uri, &[("error", error), ("state", state)])
}

impl<'a> AuthorizationEngine<'a> {
    pub(crate) fn new(state: &'a OAuth2State) -> Self {
        Self { state }
    }

    /// Returns the `Location` to send the user agent to.
    #[tracing::instrument(
        skip_all,
        fields(user_id = %user.id, client_id = %request.client_id, response_type = %request.response_type)
    )]
    pub async fn authorize(
        &self,
        user: &UserAccount,
        request: &AuthorizeRequest,
    ) -> Result<String, AuthError> {
        let response_type: ResponseType = request
            .response_type
            .parse()
            .map_err(|_| AuthError::InvalidResponseType)?;
        if request.state.is_empty() {
            return Err(AuthError::InvalidRequest("state is required".to_string()));
        }
        let client = self.state.clients().find_by_id(&request.client_id).await?;

        let redirect_uri = urlencoding::decode(&request.redirect_uri).map_err(|_| {
            AuthError::InvalidRequest("redirect_uri is not valid percent-encoded UTF-8".to_string())
        })?;
        if redirect_uri != client.redirect_uri {
            tracing::warn!("redirect uri does not match registration");
            return Err(AuthError::RedirectMismatch);
        }

        // The redirect target is trusted from here on.
        if client.response_type != response_type {
            return error_redirect(&client.redirect_uri, "invalid_request", &request.state);
        }
        if let Some(scope) = &request.scope
            && !parse_set(scope).is_subset(&client.scope)
        {
            return error_redirect(&client.redirect_uri, "invalid_scope", &request.state);
        }

        match self.grant(user, &client, response_type, &request.state).await {
            Ok(location) => Ok(location),
            Err(e) => {
                tracing::error!(error = %e, "could not complete authorization");
                error_redirect(&client.redirect_uri, "server_error", &request.state)
            }
        }
    }

    async fn grant(
        &self,
        user: &UserAccount,
        client: &ClientApplication,
        response_type: ResponseType,
        state: &str,
    ) -> Result<String, AuthError> {
        let settings = &self.state.settings;
        match response_type {
            ResponseType::Token => {
                let token = self
                    .state
                    .mint_token(
                        TokenKind::AccessToken,
                        &client.id,
                        &user.id,
                        settings.access_token_lifetime,
                    )
                    .await?;
                let expires_in = token.ttl.to_string();
                with_fragment(
                    &client.redirect_uri,
                    &[
                        ("access_token", token.id.as_str()),
                        ("token_type", "bearer"),
                        ("expires_in", expires_in.as_str()),
                        ("state", state),
                    ],
                )
            }
            ResponseType::Code => {
                let code = self
                    .state
                    .mint_token(
                        TokenKind::AuthorizationCode,
                        &client.id,
                        &user.id,
                        settings.authorization_code_lifetime,
                    )
                    .await?;
                with_query(
                    &client.redirect_uri,
                    &[("code", code.id.as_str()), ("state", state)],
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_redirect_echoes_state_verbatim() {
        let location =
            error_redirect("https://app.example.org/cb", "invalid_request", "a b&c").unwrap();
        assert_eq!(
            location,
            "https://app.example.org/cb?error=invalid_request&state=a+b%26c"
        );
    }

    #[test]
    fn existing_query_is_preserved() {
        let location = with_query("https://app.example.org/cb?tenant=7", &[("code", "x")]).unwrap();
        assert_eq!(location, "https://app.example.org/cb?tenant=7&code=x");
    }

    #[test]
    fn implicit_grant_uses_fragment() {
        let location = with_fragment(
            "https://app.example.org/cb",
            &[("access_token", "tok"), ("state", "s")],
        )
        .unwrap();
        assert_eq!(location, "https://app.example.org/cb#access_token=tok&state=s");
    }
}
