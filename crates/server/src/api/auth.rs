//! Authentication extractors.
//!
//! Thin axum adapters over [`crate::oauth2::guard::Guard`]: they pull the
//! credentials out of the request, run the matching strategy and hand the
//! typed context to the handler. Route requirements are expressed as marker
//! types implementing [`Requires`].

use std::marker::PhantomData;

use axum::{
    extract::FromRequestParts,
    http::{HeaderMap, header, request::Parts},
};
use axum_extra::extract::cookie::CookieJar;
use url::form_urlencoded;

use crate::error::AuthRejection;
use crate::oauth2::scopes::{
    CLIENTS_CREATE, CLIENTS_DELETE, CLIENTS_READ, USERS_DELETE, USERS_MODIFY, USERS_READ,
    USERS_REALMS,
};
use crate::oauth2::{ClientContext, ClientCredentials, OAuth2State, ResourceContext};
use crate::store::UserAccount;

/// Cookie carrying the user session assertion.
pub const SESSION_COOKIE: &str = "session";

/// Scopes and realms a route requires.
pub trait Requires: Send + Sync + 'static {
    const SCOPES: &'static [&'static str];
    const REALMS: &'static [&'static str];
}

macro_rules! requirement {
    ($(#[$meta:meta])* $name:ident, scopes = [$($scope:expr),*], realms = [$($realm:expr),*]) => {
        $(#[$meta])*
        pub struct $name;

        impl Requires for $name {
            const SCOPES: &'static [&'static str] = &[$($scope),*];
            const REALMS: &'static [&'static str] = &[$($realm),*];
        }
    };
}

requirement!(
    /// Any authenticated caller.
    Anyone, scopes = [], realms = []
);
requirement!(CreateClients, scopes = [CLIENTS_CREATE], realms = [CLIENTS_CREATE]);
requirement!(
    /// Ownership is checked by the registry.
    DeleteClients, scopes = [CLIENTS_DELETE], realms = []
);
requirement!(ReadClients, scopes = [CLIENTS_READ], realms = [CLIENTS_READ]);
requirement!(ModifyUser, scopes = [USERS_MODIFY], realms = []);
requirement!(ReadUsers, scopes = [USERS_READ], realms = [USERS_READ]);
requirement!(ManageRealms, scopes = [USERS_REALMS], realms = [USERS_REALMS]);
requirement!(DeleteUsers, scopes = [USERS_DELETE], realms = [USERS_DELETE]);

fn authorization(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
}

fn query_param(parts: &Parts, name: &str) -> Option<String> {
    form_urlencoded::parse(parts.uri.query()?.as_bytes())
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
}

/// The user session assertion: `Authorization: Bearer`, then the session
/// cookie, then the `assertion` query parameter.
fn session_assertion(parts: &Parts) -> Option<String> {
    authorization(&parts.headers)
        .and_then(crate::oauth2::guard::bearer_token)
        .map(str::to_string)
        .or_else(|| {
            CookieJar::from_headers(&parts.headers)
                .get(SESSION_COOKIE)
                .map(|c| c.value_trimmed().to_string())
        })
        .or_else(|| query_param(parts, "assertion"))
}

/// A signed-in user, authenticated by a user session assertion.
///
/// ```ignore
/// async fn handler(UserBearer { user, .. }: UserBearer) -> impl IntoResponse {
///     user.email
/// }
/// ```
pub struct UserBearer<R: Requires = Anyone> {
    pub user: UserAccount,
    _requires: PhantomData<R>,
}

impl<R: Requires> FromRequestParts<OAuth2State> for UserBearer<R> {
    type Rejection = AuthRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &OAuth2State,
    ) -> Result<Self, Self::Rejection> {
        let assertion = session_assertion(parts);
        let context = state.guard().user(assertion.as_deref(), R::REALMS).await?;
        Ok(Self {
            user: context.user,
            _requires: PhantomData,
        })
    }
}

/// An authenticated `code` client, via `Basic` or `client_assertion`.
pub struct ClientAuth(pub ClientContext);

impl FromRequestParts<OAuth2State> for ClientAuth {
    type Rejection = AuthRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &OAuth2State,
    ) -> Result<Self, Self::Rejection> {
        let assertion = query_param(parts, "client_assertion");
        let credentials =
            ClientCredentials::from_parts(authorization(&parts.headers), assertion.as_deref());
        let context = state.guard().client(credentials).await?;
        Ok(ClientAuth(context))
    }
}

/// Access to a protected resource by a first-party session or an access
/// token carrying every scope in `R::SCOPES`.
pub struct ResourceBearer<R: Requires = Anyone> {
    pub context: ResourceContext,
    _requires: PhantomData<R>,
}

impl<R: Requires> FromRequestParts<OAuth2State> for ResourceBearer<R> {
    type Rejection = AuthRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &OAuth2State,
    ) -> Result<Self, Self::Rejection> {
        let context = state
            .guard()
            .resource(authorization(&parts.headers), R::SCOPES, R::REALMS)
            .await?;
        Ok(Self {
            context,
            _requires: PhantomData,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts(request: Request<()>) -> Parts {
        request.into_parts().0
    }

    #[test]
    fn session_prefers_the_authorization_header() {
        let parts = parts(
            Request::get("/authorize?assertion=from-query")
                .header(header::AUTHORIZATION, "Bearer from-header")
                .header(header::COOKIE, "session=from-cookie")
                .body(())
                .unwrap(),
        );
        assert_eq!(session_assertion(&parts).as_deref(), Some("from-header"));
    }

    #[test]
    fn session_falls_back_to_cookie_then_query() {
        let with_cookie = parts(
            Request::get("/authorize?assertion=from-query")
                .header(header::COOKIE, "theme=dark; session=from-cookie")
                .body(())
                .unwrap(),
        );
        assert_eq!(session_assertion(&with_cookie).as_deref(), Some("from-cookie"));

        let with_query = parts(
            Request::get("/authorize?state=x&assertion=from%2Dquery")
                .body(())
                .unwrap(),
        );
        assert_eq!(session_assertion(&with_query).as_deref(), Some("from-query"));

        let bare = parts(Request::get("/authorize").body(()).unwrap());
        assert_eq!(session_assertion(&bare), None);
    }

    #[test]
    fn quoted_session_cookie_is_unwrapped() {
        let parts = parts(
            Request::get("/authorize")
                .header(header::COOKIE, "session=\"quoted-value\"; theme=dark")
                .body(())
                .unwrap(),
        );
        assert_eq!(session_assertion(&parts).as_deref(), Some("quoted-value"));
    }

    #[test]
    fn requirements_expose_their_lists() {
        assert!(Anyone::SCOPES.is_empty());
        assert_eq!(CreateClients::REALMS, &[CLIENTS_CREATE]);
        assert!(DeleteClients::REALMS.is_empty());
    }
}
