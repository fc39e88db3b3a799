//! OpenAPI/Utoipa configuration.

use crate::api::health::MISC_TAG;
use crate::oauth2::OAUTH2_TAG;
use crate::oauth2::scopes::{
    CLIENTS_CREATE, CLIENTS_DELETE, CLIENTS_READ, SCOPE_EMAIL, SCOPE_PUBLIC, USERS_DELETE,
    USERS_MODIFY, USERS_READ, USERS_REALMS,
};
use utoipa::{
    Modify, OpenApi,
    openapi::security::{
        AuthorizationCode, Flow, HttpAuthScheme, HttpBuilder, Implicit, OAuth2, Scopes,
        SecurityScheme,
    },
};

/// Security schemes for the generated document.
pub struct SecurityAddon;

fn scopes() -> Scopes {
    Scopes::from_iter([
        (SCOPE_PUBLIC, "Public profile"),
        (SCOPE_EMAIL, "Email address"),
        (USERS_READ, "List accounts"),
        (USERS_MODIFY, "Edit the account's name"),
        (USERS_DELETE, "Delete accounts"),
        (USERS_REALMS, "Assign realms"),
        (CLIENTS_READ, "List clients"),
        (CLIENTS_CREATE, "Register clients"),
        (CLIENTS_DELETE, "Delete clients"),
    ])
}

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            // Session assertion or access token
            let bearer = HttpBuilder::new()
                .scheme(HttpAuthScheme::Bearer)
                .description(Some(
                    "A session assertion from `/signin`, or an access token from `/token`.",
                ))
                .build();
            components.add_security_scheme("Authorization", SecurityScheme::Http(bearer));

            let basic = HttpBuilder::new()
                .scheme(HttpAuthScheme::Basic)
                .description(Some("Client id and secret."))
                .build();
            components.add_security_scheme("Basic", SecurityScheme::Http(basic));

            let oauth2 = OAuth2::new([
                Flow::AuthorizationCode(AuthorizationCode::new("/authorize", "/token", scopes())),
                Flow::Implicit(Implicit::new("/authorize", scopes())),
            ]);
            components.add_security_scheme("OAuth2", SecurityScheme::OAuth2(oauth2));
        }
    }
}

/// OpenAPI documentation configuration.
#[derive(OpenApi)]
#[openapi(
    modifiers(&SecurityAddon),
    info(
        title = "OAuth2 Authority API",
        version = "1.0.0",
        description = "Accounts, client registration and OAuth2 authorization code, implicit \
                       and refresh token grants."
    ),
    tags(
        (name = MISC_TAG, description = "Miscellaneous endpoints"),
        (name = OAUTH2_TAG, description = "Accounts, clients and OAuth2 grants")
    )
)]
pub struct ApiDoc;
