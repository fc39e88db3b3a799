//! OAuth2-style authorization server engines.
//!
//! ## Flows
//!
//! - Authorization Code (`response_type=code`), redeemed at `/token`
//! - Implicit (`response_type=token`), access token in the redirect fragment
//! - Refresh Token, without rotation
//!
//! All engines borrow one [`OAuth2State`] and reach each other through its
//! accessors (`state.clients()`, `state.tokens()` and so on).

pub mod authorize;
pub mod claims;
pub mod clients;
pub mod guard;
pub mod password;
pub mod scopes;
pub mod session;
mod state;
pub mod token;

pub use claims::{ClaimsCodec, PrincipalKind};
pub use guard::{ClientContext, ClientCredentials, Grant, ResourceContext, UserContext};
pub use state::OAuth2State;

/// OpenAPI tag for OAuth2 endpoints
pub const OAUTH2_TAG: &str = "OAuth2";
