//! Domain records persisted through a [`Repository`](super::Repository).

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};
use utoipa::ToSchema;

/// Splits a space-separated list into a set, dropping empty entries.
pub fn parse_set(value: &str) -> BTreeSet<String> {
    value.split_whitespace().map(str::to_string).collect()
}

/// Inverse of [`parse_set`].
pub fn join_set(set: &BTreeSet<String>) -> String {
    set.iter().map(String::as_str).collect::<Vec<_>>().join(" ")
}

/// Records that live for `ttl` seconds after `created_at`.
pub trait Expiring {
    fn created_at(&self) -> OffsetDateTime;
    fn ttl(&self) -> i64;

    fn expires_at(&self) -> OffsetDateTime {
        self.created_at() + Duration::seconds(self.ttl())
    }

    /// `true` once `now` is strictly past `created_at + ttl`.
    fn is_expired_at(&self, now: OffsetDateTime) -> bool {
        now > self.expires_at()
    }

    fn is_expired(&self) -> bool {
        self.is_expired_at(OffsetDateTime::now_utc())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UserAccount {
    pub id: String,
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub realms: BTreeSet<String>,
    pub created_at: OffsetDateTime,
}

impl UserAccount {
    /// `true` when every realm in `required` is held.
    pub fn has_realms(&self, required: &[&str]) -> bool {
        required.iter().all(|realm| self.realms.contains(*realm))
    }
}

/// A sign-up waiting for its email address to be confirmed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingUserAccount {
    pub id: String,
    pub email: String,
    pub user: UserAccount,
    pub created_at: OffsetDateTime,
    pub ttl: i64,
}

impl Expiring for PendingUserAccount {
    fn created_at(&self) -> OffsetDateTime {
        self.created_at
    }

    fn ttl(&self) -> i64 {
        self.ttl
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ResponseType {
    Code,
    Token,
}

impl ResponseType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseType::Code => "code",
            ResponseType::Token => "token",
        }
    }
}

impl fmt::Display for ResponseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResponseType {
    type Err = ();

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "code" => Ok(ResponseType::Code),
            "token" => Ok(ResponseType::Token),
            _ => Err(()),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientApplication {
    pub id: String,
    pub name: String,
    pub description: String,
    pub response_type: ResponseType,
    pub redirect_uri: String,
    pub scope: BTreeSet<String>,
    /// Id of the owning [`UserAccount`].
    pub owner: String,
    pub secret_hash: String,
    pub created_at: OffsetDateTime,
    pub ttl: i64,
}

impl Expiring for ClientApplication {
    fn created_at(&self) -> OffsetDateTime {
        self.created_at
    }

    fn ttl(&self) -> i64 {
        self.ttl
    }
}

/// The three token namespaces. They share one record shape but never
/// one collection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TokenKind {
    AuthorizationCode,
    AccessToken,
    RefreshToken,
}

impl TokenKind {
    pub const ALL: [TokenKind; 3] = [
        TokenKind::AuthorizationCode,
        TokenKind::AccessToken,
        TokenKind::RefreshToken,
    ];
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TokenKind::AuthorizationCode => "authorization code",
            TokenKind::AccessToken => "access token",
            TokenKind::RefreshToken => "refresh token",
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Token {
    pub id: String,
    pub client_id: String,
    pub user_id: String,
    pub created_at: OffsetDateTime,
    pub ttl: i64,
}

impl Expiring for Token {
    fn created_at(&self) -> OffsetDateTime {
        self.created_at
    }

    fn ttl(&self) -> i64 {
        self.ttl
    }
}
