//! Scope and realm names.
//!
//! Scopes bound what a client's tokens may do; realms are administrative
//! permissions held by user accounts. The administrative names are used
//! as both.

pub const SCOPE_PUBLIC: &str = "public";
pub const SCOPE_EMAIL: &str = "email";

pub const USERS_READ: &str = "users.read";
pub const USERS_MODIFY: &str = "users.modify";
pub const USERS_DELETE: &str = "users.delete";
pub const USERS_REALMS: &str = "users.realms";
pub const CLIENTS_READ: &str = "clients.read";
pub const CLIENTS_CREATE: &str = "clients.create";
pub const CLIENTS_DELETE: &str = "clients.delete";

/// Every realm an account can hold.
pub const ADMIN_REALMS: [&str; 7] = [
    USERS_READ,
    USERS_MODIFY,
    USERS_DELETE,
    USERS_REALMS,
    CLIENTS_READ,
    CLIENTS_CREATE,
    CLIENTS_DELETE,
];

/// Scopes implicitly held by a first-party session assertion.
pub const FIRST_PARTY_SCOPES: [&str; 9] = [
    SCOPE_PUBLIC,
    SCOPE_EMAIL,
    USERS_READ,
    USERS_MODIFY,
    USERS_DELETE,
    USERS_REALMS,
    CLIENTS_READ,
    CLIENTS_CREATE,
    CLIENTS_DELETE,
];

pub fn is_known_realm(realm: &str) -> bool {
    ADMIN_REALMS.contains(&realm)
}
