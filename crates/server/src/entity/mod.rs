//! SeaORM entities backing [`SqlRepository`](crate::store::SqlRepository).

pub mod access_tokens;
pub mod authorization_codes;
pub mod clients;
pub mod pending_users;
pub mod refresh_tokens;
pub mod users;
