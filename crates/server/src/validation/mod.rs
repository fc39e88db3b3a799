//! Input policies: account fields and client registration fields.

pub mod account;
pub mod client;
