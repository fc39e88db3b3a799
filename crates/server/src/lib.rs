//! An OAuth2-style authorization server.
//!
//! Accounts sign up with email verification and sign in for short-lived
//! session assertions. Registered client applications obtain access through
//! the authorization code and implicit grants, refresh their access tokens,
//! and call protected routes limited by scope and administrative realms.

pub mod api;
pub mod config;
pub mod entity;
pub mod error;
pub mod notify;
pub mod oauth2;
pub mod store;
pub mod validation;
