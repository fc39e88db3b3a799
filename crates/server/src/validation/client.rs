//! Client registration policies.

use std::collections::BTreeSet;

use url::{Host, Url};

use crate::oauth2::scopes::{SCOPE_EMAIL, SCOPE_PUBLIC};
use crate::store::ResponseType;

pub const MAX_CLIENT_NAME_LEN: usize = 12;
pub const MAX_CLIENT_DESCRIPTION_LEN: usize = 150;

/// Absolute `https` URI, or `http` to a loopback host; never a fragment.
pub fn is_valid_redirect_uri(uri: &str) -> bool {
    let Ok(url) = Url::parse(uri) else {
        return false;
    };
    if url.fragment().is_some() || !url.username().is_empty() || url.password().is_some() {
        return false;
    }
    match (url.scheme(), url.host()) {
        ("https", Some(_)) => true,
        ("http", Some(Host::Domain(domain))) => domain == "localhost",
        ("http", Some(Host::Ipv4(addr))) => addr.is_loopback(),
        ("http", Some(Host::Ipv6(addr))) => addr.is_loopback(),
        _ => false,
    }
}

/// Implicit (`token`) clients may only hold `public`; `code` clients may
/// hold `public` and/or `email`. The empty set is never valid.
pub fn is_valid_scope(response_type: ResponseType, scope: &BTreeSet<String>) -> bool {
    if scope.is_empty() {
        return false;
    }
    let allowed: &[&str] = match response_type {
        ResponseType::Token => &[SCOPE_PUBLIC],
        ResponseType::Code => &[SCOPE_PUBLIC, SCOPE_EMAIL],
    };
    scope.iter().all(|s| allowed.contains(&s.as_str()))
}

pub fn is_valid_client_name(name: &str) -> bool {
    let length = name.chars().count();
    length > 0 && length <= MAX_CLIENT_NAME_LEN && !name.trim().is_empty()
}

pub fn is_valid_client_description(description: &str) -> bool {
    description.chars().count() <= MAX_CLIENT_DESCRIPTION_LEN
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scope(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_redirect_uris() {
        assert!(is_valid_redirect_uri("https://app.example.org/callback"));
        assert!(is_valid_redirect_uri("https://app.example.org/cb?tenant=7"));
        assert!(is_valid_redirect_uri("http://localhost:3000/callback"));
        assert!(is_valid_redirect_uri("http://127.0.0.1:8080/cb"));
        assert!(!is_valid_redirect_uri("http://app.example.org/callback"));
        assert!(!is_valid_redirect_uri("https://app.example.org/cb#frag"));
        assert!(!is_valid_redirect_uri("https://user:pw@app.example.org/cb"));
        assert!(!is_valid_redirect_uri("javascript:alert(1)"));
        assert!(!is_valid_redirect_uri("/relative/callback"));
    }

    #[test]
    fn test_token_clients_only_get_public() {
        assert!(is_valid_scope(ResponseType::Token, &scope(&["public"])));
        assert!(!is_valid_scope(ResponseType::Token, &scope(&["email"])));
        assert!(!is_valid_scope(ResponseType::Token, &scope(&["public", "email"])));
    }

    #[test]
    fn test_code_clients_get_public_and_email() {
        assert!(is_valid_scope(ResponseType::Code, &scope(&["public"])));
        assert!(is_valid_scope(ResponseType::Code, &scope(&["email"])));
        assert!(is_valid_scope(ResponseType::Code, &scope(&["public", "email"])));
        assert!(!is_valid_scope(ResponseType::Code, &scope(&["users.read"])));
        assert!(!is_valid_scope(ResponseType::Code, &scope(&[])));
    }

    #[test]
    fn test_name_and_description_limits() {
        assert!(is_valid_client_name("dashboard"));
        assert!(!is_valid_client_name(""));
        assert!(!is_valid_client_name("a-name-too-long"));
        assert!(is_valid_client_description(""));
        assert!(!is_valid_client_description(&"x".repeat(151)));
    }
}
