//! Credential hashing for user passwords and client secrets.
//!
//! Argon2id with a random salt; hashes are stored in PHC string format.

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use base64::Engine;
use once_cell::sync::Lazy;

use crate::error::AuthError;

/// Hash of a throwaway secret, verified against when the looked-up account
/// does not exist so both failure paths cost one Argon2 run.
static DECOY_HASH: Lazy<Option<String>> =
    Lazy::new(|| hash_secret("decoy-secret-never-issued").ok());

/// Hash a password or client secret.
pub fn hash_secret(secret: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(secret.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| AuthError::internal(format!("credential hashing failed: {err}")))
}

/// Verify `secret` against a stored hash. Malformed hashes never verify.
pub fn verify_secret(secret: &str, hash: &str) -> bool {
    let Ok(parsed_hash) = PasswordHash::new(hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(secret.as_bytes(), &parsed_hash)
        .is_ok()
}

/// Burn the same work as [`verify_secret`] without anything to compare.
pub fn verify_decoy(secret: &str) {
    if let Some(hash) = DECOY_HASH.as_deref() {
        let _ = verify_secret(secret, hash);
    }
}

/// 32 random bytes, URL-safe base64 without padding. Used for client
/// secrets and every opaque identifier handed to callers.
pub fn generate_secret() -> Result<String, AuthError> {
    let mut bytes = [0u8; 32];
    getrandom::fill(&mut bytes)
        .map_err(|err| AuthError::internal(format!("random source failed: {err}")))?;
    Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify_secret() {
        let hash = hash_secret("correct horse 42!").expect("hash");
        assert!(hash.starts_with("$argon2"));
        assert!(verify_secret("correct horse 42!", &hash));
        assert!(!verify_secret("correct horse 43!", &hash));
    }

    #[test]
    fn test_same_secret_gets_fresh_salt() {
        let first = hash_secret("same-secret").expect("hash");
        let second = hash_secret("same-secret").expect("hash");
        assert_ne!(first, second);
        assert!(verify_secret("same-secret", &first));
        assert!(verify_secret("same-secret", &second));
    }

    #[test]
    fn test_malformed_hash_never_verifies() {
        assert!(!verify_secret("secret", "plaintext"));
        assert!(!verify_secret("secret", ""));
        assert!(!verify_secret("secret", "$argon2id$broken"));
    }

    #[test]
    fn test_generated_secrets_are_url_safe_and_unique() {
        let first = generate_secret().expect("random");
        let second = generate_secret().expect("random");
        assert_ne!(first, second);
        assert_eq!(first.len(), 43);
        assert!(!first.contains(['+', '/', '=']));
    }
}
