//! Signed bearer assertions (HS256 JWTs).
//!
//! An assertion names its subject, the kind of principal, and a fingerprint
//! of the principal's credential hash at issuance. Freshness of the
//! fingerprint is checked by the guard, not here.

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};

use crate::error::AuthError;

pub const ISSUER: &str = "oauth2-authority";
pub const AUDIENCE: &str = "oauth2-authority/api";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrincipalKind {
    User,
    Client,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    #[serde(rename = "type")]
    pub kind: PrincipalKind,
    /// Credential hash of the principal when the assertion was issued.
    #[serde(rename = "pkey")]
    pub fingerprint: String,
    pub iss: String,
    pub aud: String,
    pub exp: i64,
}

#[derive(Clone)]
pub struct ClaimsCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl ClaimsCodec {
    /// Fails when no signing key is configured.
    pub fn new(secret: &[u8]) -> Result<Self, AuthError> {
        if secret.is_empty() {
            return Err(AuthError::internal("assertion signing key is empty"));
        }
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_issuer(&[ISSUER]);
        validation.set_audience(&[AUDIENCE]);
        validation.set_required_spec_claims(&["exp", "iss", "aud", "sub"]);
        Ok(Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
        })
    }

    pub fn issue(
        &self,
        subject: &str,
        kind: PrincipalKind,
        fingerprint: &str,
        ttl: i64,
    ) -> Result<String, AuthError> {
        if ttl <= 0 {
            return Err(AuthError::internal("assertion lifetime must be positive"));
        }
        let claims = Claims {
            sub: subject.to_string(),
            kind,
            fingerprint: fingerprint.to_string(),
            iss: ISSUER.to_string(),
            aud: AUDIENCE.to_string(),
            exp: (OffsetDateTime::now_utc() + Duration::seconds(ttl)).unix_timestamp(),
        };
        self.sign(&claims)
    }

    /// Verifies algorithm, signature, issuer, audience and expiry.
    pub fn parse(&self, token: &str) -> Option<Claims> {
        decode::<Claims>(token, &self.decoding, &self.validation)
            .ok()
            .map(|data| data.claims)
    }

    pub(crate) fn sign(&self, claims: &Claims) -> Result<String, AuthError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding)
            .map_err(|err| AuthError::internal(format!("assertion signing failed: {err}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"test-signing-key-with-enough-bytes!!";

    fn codec() -> ClaimsCodec {
        ClaimsCodec::new(SECRET).expect("codec")
    }

    fn claims(exp_offset: i64) -> Claims {
        Claims {
            sub: "user-1".into(),
            kind: PrincipalKind::User,
            fingerprint: "$argon2id$fp".into(),
            iss: ISSUER.into(),
            aud: AUDIENCE.into(),
            exp: OffsetDateTime::now_utc().unix_timestamp() + exp_offset,
        }
    }

    #[test]
    fn issued_assertion_parses_back() {
        let codec = codec();
        let token = codec
            .issue("client-9", PrincipalKind::Client, "$argon2id$secret", 60)
            .expect("issue");
        let parsed = codec.parse(&token).expect("valid assertion");
        assert_eq!(parsed.sub, "client-9");
        assert_eq!(parsed.kind, PrincipalKind::Client);
        assert_eq!(parsed.fingerprint, "$argon2id$secret");
    }

    #[test]
    fn expired_assertion_is_rejected() {
        let codec = codec();
        let token = codec.sign(&claims(-10)).expect("sign");
        assert!(codec.parse(&token).is_none());
    }

    #[test]
    fn foreign_issuer_or_audience_is_rejected() {
        let codec = codec();
        let mut foreign = claims(60);
        foreign.iss = "someone-else".into();
        assert!(codec.parse(&codec.sign(&foreign).unwrap()).is_none());

        let mut foreign = claims(60);
        foreign.aud = "another-api".into();
        assert!(codec.parse(&codec.sign(&foreign).unwrap()).is_none());
    }

    #[test]
    fn other_key_or_algorithm_is_rejected() {
        let token = ClaimsCodec::new(b"a-completely-different-signing-key")
            .unwrap()
            .sign(&claims(60))
            .unwrap();
        assert!(codec().parse(&token).is_none());

        let hs512 = encode(
            &Header::new(Algorithm::HS512),
            &claims(60),
            &EncodingKey::from_secret(SECRET),
        )
        .unwrap();
        assert!(codec().parse(&hs512).is_none());
    }

    #[test]
    fn misconfiguration_and_bad_lifetimes_fail() {
        assert!(ClaimsCodec::new(b"").is_err());
        assert!(codec().issue("u", PrincipalKind::User, "fp", 0).is_err());
        assert!(codec().parse("not-a-jwt").is_none());
    }

    #[test]
    fn wire_format_uses_short_claim_names() {
        let json = serde_json::to_value(claims(60)).unwrap();
        assert_eq!(json["type"], "user");
        assert_eq!(json["pkey"], "$argon2id$fp");
    }
}
