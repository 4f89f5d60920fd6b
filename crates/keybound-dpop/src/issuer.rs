//! Proof construction and server-issued access tokens.
//!
//! Two symmetric halves of the possession scheme live here: `issue_proof`
//! builds the client-side proof JWT over a holder key pair, and
//! [`TokenIssuer`] mints the server-side access token whose confirmation
//! claim commits to that key's thumbprint.

use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use tracing::debug;
use uuid::Uuid;

use crate::binding::{access_token_hash, canonical_htu};
use crate::error::DpopError;
use crate::keys::ProofKeyPair;
use crate::types::{AccessTokenClaims, ConfirmationClaim, ProofClaims};
use crate::{CLOCK_SKEW_SECONDS, DEFAULT_TOKEN_VALIDITY_SECONDS, DPOP_JWT_TYPE, Result};

/// Build a signed proof JWT for one HTTP request.
///
/// The header carries the holder's public JWK and `typ: dpop+jwt`; the
/// claims bind the proof to `method` + the canonical form of `uri`, with
/// a fresh random `jti` and, when `access_token` is given, its hash.
///
/// # Errors
/// Returns `MalformedProof` for an unparseable `uri` and
/// `CryptographicFailure` if signing fails.
pub fn issue_proof(
    key_pair: &ProofKeyPair,
    method: &str,
    uri: &str,
    access_token: Option<&str>,
) -> Result<String> {
    let jti = Uuid::new_v4().to_string();
    let claims = ProofClaims {
        htm: method.to_uppercase(),
        htu: canonical_htu(uri)?,
        iat: Utc::now().timestamp(),
        jti: Some(jti.clone()),
        ath: access_token.map(access_token_hash),
    };

    let mut header = Header::new(Algorithm::ES256);
    header.typ = Some(DPOP_JWT_TYPE.to_string());
    header.jwk = Some(key_pair.public_jwk());

    let jwt = encode(&header, &claims, &key_pair.encoding_key()?).map_err(|e| {
        DpopError::CryptographicFailure {
            reason: format!("proof signing failed: {e}"),
        }
    })?;

    debug!(key_id = %key_pair.id, %method, %uri, %jti, "issued proof token");
    Ok(jwt)
}

/// Issues and verifies server-signed access tokens.
///
/// Tokens are HS256-signed with a server-held symmetric key. A key-bound
/// token carries `cnf: { jkt }` (the thumbprint of the holder's public
/// key), which the request layer cross-checks against the key that signed
/// the accompanying proof.
#[derive(Debug)]
pub struct TokenIssuer {
    secret: Vec<u8>,
    issuer: String,
    audience: String,
    validity_seconds: i64,
}

impl TokenIssuer {
    /// Issuer with the default 1-hour validity window.
    #[must_use]
    pub fn new(secret: Vec<u8>, issuer: impl Into<String>, audience: impl Into<String>) -> Self {
        Self {
            secret,
            issuer: issuer.into(),
            audience: audience.into(),
            validity_seconds: DEFAULT_TOKEN_VALIDITY_SECONDS,
        }
    }

    /// Override the validity window.
    #[must_use]
    pub fn with_validity(mut self, validity_seconds: i64) -> Self {
        self.validity_seconds = validity_seconds;
        self
    }

    /// Mint an access token bound to the holder key with the given
    /// RFC 7638 thumbprint.
    ///
    /// # Errors
    /// Returns `CryptographicFailure` if signing fails.
    pub fn issue_bound_token(&self, subject: &str, holder_thumbprint: &str) -> Result<String> {
        self.issue(
            subject,
            Some(ConfirmationClaim {
                jkt: holder_thumbprint.to_string(),
            }),
        )
    }

    /// Mint a plain bearer token with no key binding.
    ///
    /// # Errors
    /// Returns `CryptographicFailure` if signing fails.
    pub fn issue_bearer_token(&self, subject: &str) -> Result<String> {
        self.issue(subject, None)
    }

    fn issue(&self, subject: &str, cnf: Option<ConfirmationClaim>) -> Result<String> {
        let now = Utc::now().timestamp();
        let bound = cnf.is_some();
        let claims = AccessTokenClaims {
            sub: subject.to_string(),
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            iat: now,
            exp: now + self.validity_seconds,
            cnf,
        };

        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(&self.secret),
        )
        .map_err(|e| DpopError::CryptographicFailure {
            reason: format!("access token signing failed: {e}"),
        })?;

        debug!(%subject, bound, "issued access token");
        Ok(token)
    }

    /// Verify a token this issuer minted: signature, issuer, audience, and
    /// expiry (with clock-skew leeway).
    ///
    /// # Errors
    /// Returns `TokenRejected` for any verification failure.
    pub fn verify_token(&self, token: &str) -> Result<AccessTokenClaims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.issuer]);
        validation.set_audience(&[&self.audience]);
        validation.leeway = CLOCK_SKEW_SECONDS as u64;

        let data = decode::<AccessTokenClaims>(
            token,
            &DecodingKey::from_secret(&self.secret),
            &validation,
        )
        .map_err(|e| DpopError::TokenRejected {
            reason: format!("access token verification failed: {e}"),
        })?;

        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn issuer() -> TokenIssuer {
        TokenIssuer::new(
            b"test-secret-at-least-32-bytes-long!".to_vec(),
            "https://issuer.test",
            "keybound-api",
        )
    }

    #[test]
    fn bound_token_round_trips_with_cnf() {
        let token = issuer().issue_bound_token("u@x.com", "thumb-1").unwrap();
        let claims = issuer().verify_token(&token).unwrap();
        assert_eq!(claims.sub, "u@x.com");
        assert_eq!(claims.bound_thumbprint(), Some("thumb-1"));
        assert_eq!(claims.exp - claims.iat, DEFAULT_TOKEN_VALIDITY_SECONDS);
    }

    #[test]
    fn bearer_token_has_no_cnf() {
        let token = issuer().issue_bearer_token("u@x.com").unwrap();
        let claims = issuer().verify_token(&token).unwrap();
        assert_eq!(claims.bound_thumbprint(), None);
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = issuer().issue_bearer_token("u@x.com").unwrap();
        let other = TokenIssuer::new(
            b"another-secret-entirely-different!!".to_vec(),
            "https://issuer.test",
            "keybound-api",
        );
        let err = other.verify_token(&token).unwrap_err();
        assert!(matches!(err, DpopError::TokenRejected { .. }));
    }

    #[test]
    fn wrong_audience_is_rejected() {
        let token = issuer().issue_bearer_token("u@x.com").unwrap();
        let other = TokenIssuer::new(
            b"test-secret-at-least-32-bytes-long!".to_vec(),
            "https://issuer.test",
            "someone-else",
        );
        assert!(other.verify_token(&token).is_err());
    }

    #[test]
    fn expired_token_is_rejected_beyond_leeway() {
        let short = issuer().with_validity(-(CLOCK_SKEW_SECONDS + 60));
        let token = short.issue_bearer_token("u@x.com").unwrap();
        assert!(issuer().verify_token(&token).is_err());
    }

    #[test]
    fn proof_claims_carry_canonical_htu_and_fresh_jti() {
        let key_pair = ProofKeyPair::generate().unwrap();
        let a = issue_proof(&key_pair, "post", "https://h.test/p?x=1", None).unwrap();
        let b = issue_proof(&key_pair, "post", "https://h.test/p?x=1", None).unwrap();
        assert_ne!(a, b, "jti must differ between proofs");
    }
}
