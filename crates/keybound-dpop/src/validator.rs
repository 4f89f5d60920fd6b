//! Proof validation.
//!
//! Checks run in a fixed order and short-circuit on the first failure,
//! each with a distinct reportable reason: header shape (typ, algorithm
//! allow-list, embedded key) before any cryptographic work, then
//! signature and lifetime, then request binding, token hash, and finally
//! the replay check. The replay record is a side effect of success, so
//! validating the identical proof twice fails.

use std::sync::Arc;

use chrono::Utc;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, Validation, decode, decode_header};
use tracing::debug;

use crate::binding::{access_token_hash, canonical_htu, constant_time_eq};
use crate::error::DpopError;
use crate::keys::verification_key_from_jwk;
use crate::replay::ReplayGuard;
use crate::types::ProofClaims;
use crate::{CLOCK_SKEW_SECONDS, DEFAULT_PROOF_LIFETIME_SECONDS, DPOP_JWT_TYPE, Result};

/// Algorithms acceptable for proof signatures.
///
/// The proof key is caller-supplied, so this list must only ever contain
/// asymmetric signature algorithms, never `none` and never HMAC.
const ALLOWED_ALGORITHMS: &[Algorithm] = &[Algorithm::ES256];

/// Outcome of a successful validation.
#[derive(Debug, Clone)]
pub struct ValidatedProof {
    /// RFC 7638 thumbprint of the key that signed the proof; compare this
    /// against the access token's `cnf.jkt` to confirm possession.
    pub thumbprint: String,
    /// The verified proof claims.
    pub claims: ProofClaims,
}

/// Validates proof JWTs against a request line and the replay guard.
///
/// Holds no locks during cryptographic work; the only shared mutation is
/// the replay guard's atomic check-and-record at the end of a successful
/// pass.
#[derive(Debug)]
pub struct ProofValidator {
    replay: Arc<dyn ReplayGuard>,
    max_skew_seconds: i64,
    proof_lifetime_seconds: i64,
}

impl ProofValidator {
    /// Validator with the default 30s skew tolerance and 60s lifetime.
    #[must_use]
    pub fn new(replay: Arc<dyn ReplayGuard>) -> Self {
        Self {
            replay,
            max_skew_seconds: CLOCK_SKEW_SECONDS,
            proof_lifetime_seconds: DEFAULT_PROOF_LIFETIME_SECONDS,
        }
    }

    /// Override skew tolerance and proof lifetime (both in seconds).
    #[must_use]
    pub fn with_limits(mut self, max_skew_seconds: i64, proof_lifetime_seconds: i64) -> Self {
        self.max_skew_seconds = max_skew_seconds;
        self.proof_lifetime_seconds = proof_lifetime_seconds;
        self
    }

    /// Validate a proof JWT against the actual request line.
    ///
    /// On success the proof's nonce has been recorded: a second validation
    /// of the same proof fails with `ReplayDetected`.
    ///
    /// # Errors
    /// `MalformedProof` for shape problems (400-class); the remaining
    /// variants for verification failures (401-class); `StoreUnavailable`
    /// if the replay guard's backing store fails.
    pub async fn validate(
        &self,
        proof_jwt: &str,
        method: &str,
        uri: &str,
        access_token: Option<&str>,
    ) -> Result<ValidatedProof> {
        // 1. Header shape: typ, algorithm allow-list. decode_header only
        //    parses; no signature work has happened yet.
        let header = decode_header(proof_jwt).map_err(|e| DpopError::MalformedProof {
            reason: format!("undecodable JWT header: {e}"),
        })?;

        if header.typ.as_deref() != Some(DPOP_JWT_TYPE) {
            return Err(DpopError::MalformedProof {
                reason: format!(
                    "typ is {:?}, expected \"{DPOP_JWT_TYPE}\"",
                    header.typ.as_deref().unwrap_or("<absent>")
                ),
            });
        }

        if !ALLOWED_ALGORITHMS.contains(&header.alg) {
            return Err(DpopError::MalformedProof {
                reason: format!("algorithm {:?} not in allow-list", header.alg),
            });
        }

        // 2. Embedded public key must be present and well-formed.
        let jwk = header.jwk.as_ref().ok_or_else(|| DpopError::MalformedProof {
            reason: "header has no embedded JWK".to_string(),
        })?;
        let (decoding_key, thumbprint) = verification_key_from_jwk(jwk)?;

        // 3. Signature over the exact wire bytes, then lifetime.
        let mut validation = Validation::new(header.alg);
        validation.validate_exp = false; // proofs carry iat, not exp
        validation.required_spec_claims.clear();

        let claims = decode::<ProofClaims>(proof_jwt, &decoding_key, &validation)
            .map_err(|e| match e.kind() {
                ErrorKind::Json(_) | ErrorKind::Base64(_) | ErrorKind::Utf8(_) => {
                    DpopError::MalformedProof {
                        reason: format!("claims do not deserialize: {e}"),
                    }
                }
                _ => DpopError::SignatureInvalid {
                    reason: e.to_string(),
                },
            })?
            .claims;

        let now = Utc::now().timestamp();
        if claims.iat > now + self.max_skew_seconds {
            return Err(DpopError::ClockSkewExceeded {
                skew_seconds: claims.iat - now,
                max_skew_seconds: self.max_skew_seconds,
            });
        }
        let age = now - claims.iat;
        if age > self.proof_lifetime_seconds + self.max_skew_seconds {
            return Err(DpopError::ProofExpired {
                age_seconds: age,
                max_age_seconds: self.proof_lifetime_seconds,
            });
        }

        // 4. Request binding. htm is case-sensitive; htu compares against
        //    the canonical form of the actual request URI.
        if claims.htm != method {
            return Err(DpopError::HttpBindingMismatch {
                reason: format!("htm is {:?}, request method is {method:?}", claims.htm),
            });
        }

        let expected_htu = canonical_htu(uri).map_err(|e| DpopError::Internal {
            reason: format!("request URI not canonicalizable: {e}"),
        })?;
        if claims.htu != expected_htu {
            return Err(DpopError::HttpBindingMismatch {
                reason: format!("htu is {:?}, request is {expected_htu:?}", claims.htu),
            });
        }

        // 5. Access token hash. A supplied token requires a matching ath;
        //    an ath without a token means the proof was built for a
        //    different exchange.
        match (access_token, &claims.ath) {
            (Some(token), Some(ath)) => {
                if !constant_time_eq(ath, &access_token_hash(token)) {
                    return Err(DpopError::AccessTokenHashMismatch {
                        reason: "ath does not commit to the presented token".to_string(),
                    });
                }
            }
            (Some(_), None) => {
                return Err(DpopError::AccessTokenHashMismatch {
                    reason: "token presented but proof carries no ath".to_string(),
                });
            }
            (None, Some(_)) => {
                return Err(DpopError::AccessTokenHashMismatch {
                    reason: "proof carries ath but no token was presented".to_string(),
                });
            }
            (None, None) => {}
        }

        // 6. Replay: check and record are one atomic step, so concurrent
        //    presentations of one nonce cannot both pass.
        if let Some(jti) = &claims.jti {
            let first = self.replay.check_and_record(jti, claims.iat).await?;
            if !first {
                return Err(DpopError::ReplayDetected { nonce: jti.clone() });
            }
        }

        debug!(%thumbprint, htm = %claims.htm, htu = %claims.htu, "proof validated");
        Ok(ValidatedProof { thumbprint, claims })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::issuer::issue_proof;
    use crate::keys::ProofKeyPair;
    use crate::replay::InMemoryReplayGuard;
    use jsonwebtoken::{EncodingKey, Header, encode};

    fn validator() -> ProofValidator {
        ProofValidator::new(Arc::new(InMemoryReplayGuard::new()))
    }

    /// Sign arbitrary claims with an arbitrary header over the key pair,
    /// for shapes `issue_proof` refuses to build.
    fn raw_proof(key_pair: &ProofKeyPair, header: Header, claims: &ProofClaims) -> String {
        encode(&header, claims, &key_pair.encoding_key().unwrap()).unwrap()
    }

    fn dpop_header(key_pair: &ProofKeyPair) -> Header {
        let mut header = Header::new(Algorithm::ES256);
        header.typ = Some(DPOP_JWT_TYPE.to_string());
        header.jwk = Some(key_pair.public_jwk());
        header
    }

    fn claims_for(method: &str, htu: &str) -> ProofClaims {
        ProofClaims {
            htm: method.to_string(),
            htu: htu.to_string(),
            iat: Utc::now().timestamp(),
            jti: Some(uuid::Uuid::new_v4().to_string()),
            ath: None,
        }
    }

    const URI: &str = "https://api.example.test/api/profile";

    #[tokio::test]
    async fn round_trip_validates_exactly_once() {
        let key_pair = ProofKeyPair::generate().unwrap();
        let validator = validator();
        let proof = issue_proof(&key_pair, "POST", URI, None).unwrap();

        let validated = validator.validate(&proof, "POST", URI, None).await.unwrap();
        assert_eq!(validated.thumbprint, key_pair.thumbprint);

        // Identical proof a second time is a replay.
        let err = validator.validate(&proof, "POST", URI, None).await.unwrap_err();
        assert!(matches!(err, DpopError::ReplayDetected { .. }));
    }

    #[tokio::test]
    async fn wrong_typ_is_rejected_before_signature_work() {
        let key_pair = ProofKeyPair::generate().unwrap();
        let mut header = dpop_header(&key_pair);
        header.typ = Some("jwt".to_string());
        // Garbage signature: if typ were checked after signature
        // verification, this would surface as SignatureInvalid instead.
        let mut proof = raw_proof(&key_pair, header, &claims_for("GET", URI));
        proof.replace_range(proof.rfind('.').unwrap().., ".AAAA");

        let err = validator().validate(&proof, "GET", URI, None).await.unwrap_err();
        assert!(matches!(err, DpopError::MalformedProof { .. }));
    }

    #[tokio::test]
    async fn symmetric_algorithm_is_rejected() {
        let mut header = Header::new(Algorithm::HS256);
        header.typ = Some(DPOP_JWT_TYPE.to_string());
        let proof = encode(
            &header,
            &claims_for("GET", URI),
            &EncodingKey::from_secret(b"attacker-chosen"),
        )
        .unwrap();

        let err = validator().validate(&proof, "GET", URI, None).await.unwrap_err();
        assert!(matches!(err, DpopError::MalformedProof { .. }));
    }

    #[tokio::test]
    async fn missing_jwk_is_rejected() {
        let key_pair = ProofKeyPair::generate().unwrap();
        let mut header = Header::new(Algorithm::ES256);
        header.typ = Some(DPOP_JWT_TYPE.to_string());
        let proof = raw_proof(&key_pair, header, &claims_for("GET", URI));

        let err = validator().validate(&proof, "GET", URI, None).await.unwrap_err();
        assert!(matches!(err, DpopError::MalformedProof { .. }));
    }

    #[tokio::test]
    async fn signature_from_other_key_is_rejected() {
        let signer = ProofKeyPair::generate().unwrap();
        let impostor = ProofKeyPair::generate().unwrap();
        // Header advertises the impostor's key; signature is the signer's.
        let proof = raw_proof(&signer, dpop_header(&impostor), &claims_for("GET", URI));

        let err = validator().validate(&proof, "GET", URI, None).await.unwrap_err();
        assert!(matches!(err, DpopError::SignatureInvalid { .. }));
    }

    #[tokio::test]
    async fn method_mismatch_fails_despite_valid_signature() {
        let key_pair = ProofKeyPair::generate().unwrap();
        let proof = issue_proof(&key_pair, "POST", URI, None).unwrap();

        let err = validator().validate(&proof, "GET", URI, None).await.unwrap_err();
        assert!(matches!(err, DpopError::HttpBindingMismatch { .. }));
    }

    #[tokio::test]
    async fn method_comparison_is_case_sensitive() {
        let key_pair = ProofKeyPair::generate().unwrap();
        let proof = raw_proof(&key_pair, dpop_header(&key_pair), &claims_for("get", URI));

        let err = validator().validate(&proof, "GET", URI, None).await.unwrap_err();
        assert!(matches!(err, DpopError::HttpBindingMismatch { .. }));
    }

    #[tokio::test]
    async fn uri_mismatch_fails_despite_valid_signature() {
        let key_pair = ProofKeyPair::generate().unwrap();
        let proof = issue_proof(&key_pair, "POST", URI, None).unwrap();

        let err = validator()
            .validate(&proof, "POST", "https://api.example.test/api/other", None)
            .await
            .unwrap_err();
        assert!(matches!(err, DpopError::HttpBindingMismatch { .. }));
    }

    #[tokio::test]
    async fn query_string_is_ignored_in_uri_binding() {
        let key_pair = ProofKeyPair::generate().unwrap();
        let proof = issue_proof(&key_pair, "GET", URI, None).unwrap();

        let uri_with_query = format!("{URI}?page=2");
        assert!(
            validator()
                .validate(&proof, "GET", &uri_with_query, None)
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn token_binding_round_trip_and_mismatch() {
        let key_pair = ProofKeyPair::generate().unwrap();
        let validator = validator();
        let token = "access-token-xyz";
        let proof = issue_proof(&key_pair, "GET", URI, Some(token)).unwrap();

        let validated = validator.validate(&proof, "GET", URI, Some(token)).await.unwrap();
        assert!(validated.claims.ath.is_some());

        let proof2 = issue_proof(&key_pair, "GET", URI, Some(token)).unwrap();
        let err = validator
            .validate(&proof2, "GET", URI, Some("other-token"))
            .await
            .unwrap_err();
        assert!(matches!(err, DpopError::AccessTokenHashMismatch { .. }));
    }

    #[tokio::test]
    async fn token_without_ath_is_rejected() {
        let key_pair = ProofKeyPair::generate().unwrap();
        let proof = issue_proof(&key_pair, "GET", URI, None).unwrap();

        let err = validator()
            .validate(&proof, "GET", URI, Some("token"))
            .await
            .unwrap_err();
        assert!(matches!(err, DpopError::AccessTokenHashMismatch { .. }));
    }

    #[tokio::test]
    async fn stale_proof_is_rejected() {
        let key_pair = ProofKeyPair::generate().unwrap();
        let mut claims = claims_for("GET", URI);
        claims.iat -= 600;
        let proof = raw_proof(&key_pair, dpop_header(&key_pair), &claims);

        let err = validator().validate(&proof, "GET", URI, None).await.unwrap_err();
        assert!(matches!(err, DpopError::ProofExpired { .. }));
    }

    #[tokio::test]
    async fn future_dated_proof_is_rejected() {
        let key_pair = ProofKeyPair::generate().unwrap();
        let mut claims = claims_for("GET", URI);
        claims.iat += 600;
        let proof = raw_proof(&key_pair, dpop_header(&key_pair), &claims);

        let err = validator().validate(&proof, "GET", URI, None).await.unwrap_err();
        assert!(matches!(err, DpopError::ClockSkewExceeded { .. }));
    }

    #[tokio::test]
    async fn proof_without_jti_skips_replay_tracking() {
        let key_pair = ProofKeyPair::generate().unwrap();
        let validator = validator();
        let mut claims = claims_for("GET", URI);
        claims.jti = None;
        let proof = raw_proof(&key_pair, dpop_header(&key_pair), &claims);

        assert!(validator.validate(&proof, "GET", URI, None).await.is_ok());
        // No nonce recorded, so even the identical proof passes again.
        assert!(validator.validate(&proof, "GET", URI, None).await.is_ok());
    }

    #[tokio::test]
    async fn concurrent_validations_of_one_proof_have_one_winner() {
        let key_pair = ProofKeyPair::generate().unwrap();
        let validator = Arc::new(validator());
        let proof = issue_proof(&key_pair, "POST", URI, None).unwrap();

        let mut handles = Vec::new();
        for _ in 0..16 {
            let validator = validator.clone();
            let proof = proof.clone();
            handles.push(tokio::spawn(async move {
                validator.validate(&proof, "POST", URI, None).await.is_ok()
            }));
        }

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }
}
