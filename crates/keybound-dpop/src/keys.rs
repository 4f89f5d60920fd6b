//! ES256 key material and JWK conversions.
//!
//! The proof holder's key pair lives here, together with the conversions
//! between raw P-256 coordinates and the `jsonwebtoken` JWK types used
//! for signing and verification. Private key bytes are zeroized on drop.

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use jsonwebtoken::jwk::{
    AlgorithmParameters, CommonParameters, EllipticCurve, EllipticCurveKeyParameters,
    EllipticCurveKeyType, Jwk, KeyAlgorithm, PublicKeyUse,
};
use jsonwebtoken::{DecodingKey, EncodingKey};
use p256::SecretKey;
use p256::ecdsa::{SigningKey, VerifyingKey};
use p256::pkcs8::EncodePrivateKey;
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};
use uuid::Uuid;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::Result;
use crate::error::DpopError;

/// P-256 private scalar, zeroized on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
struct PrivateScalar([u8; 32]);

impl std::fmt::Debug for PrivateScalar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("PrivateScalar([redacted])")
    }
}

/// An ES256 (ECDSA P-256) key pair held by a proof presenter.
///
/// The public half is embedded as a JWK in each proof header; the RFC 7638
/// thumbprint is what a bound access token's confirmation claim commits to.
#[derive(Debug, Clone)]
pub struct ProofKeyPair {
    /// Identifier for logging and rotation bookkeeping
    pub id: String,
    private_key: PrivateScalar,
    /// Public key x coordinate (32 bytes)
    pub public_x: [u8; 32],
    /// Public key y coordinate (32 bytes)
    pub public_y: [u8; 32],
    /// RFC 7638 JWK thumbprint, base64url
    pub thumbprint: String,
}

impl ProofKeyPair {
    /// Generate a fresh P-256 key pair.
    ///
    /// # Errors
    /// Returns `CryptographicFailure` if the public point cannot be
    /// decomposed into affine coordinates.
    pub fn generate() -> Result<Self> {
        let signing_key = SigningKey::random(&mut OsRng);
        let verifying_key = VerifyingKey::from(&signing_key);

        let mut key_bytes = [0u8; 32];
        key_bytes.copy_from_slice(signing_key.to_bytes().as_ref());

        let point = verifying_key.to_encoded_point(false);
        let x_bytes = point
            .x()
            .ok_or_else(|| DpopError::CryptographicFailure {
                reason: "P-256 public key has no x coordinate".to_string(),
            })?;
        let y_bytes = point
            .y()
            .ok_or_else(|| DpopError::CryptographicFailure {
                reason: "P-256 public key has no y coordinate".to_string(),
            })?;

        let mut public_x = [0u8; 32];
        let mut public_y = [0u8; 32];
        public_x.copy_from_slice(x_bytes);
        public_y.copy_from_slice(y_bytes);

        let thumbprint = thumbprint_from_coordinates(
            &URL_SAFE_NO_PAD.encode(public_x),
            &URL_SAFE_NO_PAD.encode(public_y),
        );

        Ok(Self {
            id: Uuid::new_v4().to_string(),
            private_key: PrivateScalar(key_bytes),
            public_x,
            public_y,
            thumbprint,
        })
    }

    /// Public key as an RFC 7517 JWK, ready to embed in a proof header.
    #[must_use]
    pub fn public_jwk(&self) -> Jwk {
        Jwk {
            common: CommonParameters {
                public_key_use: Some(PublicKeyUse::Signature),
                key_algorithm: Some(KeyAlgorithm::ES256),
                ..Default::default()
            },
            algorithm: AlgorithmParameters::EllipticCurve(EllipticCurveKeyParameters {
                key_type: EllipticCurveKeyType::EC,
                curve: EllipticCurve::P256,
                x: URL_SAFE_NO_PAD.encode(self.public_x),
                y: URL_SAFE_NO_PAD.encode(self.public_y),
            }),
        }
    }

    /// Private key as a `jsonwebtoken` signing key.
    ///
    /// Converts the raw scalar to PKCS#8 DER, the format `jsonwebtoken`
    /// expects for EC keys.
    ///
    /// # Errors
    /// Returns `CryptographicFailure` if the scalar is out of range or the
    /// PKCS#8 encoding fails.
    pub fn encoding_key(&self) -> Result<EncodingKey> {
        let secret_key = SecretKey::from_bytes((&self.private_key.0).into()).map_err(|e| {
            DpopError::CryptographicFailure {
                reason: format!("invalid EC private key: {e}"),
            }
        })?;
        let pkcs8 = secret_key
            .to_pkcs8_der()
            .map_err(|e| DpopError::CryptographicFailure {
                reason: format!("EC key PKCS#8 encoding failed: {e}"),
            })?;
        Ok(EncodingKey::from_ec_der(pkcs8.as_bytes()))
    }
}

/// Parse and sanity-check the JWK embedded in a proof header.
///
/// Accepts only EC P-256 keys with 32-byte coordinates; anything else is
/// reported as a malformed proof, as is any decoding failure. The caller
/// gets a verification key plus the RFC 7638 thumbprint of the JWK.
pub fn verification_key_from_jwk(jwk: &Jwk) -> Result<(DecodingKey, String)> {
    let AlgorithmParameters::EllipticCurve(params) = &jwk.algorithm else {
        return Err(DpopError::MalformedProof {
            reason: "embedded JWK is not an EC key".to_string(),
        });
    };

    if params.curve != EllipticCurve::P256 {
        return Err(DpopError::MalformedProof {
            reason: format!("unsupported curve {:?}, expected P-256", params.curve),
        });
    }

    for (name, coordinate) in [("x", &params.x), ("y", &params.y)] {
        let bytes = URL_SAFE_NO_PAD
            .decode(coordinate)
            .map_err(|e| DpopError::MalformedProof {
                reason: format!("JWK {name} coordinate is not base64url: {e}"),
            })?;
        if bytes.len() != 32 {
            return Err(DpopError::MalformedProof {
                reason: format!("JWK {name} coordinate is {} bytes, expected 32", bytes.len()),
            });
        }
    }

    let decoding_key = DecodingKey::from_jwk(jwk).map_err(|e| DpopError::MalformedProof {
        reason: format!("embedded JWK rejected: {e}"),
    })?;

    let thumbprint = thumbprint_from_coordinates(&params.x, &params.y);
    Ok((decoding_key, thumbprint))
}

/// RFC 7638 thumbprint of a P-256 JWK.
///
/// The required members (`crv`, `kty`, `x`, `y`) are serialized in
/// lexicographic order (`serde_json`'s default map ordering), then
/// SHA-256 hashed and base64url encoded.
fn thumbprint_from_coordinates(x_b64: &str, y_b64: &str) -> String {
    let canonical = serde_json::json!({
        "crv": "P-256",
        "kty": "EC",
        "x": x_b64,
        "y": y_b64,
    })
    .to_string();

    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    URL_SAFE_NO_PAD.encode(hasher.finalize())
}
