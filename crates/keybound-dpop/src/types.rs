//! Proof and access-token claim structures.

use serde::{Deserialize, Serialize};

/// Claims carried by a proof JWT.
///
/// `htm`/`htu` bind the proof to one request line; `jti` is the replay
/// nonce; `ath` commits to an access token when the proof accompanies one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProofClaims {
    /// Uppercase HTTP method the proof authorizes
    pub htm: String,
    /// Canonical scheme://host\[:port\]/path of the request
    pub htu: String,
    /// Issued-at, Unix seconds
    pub iat: i64,
    /// Unique nonce for replay detection
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>,
    /// base64url(SHA-256(access token)), present when token-bound
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ath: Option<String>,
}

/// Confirmation claim binding a token to a key (RFC 7800 `cnf`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmationClaim {
    /// RFC 7638 thumbprint of the holder's public JWK
    pub jkt: String,
}

/// Claims of a server-issued access token.
///
/// `cnf` is present on key-bound tokens and absent on plain bearer
/// tokens; verifiers that require possession must treat a missing `cnf`
/// as a binding failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessTokenClaims {
    /// Subject (the authenticated identity)
    pub sub: String,
    /// Issuer
    pub iss: String,
    /// Audience
    pub aud: String,
    /// Issued-at, Unix seconds
    pub iat: i64,
    /// Expiry, Unix seconds
    pub exp: i64,
    /// Key-binding confirmation, absent for bearer tokens
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cnf: Option<ConfirmationClaim>,
}

impl AccessTokenClaims {
    /// Thumbprint the token is bound to, if any.
    #[must_use]
    pub fn bound_thumbprint(&self) -> Option<&str> {
        self.cnf.as_ref().map(|cnf| cnf.jkt.as_str())
    }
}
