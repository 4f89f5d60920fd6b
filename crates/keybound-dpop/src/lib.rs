//! # Keybound DPoP
//!
//! Proof-of-possession tokens in the style of RFC 9449: a client proves
//! control of a private key by signing a short-lived JWT bound to the HTTP
//! method and URI of the request, optionally bound to an access token. The
//! server validates the proof against the public key embedded in its
//! header and rejects replays by tracking the proof nonce (`jti`).
//!
//! ## Modules
//!
//! - `error` - error taxonomy (malformed vs invalid vs store failure)
//! - `keys` - ES256 key material and JWK conversions
//! - `types` - proof and bound-access-token claim structures
//! - `replay` - nonce tracking with a bounded eviction window
//! - `issuer` - proof construction and key-bound access tokens
//! - `validator` - ordered, short-circuiting proof validation
//!
//! ## Security notes
//!
//! Only ES256 (ECDSA P-256) is accepted for proofs. The signing key is
//! caller-supplied, so symmetric algorithms and `"none"` must never enter
//! the allow-list. The server-issued access token is HS256-signed with a
//! server-held key; that is a separate trust domain.

mod binding;
pub mod error;
pub mod issuer;
pub mod keys;
pub mod replay;
pub mod types;
pub mod validator;

pub use error::{DpopError, ErrorClass};
pub use issuer::{TokenIssuer, issue_proof};
pub use keys::ProofKeyPair;
pub use replay::{InMemoryReplayGuard, ReplayGuard};
pub use types::{AccessTokenClaims, ConfirmationClaim, ProofClaims};
pub use validator::{ProofValidator, ValidatedProof};

/// DPoP result type
pub type Result<T> = std::result::Result<T, DpopError>;

/// Required `typ` header value for proof JWTs
pub const DPOP_JWT_TYPE: &str = "dpop+jwt";

/// Clock skew tolerance applied to the proof `iat` claim (seconds)
pub const CLOCK_SKEW_SECONDS: i64 = 30;

/// Default proof lifetime (seconds)
pub const DEFAULT_PROOF_LIFETIME_SECONDS: i64 = 60;

/// Maximum proof lifetime; also bounds the replay-guard retention window
pub const MAX_PROOF_LIFETIME_SECONDS: i64 = 300;

/// Default bound access token validity (1 hour)
pub const DEFAULT_TOKEN_VALIDITY_SECONDS: i64 = 3600;
