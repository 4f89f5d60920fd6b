//! DPoP error taxonomy.
//!
//! Errors are classified so the transport layer can map them to HTTP
//! status codes without inspecting variants: malformed input is the
//! client's encoding problem (400), a well-formed but unverifiable proof
//! is an authentication failure (401), and a backing-store fault is a
//! transient server problem (5xx). Absence of a key, ticket, or nonce is
//! never an error; those are typed `Option` outcomes.

use thiserror::Error;

/// Coarse classification used for HTTP status mapping and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Unparseable token or bad header/claim shape (400-class)
    Malformed,
    /// Well-formed proof that fails verification (401-class)
    Invalid,
    /// Backing store failure, transient (5xx-class)
    Unavailable,
    /// Server-side fault (5xx-class)
    Internal,
}

/// Errors produced by proof validation, issuance, and replay tracking.
#[derive(Debug, Error)]
pub enum DpopError {
    /// Token could not be parsed, or header/claim shape is wrong.
    /// Cryptographic key-parse failures are converted to this variant,
    /// never allowed to propagate as panics.
    #[error("malformed proof: {reason}")]
    MalformedProof {
        /// What failed to parse
        reason: String,
    },

    /// Signature did not verify against the embedded public key.
    #[error("proof signature verification failed: {reason}")]
    SignatureInvalid {
        /// Verification failure detail (logged, never echoed to clients)
        reason: String,
    },

    /// The `iat` claim is too far from the server clock.
    #[error("proof clock skew {skew_seconds}s exceeds maximum {max_skew_seconds}s")]
    ClockSkewExceeded {
        /// Observed skew in seconds
        skew_seconds: i64,
        /// Configured tolerance in seconds
        max_skew_seconds: i64,
    },

    /// The proof is older than the configured lifetime.
    #[error("proof expired: issued {age_seconds}s ago (max {max_age_seconds}s)")]
    ProofExpired {
        /// Proof age in seconds
        age_seconds: i64,
        /// Configured lifetime in seconds
        max_age_seconds: i64,
    },

    /// `htm` or `htu` does not match the request being authorized.
    #[error("http binding mismatch: {reason}")]
    HttpBindingMismatch {
        /// Which binding failed and how
        reason: String,
    },

    /// The `ath` claim does not commit to the presented access token.
    #[error("access token hash mismatch: {reason}")]
    AccessTokenHashMismatch {
        /// Why the binding check failed
        reason: String,
    },

    /// The proof nonce was already observed inside the replay window.
    #[error("proof nonce already used: {nonce}")]
    ReplayDetected {
        /// The replayed `jti` value
        nonce: String,
    },

    /// The accompanying access token failed verification.
    #[error("access token rejected: {reason}")]
    TokenRejected {
        /// Verification failure detail
        reason: String,
    },

    /// The access token's confirmation claim does not match the key that
    /// signed the proof.
    #[error("access token is bound to a different key")]
    KeyBindingMismatch,

    /// The replay guard's backing store failed.
    #[error("replay store unavailable: {reason}")]
    StoreUnavailable {
        /// Underlying store failure
        reason: String,
    },

    /// Signing or key-generation failure during issuance.
    #[error("cryptographic operation failed: {reason}")]
    CryptographicFailure {
        /// Underlying failure
        reason: String,
    },

    /// Invariant violation on the server side (bad request URI, clock
    /// before epoch).
    #[error("internal error: {reason}")]
    Internal {
        /// What went wrong
        reason: String,
    },
}

impl DpopError {
    /// Classify for status mapping.
    #[must_use]
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::MalformedProof { .. } => ErrorClass::Malformed,
            Self::SignatureInvalid { .. }
            | Self::ClockSkewExceeded { .. }
            | Self::ProofExpired { .. }
            | Self::HttpBindingMismatch { .. }
            | Self::AccessTokenHashMismatch { .. }
            | Self::ReplayDetected { .. }
            | Self::TokenRejected { .. }
            | Self::KeyBindingMismatch => ErrorClass::Invalid,
            Self::StoreUnavailable { .. } => ErrorClass::Unavailable,
            Self::CryptographicFailure { .. } | Self::Internal { .. } => ErrorClass::Internal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_maps_to_400_class() {
        let err = DpopError::MalformedProof {
            reason: "bad typ".into(),
        };
        assert_eq!(err.class(), ErrorClass::Malformed);
    }

    #[test]
    fn verification_failures_map_to_401_class() {
        let err = DpopError::ReplayDetected {
            nonce: "abc".into(),
        };
        assert_eq!(err.class(), ErrorClass::Invalid);
        assert_eq!(DpopError::KeyBindingMismatch.class(), ErrorClass::Invalid);
    }

    #[test]
    fn store_failure_maps_to_5xx_class() {
        let err = DpopError::StoreUnavailable {
            reason: "connection reset".into(),
        };
        assert_eq!(err.class(), ErrorClass::Unavailable);
    }
}
