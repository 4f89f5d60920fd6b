//! Request-binding helpers shared by issuance and validation.

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use sha2::{Digest, Sha256};

use crate::Result;
use crate::error::DpopError;

/// Canonical `htu` form: scheme://host\[:port\]/path.
///
/// Query string and fragment are stripped; the `url` crate lowercases
/// scheme and host; the path is kept byte-exact (no trailing-slash
/// normalization). Both sides of the comparison, issuance and
/// validation, go through this function, so the canonicalization choice
/// cannot cause a one-sided mismatch.
pub(crate) fn canonical_htu(uri: &str) -> Result<String> {
    let url = url::Url::parse(uri).map_err(|e| DpopError::MalformedProof {
        reason: format!("invalid URI: {e}"),
    })?;

    let host = url.host_str().ok_or_else(|| DpopError::MalformedProof {
        reason: "URI has no host".to_string(),
    })?;

    let authority = match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    };

    Ok(format!("{}://{}{}", url.scheme(), authority, url.path()))
}

/// `ath` claim value: base64url(SHA-256(access token)).
pub(crate) fn access_token_hash(access_token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(access_token.as_bytes());
    URL_SAFE_NO_PAD.encode(hasher.finalize())
}

/// Constant-time equality for hash and thumbprint comparisons.
pub(crate) fn constant_time_eq(a: &str, b: &str) -> bool {
    use subtle::ConstantTimeEq;
    a.as_bytes().ct_eq(b.as_bytes()).into()
}
