//! Proof-of-possession request layer.
//!
//! Requests that do not use the `DPoP` authorization scheme pass through
//! untouched. For those that do, the layer demands a proof header bound
//! to this exact request, verifies the access token, and cross-checks the
//! token's confirmation claim against the key that signed the proof. On
//! success the Authorization header is rewritten to the `Bearer` scheme
//! so downstream handlers only ever deal with an already-proven token.

use axum::extract::{Request, State};
use axum::http::HeaderValue;
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use subtle::ConstantTimeEq;
use tracing::{debug, warn};

use keybound_dpop::DpopError;

use crate::error::ApiError;
use crate::state::{AppState, CurrentUser};

/// Header carrying the proof JWT.
pub const PROOF_HEADER: &str = "DPoP";

const DPOP_SCHEME_PREFIX: &str = "DPoP ";

pub async fn dpop_layer(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let Some(access_token) = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix(DPOP_SCHEME_PREFIX))
        .map(|token| token.trim().to_string())
    else {
        // Not our scheme; cookie layer or handler decides what happens.
        return next.run(req).await;
    };

    let Some(proof) = req
        .headers()
        .get(PROOF_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
    else {
        warn!("DPoP-scheme token presented without a proof header");
        return ApiError::bad_request().into_response();
    };

    let method = req.method().as_str().to_string();
    let uri = state.request_uri(req.uri().path());

    match authenticate(&state, &proof, &method, &uri, &access_token).await {
        Ok(subject) => {
            let mut req = req;
            let bearer = format!("Bearer {access_token}");
            match HeaderValue::from_str(&bearer) {
                Ok(value) => {
                    req.headers_mut().insert(AUTHORIZATION, value);
                }
                Err(error) => {
                    warn!(%error, "rewritten authorization header is not a valid header value");
                    return ApiError::bad_request().into_response();
                }
            }
            debug!(%subject, %method, "request authenticated by proof of possession");
            req.extensions_mut().insert(CurrentUser {
                identity: subject,
                claims: Vec::new(),
            });
            next.run(req).await
        }
        Err(error) => error.into_response(),
    }
}

/// Full check for one request: proof, token, and the binding between
/// them. Returns the token subject.
async fn authenticate(
    state: &AppState,
    proof: &str,
    method: &str,
    uri: &str,
    access_token: &str,
) -> Result<String, ApiError> {
    let validated = state
        .validator
        .validate(proof, method, uri, Some(access_token))
        .await?;

    let claims = state.token_issuer.verify_token(access_token)?;

    // The token must commit to the same key that signed the proof;
    // anything else means the token was stolen or minted for another
    // holder.
    let bound = claims
        .bound_thumbprint()
        .ok_or(DpopError::KeyBindingMismatch)?;
    let matches: bool = bound
        .as_bytes()
        .ct_eq(validated.thumbprint.as_bytes())
        .into();
    if !matches {
        return Err(DpopError::KeyBindingMismatch.into());
    }

    Ok(claims.sub)
}
