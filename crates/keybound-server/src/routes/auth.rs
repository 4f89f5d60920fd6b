//! Sign-in, sign-out, and session removal.

use axum::Json;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::{Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use keybound_cache::EntryOptions;
use keybound_session::{IDENTITY_CLAIM, SessionTicket};

use crate::credentials::VerifiedUser;
use crate::error::ApiError;
use crate::layers::dpop::PROOF_HEADER;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SignInRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    pub token: String,
    pub token_type: &'static str,
}

#[derive(Debug, Deserialize)]
pub struct SessionRemovalRequest {
    /// Session key (the identity the ticket is stored under).
    pub key: String,
}

/// `POST /api/sign-in`
///
/// With a proof header present, verifies the proof against this request
/// and answers with an access token bound to the proving key. Without
/// one, establishes a cookie session backed by a short-lived ticket.
pub async fn sign_in(
    State(state): State<AppState>,
    jar: CookieJar,
    headers: HeaderMap,
    Json(body): Json<SignInRequest>,
) -> Result<Response, ApiError> {
    let Some(user) = state
        .credentials
        .verify(&body.username, &body.password)
        .await
    else {
        warn!(username = %body.username, "sign-in rejected: bad credentials");
        return Err(ApiError::unauthorized());
    };

    if let Some(proof) = headers.get(PROOF_HEADER) {
        let proof = proof.to_str().map_err(|_| ApiError::bad_request())?;
        return token_sign_in(&state, &user, proof).await;
    }

    cookie_sign_in(&state, jar, &user).await
}

async fn token_sign_in(
    state: &AppState,
    user: &VerifiedUser,
    proof: &str,
) -> Result<Response, ApiError> {
    let uri = state.request_uri("/api/sign-in");
    let validated = state.validator.validate(proof, "POST", &uri, None).await?;
    let token = state
        .token_issuer
        .issue_bound_token(&user.email, &validated.thumbprint)?;

    info!(email = %user.email, "issued key-bound access token");
    Ok(Json(TokenResponse {
        token,
        token_type: "DPoP",
    })
    .into_response())
}

async fn cookie_sign_in(
    state: &AppState,
    jar: CookieJar,
    user: &VerifiedUser,
) -> Result<Response, ApiError> {
    let ttl = ChronoDuration::seconds(state.config.cookie_ttl_seconds);
    let ticket = SessionTicket::new()
        .with_claim("firstname", &user.first_name)
        .with_claim("lastname", &user.last_name)
        .with_claim(IDENTITY_CLAIM, &user.email)
        .expiring_at(Utc::now() + ttl);
    let key = state.tickets.store(ticket).await?;

    // The cookie carries only this random id; the identity never leaves
    // the server.
    let session_id = Uuid::new_v4().to_string();
    state
        .cookie_index
        .set(&session_id, key.into_bytes(), EntryOptions::sliding(ttl));

    let cookie = Cookie::build((state.config.cookie_name.clone(), session_id))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build();

    info!(email = %user.email, "established cookie session");
    Ok((jar.add(cookie), StatusCode::NO_CONTENT).into_response())
}

/// `POST /api/sign-in-token`
///
/// Plain bearer token with no key binding, for clients that cannot hold
/// a proving key.
pub async fn sign_in_token(
    State(state): State<AppState>,
    Json(body): Json<SignInRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    let Some(user) = state
        .credentials
        .verify(&body.username, &body.password)
        .await
    else {
        warn!(username = %body.username, "token sign-in rejected: bad credentials");
        return Err(ApiError::unauthorized());
    };

    let token = state.token_issuer.issue_bearer_token(&user.email)?;
    info!(email = %user.email, "issued bearer access token");
    Ok(Json(TokenResponse {
        token,
        token_type: "Bearer",
    }))
}

/// `POST /api/sign-out`
///
/// Removes the cookie index entry and the backing ticket, and expires
/// the cookie. Anonymous callers get the same 204; sign-out is
/// idempotent.
pub async fn sign_out(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<Response, ApiError> {
    if let Some(cookie) = jar.get(&state.config.cookie_name) {
        let session_id = cookie.value().to_string();
        if let Some(key_bytes) = state.cookie_index.get(&session_id) {
            if let Ok(key) = String::from_utf8(key_bytes) {
                state.tickets.remove(&key).await?;
                debug!(%key, "session removed on sign-out");
            }
        }
        state.cookie_index.remove(&session_id);
    }

    let removal = Cookie::build((state.config.cookie_name.clone(), "")).path("/");
    Ok((jar.remove(removal), StatusCode::NO_CONTENT).into_response())
}

/// `POST /api/remove-session`
///
/// Drops the ticket under the given key. The cookie index entry is left
/// alone; with the ticket gone the cookie no longer authenticates and
/// the liveness stream reports the session as expired.
pub async fn remove_session(
    State(state): State<AppState>,
    Json(body): Json<SessionRemovalRequest>,
) -> Result<StatusCode, ApiError> {
    state.tickets.remove(&body.key).await?;
    info!(key = %body.key, "session removed by request");
    Ok(StatusCode::NO_CONTENT)
}
