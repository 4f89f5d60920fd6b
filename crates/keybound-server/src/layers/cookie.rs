//! Cookie session layer.
//!
//! The cookie value is an opaque random id; the id maps to the session
//! key through the expiring cookie index (sliding window), and the key
//! maps to the ticket in the ticket store. Each authenticated pass
//! renews the ticket's absolute expiry, so an active user stays signed
//! in while an idle session lapses on schedule.
//!
//! A missing, unknown, or expired session never fails the request here;
//! it just leaves the request anonymous for the handler to judge.

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use axum_extra::extract::cookie::CookieJar;
use chrono::{Duration, Utc};
use tracing::{debug, warn};

use crate::state::{AppState, CurrentUser};

pub async fn cookie_session_layer(
    State(state): State<AppState>,
    jar: CookieJar,
    mut req: Request,
    next: Next,
) -> Response {
    // A principal established by the proof layer wins.
    if req.extensions().get::<CurrentUser>().is_none() {
        if let Some(cookie) = jar.get(&state.config.cookie_name) {
            if let Some(user) = resolve_session(&state, cookie.value()).await {
                req.extensions_mut().insert(user);
            }
        }
    }
    next.run(req).await
}

async fn resolve_session(state: &AppState, session_id: &str) -> Option<CurrentUser> {
    // The index read also touches the sliding window.
    let key_bytes = state.cookie_index.get(session_id)?;
    let key = String::from_utf8(key_bytes).ok()?;

    let ticket = match state.tickets.retrieve(&key).await {
        Ok(Some(ticket)) => ticket,
        Ok(None) => {
            debug!(%key, "cookie maps to a session that no longer exists");
            return None;
        }
        Err(error) => {
            warn!(%key, %error, "ticket store unavailable during cookie validation");
            return None;
        }
    };

    let now = Utc::now();
    if ticket.is_expired(now) {
        debug!(%key, "cookie maps to an expired session");
        return None;
    }

    let user = CurrentUser {
        identity: key.clone(),
        claims: ticket.claims().to_vec(),
    };

    // Slide the ticket deadline forward to match the cookie window.
    let renewed = ticket.expiring_at(now + Duration::seconds(state.config.cookie_ttl_seconds));
    if let Err(error) = state.tickets.renew(&key, renewed).await {
        warn!(%key, %error, "session renewal failed; ticket keeps its old expiry");
    }

    Some(user)
}
