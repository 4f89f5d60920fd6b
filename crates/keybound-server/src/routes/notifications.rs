//! Server-sent session-expiry notifications.

use axum::Extension;
use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::state::{AppState, CurrentUser};

/// Event name the browser subscribes to.
const EVENT_NAME: &str = "cookieExpired";

/// `GET /api/notifications/sse`
///
/// Streams one liveness event per tick for the caller's session.
/// Anonymous callers get a stream that reports expired on every tick,
/// so a client whose cookie has already been cleaned up still learns to
/// drop to the sign-in screen. Disconnecting cancels the watch loop.
pub async fn cookie_expiry(
    State(state): State<AppState>,
    user: Option<Extension<CurrentUser>>,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    let identity = user.map(|Extension(user)| user.identity);
    debug!(identity = identity.as_deref(), "expiry stream opened");

    let cancel = CancellationToken::new();
    // Dropping the stream (client gone) fires the token and stops the
    // watch loop within one tick.
    let guard = cancel.clone().drop_guard();

    let events = state.notifier.watch(identity, cancel).map(move |event| {
        let _alive = &guard;
        Event::default().event(EVENT_NAME).json_data(&event)
    });

    Sse::new(events).keep_alive(KeepAlive::default())
}
