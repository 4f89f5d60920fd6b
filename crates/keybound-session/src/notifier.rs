//! Session-liveness push loop.
//!
//! One loop runs per connected client. Every tick it re-reads the
//! caller's ticket and emits whether the session has lapsed; the SSE
//! endpoint forwards each event to the browser so it can drop to the
//! sign-in screen the moment the cookie's backing session dies. The loop
//! suspends between ticks and exits promptly (within one tick) when the
//! connection's cancellation token fires, without emitting a final event.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::Stream;
use serde::Serialize;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::store::TicketStore;

/// One liveness sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LivenessEvent {
    /// True when the caller has no live session: ticket absent or past
    /// its expiry.
    pub cookie_expired: bool,
}

/// Produces per-connection liveness streams over a shared ticket store.
#[derive(Debug, Clone)]
pub struct SessionLivenessNotifier {
    store: Arc<dyn TicketStore>,
    interval: Duration,
}

impl SessionLivenessNotifier {
    /// Notifier with the default 1s tick.
    #[must_use]
    pub fn new(store: Arc<dyn TicketStore>) -> Self {
        Self {
            store,
            interval: Duration::from_secs(1),
        }
    }

    /// Override the tick interval.
    #[must_use]
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Stream of liveness events for one caller.
    ///
    /// `identity` is the session key of the authenticated principal, or
    /// `None` for an anonymous connection, which reads as expired on
    /// every tick. The stream ends when `cancel` fires; it never cleans
    /// up store state itself (sign-out owns removal).
    pub fn watch(
        &self,
        identity: Option<String>,
        cancel: CancellationToken,
    ) -> impl Stream<Item = LivenessEvent> + Send {
        let store = Arc::clone(&self.store);
        let period = self.interval;

        async_stream::stream! {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // interval fires immediately; swallow that so the first
            // sample lands one full period after connect.
            ticker.tick().await;

            debug!(identity = identity.as_deref(), "liveness watch started");
            loop {
                tokio::select! {
                    // Cancellation wins over an already-elapsed tick so a
                    // disconnect never produces a trailing event.
                    biased;
                    () = cancel.cancelled() => {
                        debug!(identity = identity.as_deref(), "liveness watch cancelled");
                        break;
                    }
                    _ = ticker.tick() => {
                        match liveness_sample(store.as_ref(), identity.as_deref()).await {
                            Some(event) => yield event,
                            None => {} // store fault: logged, tick skipped
                        }
                    }
                }
            }
        }
    }
}

async fn liveness_sample(
    store: &dyn TicketStore,
    identity: Option<&str>,
) -> Option<LivenessEvent> {
    let Some(key) = identity else {
        return Some(LivenessEvent {
            cookie_expired: true,
        });
    };

    match store.retrieve(key).await {
        Ok(Some(ticket)) => Some(LivenessEvent {
            cookie_expired: ticket.is_expired(Utc::now()),
        }),
        Ok(None) => Some(LivenessEvent {
            cookie_expired: true,
        }),
        Err(error) => {
            warn!(%key, %error, "liveness check could not reach the ticket store");
            None
        }
    }
}
