//! The session ticket store.
//!
//! Keyed by the identity claim extracted from the ticket at sign-in.
//! Absence is a normal outcome throughout: `retrieve` of an unknown key
//! is `None`, `renew` of an unknown key is a silent no-op, and
//! `is_expired` of an unknown key is `false`: "no session" is not the
//! same as "expired session", and callers that need the distinction
//! check both.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use thiserror::Error;
use tracing::debug;

use keybound_cache::{Clock, SystemClock};

use crate::ticket::{IDENTITY_CLAIM, SessionTicket};

/// Session store failures.
///
/// `InvalidTicket` is a caller error; `StoreUnavailable` is the transient
/// backing-store failure a durable implementation may surface.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The ticket has no identity claim to key the session by.
    #[error("ticket has no {IDENTITY_CLAIM:?} claim to key the session by")]
    InvalidTicket,

    /// The backing store failed; transient, surfaced to callers as 5xx.
    #[error("session store unavailable: {reason}")]
    StoreUnavailable {
        /// Underlying store failure
        reason: String,
    },
}

/// Session store operations, shared by the cookie-auth integration and
/// the liveness notifier.
///
/// Implementations must be safe under concurrent access from all
/// request-handling tasks without caller-side locking.
#[async_trait]
pub trait TicketStore: Send + Sync + std::fmt::Debug {
    /// Store a ticket keyed by its identity claim; returns the key.
    ///
    /// A second sign-in for the same identity overwrites the first.
    ///
    /// # Errors
    /// `InvalidTicket` when the identity claim is missing.
    async fn store(&self, ticket: SessionTicket) -> Result<String, SessionError>;

    /// Replace the ticket under `key`. Silent no-op when the key is
    /// absent; callers that must treat absence as an error `retrieve`
    /// first.
    async fn renew(&self, key: &str, ticket: SessionTicket) -> Result<(), SessionError>;

    /// Fetch the ticket under `key`.
    async fn retrieve(&self, key: &str) -> Result<Option<SessionTicket>, SessionError>;

    /// Whether the ticket under `key` has passed its expiry. An absent
    /// ticket is **not** expired; it is "no session".
    async fn is_expired(&self, key: &str) -> Result<bool, SessionError>;

    /// Remove the ticket under `key`; absent keys are a no-op.
    async fn remove(&self, key: &str) -> Result<(), SessionError>;
}

/// In-process ticket store on a concurrent map.
#[derive(Debug)]
pub struct InMemoryTicketStore {
    tickets: DashMap<String, SessionTicket>,
    clock: Arc<dyn Clock>,
}

impl InMemoryTicketStore {
    /// Store driven by the system clock.
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Store with an injected clock.
    #[must_use]
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            tickets: DashMap::new(),
            clock,
        }
    }

    /// Number of live-or-expired tickets currently held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tickets.len()
    }

    /// True when no tickets are held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tickets.is_empty()
    }
}

impl Default for InMemoryTicketStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TicketStore for InMemoryTicketStore {
    async fn store(&self, ticket: SessionTicket) -> Result<String, SessionError> {
        let key = ticket
            .identity()
            .ok_or(SessionError::InvalidTicket)?
            .to_string();
        debug!(%key, expires_at = ?ticket.expires_at, "storing session ticket");
        self.tickets.insert(key.clone(), ticket);
        Ok(key)
    }

    async fn renew(&self, key: &str, ticket: SessionTicket) -> Result<(), SessionError> {
        if let Some(mut existing) = self.tickets.get_mut(key) {
            *existing = ticket;
        }
        Ok(())
    }

    async fn retrieve(&self, key: &str) -> Result<Option<SessionTicket>, SessionError> {
        Ok(self.tickets.get(key).map(|entry| entry.clone()))
    }

    async fn is_expired(&self, key: &str) -> Result<bool, SessionError> {
        let now = self.clock.now();
        Ok(self
            .tickets
            .get(key)
            .is_some_and(|entry| entry.is_expired(now)))
    }

    async fn remove(&self, key: &str) -> Result<(), SessionError> {
        self.tickets.remove(key);
        Ok(())
    }
}
