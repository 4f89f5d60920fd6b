//! Replay protection for proof nonces.
//!
//! A proof nonce (`jti`) observed once must be rejected on every later
//! presentation inside the retention window. The check and the record are
//! one atomic step per nonce: two concurrent presentations of the same
//! nonce must never both pass. Retention is bounded: entries older than
//! the maximum proof lifetime (plus skew) are evicted so the set cannot
//! grow without limit.

use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tracing::debug;

use crate::{CLOCK_SKEW_SECONDS, MAX_PROOF_LIFETIME_SECONDS, Result};

/// Nonce store consulted during proof validation.
///
/// Implementations must make `check_and_record` atomic per nonce. A
/// distributed deployment swaps in a shared backend (e.g. Redis with
/// `SET NX EX`) behind this trait.
#[async_trait]
pub trait ReplayGuard: Send + Sync + std::fmt::Debug {
    /// Whether the nonce has been observed inside the retention window.
    async fn seen(&self, nonce: &str) -> Result<bool>;

    /// Record a nonce observation unconditionally.
    async fn record(&self, nonce: &str, observed_at: i64) -> Result<()>;

    /// Atomically record the nonce if unseen.
    ///
    /// Returns `true` iff this call was the first observation. Exactly one
    /// of any set of concurrent calls for the same nonce returns `true`.
    async fn check_and_record(&self, nonce: &str, observed_at: i64) -> Result<bool>;

    /// Drop entries older than the retention window; returns the count
    /// evicted.
    async fn evict_expired(&self) -> Result<usize>;
}

/// In-process replay guard backed by a concurrent map.
///
/// Per-nonce atomicity comes from the map's entry API: the vacancy check
/// and the insert happen under the same shard lock. Eviction runs
/// opportunistically inside `record`/`check_and_record` at most once per
/// retention window, so steady-state memory is bounded by the number of
/// proofs seen in one window.
#[derive(Debug)]
pub struct InMemoryReplayGuard {
    observed: DashMap<String, i64>,
    /// Seconds a nonce is retained after its observation timestamp
    retention_seconds: i64,
    last_sweep: AtomicI64,
}

impl InMemoryReplayGuard {
    /// Guard with the default retention window (max proof lifetime plus
    /// clock skew).
    #[must_use]
    pub fn new() -> Self {
        Self::with_retention(MAX_PROOF_LIFETIME_SECONDS + CLOCK_SKEW_SECONDS)
    }

    /// Guard with a custom retention window in seconds.
    #[must_use]
    pub fn with_retention(retention_seconds: i64) -> Self {
        Self {
            observed: DashMap::new(),
            retention_seconds,
            last_sweep: AtomicI64::new(Utc::now().timestamp()),
        }
    }

    /// Number of nonces currently retained.
    #[must_use]
    pub fn len(&self) -> usize {
        self.observed.len()
    }

    /// True when no nonces are retained.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.observed.is_empty()
    }

    fn sweep(&self, now: i64) -> usize {
        let cutoff = now - self.retention_seconds;
        let before = self.observed.len();
        self.observed.retain(|_, &mut observed_at| observed_at > cutoff);
        let evicted = before - self.observed.len();
        if evicted > 0 {
            debug!(evicted, "evicted expired proof nonces");
        }
        evicted
    }

    /// Sweep at most once per retention window. One caller wins the CAS;
    /// everyone else skips.
    fn maybe_sweep(&self, now: i64) {
        let last = self.last_sweep.load(Ordering::Relaxed);
        if now - last >= self.retention_seconds
            && self
                .last_sweep
                .compare_exchange(last, now, Ordering::Relaxed, Ordering::Relaxed)
                .is_ok()
        {
            self.sweep(now);
        }
    }
}

impl Default for InMemoryReplayGuard {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ReplayGuard for InMemoryReplayGuard {
    async fn seen(&self, nonce: &str) -> Result<bool> {
        Ok(self.observed.contains_key(nonce))
    }

    async fn record(&self, nonce: &str, observed_at: i64) -> Result<()> {
        self.observed.insert(nonce.to_string(), observed_at);
        self.maybe_sweep(Utc::now().timestamp());
        Ok(())
    }

    async fn check_and_record(&self, nonce: &str, observed_at: i64) -> Result<bool> {
        let first = match self.observed.entry(nonce.to_string()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(vacant) => {
                vacant.insert(observed_at);
                true
            }
        };
        self.maybe_sweep(Utc::now().timestamp());
        Ok(first)
    }

    async fn evict_expired(&self) -> Result<usize> {
        Ok(self.sweep(Utc::now().timestamp()))
    }
}
