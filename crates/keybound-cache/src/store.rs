//! The expiring key/value store.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tracing::trace;

use crate::clock::{Clock, SystemClock};

/// Expiration options for a stored entry.
///
/// If both `absolute_expiration` and `absolute_expiration_relative_to_now`
/// are set, the explicit timestamp wins.
#[derive(Debug, Clone, Default)]
pub struct EntryOptions {
    /// Fixed deadline after which the entry is expired.
    pub absolute_expiration: Option<DateTime<Utc>>,
    /// Fixed deadline expressed relative to the time of the `set` call.
    pub absolute_expiration_relative_to_now: Option<Duration>,
    /// Idle deadline, measured from the last successful access.
    pub sliding_expiration: Option<Duration>,
}

impl EntryOptions {
    /// Options with only a sliding expiration.
    #[must_use]
    pub fn sliding(window: Duration) -> Self {
        Self {
            sliding_expiration: Some(window),
            ..Self::default()
        }
    }

    /// Options with only an absolute deadline relative to now.
    #[must_use]
    pub fn expires_in(ttl: Duration) -> Self {
        Self {
            absolute_expiration_relative_to_now: Some(ttl),
            ..Self::default()
        }
    }

    fn resolve_absolute(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.absolute_expiration
            .or_else(|| self.absolute_expiration_relative_to_now.map(|ttl| now + ttl))
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    value: Vec<u8>,
    absolute_expiration: Option<DateTime<Utc>>,
    sliding_expiration: Option<Duration>,
    last_accessed: DateTime<Utc>,
}

impl CacheEntry {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        if let Some(deadline) = self.absolute_expiration {
            if deadline <= now {
                return true;
            }
        }
        if let Some(window) = self.sliding_expiration {
            if self.last_accessed + window <= now {
                return true;
            }
        }
        false
    }
}

/// Thread-safe byte store with per-entry absolute and sliding expiration.
///
/// Shared by all request-handling tasks; every operation synchronizes on
/// the entry's map shard only, so unrelated keys never contend.
#[derive(Debug)]
pub struct ExpiringStore {
    entries: DashMap<String, CacheEntry>,
    clock: Arc<dyn Clock>,
}

impl Default for ExpiringStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ExpiringStore {
    /// Create a store driven by the system clock.
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Create a store with an injected clock.
    #[must_use]
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: DashMap::new(),
            clock,
        }
    }

    /// Fetch a value, touching its sliding window.
    ///
    /// Returns `None` for unknown keys and for expired entries. An expired
    /// entry is removed under the same lock that checked it, so no
    /// concurrent ordering can observe stale data for the key.
    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        let now = self.clock.now();
        match self.entries.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().is_expired(now) {
                    trace!(key, "evicting expired cache entry on read");
                    occupied.remove();
                    None
                } else {
                    occupied.get_mut().last_accessed = now;
                    Some(occupied.get().value.clone())
                }
            }
            Entry::Vacant(_) => None,
        }
    }

    /// Insert or replace a value.
    pub fn set(&self, key: impl Into<String>, value: Vec<u8>, options: EntryOptions) {
        let now = self.clock.now();
        let entry = CacheEntry {
            value,
            absolute_expiration: options.resolve_absolute(now),
            sliding_expiration: options.sliding_expiration,
            last_accessed: now,
        };
        self.entries.insert(key.into(), entry);
    }

    /// Remove a key. Removing an absent key is a no-op.
    pub fn remove(&self, key: &str) {
        self.entries.remove(key);
    }

    /// Extend a live entry's sliding window without reading its value.
    ///
    /// A refresh never revives an expired entry; expired entries are
    /// removed here just as on `get`.
    pub fn refresh(&self, key: &str) {
        let now = self.clock.now();
        match self.entries.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().is_expired(now) {
                    occupied.remove();
                } else {
                    occupied.get_mut().last_accessed = now;
                }
            }
            Entry::Vacant(_) => {}
        }
    }

    /// Number of entries currently held, including not-yet-evicted expired
    /// ones.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no entries are held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
