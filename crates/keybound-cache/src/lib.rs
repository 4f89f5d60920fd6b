//! # Keybound Cache
//!
//! A thread-safe, in-process key/value store with per-entry absolute and
//! sliding expiration. This is the backing store for the cookie/session
//! index in `keybound-server`; a durable backend (Redis, a database) is a
//! drop-in replacement behind the same operations.
//!
//! ## Semantics
//!
//! - An entry is logically expired once its absolute deadline has passed
//!   **or** `last_accessed + sliding_expiration` has passed.
//! - Expired entries are evicted lazily on the next access; there is no
//!   background sweep.
//! - All per-key operations are linearizable: the expiration check and the
//!   removal happen under the entry's shard lock, so a concurrent reader
//!   can never observe stale data for an expired key.
//!
//! Time is injected through the [`Clock`] trait so expiration behavior is
//! testable without real sleeps (enable the `test-util` feature for
//! [`ManualClock`]).

pub mod clock;
pub mod store;

pub use clock::{Clock, SystemClock};
pub use store::{EntryOptions, ExpiringStore};

#[cfg(any(test, feature = "test-util"))]
pub use clock::ManualClock;
