//! # Keybound Session
//!
//! Server-side session records decoupled from the transport cookie. A
//! [`SessionTicket`] holds the authenticated principal's claims and an
//! expiry; the [`TicketStore`] keeps exactly one ticket per identity
//! (keyed by the verified email claim, so a second sign-in overwrites the
//! first). The [`SessionLivenessNotifier`] drives the server-push stream
//! that tells a connected client when its session has lapsed.
//!
//! Ticket expiry is a plain wall-clock comparison against `expires_at`;
//! none of the sliding-window cache semantics apply at this layer.

pub mod notifier;
pub mod store;
pub mod ticket;

pub use notifier::{LivenessEvent, SessionLivenessNotifier};
pub use store::{InMemoryTicketStore, SessionError, TicketStore};
pub use ticket::{IDENTITY_CLAIM, SessionTicket};
