//! Request layers.
//!
//! Ordering matters: the proof-of-possession layer runs first and, when a
//! DPoP-scheme token is presented, either authenticates the request or
//! rejects it outright. The cookie layer runs next and only fills in a
//! principal if the proof layer left the request anonymous.

pub mod cookie;
pub mod dpop;
