//! HTTP handlers.

pub mod auth;
pub mod notifications;
pub mod profile;
