//! Session tickets.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Claim type whose value keys the session store.
///
/// The key is the verified identity, not a random id: one user has at
/// most one live ticket.
pub const IDENTITY_CLAIM: &str = "email";

/// One authenticated session record.
///
/// Claims are an ordered list of `(type, value)` pairs, preserved in the
/// order they were added. `expires_at = None` means the ticket never
/// expires on its own (sign-out still removes it).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionTicket {
    claims: Vec<(String, String)>,
    /// Absolute expiry; compared against wall-clock time only.
    pub expires_at: Option<DateTime<Utc>>,
}

impl SessionTicket {
    /// Empty ticket with no claims and no expiry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            claims: Vec::new(),
            expires_at: None,
        }
    }

    /// Append a claim, preserving insertion order.
    #[must_use]
    pub fn with_claim(mut self, claim_type: impl Into<String>, value: impl Into<String>) -> Self {
        self.claims.push((claim_type.into(), value.into()));
        self
    }

    /// Set the absolute expiry.
    #[must_use]
    pub fn expiring_at(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    /// First claim value of the given type.
    #[must_use]
    pub fn claim(&self, claim_type: &str) -> Option<&str> {
        self.claims
            .iter()
            .find(|(ty, _)| ty == claim_type)
            .map(|(_, value)| value.as_str())
    }

    /// All claims in insertion order.
    #[must_use]
    pub fn claims(&self) -> &[(String, String)] {
        &self.claims
    }

    /// The identity this ticket would be keyed by, if present.
    #[must_use]
    pub fn identity(&self) -> Option<&str> {
        self.claim(IDENTITY_CLAIM)
    }

    /// Whether the ticket's expiry has passed at `now`.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at < now)
    }
}

impl Default for SessionTicket {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use pretty_assertions::assert_eq;

    #[test]
    fn claims_preserve_insertion_order() {
        let ticket = SessionTicket::new()
            .with_claim("firstname", "Kevin")
            .with_claim(IDENTITY_CLAIM, "u@x.com")
            .with_claim("lastname", "Dockx");

        let types: Vec<&str> = ticket.claims().iter().map(|(ty, _)| ty.as_str()).collect();
        assert_eq!(types, vec!["firstname", IDENTITY_CLAIM, "lastname"]);
        assert_eq!(ticket.identity(), Some("u@x.com"));
    }

    #[test]
    fn ticket_without_expiry_never_expires() {
        let ticket = SessionTicket::new();
        assert!(!ticket.is_expired(Utc::now() + Duration::days(365)));
    }

    #[test]
    fn expiry_is_a_strict_deadline() {
        let now = Utc::now();
        let ticket = SessionTicket::new().expiring_at(now);
        assert!(!ticket.is_expired(now));
        assert!(ticket.is_expired(now + Duration::seconds(1)));
    }
}
