//! Shared application state.

use std::sync::Arc;
use std::time::Duration;

use keybound_cache::ExpiringStore;
use keybound_dpop::{InMemoryReplayGuard, ProofValidator, TokenIssuer};
use keybound_session::{InMemoryTicketStore, SessionLivenessNotifier, TicketStore};

use crate::config::ServerConfig;
use crate::credentials::{CredentialCheck, DemoCredentials};

/// The authenticated principal for one request, attached as a request
/// extension by whichever layer established it (proof-of-possession
/// token or session cookie). Handlers that require authentication
/// extract it; its absence means the request is anonymous.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    /// Session key / token subject.
    pub identity: String,
    /// Claims carried by the ticket, empty for token-authenticated
    /// requests.
    pub claims: Vec<(String, String)>,
}

impl CurrentUser {
    /// First claim value of the given type, or `""`.
    #[must_use]
    pub fn claim_or_empty(&self, claim_type: &str) -> &str {
        self.claims
            .iter()
            .find(|(ty, _)| ty == claim_type)
            .map_or("", |(_, value)| value.as_str())
    }
}

/// Everything the handlers and layers share. Cheap to clone; all stores
/// are behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    /// Session tickets, keyed by identity.
    pub tickets: Arc<dyn TicketStore>,
    /// Opaque cookie id -> identity, with a sliding window matching the
    /// cookie lifetime.
    pub cookie_index: Arc<ExpiringStore>,
    pub validator: Arc<ProofValidator>,
    pub token_issuer: Arc<TokenIssuer>,
    pub notifier: SessionLivenessNotifier,
    pub credentials: Arc<dyn CredentialCheck>,
}

impl AppState {
    /// Wire up in-memory stores from the configuration.
    #[must_use]
    pub fn new(config: ServerConfig) -> Self {
        let tickets: Arc<dyn TicketStore> = Arc::new(InMemoryTicketStore::new());
        let notifier = SessionLivenessNotifier::new(Arc::clone(&tickets))
            .with_interval(Duration::from_millis(config.notify_interval_ms));
        let token_issuer = TokenIssuer::new(
            config.token_secret.clone().into_bytes(),
            config.token_issuer.clone(),
            config.token_audience.clone(),
        )
        .with_validity(config.token_validity_seconds);

        Self {
            config: Arc::new(config),
            tickets,
            cookie_index: Arc::new(ExpiringStore::new()),
            validator: Arc::new(ProofValidator::new(Arc::new(InMemoryReplayGuard::new()))),
            token_issuer: Arc::new(token_issuer),
            notifier,
            credentials: Arc::new(DemoCredentials),
        }
    }

    /// Swap the credential backend (tests, alternative stores).
    #[must_use]
    pub fn with_credentials(mut self, credentials: Arc<dyn CredentialCheck>) -> Self {
        self.credentials = credentials;
        self
    }

    /// Absolute URI a proof for `path` must be bound to.
    #[must_use]
    pub fn request_uri(&self, path: &str) -> String {
        format!(
            "{}{}",
            self.config.public_origin.trim_end_matches('/'),
            path
        )
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
