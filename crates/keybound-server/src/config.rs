//! Server configuration.
//!
//! Every knob has a working default so the binary runs with no
//! environment at all; operators override individual values through
//! `KEYBOUND_`-prefixed environment variables (`KEYBOUND_BIND_ADDR`,
//! `KEYBOUND_TOKEN_SECRET`, ...).

use serde::Deserialize;

/// Runtime configuration for the HTTP server.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Socket address the listener binds to.
    #[serde(default = "defaults::bind_addr")]
    pub bind_addr: String,

    /// Origin clients address the server by; proofs are validated against
    /// `public_origin + request path`, so it must match what the client
    /// signs.
    #[serde(default = "defaults::public_origin")]
    pub public_origin: String,

    /// Browser origin allowed by CORS (credentialed requests, so `*` is
    /// not an option).
    #[serde(default = "defaults::allowed_origin")]
    pub allowed_origin: String,

    /// Symmetric key for access-token signing. The default is for local
    /// development only.
    #[serde(default = "defaults::token_secret")]
    pub token_secret: String,

    /// `iss` claim on issued access tokens.
    #[serde(default = "defaults::token_issuer")]
    pub token_issuer: String,

    /// `aud` claim on issued access tokens.
    #[serde(default = "defaults::token_audience")]
    pub token_audience: String,

    /// Name of the session cookie.
    #[serde(default = "defaults::cookie_name")]
    pub cookie_name: String,

    /// Session ticket lifetime in seconds. Deliberately short so the
    /// expiry push is observable interactively.
    #[serde(default = "defaults::cookie_ttl_seconds")]
    pub cookie_ttl_seconds: i64,

    /// Access token validity in seconds.
    #[serde(default = "defaults::token_validity_seconds")]
    pub token_validity_seconds: i64,

    /// Liveness notifier tick interval in milliseconds.
    #[serde(default = "defaults::notify_interval_ms")]
    pub notify_interval_ms: u64,
}

impl ServerConfig {
    /// Load configuration from the environment, falling back to defaults
    /// for anything unset.
    ///
    /// # Errors
    /// Returns a `ConfigError` when a set variable fails to deserialize
    /// into its field type.
    pub fn load() -> Result<Self, ::config::ConfigError> {
        ::config::Config::builder()
            .add_source(::config::Environment::with_prefix("KEYBOUND"))
            .build()?
            .try_deserialize()
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: defaults::bind_addr(),
            public_origin: defaults::public_origin(),
            allowed_origin: defaults::allowed_origin(),
            token_secret: defaults::token_secret(),
            token_issuer: defaults::token_issuer(),
            token_audience: defaults::token_audience(),
            cookie_name: defaults::cookie_name(),
            cookie_ttl_seconds: defaults::cookie_ttl_seconds(),
            token_validity_seconds: defaults::token_validity_seconds(),
            notify_interval_ms: defaults::notify_interval_ms(),
        }
    }
}

mod defaults {
    pub fn bind_addr() -> String {
        "127.0.0.1:8080".to_string()
    }

    pub fn public_origin() -> String {
        "http://localhost:8080".to_string()
    }

    pub fn allowed_origin() -> String {
        "http://localhost:4200".to_string()
    }

    pub fn token_secret() -> String {
        "keybound-dev-secret-do-not-use-in-production".to_string()
    }

    pub fn token_issuer() -> String {
        "http://localhost:8080".to_string()
    }

    pub fn token_audience() -> String {
        "keybound-api".to_string()
    }

    pub fn cookie_name() -> String {
        "keybound.session".to_string()
    }

    pub fn cookie_ttl_seconds() -> i64 {
        30
    }

    pub fn token_validity_seconds() -> i64 {
        3600
    }

    pub fn notify_interval_ms() -> u64 {
        1000
    }
}
