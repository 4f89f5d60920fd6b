//! # Keybound Server
//!
//! The HTTP surface over the keybound crates: credential sign-in with
//! either a short-lived cookie session or a key-bound access token, a
//! proof-of-possession request layer, and a server-sent event stream
//! that pushes session expiry to connected clients.

pub mod config;
pub mod credentials;
pub mod error;
pub mod layers;
pub mod routes;
pub mod state;

use axum::http::{HeaderName, HeaderValue, Method, header};
use axum::routing::{get, post};
use axum::{Router, middleware};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::warn;

pub use config::ServerConfig;
pub use state::{AppState, CurrentUser};

/// Build the application router over shared state.
///
/// The proof-of-possession layer is outermost so a DPoP-scheme request
/// is settled before the cookie layer ever looks at it.
pub fn router(state: AppState) -> Router {
    let cors = cors_layer(&state);

    Router::new()
        .route("/api/sign-in", post(routes::auth::sign_in))
        .route("/api/sign-in-token", post(routes::auth::sign_in_token))
        .route("/api/sign-out", post(routes::auth::sign_out))
        .route("/api/remove-session", post(routes::auth::remove_session))
        .route("/api/me", get(routes::profile::me))
        .route(
            "/api/notifications/sse",
            get(routes::notifications::cookie_expiry),
        )
        .layer(middleware::from_fn_with_state(
            state.clone(),
            layers::cookie::cookie_session_layer,
        ))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            layers::dpop::dpop_layer,
        ))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(state: &AppState) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            HeaderName::from_static("dpop"),
        ])
        .allow_credentials(true);

    match state.config.allowed_origin.parse::<HeaderValue>() {
        Ok(origin) => cors.allow_origin(origin),
        Err(error) => {
            warn!(
                %error,
                allowed_origin = %state.config.allowed_origin,
                "allowed_origin is not a valid header value; cross-origin requests will be refused"
            );
            cors
        }
    }
}
