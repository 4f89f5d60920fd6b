//! HTTP error mapping.
//!
//! Internal error detail is logged at the point of conversion and never
//! echoed to clients; response bodies carry only a generic message for
//! the status class.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use tracing::warn;

use keybound_dpop::{DpopError, ErrorClass};
use keybound_session::SessionError;

/// A response-ready error: status code plus a client-safe message.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: &'static str,
}

impl ApiError {
    #[must_use]
    pub fn bad_request() -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: "invalid request",
        }
    }

    #[must_use]
    pub fn unauthorized() -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            message: "authentication failed",
        }
    }

    #[must_use]
    pub fn unavailable() -> Self {
        Self {
            status: StatusCode::SERVICE_UNAVAILABLE,
            message: "service temporarily unavailable",
        }
    }

    #[must_use]
    pub fn internal() -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: "internal server error",
        }
    }

    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<DpopError> for ApiError {
    fn from(error: DpopError) -> Self {
        let class = error.class();
        warn!(%error, ?class, "proof-of-possession check failed");
        match class {
            ErrorClass::Malformed => Self::bad_request(),
            ErrorClass::Invalid => Self::unauthorized(),
            ErrorClass::Unavailable => Self::unavailable(),
            ErrorClass::Internal => Self::internal(),
        }
    }
}

impl From<SessionError> for ApiError {
    fn from(error: SessionError) -> Self {
        warn!(%error, "session store operation failed");
        match error {
            SessionError::StoreUnavailable { .. } => Self::unavailable(),
            SessionError::InvalidTicket => Self::internal(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "message": self.message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_proof_maps_to_400() {
        let err = ApiError::from(DpopError::MalformedProof {
            reason: "bad typ".into(),
        });
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn replay_maps_to_401() {
        let err = ApiError::from(DpopError::ReplayDetected {
            nonce: "abc".into(),
        });
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn store_failure_maps_to_503() {
        let err = ApiError::from(SessionError::StoreUnavailable {
            reason: "down".into(),
        });
        assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
