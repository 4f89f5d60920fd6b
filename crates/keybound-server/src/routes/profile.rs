//! The authenticated-profile endpoint.

use axum::{Extension, Json};
use serde::Serialize;

use crate::error::ApiError;
use crate::state::CurrentUser;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileResponse {
    pub user: ProfileUser,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUser {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
}

/// `GET /api/me`
///
/// Works for both authentication paths: cookie sessions carry name
/// claims on the ticket, token sessions carry only the subject.
pub async fn me(user: Option<Extension<CurrentUser>>) -> Result<Json<ProfileResponse>, ApiError> {
    let Some(Extension(user)) = user else {
        return Err(ApiError::unauthorized());
    };

    Ok(Json(ProfileResponse {
        user: ProfileUser {
            email: user.identity.clone(),
            first_name: user.claim_or_empty("firstname").to_string(),
            last_name: user.claim_or_empty("lastname").to_string(),
        },
    }))
}
