//! Caller identity.
//!
//! Credentials are verified by the authenticating proxy in front of this
//! service, which forwards the resolved user id in `X-User-Id`.

use crate::api::routes::{ApiError, ApiState};
use crate::db::{Database, UserRow};
use axum::async_trait;
use axum::extract::FromRequestParts;
use http::HeaderName;
use http::request::Parts;

pub const USER_ID_HEADER: HeaderName = HeaderName::from_static("x-user-id");

/// Extractor that requires a known user.
///
/// Missing header → 401, malformed id → 400, unknown user → 404.
pub struct CurrentUser(pub UserRow);

#[async_trait]
impl FromRequestParts<ApiState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &ApiState,
    ) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(&USER_ID_HEADER)
            .ok_or_else(|| ApiError::Unauthorized("Authentication header is missing".to_string()))?;

        let user_id = raw
            .to_str()
            .ok()
            .and_then(|value| value.trim().parse::<i64>().ok())
            .ok_or_else(|| ApiError::BadRequest("Invalid user id".to_string()))?;

        let database = Database::open(&state.config.db_path)?;
        let user = database
            .user(user_id)?
            .ok_or_else(|| ApiError::NotFound("User does not exist".to_string()))?;

        Ok(Self(user))
    }
}
