//! Resolves the calling user for each request.
//!
//! The caller's user id arrives in `X-User-Id`, set by the API Gateway
//! authorizer in front of the Lambda. The role always comes from the stored
//! user record, never from the request.

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use domain::Principal;

use crate::error::ApiError;
use crate::routes::AppState;

pub const USER_ID_HEADER: &str = "x-user-id";

pub struct CurrentPrincipal(pub Principal);

#[async_trait]
impl FromRequestParts<AppState> for CurrentPrincipal {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or(domain::Error::Unauthorized)?;

        let user = state
            .workflow
            .store()
            .get_user(user_id)
            .await?
            .ok_or(domain::Error::Unauthorized)?;

        Ok(Self(Principal::from(&user)))
    }
}
