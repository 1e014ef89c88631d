use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::HeaderMap;

use crate::errors::AppError;
use crate::models::Actor;

/// Set by the identity proxy in front of this service.
pub const USER_ID_HEADER: &str = "x-user-id";
pub const MEMBERSHIP_HEADER: &str = "x-membership-tier";

const MEMBER_TIER: &str = "beberia";

pub fn actor_from_headers(headers: &HeaderMap) -> Result<Actor, AppError> {
    let user_id = headers
        .get(USER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or(AppError::Unauthorized)?;

    let is_beberia_member = headers
        .get(MEMBERSHIP_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|tier| tier.trim().eq_ignore_ascii_case(MEMBER_TIER))
        .unwrap_or(false);

    Ok(Actor::new(user_id, is_beberia_member))
}

#[async_trait]
impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        actor_from_headers(&parts.headers)
    }
}

/// Staff endpoints share a single bearer token.
pub fn check_admin(headers: &HeaderMap, expected_token: &str) -> Result<(), AppError> {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    let token = auth.strip_prefix("Bearer ").unwrap_or("");
    if token.is_empty() || token != expected_token {
        return Err(AppError::Unauthorized);
    }
    Ok(())
}
