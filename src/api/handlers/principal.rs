//! Bearer credential extraction and role checks.

use axum::http::{header::AUTHORIZATION, HeaderMap};
use uuid::Uuid;

use crate::{
    api::{error::ApiError, state::AppState},
    identity::Role,
};

/// Authenticated caller derived from the bearer credential.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Principal {
    pub user_id: Uuid,
    pub role: Role,
}

impl Principal {
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

pub(crate) fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let trimmed = value.trim();
    let token = trimmed
        .strip_prefix("Bearer ")
        .or_else(|| trimmed.strip_prefix("bearer "))?
        .trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

/// Resolve the bearer credential into a principal, or 401.
///
/// # Errors
/// Unauthorized when the header is missing, the token is invalid, or it expired.
pub fn require_auth(headers: &HeaderMap, state: &AppState) -> Result<Principal, ApiError> {
    let token = extract_bearer_token(headers).ok_or_else(|| {
        ApiError::Unauthorized("No token provided, authorization denied".to_string())
    })?;
    let claims = state.sessions().verify(&token)?;
    Ok(Principal {
        user_id: claims.sub,
        role: claims.role,
    })
}

/// Like `require_auth`, then 403 for non-admins.
///
/// # Errors
/// Unauthorized as in `require_auth`, Forbidden for non-admin callers.
pub fn require_admin(headers: &HeaderMap, state: &AppState) -> Result<Principal, ApiError> {
    let principal = require_auth(headers, state)?;
    if principal.is_admin() {
        Ok(principal)
    } else {
        Err(ApiError::Forbidden(
            "Access denied. Admin privileges required.".to_string(),
        ))
    }
}

/// Devotee profile linked to the caller's user.
///
/// # Errors
/// NotFound when the user is gone, BadRequest when it has no profile yet.
pub async fn caller_devotee_id(state: &AppState, principal: &Principal) -> Result<Uuid, ApiError> {
    let user = state
        .identity()
        .find_user(principal.user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;
    user.devotee_id.ok_or_else(|| {
        ApiError::BadRequest("Complete your devotee registration first".to_string())
    })
}
