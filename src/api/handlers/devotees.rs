//! Devotee records. Members may read their own profile and change only their
//! phone number; everything else is admin-only.

use axum::{
    extract::{Extension, Path},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use super::principal::{require_admin, require_auth, Principal};
use crate::{
    api::{
        error::{ApiError, MessageResponse},
        state::AppState,
    },
    identity::{
        models::normalize_email, Devotee, DevoteeUpdate, NewDevotee, NewDonation,
        SelfDevoteeUpdate,
    },
};

fn devotee_not_found() -> ApiError {
    ApiError::NotFound("Devotee not found".to_string())
}

/// Non-admins may only touch the devotee their user is linked to.
async fn ensure_owner(
    state: &AppState,
    principal: &Principal,
    devotee_id: Uuid,
    denied: &str,
) -> Result<(), ApiError> {
    if principal.is_admin() {
        return Ok(());
    }
    let user = state.identity().find_user(principal.user_id).await?;
    match user {
        Some(user) if user.devotee_id == Some(devotee_id) => Ok(()),
        _ => Err(ApiError::Forbidden(denied.to_string())),
    }
}

#[utoipa::path(
    get,
    path = "/api/devotees",
    responses(
        (status = 200, description = "All devotees", body = [Devotee]),
        (status = 401, description = "Not authenticated", body = MessageResponse),
        (status = 403, description = "Not an admin", body = MessageResponse)
    ),
    security(("bearer" = [])),
    tag = "devotees"
)]
pub async fn list_devotees(
    headers: HeaderMap,
    state: Extension<Arc<AppState>>,
) -> Result<Response, ApiError> {
    require_admin(&headers, &state)?;
    let devotees = state.devotees().list_devotees().await?;
    Ok((StatusCode::OK, Json(devotees)).into_response())
}

#[utoipa::path(
    post,
    path = "/api/devotees",
    request_body = NewDevotee,
    responses(
        (status = 201, description = "Devotee created", body = Devotee),
        (status = 400, description = "Invalid payload", body = MessageResponse),
        (status = 403, description = "Not an admin", body = MessageResponse),
        (status = 409, description = "Email already in use", body = MessageResponse)
    ),
    security(("bearer" = [])),
    tag = "devotees"
)]
pub async fn create_devotee(
    headers: HeaderMap,
    state: Extension<Arc<AppState>>,
    payload: Option<Json<NewDevotee>>,
) -> Result<Response, ApiError> {
    require_admin(&headers, &state)?;
    let Some(Json(mut devotee)) = payload else {
        return Err(ApiError::BadRequest("Missing payload".to_string()));
    };
    devotee.name = devotee.name.trim().to_string();
    if devotee.name.is_empty() {
        return Err(ApiError::BadRequest("Name is required".to_string()));
    }
    devotee.email = devotee.email.as_deref().and_then(normalize_email);

    let devotee = state.devotees().create_devotee(&devotee).await?;
    info!(devotee_id = %devotee.id, "Devotee created");
    Ok((StatusCode::CREATED, Json(devotee)).into_response())
}

#[utoipa::path(
    get,
    path = "/api/devotees/{id}",
    params(("id" = Uuid, Path, description = "Devotee id")),
    responses(
        (status = 200, description = "Devotee", body = Devotee),
        (status = 403, description = "Not the caller's own profile", body = MessageResponse),
        (status = 404, description = "Unknown devotee", body = MessageResponse)
    ),
    security(("bearer" = [])),
    tag = "devotees"
)]
pub async fn get_devotee(
    headers: HeaderMap,
    state: Extension<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    let principal = require_auth(&headers, &state)?;
    let devotee = state
        .devotees()
        .find_devotee(id)
        .await?
        .ok_or_else(devotee_not_found)?;
    ensure_owner(
        &state,
        &principal,
        id,
        "Access denied. You can only view your own profile.",
    )
    .await?;

    Ok((StatusCode::OK, Json(devotee)).into_response())
}

#[utoipa::path(
    patch,
    path = "/api/devotees/{id}",
    params(("id" = Uuid, Path, description = "Devotee id")),
    request_body = DevoteeUpdate,
    responses(
        (status = 200, description = "Updated devotee", body = Devotee),
        (status = 400, description = "Fields not allowed for the caller's role", body = MessageResponse),
        (status = 403, description = "Not the caller's own profile", body = MessageResponse),
        (status = 404, description = "Unknown devotee", body = MessageResponse)
    ),
    security(("bearer" = [])),
    tag = "devotees"
)]
pub async fn update_devotee(
    headers: HeaderMap,
    state: Extension<Arc<AppState>>,
    Path(id): Path<Uuid>,
    payload: Option<Json<serde_json::Value>>,
) -> Result<Response, ApiError> {
    let principal = require_auth(&headers, &state)?;
    ensure_owner(
        &state,
        &principal,
        id,
        "Access denied. You can only update your own profile.",
    )
    .await?;

    let Some(Json(body)) = payload else {
        return Err(ApiError::BadRequest("Missing payload".to_string()));
    };

    let mut update = if principal.is_admin() {
        serde_json::from_value::<DevoteeUpdate>(body)
            .map_err(|err| ApiError::BadRequest(format!("Invalid updates: {err}")))?
    } else {
        serde_json::from_value::<SelfDevoteeUpdate>(body)
            .map(DevoteeUpdate::from)
            .map_err(|_| {
                ApiError::BadRequest(
                    "Invalid updates. You can only update your phone number.".to_string(),
                )
            })?
    };
    update.email = update.email.as_deref().and_then(normalize_email);

    let devotee = state
        .devotees()
        .update_devotee(id, &update)
        .await?
        .ok_or_else(devotee_not_found)?;

    Ok((StatusCode::OK, Json(devotee)).into_response())
}

#[utoipa::path(
    delete,
    path = "/api/devotees/{id}",
    params(("id" = Uuid, Path, description = "Devotee id")),
    responses(
        (status = 200, description = "Devotee and linked users deleted", body = MessageResponse),
        (status = 403, description = "Not an admin", body = MessageResponse),
        (status = 404, description = "Unknown devotee", body = MessageResponse)
    ),
    security(("bearer" = [])),
    tag = "devotees"
)]
pub async fn delete_devotee(
    headers: HeaderMap,
    state: Extension<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    require_admin(&headers, &state)?;
    if !state.devotees().delete_devotee(id).await? {
        return Err(devotee_not_found());
    }
    info!(devotee_id = %id, "Devotee deleted");
    Ok((StatusCode::OK, Json(MessageResponse::new("Devotee deleted"))).into_response())
}

#[utoipa::path(
    post,
    path = "/api/devotees/{id}/donations",
    params(("id" = Uuid, Path, description = "Devotee id")),
    request_body = NewDonation,
    responses(
        (status = 201, description = "Donation appended", body = Devotee),
        (status = 400, description = "Invalid donation", body = MessageResponse),
        (status = 403, description = "Not an admin", body = MessageResponse),
        (status = 404, description = "Unknown devotee", body = MessageResponse)
    ),
    security(("bearer" = [])),
    tag = "devotees"
)]
pub async fn add_donation(
    headers: HeaderMap,
    state: Extension<Arc<AppState>>,
    Path(id): Path<Uuid>,
    payload: Option<Json<NewDonation>>,
) -> Result<Response, ApiError> {
    require_admin(&headers, &state)?;
    let Some(Json(donation)) = payload else {
        return Err(ApiError::BadRequest("Missing payload".to_string()));
    };
    if !donation.amount.is_finite() || donation.amount <= 0.0 {
        return Err(ApiError::BadRequest(
            "Donation amount must be positive".to_string(),
        ));
    }

    let donation = donation.into_donation(state.clock().now());
    let devotee = state
        .devotees()
        .add_donation(id, &donation)
        .await?
        .ok_or_else(devotee_not_found)?;

    Ok((StatusCode::CREATED, Json(devotee)).into_response())
}
