//! Temple announcements: public reads, admin writes.

use axum::{
    extract::{Extension, Path},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

use super::principal::require_admin;
use crate::{
    api::{
        error::{ApiError, MessageResponse},
        state::AppState,
    },
    identity::{Announcement, AnnouncementUpdate, NewAnnouncement},
};

fn announcement_not_found() -> ApiError {
    ApiError::NotFound("Announcement not found".to_string())
}

#[utoipa::path(
    get,
    path = "/api/announcements",
    responses(
        (status = 200, description = "Active announcements by start date", body = [Announcement])
    ),
    tag = "announcements"
)]
pub async fn list_announcements(state: Extension<Arc<AppState>>) -> Result<Response, ApiError> {
    let announcements = state.announcements().list_active_announcements().await?;
    Ok((StatusCode::OK, Json(announcements)).into_response())
}

#[utoipa::path(
    post,
    path = "/api/announcements",
    request_body = NewAnnouncement,
    responses(
        (status = 201, description = "Announcement created", body = Announcement),
        (status = 400, description = "Invalid announcement", body = MessageResponse),
        (status = 403, description = "Not an admin", body = MessageResponse)
    ),
    security(("bearer" = [])),
    tag = "announcements"
)]
pub async fn create_announcement(
    headers: HeaderMap,
    state: Extension<Arc<AppState>>,
    payload: Option<Json<NewAnnouncement>>,
) -> Result<Response, ApiError> {
    require_admin(&headers, &state)?;
    let Some(Json(announcement)) = payload else {
        return Err(ApiError::BadRequest("Missing payload".to_string()));
    };
    if announcement.title.trim().is_empty() {
        return Err(ApiError::BadRequest("Title is required".to_string()));
    }
    if announcement.end_date < announcement.start_date {
        return Err(ApiError::BadRequest(
            "End date must not be before start date".to_string(),
        ));
    }

    let announcement = state
        .announcements()
        .create_announcement(&announcement)
        .await?;
    Ok((StatusCode::CREATED, Json(announcement)).into_response())
}

#[utoipa::path(
    get,
    path = "/api/announcements/{id}",
    params(("id" = Uuid, Path, description = "Announcement id")),
    responses(
        (status = 200, description = "Announcement", body = Announcement),
        (status = 404, description = "Unknown announcement", body = MessageResponse)
    ),
    tag = "announcements"
)]
pub async fn get_announcement(
    state: Extension<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    let announcement = state
        .announcements()
        .find_announcement(id)
        .await?
        .ok_or_else(announcement_not_found)?;
    Ok((StatusCode::OK, Json(announcement)).into_response())
}

#[utoipa::path(
    patch,
    path = "/api/announcements/{id}",
    params(("id" = Uuid, Path, description = "Announcement id")),
    request_body = AnnouncementUpdate,
    responses(
        (status = 200, description = "Updated announcement", body = Announcement),
        (status = 400, description = "Invalid update", body = MessageResponse),
        (status = 403, description = "Not an admin", body = MessageResponse),
        (status = 404, description = "Unknown announcement", body = MessageResponse)
    ),
    security(("bearer" = [])),
    tag = "announcements"
)]
pub async fn update_announcement(
    headers: HeaderMap,
    state: Extension<Arc<AppState>>,
    Path(id): Path<Uuid>,
    payload: Option<Json<AnnouncementUpdate>>,
) -> Result<Response, ApiError> {
    require_admin(&headers, &state)?;
    let Some(Json(update)) = payload else {
        return Err(ApiError::BadRequest("Invalid updates".to_string()));
    };

    let announcement = state
        .announcements()
        .update_announcement(id, &update)
        .await?
        .ok_or_else(announcement_not_found)?;
    Ok((StatusCode::OK, Json(announcement)).into_response())
}

#[utoipa::path(
    delete,
    path = "/api/announcements/{id}",
    params(("id" = Uuid, Path, description = "Announcement id")),
    responses(
        (status = 200, description = "Announcement deleted", body = MessageResponse),
        (status = 403, description = "Not an admin", body = MessageResponse),
        (status = 404, description = "Unknown announcement", body = MessageResponse)
    ),
    security(("bearer" = [])),
    tag = "announcements"
)]
pub async fn delete_announcement(
    headers: HeaderMap,
    state: Extension<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    require_admin(&headers, &state)?;
    if !state.announcements().delete_announcement(id).await? {
        return Err(announcement_not_found());
    }
    Ok((
        StatusCode::OK,
        Json(MessageResponse::new("Announcement deleted")),
    )
        .into_response())
}
