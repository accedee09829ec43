//! Temple events. Anyone may browse; admins manage them and signed-in
//! members sign up for events that take registrations.

use axum::{
    extract::{Extension, Path},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use super::principal::{caller_devotee_id, require_admin, require_auth};
use crate::{
    api::{
        error::{ApiError, MessageResponse},
        state::AppState,
    },
    identity::{Event, EventRegistration, EventUpdate, NewEvent},
};

fn event_not_found() -> ApiError {
    ApiError::NotFound("Event not found".to_string())
}

fn validate_capacity(max_attendees: Option<i32>) -> Result<(), ApiError> {
    match max_attendees {
        Some(max) if max < 1 => Err(ApiError::BadRequest(
            "maxAttendees must be at least 1".to_string(),
        )),
        _ => Ok(()),
    }
}

/// Midnight UTC of the day `now` falls on.
fn start_of_day(now: DateTime<Utc>) -> DateTime<Utc> {
    now.date_naive()
        .and_hms_opt(0, 0, 0)
        .map_or(now, |midnight| midnight.and_utc())
}

#[utoipa::path(
    get,
    path = "/api/events",
    responses(
        (status = 200, description = "Every event, soonest first", body = [Event])
    ),
    tag = "events"
)]
pub async fn list_events(state: Extension<Arc<AppState>>) -> Result<Response, ApiError> {
    let events = state.events().list_events().await?;
    Ok((StatusCode::OK, Json(events)).into_response())
}

#[utoipa::path(
    get,
    path = "/api/events/upcoming",
    responses(
        (status = 200, description = "Active events from today on", body = [Event])
    ),
    tag = "events"
)]
pub async fn upcoming_events(state: Extension<Arc<AppState>>) -> Result<Response, ApiError> {
    let today = start_of_day(state.clock().now());
    let events = state.events().list_upcoming_events(today).await?;
    Ok((StatusCode::OK, Json(events)).into_response())
}

#[utoipa::path(
    post,
    path = "/api/events",
    request_body = NewEvent,
    responses(
        (status = 201, description = "Event created", body = Event),
        (status = 400, description = "Invalid event", body = MessageResponse),
        (status = 403, description = "Not an admin", body = MessageResponse)
    ),
    security(("bearer" = [])),
    tag = "events"
)]
pub async fn create_event(
    headers: HeaderMap,
    state: Extension<Arc<AppState>>,
    payload: Option<Json<NewEvent>>,
) -> Result<Response, ApiError> {
    require_admin(&headers, &state)?;
    let Some(Json(event)) = payload else {
        return Err(ApiError::BadRequest("Missing payload".to_string()));
    };
    if event.title.trim().is_empty() {
        return Err(ApiError::BadRequest("Title is required".to_string()));
    }
    validate_capacity(event.max_attendees)?;

    let event = state.events().create_event(&event).await?;
    info!(event_id = %event.id, "Event created");
    Ok((StatusCode::CREATED, Json(event)).into_response())
}

#[utoipa::path(
    get,
    path = "/api/events/{id}",
    params(("id" = Uuid, Path, description = "Event id")),
    responses(
        (status = 200, description = "Event", body = Event),
        (status = 404, description = "Unknown event", body = MessageResponse)
    ),
    tag = "events"
)]
pub async fn get_event(
    state: Extension<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    let event = state
        .events()
        .find_event(id)
        .await?
        .ok_or_else(event_not_found)?;
    Ok((StatusCode::OK, Json(event)).into_response())
}

#[utoipa::path(
    patch,
    path = "/api/events/{id}",
    params(("id" = Uuid, Path, description = "Event id")),
    request_body = EventUpdate,
    responses(
        (status = 200, description = "Updated event", body = Event),
        (status = 400, description = "Invalid update", body = MessageResponse),
        (status = 403, description = "Not an admin", body = MessageResponse),
        (status = 404, description = "Unknown event", body = MessageResponse)
    ),
    security(("bearer" = [])),
    tag = "events"
)]
pub async fn update_event(
    headers: HeaderMap,
    state: Extension<Arc<AppState>>,
    Path(id): Path<Uuid>,
    payload: Option<Json<EventUpdate>>,
) -> Result<Response, ApiError> {
    require_admin(&headers, &state)?;
    let Some(Json(update)) = payload else {
        return Err(ApiError::BadRequest("Invalid updates".to_string()));
    };
    validate_capacity(update.max_attendees)?;

    let event = state
        .events()
        .update_event(id, &update)
        .await?
        .ok_or_else(event_not_found)?;
    Ok((StatusCode::OK, Json(event)).into_response())
}

#[utoipa::path(
    delete,
    path = "/api/events/{id}",
    params(("id" = Uuid, Path, description = "Event id")),
    responses(
        (status = 200, description = "Event deleted", body = MessageResponse),
        (status = 403, description = "Not an admin", body = MessageResponse),
        (status = 404, description = "Unknown event", body = MessageResponse)
    ),
    security(("bearer" = [])),
    tag = "events"
)]
pub async fn delete_event(
    headers: HeaderMap,
    state: Extension<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    require_admin(&headers, &state)?;
    if !state.events().delete_event(id).await? {
        return Err(event_not_found());
    }
    info!(event_id = %id, "Event deleted");
    Ok((
        StatusCode::OK,
        Json(MessageResponse::new("Event deleted successfully")),
    )
        .into_response())
}

#[utoipa::path(
    post,
    path = "/api/events/{id}/register",
    params(("id" = Uuid, Path, description = "Event id")),
    responses(
        (status = 200, description = "Signed up; the updated event", body = Event),
        (status = 400, description = "No registration, full, or already signed up", body = MessageResponse),
        (status = 401, description = "Not authenticated", body = MessageResponse),
        (status = 404, description = "Unknown event", body = MessageResponse)
    ),
    security(("bearer" = [])),
    tag = "events"
)]
pub async fn register_for_event(
    headers: HeaderMap,
    state: Extension<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    let principal = require_auth(&headers, &state)?;
    let devotee_id = caller_devotee_id(&state, &principal).await?;

    match state.events().register_for_event(id, devotee_id).await? {
        EventRegistration::Registered(event) => {
            info!(event_id = %id, devotee_id = %devotee_id, "Devotee signed up for event");
            Ok((StatusCode::OK, Json(event)).into_response())
        }
        EventRegistration::NotFound => Err(event_not_found()),
        EventRegistration::NotRequired => Err(ApiError::BadRequest(
            "Registration is not required for this event".to_string(),
        )),
        EventRegistration::Full => Err(ApiError::BadRequest("Event is full".to_string())),
        EventRegistration::AlreadyRegistered => Err(ApiError::BadRequest(
            "You are already registered for this event".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn start_of_day_truncates_to_midnight() {
        let evening = Utc.with_ymd_and_hms(2024, 11, 1, 19, 30, 0).single();
        let midnight = Utc.with_ymd_and_hms(2024, 11, 1, 0, 0, 0).single();
        assert!(evening.is_some());
        assert_eq!(evening.map(start_of_day), midnight);
    }

    #[test]
    fn capacity_must_be_positive() {
        assert!(validate_capacity(None).is_ok());
        assert!(validate_capacity(Some(1)).is_ok());
        assert!(validate_capacity(Some(0)).is_err());
    }
}
