//! Puja catalogue and bookings.
//!
//! The catalogue is public and admin-managed. Members book a puja for their
//! own devotee profile, see and cancel their own bookings; admins see every
//! booking and move it through its statuses.

use axum::{
    extract::{Extension, Path},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;
use utoipa::ToSchema;
use uuid::Uuid;

use super::principal::{caller_devotee_id, require_admin, require_auth};
use crate::{
    api::{
        error::{ApiError, MessageResponse},
        state::AppState,
    },
    identity::{
        BookingCancellation, BookingRequest, BookingStatus, NewPuja, Puja, PujaBooking,
        PujaUpdate,
    },
};

#[derive(Clone, Debug, Deserialize, ToSchema)]
pub struct BookingStatusUpdate {
    pub status: BookingStatus,
}

fn puja_not_found() -> ApiError {
    ApiError::NotFound("Puja not found".to_string())
}

fn booking_not_found() -> ApiError {
    ApiError::NotFound("Booking not found".to_string())
}

fn validate_cost(cost: f64) -> Result<(), ApiError> {
    if cost.is_finite() && cost >= 0.0 {
        Ok(())
    } else {
        Err(ApiError::BadRequest(
            "Cost must be zero or more".to_string(),
        ))
    }
}

#[utoipa::path(
    get,
    path = "/api/pujas",
    responses(
        (status = 200, description = "Active pujas", body = [Puja])
    ),
    tag = "pujas"
)]
pub async fn list_pujas(state: Extension<Arc<AppState>>) -> Result<Response, ApiError> {
    let pujas = state.pujas().list_active_pujas().await?;
    Ok((StatusCode::OK, Json(pujas)).into_response())
}

#[utoipa::path(
    post,
    path = "/api/pujas",
    request_body = NewPuja,
    responses(
        (status = 201, description = "Puja created", body = Puja),
        (status = 400, description = "Invalid puja", body = MessageResponse),
        (status = 403, description = "Not an admin", body = MessageResponse)
    ),
    security(("bearer" = [])),
    tag = "pujas"
)]
pub async fn create_puja(
    headers: HeaderMap,
    state: Extension<Arc<AppState>>,
    payload: Option<Json<NewPuja>>,
) -> Result<Response, ApiError> {
    require_admin(&headers, &state)?;
    let Some(Json(puja)) = payload else {
        return Err(ApiError::BadRequest("Missing payload".to_string()));
    };
    if puja.name.trim().is_empty() {
        return Err(ApiError::BadRequest("Name is required".to_string()));
    }
    validate_cost(puja.cost)?;

    let puja = state.pujas().create_puja(&puja).await?;
    info!(puja_id = %puja.id, "Puja created");
    Ok((StatusCode::CREATED, Json(puja)).into_response())
}

#[utoipa::path(
    get,
    path = "/api/pujas/{id}",
    params(("id" = Uuid, Path, description = "Puja id")),
    responses(
        (status = 200, description = "Puja", body = Puja),
        (status = 404, description = "Unknown puja", body = MessageResponse)
    ),
    tag = "pujas"
)]
pub async fn get_puja(
    state: Extension<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    let puja = state
        .pujas()
        .find_puja(id)
        .await?
        .ok_or_else(puja_not_found)?;
    Ok((StatusCode::OK, Json(puja)).into_response())
}

#[utoipa::path(
    patch,
    path = "/api/pujas/{id}",
    params(("id" = Uuid, Path, description = "Puja id")),
    request_body = PujaUpdate,
    responses(
        (status = 200, description = "Updated puja", body = Puja),
        (status = 400, description = "Invalid update", body = MessageResponse),
        (status = 403, description = "Not an admin", body = MessageResponse),
        (status = 404, description = "Unknown puja", body = MessageResponse)
    ),
    security(("bearer" = [])),
    tag = "pujas"
)]
pub async fn update_puja(
    headers: HeaderMap,
    state: Extension<Arc<AppState>>,
    Path(id): Path<Uuid>,
    payload: Option<Json<PujaUpdate>>,
) -> Result<Response, ApiError> {
    require_admin(&headers, &state)?;
    let Some(Json(update)) = payload else {
        return Err(ApiError::BadRequest("Invalid updates".to_string()));
    };
    if let Some(cost) = update.cost {
        validate_cost(cost)?;
    }

    let puja = state
        .pujas()
        .update_puja(id, &update)
        .await?
        .ok_or_else(puja_not_found)?;
    Ok((StatusCode::OK, Json(puja)).into_response())
}

#[utoipa::path(
    delete,
    path = "/api/pujas/{id}",
    params(("id" = Uuid, Path, description = "Puja id")),
    responses(
        (status = 200, description = "Puja and its bookings deleted", body = MessageResponse),
        (status = 403, description = "Not an admin", body = MessageResponse),
        (status = 404, description = "Unknown puja", body = MessageResponse)
    ),
    security(("bearer" = [])),
    tag = "pujas"
)]
pub async fn delete_puja(
    headers: HeaderMap,
    state: Extension<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    require_admin(&headers, &state)?;
    if !state.pujas().delete_puja(id).await? {
        return Err(puja_not_found());
    }
    info!(puja_id = %id, "Puja deleted");
    Ok((
        StatusCode::OK,
        Json(MessageResponse::new("Puja deleted successfully")),
    )
        .into_response())
}

#[utoipa::path(
    post,
    path = "/api/pujas/book",
    request_body = BookingRequest,
    responses(
        (status = 201, description = "Booking created at the puja's cost", body = PujaBooking),
        (status = 400, description = "Invalid booking", body = MessageResponse),
        (status = 401, description = "Not authenticated", body = MessageResponse),
        (status = 404, description = "Unknown or inactive puja", body = MessageResponse)
    ),
    security(("bearer" = [])),
    tag = "pujas"
)]
pub async fn book_puja(
    headers: HeaderMap,
    state: Extension<Arc<AppState>>,
    payload: Option<Json<BookingRequest>>,
) -> Result<Response, ApiError> {
    let principal = require_auth(&headers, &state)?;
    let Some(Json(request)) = payload else {
        return Err(ApiError::BadRequest("Missing payload".to_string()));
    };
    if request.time.trim().is_empty() {
        return Err(ApiError::BadRequest("Time is required".to_string()));
    }
    let devotee_id = caller_devotee_id(&state, &principal).await?;

    let booking = state
        .pujas()
        .create_booking(devotee_id, &request)
        .await?
        .ok_or_else(puja_not_found)?;
    info!(booking_id = %booking.id, puja_id = %booking.puja_id, "Puja booked");
    Ok((StatusCode::CREATED, Json(booking)).into_response())
}

#[utoipa::path(
    get,
    path = "/api/pujas/bookings",
    responses(
        (status = 200, description = "The caller's bookings by date", body = [PujaBooking]),
        (status = 401, description = "Not authenticated", body = MessageResponse)
    ),
    security(("bearer" = [])),
    tag = "pujas"
)]
pub async fn my_bookings(
    headers: HeaderMap,
    state: Extension<Arc<AppState>>,
) -> Result<Response, ApiError> {
    let principal = require_auth(&headers, &state)?;
    let devotee_id = caller_devotee_id(&state, &principal).await?;
    let bookings = state.pujas().list_bookings(Some(devotee_id)).await?;
    Ok((StatusCode::OK, Json(bookings)).into_response())
}

#[utoipa::path(
    delete,
    path = "/api/pujas/bookings/{id}",
    params(("id" = Uuid, Path, description = "Booking id")),
    responses(
        (status = 200, description = "Booking cancelled", body = MessageResponse),
        (status = 400, description = "Booking already completed", body = MessageResponse),
        (status = 401, description = "Not authenticated", body = MessageResponse),
        (status = 404, description = "No such booking of the caller", body = MessageResponse)
    ),
    security(("bearer" = [])),
    tag = "pujas"
)]
pub async fn cancel_booking(
    headers: HeaderMap,
    state: Extension<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    let principal = require_auth(&headers, &state)?;
    let devotee_id = caller_devotee_id(&state, &principal).await?;

    match state.pujas().cancel_booking(id, devotee_id).await? {
        BookingCancellation::Cancelled(_) => Ok((
            StatusCode::OK,
            Json(MessageResponse::new("Booking cancelled successfully")),
        )
            .into_response()),
        BookingCancellation::NotFound => Err(booking_not_found()),
        BookingCancellation::Completed => Err(ApiError::BadRequest(
            "Cannot cancel a completed booking".to_string(),
        )),
    }
}

#[utoipa::path(
    get,
    path = "/api/pujas/admin/bookings",
    responses(
        (status = 200, description = "Every booking by date", body = [PujaBooking]),
        (status = 403, description = "Not an admin", body = MessageResponse)
    ),
    security(("bearer" = [])),
    tag = "pujas"
)]
pub async fn list_bookings(
    headers: HeaderMap,
    state: Extension<Arc<AppState>>,
) -> Result<Response, ApiError> {
    require_admin(&headers, &state)?;
    let bookings = state.pujas().list_bookings(None).await?;
    Ok((StatusCode::OK, Json(bookings)).into_response())
}

#[utoipa::path(
    patch,
    path = "/api/pujas/admin/bookings/{id}",
    params(("id" = Uuid, Path, description = "Booking id")),
    request_body = BookingStatusUpdate,
    responses(
        (status = 200, description = "Updated booking", body = PujaBooking),
        (status = 400, description = "Missing or unknown status", body = MessageResponse),
        (status = 403, description = "Not an admin", body = MessageResponse),
        (status = 404, description = "Unknown booking", body = MessageResponse)
    ),
    security(("bearer" = [])),
    tag = "pujas"
)]
pub async fn update_booking_status(
    headers: HeaderMap,
    state: Extension<Arc<AppState>>,
    Path(id): Path<Uuid>,
    payload: Option<Json<BookingStatusUpdate>>,
) -> Result<Response, ApiError> {
    require_admin(&headers, &state)?;
    let Some(Json(update)) = payload else {
        return Err(ApiError::BadRequest("A valid status is required".to_string()));
    };

    let booking = state
        .pujas()
        .set_booking_status(id, update.status)
        .await?
        .ok_or_else(booking_not_found)?;
    info!(booking_id = %id, status = %update.status, "Booking status changed");
    Ok((StatusCode::OK, Json(booking)).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cost_must_be_finite_and_non_negative() {
        assert!(validate_cost(0.0).is_ok());
        assert!(validate_cost(151.0).is_ok());
        assert!(validate_cost(-1.0).is_err());
        assert!(validate_cost(f64::NAN).is_err());
    }
}
