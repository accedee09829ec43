//! Local payment ledger. Members record and read their own payments;
//! admins see, correct and remove every entry.

use axum::{
    extract::{Extension, Path},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use super::principal::{require_admin, require_auth};
use crate::{
    api::{
        error::{ApiError, MessageResponse},
        state::AppState,
    },
    identity::{NewPayment, Payment, PaymentUpdate},
};

fn payment_not_found() -> ApiError {
    ApiError::NotFound("Payment not found".to_string())
}

#[utoipa::path(
    post,
    path = "/api/payments",
    request_body = NewPayment,
    responses(
        (status = 201, description = "Pending payment recorded for the caller", body = Payment),
        (status = 400, description = "Invalid payment", body = MessageResponse),
        (status = 401, description = "Not authenticated", body = MessageResponse)
    ),
    security(("bearer" = [])),
    tag = "payments"
)]
pub async fn create_payment(
    headers: HeaderMap,
    state: Extension<Arc<AppState>>,
    payload: Option<Json<NewPayment>>,
) -> Result<Response, ApiError> {
    let principal = require_auth(&headers, &state)?;
    let Some(Json(payment)) = payload else {
        return Err(ApiError::BadRequest("Missing payload".to_string()));
    };
    if !payment.amount.is_finite() || payment.amount <= 0.0 {
        return Err(ApiError::BadRequest(
            "Payment amount must be positive".to_string(),
        ));
    }

    let payment = state
        .payments()
        .create_payment(principal.user_id, &payment)
        .await?;
    info!(payment_id = %payment.id, user_id = %payment.user_id, "Payment recorded");
    Ok((StatusCode::CREATED, Json(payment)).into_response())
}

#[utoipa::path(
    get,
    path = "/api/payments/all",
    responses(
        (status = 200, description = "Every payment, newest first", body = [Payment]),
        (status = 403, description = "Not an admin", body = MessageResponse)
    ),
    security(("bearer" = [])),
    tag = "payments"
)]
pub async fn list_payments(
    headers: HeaderMap,
    state: Extension<Arc<AppState>>,
) -> Result<Response, ApiError> {
    require_admin(&headers, &state)?;
    let payments = state.payments().list_payments(None).await?;
    Ok((StatusCode::OK, Json(payments)).into_response())
}

#[utoipa::path(
    get,
    path = "/api/payments/my-payments",
    responses(
        (status = 200, description = "The caller's payments, newest first", body = [Payment]),
        (status = 401, description = "Not authenticated", body = MessageResponse)
    ),
    security(("bearer" = [])),
    tag = "payments"
)]
pub async fn my_payments(
    headers: HeaderMap,
    state: Extension<Arc<AppState>>,
) -> Result<Response, ApiError> {
    let principal = require_auth(&headers, &state)?;
    let payments = state
        .payments()
        .list_payments(Some(principal.user_id))
        .await?;
    Ok((StatusCode::OK, Json(payments)).into_response())
}

#[utoipa::path(
    get,
    path = "/api/payments/{id}",
    params(("id" = Uuid, Path, description = "Payment id")),
    responses(
        (status = 200, description = "Payment", body = Payment),
        (status = 403, description = "Someone else's payment", body = MessageResponse),
        (status = 404, description = "Unknown payment", body = MessageResponse)
    ),
    security(("bearer" = [])),
    tag = "payments"
)]
pub async fn get_payment(
    headers: HeaderMap,
    state: Extension<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    let principal = require_auth(&headers, &state)?;
    let payment = state
        .payments()
        .find_payment(id)
        .await?
        .ok_or_else(payment_not_found)?;
    if !principal.is_admin() && payment.user_id != principal.user_id {
        return Err(ApiError::Forbidden("Not authorized".to_string()));
    }
    Ok((StatusCode::OK, Json(payment)).into_response())
}

#[utoipa::path(
    patch,
    path = "/api/payments/{id}",
    params(("id" = Uuid, Path, description = "Payment id")),
    request_body = PaymentUpdate,
    responses(
        (status = 200, description = "Updated payment", body = Payment),
        (status = 400, description = "Fields other than status, paymentType or description", body = MessageResponse),
        (status = 403, description = "Not an admin", body = MessageResponse),
        (status = 404, description = "Unknown payment", body = MessageResponse)
    ),
    security(("bearer" = [])),
    tag = "payments"
)]
pub async fn update_payment(
    headers: HeaderMap,
    state: Extension<Arc<AppState>>,
    Path(id): Path<Uuid>,
    payload: Option<Json<serde_json::Value>>,
) -> Result<Response, ApiError> {
    require_admin(&headers, &state)?;
    let Some(Json(body)) = payload else {
        return Err(ApiError::BadRequest("Invalid updates".to_string()));
    };
    let update = serde_json::from_value::<PaymentUpdate>(body)
        .map_err(|_| ApiError::BadRequest("Invalid updates".to_string()))?;

    let payment = state
        .payments()
        .update_payment(id, &update)
        .await?
        .ok_or_else(payment_not_found)?;
    Ok((StatusCode::OK, Json(payment)).into_response())
}

#[utoipa::path(
    delete,
    path = "/api/payments/{id}",
    params(("id" = Uuid, Path, description = "Payment id")),
    responses(
        (status = 200, description = "Payment deleted", body = MessageResponse),
        (status = 403, description = "Not an admin", body = MessageResponse),
        (status = 404, description = "Unknown payment", body = MessageResponse)
    ),
    security(("bearer" = [])),
    tag = "payments"
)]
pub async fn delete_payment(
    headers: HeaderMap,
    state: Extension<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    require_admin(&headers, &state)?;
    if !state.payments().delete_payment(id).await? {
        return Err(payment_not_found());
    }
    info!(payment_id = %id, "Payment deleted");
    Ok((
        StatusCode::OK,
        Json(MessageResponse::new("Payment deleted successfully")),
    )
        .into_response())
}
