//! Mobile OTP endpoints: request a code, then verify it.

use axum::{
    extract::Extension,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;

use super::types::{
    RegistrationRequiredResponse, RequestOtpRequest, RequestOtpResponse, SessionResponse,
    UserSummary, VerifyOtpRequest,
};
use crate::{
    api::{
        error::{ApiError, MessageResponse},
        state::AppState,
    },
    otp::Verification,
};

#[utoipa::path(
    post,
    path = "/api/otp-auth/request-otp",
    request_body = RequestOtpRequest,
    responses(
        (status = 200, description = "Code generated and handed to the SMS gateway", body = RequestOtpResponse),
        (status = 400, description = "Mobile number missing", body = MessageResponse),
        (status = 500, description = "SMS delivery failed", body = MessageResponse)
    ),
    tag = "auth"
)]
pub async fn request_otp(
    state: Extension<Arc<AppState>>,
    payload: Option<Json<RequestOtpRequest>>,
) -> Result<Response, ApiError> {
    let Some(Json(request)) = payload else {
        return Err(ApiError::BadRequest("Mobile number is required".to_string()));
    };

    let issued = state.engine().request_challenge(&request.mobile_number).await?;

    Ok((
        StatusCode::OK,
        Json(RequestOtpResponse {
            message: "OTP sent successfully".to_string(),
            user_exists: issued.user_exists,
        }),
    )
        .into_response())
}

#[utoipa::path(
    post,
    path = "/api/otp-auth/verify-otp",
    request_body = VerifyOtpRequest,
    responses(
        (status = 200, description = "Returning member signed in", body = SessionResponse),
        (status = 201, description = "New member registered and signed in", body = SessionResponse),
        (status = 400, description = "Missing fields, or registration data required", body = RegistrationRequiredResponse),
        (status = 401, description = "Invalid or expired code", body = MessageResponse),
        (status = 404, description = "Unknown mobile number", body = MessageResponse)
    ),
    tag = "auth"
)]
pub async fn verify_otp(
    state: Extension<Arc<AppState>>,
    payload: Option<Json<VerifyOtpRequest>>,
) -> Result<Response, ApiError> {
    let Some(Json(request)) = payload else {
        return Err(ApiError::BadRequest(
            "Mobile number and OTP are required".to_string(),
        ));
    };

    let verification = state
        .engine()
        .verify_challenge(&request.mobile_number, &request.otp, request.user_data)
        .await?;

    match verification {
        Verification::RegistrationRequired => Ok((
            StatusCode::BAD_REQUEST,
            Json(RegistrationRequiredResponse {
                message: "Additional user data required for registration".to_string(),
                requires_registration: true,
            }),
        )
            .into_response()),
        Verification::Authenticated(session) => {
            let (status, message) = if session.is_new_user {
                (StatusCode::CREATED, "Registration successful")
            } else {
                (StatusCode::OK, "Login successful")
            };
            Ok((
                status,
                Json(SessionResponse {
                    message: message.to_string(),
                    token: session.token,
                    user: UserSummary::from(&session.user),
                    is_new_user: Some(session.is_new_user),
                }),
            )
                .into_response())
        }
    }
}
