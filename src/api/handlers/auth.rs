//! Account endpoints: profile lookup, admin bootstrap, and the retired
//! password routes that now point clients at the OTP flow.

use axum::{
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;
use tracing::{info, warn};

use super::{
    principal::require_auth,
    types::{
        AdminRegistrationRequest, LegacyAuthResponse, ProfileResponse, ProfileUser,
        SessionResponse, UserSummary,
    },
};
use crate::{
    api::{
        error::{ApiError, MessageResponse},
        state::AppState,
    },
    identity::{
        models::{normalize_email, DEFAULT_DEVOTEE_NAME},
        MembershipType, NewDevotee, Role,
    },
};

const ADMIN_SECRET_HEADER: &str = "admin-secret-key";
const OTP_ENTRYPOINT: &str = "/api/otp-auth/request-otp";

#[utoipa::path(
    get,
    path = "/api/auth/profile",
    responses(
        (status = 200, description = "Current user and linked devotee profile", body = ProfileResponse),
        (status = 401, description = "Missing, invalid or expired credential", body = MessageResponse),
        (status = 404, description = "User no longer exists", body = MessageResponse)
    ),
    security(("bearer" = [])),
    tag = "auth"
)]
pub async fn profile(
    headers: HeaderMap,
    state: Extension<Arc<AppState>>,
) -> Result<Response, ApiError> {
    let principal = require_auth(&headers, &state)?;

    let user = state
        .identity()
        .find_user(principal.user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    let devotee = match user.devotee_id {
        Some(devotee_id) => state.devotees().find_devotee(devotee_id).await?,
        None => None,
    };

    let response = ProfileResponse {
        user: ProfileUser {
            id: user.id,
            mobile_number: user.mobile_number,
            email: user.email,
            role: user.role,
            created_at: user.created_at,
        },
        devotee,
    };

    Ok((StatusCode::OK, Json(response)).into_response())
}

#[utoipa::path(
    post,
    path = "/api/auth/register/admin",
    request_body = AdminRegistrationRequest,
    params(
        ("admin-secret-key" = String, Header, description = "Shared admin bootstrap secret")
    ),
    responses(
        (status = 201, description = "Admin account created", body = SessionResponse),
        (status = 400, description = "Mobile number missing or already registered", body = MessageResponse),
        (status = 403, description = "Secret missing or wrong", body = MessageResponse),
        (status = 409, description = "Email already in use", body = MessageResponse)
    ),
    tag = "auth"
)]
pub async fn register_admin(
    headers: HeaderMap,
    state: Extension<Arc<AppState>>,
    payload: Option<Json<AdminRegistrationRequest>>,
) -> Result<Response, ApiError> {
    let presented = headers
        .get(ADMIN_SECRET_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    if !state.admin_secret_matches(presented) {
        warn!("Rejected admin registration attempt");
        return Err(ApiError::Forbidden(
            "Not authorized to create admin account".to_string(),
        ));
    }

    let Some(Json(request)) = payload else {
        return Err(ApiError::BadRequest("Missing payload".to_string()));
    };
    let mobile_number = request.mobile_number.trim();
    if mobile_number.is_empty() {
        return Err(ApiError::BadRequest("Mobile number is required".to_string()));
    }

    let devotee = NewDevotee {
        name: request
            .name
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_DEVOTEE_NAME.to_string()),
        email: request.email.as_deref().and_then(normalize_email),
        mobile_number: Some(mobile_number.to_string()),
        address: request.address,
        membership_type: MembershipType::Vip,
        ..NewDevotee::default()
    };

    let registered = state
        .identity()
        .create_linked_user(mobile_number, &devotee, Role::Admin)
        .await?;
    let token = state
        .sessions()
        .issue(registered.user.id, registered.user.role)?;

    info!(user_id = %registered.user.id, "Admin account created");

    Ok((
        StatusCode::CREATED,
        Json(SessionResponse {
            message: "Admin registered successfully".to_string(),
            token,
            user: UserSummary::from(&registered.user),
            is_new_user: None,
        }),
    )
        .into_response())
}

fn legacy_redirect(kind: &str) -> Response {
    (
        StatusCode::PERMANENT_REDIRECT,
        Json(LegacyAuthResponse {
            message: format!(
                "Traditional {kind} is no longer supported. Please use mobile OTP authentication."
            ),
            redirect_to: OTP_ENTRYPOINT.to_string(),
        }),
    )
        .into_response()
}

#[utoipa::path(
    post,
    path = "/api/auth/register",
    responses(
        (status = 308, description = "Password registration is retired", body = LegacyAuthResponse)
    ),
    tag = "auth"
)]
pub async fn legacy_register() -> Response {
    legacy_redirect("registration")
}

#[utoipa::path(
    post,
    path = "/api/auth/login",
    responses(
        (status = 308, description = "Password login is retired", body = LegacyAuthResponse)
    ),
    tag = "auth"
)]
pub async fn legacy_login() -> Response {
    legacy_redirect("login")
}
