//! HTTP error mapping. Every error body is `{"message": "..."}`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::error;
use utoipa::ToSchema;

use crate::{identity::StoreError, otp::AuthError, session::SessionError};

#[derive(ToSchema, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Unauthorized(String),
    Forbidden(String),
    NotFound(String),
    Conflict(String),
    Internal(String),
}

impl ApiError {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn internal() -> Self {
        Self::Internal("Internal server error".to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match self {
            Self::BadRequest(message)
            | Self::Unauthorized(message)
            | Self::Forbidden(message)
            | Self::NotFound(message)
            | Self::Conflict(message)
            | Self::Internal(message) => message,
        };
        (status, Json(MessageResponse { message })).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::EmailTaken => Self::Conflict("Email already in use".to_string()),
            StoreError::MobileTaken => {
                Self::BadRequest("User already exists with this mobile number".to_string())
            }
            StoreError::AlreadyRegistered => {
                Self::Conflict("User is already registered".to_string())
            }
            StoreError::UserNotFound => Self::NotFound("User not found".to_string()),
            StoreError::InvalidRecord(_) | StoreError::Database(_) => {
                error!("Storage error: {err}");
                Self::internal()
            }
        }
    }
}

impl From<SessionError> for ApiError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::Invalid | SessionError::Expired => Self::Unauthorized(err.to_string()),
            SessionError::Signing(_) | SessionError::ExpiryOutOfRange => {
                error!("Session error: {err}");
                Self::internal()
            }
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Validation(message) => Self::BadRequest(message.to_string()),
            AuthError::NotFound => Self::NotFound(err.to_string()),
            AuthError::InvalidCode | AuthError::Expired => Self::Unauthorized(err.to_string()),
            AuthError::Delivery => Self::Internal(err.to_string()),
            AuthError::ExpiryOutOfRange => {
                error!("OTP error: {err}");
                Self::internal()
            }
            AuthError::Storage(err) => err.into(),
            AuthError::Session(err) => err.into(),
        }
    }
}
