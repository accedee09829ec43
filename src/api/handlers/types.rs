//! Request and response bodies shared by the auth handlers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    identity::{Devotee, Role, User},
    otp::RegistrationData,
};

#[derive(ToSchema, Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct RequestOtpRequest {
    #[serde(default)]
    pub mobile_number: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct RequestOtpResponse {
    pub message: String,
    pub user_exists: bool,
}

#[derive(ToSchema, Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct VerifyOtpRequest {
    #[serde(default)]
    pub mobile_number: String,
    #[serde(default)]
    pub otp: String,
    pub user_data: Option<RegistrationData>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationRequiredResponse {
    pub message: String,
    pub requires_registration: bool,
}

/// Minimal user view returned with a fresh session.
#[derive(ToSchema, Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: Uuid,
    pub mobile_number: String,
    pub email: Option<String>,
    pub role: Role,
}

impl From<&User> for UserSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            mobile_number: user.mobile_number.clone(),
            email: user.email.clone(),
            role: user.role,
        }
    }
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub message: String,
    pub token: String,
    pub user: UserSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_new_user: Option<bool>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUser {
    pub id: Uuid,
    pub mobile_number: String,
    pub email: Option<String>,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ProfileResponse {
    pub user: ProfileUser,
    pub devotee: Option<Devotee>,
}

#[derive(ToSchema, Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct AdminRegistrationRequest {
    #[serde(default)]
    pub mobile_number: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct LegacyAuthResponse {
    pub message: String,
    pub redirect_to: String,
}
