//! Service banner and status.

use axum::{extract::Extension, http::StatusCode, response::IntoResponse, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

use crate::api::state::AppState;

pub async fn root() -> &'static str {
    "Temple Management API is running"
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct Status {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub version: String,
    pub database: String,
}

#[utoipa::path(
    get,
    path = "/api/status",
    responses(
        (status = 200, description = "Service is online", body = Status)
    ),
    tag = "temple"
)]
pub async fn status(state: Extension<Arc<AppState>>) -> impl IntoResponse {
    let database = match state.identity().ping().await {
        Ok(()) => "ok",
        Err(_) => "error",
    };

    (
        StatusCode::OK,
        Json(Status {
            status: "online".to_string(),
            timestamp: state.clock().now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            database: database.to_string(),
        }),
    )
}
