//! Route handlers.
//!
//! Every handler takes the shared [`AppState`](crate::api::state::AppState)
//! as an `Extension` and maps domain errors through
//! [`ApiError`](crate::api::error::ApiError). Authenticated routes resolve the
//! caller with [`principal::require_auth`] before touching any record.

pub mod announcements;
pub mod auth;
pub mod devotees;
pub mod events;
pub mod health;
pub mod otp_auth;
pub mod payments;
pub mod principal;
pub mod pujas;
pub mod root;
pub mod types;
