use crate::{identity::StoreError, session::SessionError};

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("{0}")]
    Validation(&'static str),
    #[error("User not found")]
    NotFound,
    #[error("Invalid OTP")]
    InvalidCode,
    #[error("OTP expired")]
    Expired,
    #[error("Failed to send OTP")]
    Delivery,
    #[error("OTP expiry is out of range")]
    ExpiryOutOfRange,
    #[error("storage failure: {0}")]
    Storage(#[from] StoreError),
    #[error("session failure: {0}")]
    Session(#[from] SessionError),
}
