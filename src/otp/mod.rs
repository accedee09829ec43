//! OTP engine: issues and verifies one-time codes for mobile numbers.
//!
//! ## Request
//!
//! A fresh code is stored on the user for the number (created on first
//! sight) and handed to the delivery gateway once. A failed delivery is
//! reported, but the stored code stays valid, so a retry simply re-sends.
//!
//! ## Verify
//!
//! Checks run in order: unknown number, code mismatch, expiry. An expired
//! code is not cleared. A matching code for an unregistered user without
//! profile data yields `Verification::RegistrationRequired` and leaves the
//! code in place so the client can resubmit it with the data.
//!
//! Otherwise the code is consumed with a compare-and-clear; losing that race
//! to a concurrent request is reported as an invalid code. First-time users
//! then go through the registration finisher before a session is issued.

use chrono::Duration;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::{
    clock::Clock,
    identity::{IdentityStore, OtpChallenge, User},
    session::SessionIssuer,
    sms::DeliveryGateway,
};

pub mod code;
mod error;
pub mod registration;

pub use error::AuthError;
pub use registration::{RegistrationData, RegistrationFinisher};

/// Default code validity window.
pub const DEFAULT_OTP_TTL_SECONDS: i64 = 10 * 60;

/// Outcome of a successful `request_challenge`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChallengeIssued {
    /// The number already belongs to a registered member.
    pub user_exists: bool,
}

#[derive(Clone, Debug)]
pub struct AuthenticatedSession {
    pub token: String,
    pub user: User,
    pub is_new_user: bool,
}

#[derive(Clone, Debug)]
pub enum Verification {
    /// Code matched but the number has no profile yet; resubmit with data.
    RegistrationRequired,
    Authenticated(AuthenticatedSession),
}

#[derive(Clone)]
pub struct OtpEngine {
    store: Arc<dyn IdentityStore>,
    gateway: Arc<dyn DeliveryGateway>,
    sessions: SessionIssuer,
    finisher: RegistrationFinisher,
    clock: Arc<dyn Clock>,
    ttl: Duration,
}

impl OtpEngine {
    #[must_use]
    pub fn new(
        store: Arc<dyn IdentityStore>,
        gateway: Arc<dyn DeliveryGateway>,
        sessions: SessionIssuer,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let finisher = RegistrationFinisher::new(store.clone(), clock.clone());
        Self {
            store,
            gateway,
            sessions,
            finisher,
            clock,
            ttl: Duration::seconds(DEFAULT_OTP_TTL_SECONDS),
        }
    }

    #[must_use]
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    #[must_use]
    pub fn sessions(&self) -> &SessionIssuer {
        &self.sessions
    }

    /// Store a new code for `mobile_number` and deliver it.
    ///
    /// # Errors
    /// `Validation` for an empty number, `Delivery` when the gateway fails,
    /// `ExpiryOutOfRange` when the TTL overflows the calendar, `Storage` on
    /// persistence failures.
    #[instrument(skip(self))]
    pub async fn request_challenge(&self, mobile_number: &str) -> Result<ChallengeIssued, AuthError> {
        let mobile_number = mobile_number.trim();
        if mobile_number.is_empty() {
            return Err(AuthError::Validation("Mobile number is required"));
        }

        let expires_at = self
            .clock
            .now()
            .checked_add_signed(self.ttl)
            .ok_or(AuthError::ExpiryOutOfRange)?;
        let challenge = OtpChallenge {
            code: code::generate_code(),
            expires_at,
        };
        let user = self.store.save_challenge(mobile_number, &challenge).await?;

        if !self.gateway.send(mobile_number, &challenge.code).await {
            warn!(user_id = %user.id, "OTP delivery failed");
            return Err(AuthError::Delivery);
        }

        debug!(user_id = %user.id, "OTP issued");
        Ok(ChallengeIssued {
            user_exists: user.is_registered(),
        })
    }

    /// Verify a submitted code and sign the user in, registering on first use.
    ///
    /// # Errors
    /// `Validation`, `NotFound`, `InvalidCode`, `Expired`, `Storage` or
    /// `Session` as described in the module docs.
    #[instrument(skip(self, code, registration))]
    pub async fn verify_challenge(
        &self,
        mobile_number: &str,
        code: &str,
        registration: Option<RegistrationData>,
    ) -> Result<Verification, AuthError> {
        let mobile_number = mobile_number.trim();
        if mobile_number.is_empty() || code.is_empty() {
            return Err(AuthError::Validation("Mobile number and OTP are required"));
        }

        let user = self
            .store
            .find_user_by_mobile(mobile_number)
            .await?
            .ok_or(AuthError::NotFound)?;

        let Some(challenge) = user.otp.as_ref() else {
            return Err(AuthError::InvalidCode);
        };
        if challenge.code != code {
            return Err(AuthError::InvalidCode);
        }
        if self.clock.now() > challenge.expires_at {
            return Err(AuthError::Expired);
        }

        if !user.is_registered() && registration.is_none() {
            debug!(user_id = %user.id, "registration data required");
            return Ok(Verification::RegistrationRequired);
        }

        if !self.store.consume_challenge(user.id, code).await? {
            warn!(user_id = %user.id, "OTP was consumed concurrently");
            return Err(AuthError::InvalidCode);
        }

        let (user, is_new_user) = match registration {
            Some(data) if !user.is_registered() => {
                let registered = self.finisher.finish(&user, data).await?;
                info!(
                    user_id = %registered.user.id,
                    devotee_id = %registered.devotee.id,
                    "member registered"
                );
                (registered.user, true)
            }
            _ => (
                User {
                    otp: None,
                    ..user
                },
                false,
            ),
        };

        let token = self.sessions.issue(user.id, user.role)?;

        Ok(Verification::Authenticated(AuthenticatedSession {
            token,
            user,
            is_new_user,
        }))
    }
}
