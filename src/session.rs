//! Signed session credentials (HS256 JWT).
//!
//! A credential carries the user id and role, nothing else beyond the
//! registered `iat`/`exp` claims. Nothing is persisted, so there is no
//! revocation; clients re-authenticate with a new OTP cycle.

use chrono::Duration;
use jsonwebtoken::{decode, encode, errors::ErrorKind, DecodingKey, EncodingKey, Header, Validation};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::{fmt, sync::Arc};
use uuid::Uuid;

use crate::{clock::Clock, identity::Role};

/// Default validity window.
pub const DEFAULT_SESSION_TTL_SECONDS: i64 = 24 * 60 * 60;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    pub sub: Uuid,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Invalid token")]
    Invalid,
    #[error("Token expired")]
    Expired,
    #[error("failed to sign token: {0}")]
    Signing(#[source] jsonwebtoken::errors::Error),
    #[error("session expiry is out of range")]
    ExpiryOutOfRange,
}

#[derive(Clone)]
pub struct SessionIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl fmt::Debug for SessionIssuer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionIssuer")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl SessionIssuer {
    #[must_use]
    pub fn new(secret: &SecretString, clock: Arc<dyn Clock>) -> Self {
        let secret = secret.expose_secret().as_bytes();
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            ttl: Duration::seconds(DEFAULT_SESSION_TTL_SECONDS),
            clock,
        }
    }

    #[must_use]
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Mint a credential for `user_id` valid for the configured window.
    ///
    /// # Errors
    /// Returns `SessionError::Signing` if encoding fails and
    /// `ExpiryOutOfRange` if the window overflows the calendar.
    pub fn issue(&self, user_id: Uuid, role: Role) -> Result<String, SessionError> {
        let now = self.clock.now();
        let expires_at = now
            .checked_add_signed(self.ttl)
            .ok_or(SessionError::ExpiryOutOfRange)?;
        let claims = Claims {
            sub: user_id,
            role,
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        };

        encode(&Header::default(), &claims, &self.encoding_key).map_err(SessionError::Signing)
    }

    /// Check signature and expiry of a presented credential.
    ///
    /// # Errors
    /// `Invalid` for malformed or badly signed tokens, `Expired` once the
    /// validity window has passed.
    pub fn verify(&self, token: &str) -> Result<Claims, SessionError> {
        // Expiry is checked against the injected clock below, with no leeway.
        let mut validation = Validation::default();
        validation.validate_exp = false;
        validation.leeway = 0;

        let claims = decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|err| match err.kind() {
                ErrorKind::ExpiredSignature => SessionError::Expired,
                _ => SessionError::Invalid,
            })?;

        if self.clock.now().timestamp() >= claims.exp {
            return Err(SessionError::Expired);
        }

        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{ManualClock, SystemClock};
    use chrono::Utc;

    fn issuer(secret: &str, clock: Arc<dyn Clock>) -> SessionIssuer {
        SessionIssuer::new(&SecretString::from(secret.to_string()), clock)
    }

    #[test]
    fn issue_and_verify() -> anyhow::Result<()> {
        let sessions = issuer("test_secret_key", Arc::new(SystemClock));
        let user_id = Uuid::new_v4();

        let token = sessions.issue(user_id, Role::Admin)?;
        let claims = sessions.verify(&token)?;

        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.role, Role::Admin);
        assert_eq!(claims.exp - claims.iat, DEFAULT_SESSION_TTL_SECONDS);
        Ok(())
    }

    #[test]
    fn malformed_token_is_invalid() {
        let sessions = issuer("test_secret_key", Arc::new(SystemClock));
        assert!(matches!(
            sessions.verify("invalid_token"),
            Err(SessionError::Invalid)
        ));
    }

    #[test]
    fn wrong_secret_is_invalid() -> anyhow::Result<()> {
        let first = issuer("secret1", Arc::new(SystemClock));
        let second = issuer("secret2", Arc::new(SystemClock));

        let token = first.issue(Uuid::new_v4(), Role::User)?;
        assert!(matches!(second.verify(&token), Err(SessionError::Invalid)));
        Ok(())
    }

    #[test]
    fn token_expires_after_window() -> anyhow::Result<()> {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let sessions = issuer("test_secret_key", clock.clone());

        let token = sessions.issue(Uuid::new_v4(), Role::User)?;
        clock.advance(Duration::hours(23));
        assert!(sessions.verify(&token).is_ok());

        clock.advance(Duration::hours(1));
        assert!(matches!(sessions.verify(&token), Err(SessionError::Expired)));
        Ok(())
    }

    #[test]
    fn oversized_ttl_is_an_error() {
        let sessions =
            issuer("test_secret_key", Arc::new(SystemClock)).with_ttl(Duration::MAX);
        assert!(matches!(
            sessions.issue(Uuid::new_v4(), Role::User),
            Err(SessionError::ExpiryOutOfRange)
        ));
    }

    #[test]
    fn custom_ttl_is_applied() -> anyhow::Result<()> {
        let sessions =
            issuer("test_secret_key", Arc::new(SystemClock)).with_ttl(Duration::minutes(5));
        let claims = sessions.verify(&sessions.issue(Uuid::new_v4(), Role::User)?)?;
        assert_eq!(claims.exp - claims.iat, 300);
        Ok(())
    }
}
