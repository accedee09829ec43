//! Shared request state, injected into handlers as an `Extension`.

use secrecy::{ExposeSecret, SecretString};
use std::sync::Arc;

use crate::{
    clock::Clock,
    identity::{
        AnnouncementStore, DevoteeStore, EventStore, IdentityStore, PaymentStore, PujaStore,
        TempleStore,
    },
    otp::OtpEngine,
    session::SessionIssuer,
};

#[derive(Clone)]
pub struct AppState {
    engine: OtpEngine,
    identity: Arc<dyn IdentityStore>,
    devotees: Arc<dyn DevoteeStore>,
    announcements: Arc<dyn AnnouncementStore>,
    events: Arc<dyn EventStore>,
    pujas: Arc<dyn PujaStore>,
    payments: Arc<dyn PaymentStore>,
    clock: Arc<dyn Clock>,
    admin_secret: Option<SecretString>,
}

impl AppState {
    #[must_use]
    pub fn new<S>(store: Arc<S>, engine: OtpEngine, clock: Arc<dyn Clock>) -> Self
    where
        S: TempleStore + 'static,
    {
        Self {
            engine,
            identity: store.clone(),
            devotees: store.clone(),
            announcements: store.clone(),
            events: store.clone(),
            pujas: store.clone(),
            payments: store,
            clock,
            admin_secret: None,
        }
    }

    /// Enable admin self-registration guarded by this shared secret.
    #[must_use]
    pub fn with_admin_secret(mut self, secret: Option<SecretString>) -> Self {
        self.admin_secret = secret;
        self
    }

    #[must_use]
    pub fn engine(&self) -> &OtpEngine {
        &self.engine
    }

    #[must_use]
    pub fn sessions(&self) -> &SessionIssuer {
        self.engine.sessions()
    }

    #[must_use]
    pub fn identity(&self) -> &dyn IdentityStore {
        self.identity.as_ref()
    }

    #[must_use]
    pub fn devotees(&self) -> &dyn DevoteeStore {
        self.devotees.as_ref()
    }

    #[must_use]
    pub fn announcements(&self) -> &dyn AnnouncementStore {
        self.announcements.as_ref()
    }

    #[must_use]
    pub fn events(&self) -> &dyn EventStore {
        self.events.as_ref()
    }

    #[must_use]
    pub fn pujas(&self) -> &dyn PujaStore {
        self.pujas.as_ref()
    }

    #[must_use]
    pub fn payments(&self) -> &dyn PaymentStore {
        self.payments.as_ref()
    }

    #[must_use]
    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    /// False whenever no admin secret is configured.
    #[must_use]
    pub fn admin_secret_matches(&self, presented: &str) -> bool {
        self.admin_secret.as_ref().is_some_and(|secret| {
            let expected = secret.expose_secret().as_bytes();
            let presented = presented.as_bytes();
            // Compare every byte so timing does not leak the matching prefix.
            expected.len() == presented.len()
                && expected
                    .iter()
                    .zip(presented)
                    .fold(0u8, |acc, (a, b)| acc | (a ^ b))
                    == 0
        })
    }
}
