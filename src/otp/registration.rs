//! First-login profile creation.
//!
//! Registration never fails on an email collision: the requested email is
//! rewritten to `local.<unix-millis>@domain` and the insert retried.

use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use super::AuthError;
use crate::{
    clock::Clock,
    identity::{
        models::{normalize_email, DEFAULT_COUNTRY, DEFAULT_DEVOTEE_NAME},
        IdentityStore, MembershipType, NewDevotee, Registered, Role, StoreError, User,
    },
};

/// Registration attempts on email collisions; the last one uses a random suffix.
const MAX_EMAIL_ATTEMPTS: i64 = 5;

/// Profile data supplied by a member on first verification.
#[derive(Clone, Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationData {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip_code: Option<String>,
    pub country: Option<String>,
}

impl RegistrationData {
    fn into_devotee(self, mobile_number: &str) -> NewDevotee {
        let name = self
            .name
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| DEFAULT_DEVOTEE_NAME.to_string());

        NewDevotee {
            name,
            email: None,
            mobile_number: Some(mobile_number.to_string()),
            phone: self.phone,
            address: self.address,
            city: self.city,
            state: self.state,
            zip_code: self.zip_code,
            country: self.country.or_else(|| Some(DEFAULT_COUNTRY.to_string())),
            membership_type: MembershipType::Regular,
        }
    }
}

/// Append a time-derived suffix to the local part of `email`.
#[must_use]
pub fn unique_email(email: &str, millis: i64) -> String {
    match email.rsplit_once('@') {
        Some((local, domain)) => format!("{local}.{millis}@{domain}"),
        None => format!("{email}.{millis}"),
    }
}

#[derive(Clone)]
pub struct RegistrationFinisher {
    store: Arc<dyn IdentityStore>,
    clock: Arc<dyn Clock>,
}

impl RegistrationFinisher {
    #[must_use]
    pub fn new(store: Arc<dyn IdentityStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Create the devotee for an unlinked `user` and link it.
    ///
    /// # Errors
    /// Only storage failures.
    pub async fn finish(&self, user: &User, data: RegistrationData) -> Result<Registered, AuthError> {
        let requested = data.email.as_deref().and_then(normalize_email);
        let millis = self.clock.now().timestamp_millis();

        let mut email = requested.clone();
        if let Some(requested) = requested.as_deref() {
            if self.store.email_in_use(requested).await? {
                email = Some(unique_email(requested, millis));
            }
        }
        let devotee = data.into_devotee(&user.mobile_number);

        for attempt in 1..=MAX_EMAIL_ATTEMPTS {
            let candidate = NewDevotee {
                email: email.clone(),
                ..devotee.clone()
            };
            match self
                .store
                .complete_registration(user.id, &candidate, Role::User)
                .await
            {
                Ok(registered) => {
                    if registered.devotee.email != requested {
                        info!(
                            user_id = %user.id,
                            "registration email was taken, stored a unique variant"
                        );
                    }
                    return Ok(registered);
                }
                Err(StoreError::EmailTaken) if attempt < MAX_EMAIL_ATTEMPTS => {
                    warn!(user_id = %user.id, attempt, "registration email collided, retrying");
                    email = requested.as_deref().map(|requested| {
                        if attempt + 1 == MAX_EMAIL_ATTEMPTS {
                            random_email(requested)
                        } else {
                            unique_email(requested, millis + attempt)
                        }
                    });
                }
                Err(err) => return Err(err.into()),
            }
        }

        Err(StoreError::EmailTaken.into())
    }
}

/// Last-resort variant of `email` with a random, collision-free suffix.
fn random_email(email: &str) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    match email.rsplit_once('@') {
        Some((local, domain)) => format!("{local}.{suffix}@{domain}"),
        None => format!("{email}.{suffix}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        clock::ManualClock,
        identity::{MemoryStore, OtpChallenge},
    };
    use async_trait::async_trait;
    use chrono::{Duration, TimeZone, Utc};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn finisher(store: Arc<MemoryStore>) -> RegistrationFinisher {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).single();
        let clock = Arc::new(ManualClock::new(start.unwrap_or_else(Utc::now)));
        RegistrationFinisher::new(store, clock)
    }

    async fn pending_user(store: &MemoryStore, mobile: &str) -> anyhow::Result<User> {
        let challenge = OtpChallenge {
            code: "123456".to_string(),
            expires_at: Utc::now() + Duration::minutes(10),
        };
        Ok(store.save_challenge(mobile, &challenge).await?)
    }

    #[test]
    fn unique_email_suffixes_local_part() {
        assert_eq!(
            unique_email("asha@example.com", 1_700_000_000_000),
            "asha.1700000000000@example.com"
        );
        assert_eq!(unique_email("not-an-email", 5), "not-an-email.5");
    }

    #[tokio::test]
    async fn defaults_are_applied() -> anyhow::Result<()> {
        let store = Arc::new(MemoryStore::new());
        let user = pending_user(&store, "+15550000010").await?;

        let registered = finisher(store.clone())
            .finish(&user, RegistrationData::default())
            .await?;

        assert_eq!(registered.devotee.name, DEFAULT_DEVOTEE_NAME);
        assert_eq!(registered.devotee.country.as_deref(), Some(DEFAULT_COUNTRY));
        assert_eq!(registered.devotee.membership_type, MembershipType::Regular);
        assert_eq!(
            registered.devotee.mobile_number.as_deref(),
            Some("+15550000010")
        );
        assert_eq!(registered.user.role, Role::User);
        assert_eq!(registered.user.devotee_id, Some(registered.devotee.id));
        Ok(())
    }

    /// Store that reports an email collision for every timestamped variant,
    /// as if concurrent registrations kept claiming them.
    struct TimestampVariantsTaken {
        inner: MemoryStore,
        attempts: AtomicUsize,
    }

    #[async_trait]
    impl IdentityStore for TimestampVariantsTaken {
        async fn find_user_by_mobile(&self, mobile_number: &str) -> Result<Option<User>, StoreError> {
            self.inner.find_user_by_mobile(mobile_number).await
        }

        async fn find_user(&self, id: Uuid) -> Result<Option<User>, StoreError> {
            self.inner.find_user(id).await
        }

        async fn save_challenge(
            &self,
            mobile_number: &str,
            challenge: &OtpChallenge,
        ) -> Result<User, StoreError> {
            self.inner.save_challenge(mobile_number, challenge).await
        }

        async fn consume_challenge(&self, user_id: Uuid, code: &str) -> Result<bool, StoreError> {
            self.inner.consume_challenge(user_id, code).await
        }

        async fn email_in_use(&self, _email: &str) -> Result<bool, StoreError> {
            Ok(true)
        }

        async fn complete_registration(
            &self,
            user_id: Uuid,
            devotee: &NewDevotee,
            role: Role,
        ) -> Result<Registered, StoreError> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            let local = devotee
                .email
                .as_deref()
                .and_then(|email| email.split_once('@'))
                .map(|(local, _)| local)
                .unwrap_or_default();
            let suffix = local.rsplit('.').next().unwrap_or_default();
            if suffix.chars().all(|c| c.is_ascii_digit()) {
                return Err(StoreError::EmailTaken);
            }
            self.inner.complete_registration(user_id, devotee, role).await
        }

        async fn create_linked_user(
            &self,
            mobile_number: &str,
            devotee: &NewDevotee,
            role: Role,
        ) -> Result<Registered, StoreError> {
            self.inner.create_linked_user(mobile_number, devotee, role).await
        }

        async fn ping(&self) -> Result<(), StoreError> {
            self.inner.ping().await
        }
    }

    #[tokio::test]
    async fn exhausted_timestamp_variants_fall_back_to_random_suffix() -> anyhow::Result<()> {
        let store = Arc::new(TimestampVariantsTaken {
            inner: MemoryStore::new(),
            attempts: AtomicUsize::new(0),
        });
        let user = pending_user(&store.inner, "+15550000013").await?;
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let finisher = RegistrationFinisher::new(store.clone(), clock);

        let data = RegistrationData {
            email: Some("asha@example.com".to_string()),
            ..RegistrationData::default()
        };
        let registered = finisher.finish(&user, data).await?;

        let email = registered.devotee.email.unwrap_or_default();
        let local = email.strip_suffix("@example.com").unwrap_or_default();
        let suffix = local.strip_prefix("asha.").unwrap_or_default();
        assert_eq!(suffix.len(), 32, "unexpected email {email}");
        assert!(suffix.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(
            store.attempts.load(Ordering::SeqCst),
            usize::try_from(MAX_EMAIL_ATTEMPTS)?
        );
        Ok(())
    }

    #[tokio::test]
    async fn email_collision_yields_distinct_email() -> anyhow::Result<()> {
        let store = Arc::new(MemoryStore::new());
        let finisher = finisher(store.clone());
        let data = RegistrationData {
            name: Some("Asha".to_string()),
            email: Some("Asha@Example.com".to_string()),
            ..RegistrationData::default()
        };

        let first_user = pending_user(&store, "+15550000011").await?;
        let first = finisher.finish(&first_user, data.clone()).await?;
        assert_eq!(first.devotee.email.as_deref(), Some("asha@example.com"));

        let second_user = pending_user(&store, "+15550000012").await?;
        let second = finisher.finish(&second_user, data).await?;
        let stored = second.devotee.email.unwrap_or_default();
        assert_ne!(stored, "asha@example.com");
        assert!(stored.starts_with("asha."));
        assert!(stored.ends_with("@example.com"));
        assert_eq!(second.user.email.as_deref(), Some(stored.as_str()));
        Ok(())
    }
}
