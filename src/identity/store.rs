//! Persistence seams for users, devotees and the temple's public records.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::models::{
    Announcement, AnnouncementUpdate, BookingCancellation, BookingRequest, BookingStatus,
    Devotee, DevoteeUpdate, Donation, Event, EventRegistration, EventUpdate, NewAnnouncement,
    NewDevotee, NewEvent, NewPayment, NewPuja, OtpChallenge, Payment, PaymentUpdate, Puja,
    PujaBooking, PujaUpdate, Role, User,
};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("email already in use")]
    EmailTaken,
    #[error("mobile number already registered")]
    MobileTaken,
    #[error("user is already linked to a devotee")]
    AlreadyRegistered,
    #[error("user not found")]
    UserNotFound,
    #[error("invalid stored record: {0}")]
    InvalidRecord(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Result of linking a fresh devotee profile to a user.
#[derive(Clone, Debug)]
pub struct Registered {
    pub user: User,
    pub devotee: Devotee,
}

#[async_trait]
pub trait IdentityStore: Send + Sync {
    async fn find_user_by_mobile(&self, mobile_number: &str) -> Result<Option<User>, StoreError>;

    async fn find_user(&self, id: Uuid) -> Result<Option<User>, StoreError>;

    /// Create the user for an unseen mobile number, or overwrite the pending
    /// challenge of an existing one. Role and devotee link are left alone.
    async fn save_challenge(
        &self,
        mobile_number: &str,
        challenge: &OtpChallenge,
    ) -> Result<User, StoreError>;

    /// Clear the pending challenge only if it still holds `code`.
    /// Returns `false` when another request already consumed or replaced it.
    async fn consume_challenge(&self, user_id: Uuid, code: &str) -> Result<bool, StoreError>;

    /// Whether any devotee or user already owns this (normalized) email.
    async fn email_in_use(&self, email: &str) -> Result<bool, StoreError>;

    /// Insert the devotee and link it to an unlinked user as one unit.
    ///
    /// # Errors
    /// `EmailTaken` on an email collision, `AlreadyRegistered` if the user
    /// gained a devotee in the meantime, `UserNotFound` if it vanished.
    async fn complete_registration(
        &self,
        user_id: Uuid,
        devotee: &NewDevotee,
        role: Role,
    ) -> Result<Registered, StoreError>;

    /// Create a devotee and an already linked user with the given role.
    async fn create_linked_user(
        &self,
        mobile_number: &str,
        devotee: &NewDevotee,
        role: Role,
    ) -> Result<Registered, StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;
}

#[async_trait]
pub trait DevoteeStore: Send + Sync {
    async fn list_devotees(&self) -> Result<Vec<Devotee>, StoreError>;

    async fn find_devotee(&self, id: Uuid) -> Result<Option<Devotee>, StoreError>;

    async fn create_devotee(&self, devotee: &NewDevotee) -> Result<Devotee, StoreError>;

    async fn update_devotee(
        &self,
        id: Uuid,
        update: &DevoteeUpdate,
    ) -> Result<Option<Devotee>, StoreError>;

    /// Delete a devotee together with every user linked to it, and with
    /// them their bookings, event sign-ups and payments.
    async fn delete_devotee(&self, id: Uuid) -> Result<bool, StoreError>;

    /// Append to the donation ledger, preserving insertion order.
    async fn add_donation(
        &self,
        id: Uuid,
        donation: &Donation,
    ) -> Result<Option<Devotee>, StoreError>;
}

#[async_trait]
pub trait AnnouncementStore: Send + Sync {
    /// Active announcements ordered by start date.
    async fn list_active_announcements(&self) -> Result<Vec<Announcement>, StoreError>;

    async fn find_announcement(&self, id: Uuid) -> Result<Option<Announcement>, StoreError>;

    async fn create_announcement(
        &self,
        announcement: &NewAnnouncement,
    ) -> Result<Announcement, StoreError>;

    async fn update_announcement(
        &self,
        id: Uuid,
        update: &AnnouncementUpdate,
    ) -> Result<Option<Announcement>, StoreError>;

    async fn delete_announcement(&self, id: Uuid) -> Result<bool, StoreError>;
}

#[async_trait]
pub trait EventStore: Send + Sync {
    /// Every event, soonest first.
    async fn list_events(&self) -> Result<Vec<Event>, StoreError>;

    /// Active events dated at or after `from`, soonest first.
    async fn list_upcoming_events(&self, from: DateTime<Utc>) -> Result<Vec<Event>, StoreError>;

    async fn find_event(&self, id: Uuid) -> Result<Option<Event>, StoreError>;

    async fn create_event(&self, event: &NewEvent) -> Result<Event, StoreError>;

    async fn update_event(&self, id: Uuid, update: &EventUpdate)
        -> Result<Option<Event>, StoreError>;

    async fn delete_event(&self, id: Uuid) -> Result<bool, StoreError>;

    /// Sign a devotee up. Capacity and duplicate checks happen under the
    /// same lock as the insert.
    async fn register_for_event(
        &self,
        event_id: Uuid,
        devotee_id: Uuid,
    ) -> Result<EventRegistration, StoreError>;
}

#[async_trait]
pub trait PujaStore: Send + Sync {
    /// Active pujas by name.
    async fn list_active_pujas(&self) -> Result<Vec<Puja>, StoreError>;

    async fn find_puja(&self, id: Uuid) -> Result<Option<Puja>, StoreError>;

    async fn create_puja(&self, puja: &NewPuja) -> Result<Puja, StoreError>;

    async fn update_puja(&self, id: Uuid, update: &PujaUpdate) -> Result<Option<Puja>, StoreError>;

    /// Delete a puja and every booking of it.
    async fn delete_puja(&self, id: Uuid) -> Result<bool, StoreError>;

    /// Book an active puja at its current cost. `None` when the puja is
    /// unknown or inactive.
    async fn create_booking(
        &self,
        devotee_id: Uuid,
        request: &BookingRequest,
    ) -> Result<Option<PujaBooking>, StoreError>;

    /// Bookings ordered by date; all of them, or one devotee's.
    async fn list_bookings(&self, devotee_id: Option<Uuid>)
        -> Result<Vec<PujaBooking>, StoreError>;

    /// Cancel a booking owned by `devotee_id`. Completed bookings stay.
    async fn cancel_booking(
        &self,
        id: Uuid,
        devotee_id: Uuid,
    ) -> Result<BookingCancellation, StoreError>;

    async fn set_booking_status(
        &self,
        id: Uuid,
        status: BookingStatus,
    ) -> Result<Option<PujaBooking>, StoreError>;
}

#[async_trait]
pub trait PaymentStore: Send + Sync {
    async fn create_payment(
        &self,
        user_id: Uuid,
        payment: &NewPayment,
    ) -> Result<Payment, StoreError>;

    /// Ledger entries newest first; all of them, or one user's.
    async fn list_payments(&self, user_id: Option<Uuid>) -> Result<Vec<Payment>, StoreError>;

    async fn find_payment(&self, id: Uuid) -> Result<Option<Payment>, StoreError>;

    async fn update_payment(
        &self,
        id: Uuid,
        update: &PaymentUpdate,
    ) -> Result<Option<Payment>, StoreError>;

    async fn delete_payment(&self, id: Uuid) -> Result<bool, StoreError>;
}

/// Everything the HTTP layer needs from one backing store.
pub trait TempleStore:
    IdentityStore + DevoteeStore + AnnouncementStore + EventStore + PujaStore + PaymentStore
{
}

impl<T> TempleStore for T where
    T: IdentityStore + DevoteeStore + AnnouncementStore + EventStore + PujaStore + PaymentStore
{
}
