//! In-process store used when no database is configured.
//!
//! Every operation takes the single lock for its whole duration, which makes
//! compare-and-clear and registration linking atomic here as well.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::models::{
    Announcement, AnnouncementUpdate, BookingCancellation, BookingPaymentStatus, BookingRequest,
    BookingStatus, Devotee, DevoteeUpdate, Donation, Event, EventRegistration, EventUpdate,
    NewAnnouncement, NewDevotee, NewEvent, NewPayment, NewPuja, OtpChallenge, Payment,
    PaymentStatus, PaymentUpdate, Puja, PujaBooking, PujaUpdate, Role, User,
};
use super::store::{
    AnnouncementStore, DevoteeStore, EventStore, IdentityStore, PaymentStore, PujaStore,
    Registered, StoreError,
};

#[derive(Default)]
struct Inner {
    users: HashMap<Uuid, User>,
    devotees: HashMap<Uuid, Devotee>,
    announcements: HashMap<Uuid, Announcement>,
    events: HashMap<Uuid, Event>,
    pujas: HashMap<Uuid, Puja>,
    bookings: HashMap<Uuid, PujaBooking>,
    payments: HashMap<Uuid, Payment>,
}

fn set_if_some<T: Clone>(target: &mut T, value: Option<&T>) {
    if let Some(value) = value {
        target.clone_from(value);
    }
}

impl Inner {
    fn devotee_email_taken(&self, email: &str, except: Option<Uuid>) -> bool {
        self.devotees
            .values()
            .any(|d| Some(d.id) != except && d.email.as_deref() == Some(email))
    }

    fn user_email_taken(&self, email: &str, except: Option<Uuid>) -> bool {
        self.users
            .values()
            .any(|u| Some(u.id) != except && u.email.as_deref() == Some(email))
    }

    fn insert_devotee(&mut self, new: &NewDevotee) -> Result<Devotee, StoreError> {
        if let Some(email) = new.email.as_deref() {
            if self.devotee_email_taken(email, None) {
                return Err(StoreError::EmailTaken);
            }
        }
        let now = Utc::now();
        let devotee = Devotee {
            id: Uuid::new_v4(),
            name: new.name.clone(),
            email: new.email.clone(),
            mobile_number: new.mobile_number.clone(),
            phone: new.phone.clone(),
            address: new.address.clone(),
            city: new.city.clone(),
            state: new.state.clone(),
            zip_code: new.zip_code.clone(),
            country: new.country.clone(),
            membership_type: new.membership_type,
            member_since: now,
            donation_history: Vec::new(),
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        self.devotees.insert(devotee.id, devotee.clone());
        Ok(devotee)
    }
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl IdentityStore for MemoryStore {
    async fn find_user_by_mobile(&self, mobile_number: &str) -> Result<Option<User>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .users
            .values()
            .find(|u| u.mobile_number == mobile_number)
            .cloned())
    }

    async fn find_user(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.inner.lock().await.users.get(&id).cloned())
    }

    async fn save_challenge(
        &self,
        mobile_number: &str,
        challenge: &OtpChallenge,
    ) -> Result<User, StoreError> {
        let mut inner = self.inner.lock().await;
        if let Some(user) = inner
            .users
            .values_mut()
            .find(|u| u.mobile_number == mobile_number)
        {
            user.otp = Some(challenge.clone());
            return Ok(user.clone());
        }

        let user = User {
            id: Uuid::new_v4(),
            mobile_number: mobile_number.to_string(),
            email: None,
            role: Role::User,
            devotee_id: None,
            is_active: true,
            otp: Some(challenge.clone()),
            created_at: Utc::now(),
        };
        inner.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn consume_challenge(&self, user_id: Uuid, code: &str) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock().await;
        let Some(user) = inner.users.get_mut(&user_id) else {
            return Ok(false);
        };
        match &user.otp {
            Some(challenge) if challenge.code == code => {
                user.otp = None;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn email_in_use(&self, email: &str) -> Result<bool, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner.devotee_email_taken(email, None) || inner.user_email_taken(email, None))
    }

    async fn complete_registration(
        &self,
        user_id: Uuid,
        devotee: &NewDevotee,
        role: Role,
    ) -> Result<Registered, StoreError> {
        let mut inner = self.inner.lock().await;
        match inner.users.get(&user_id) {
            None => return Err(StoreError::UserNotFound),
            Some(user) if user.devotee_id.is_some() => return Err(StoreError::AlreadyRegistered),
            Some(_) => {}
        }
        if let Some(email) = devotee.email.as_deref() {
            if inner.user_email_taken(email, Some(user_id)) {
                return Err(StoreError::EmailTaken);
            }
        }

        let devotee = inner.insert_devotee(devotee)?;
        let user = inner
            .users
            .get_mut(&user_id)
            .ok_or(StoreError::UserNotFound)?;
        user.devotee_id = Some(devotee.id);
        user.email.clone_from(&devotee.email);
        user.role = role;
        let user = user.clone();

        Ok(Registered { user, devotee })
    }

    async fn create_linked_user(
        &self,
        mobile_number: &str,
        devotee: &NewDevotee,
        role: Role,
    ) -> Result<Registered, StoreError> {
        let mut inner = self.inner.lock().await;
        if inner
            .users
            .values()
            .any(|u| u.mobile_number == mobile_number)
        {
            return Err(StoreError::MobileTaken);
        }
        if let Some(email) = devotee.email.as_deref() {
            if inner.user_email_taken(email, None) {
                return Err(StoreError::EmailTaken);
            }
        }

        let devotee = inner.insert_devotee(devotee)?;
        let user = User {
            id: Uuid::new_v4(),
            mobile_number: mobile_number.to_string(),
            email: devotee.email.clone(),
            role,
            devotee_id: Some(devotee.id),
            is_active: true,
            otp: None,
            created_at: Utc::now(),
        };
        inner.users.insert(user.id, user.clone());

        Ok(Registered { user, devotee })
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[async_trait]
impl DevoteeStore for MemoryStore {
    async fn list_devotees(&self) -> Result<Vec<Devotee>, StoreError> {
        let inner = self.inner.lock().await;
        let mut devotees: Vec<Devotee> = inner.devotees.values().cloned().collect();
        devotees.sort_by_key(|d| d.created_at);
        Ok(devotees)
    }

    async fn find_devotee(&self, id: Uuid) -> Result<Option<Devotee>, StoreError> {
        Ok(self.inner.lock().await.devotees.get(&id).cloned())
    }

    async fn create_devotee(&self, devotee: &NewDevotee) -> Result<Devotee, StoreError> {
        self.inner.lock().await.insert_devotee(devotee)
    }

    async fn update_devotee(
        &self,
        id: Uuid,
        update: &DevoteeUpdate,
    ) -> Result<Option<Devotee>, StoreError> {
        let mut inner = self.inner.lock().await;
        if let Some(email) = update.email.as_deref() {
            if inner.devotee_email_taken(email, Some(id)) {
                return Err(StoreError::EmailTaken);
            }
        }
        let Some(devotee) = inner.devotees.get_mut(&id) else {
            return Ok(None);
        };

        let set = |target: &mut Option<String>, value: &Option<String>| {
            if value.is_some() {
                target.clone_from(value);
            }
        };
        if let Some(name) = &update.name {
            devotee.name.clone_from(name);
        }
        set(&mut devotee.email, &update.email);
        set(&mut devotee.mobile_number, &update.mobile_number);
        set(&mut devotee.phone, &update.phone);
        set(&mut devotee.address, &update.address);
        set(&mut devotee.city, &update.city);
        set(&mut devotee.state, &update.state);
        set(&mut devotee.zip_code, &update.zip_code);
        set(&mut devotee.country, &update.country);
        if let Some(membership_type) = update.membership_type {
            devotee.membership_type = membership_type;
        }
        if let Some(is_active) = update.is_active {
            devotee.is_active = is_active;
        }
        devotee.updated_at = Utc::now();

        Ok(Some(devotee.clone()))
    }

    async fn delete_devotee(&self, id: Uuid) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock().await;
        if inner.devotees.remove(&id).is_none() {
            return Ok(false);
        }
        let removed: Vec<Uuid> = inner
            .users
            .values()
            .filter(|u| u.devotee_id == Some(id))
            .map(|u| u.id)
            .collect();
        inner.users.retain(|_, u| u.devotee_id != Some(id));
        inner.payments.retain(|_, p| !removed.contains(&p.user_id));
        inner.bookings.retain(|_, b| b.devotee_id != id);
        for event in inner.events.values_mut() {
            event.registered_devotees.retain(|devotee| *devotee != id);
        }
        Ok(true)
    }

    async fn add_donation(
        &self,
        id: Uuid,
        donation: &Donation,
    ) -> Result<Option<Devotee>, StoreError> {
        let mut inner = self.inner.lock().await;
        Ok(inner.devotees.get_mut(&id).map(|devotee| {
            devotee.donation_history.push(donation.clone());
            devotee.updated_at = Utc::now();
            devotee.clone()
        }))
    }
}

#[async_trait]
impl AnnouncementStore for MemoryStore {
    async fn list_active_announcements(&self) -> Result<Vec<Announcement>, StoreError> {
        let inner = self.inner.lock().await;
        let mut active: Vec<Announcement> = inner
            .announcements
            .values()
            .filter(|a| a.is_active)
            .cloned()
            .collect();
        active.sort_by_key(|a| a.start_date);
        Ok(active)
    }

    async fn find_announcement(&self, id: Uuid) -> Result<Option<Announcement>, StoreError> {
        Ok(self.inner.lock().await.announcements.get(&id).cloned())
    }

    async fn create_announcement(
        &self,
        announcement: &NewAnnouncement,
    ) -> Result<Announcement, StoreError> {
        let now = Utc::now();
        let record = Announcement {
            id: Uuid::new_v4(),
            title: announcement.title.clone(),
            date_range: announcement.date_range.clone(),
            description: announcement.description.clone(),
            start_date: announcement.start_date,
            end_date: announcement.end_date,
            is_active: announcement.is_active,
            image_url: announcement.image_url.clone(),
            created_at: now,
            updated_at: now,
        };
        self.inner
            .lock()
            .await
            .announcements
            .insert(record.id, record.clone());
        Ok(record)
    }

    async fn update_announcement(
        &self,
        id: Uuid,
        update: &AnnouncementUpdate,
    ) -> Result<Option<Announcement>, StoreError> {
        let mut inner = self.inner.lock().await;
        let Some(record) = inner.announcements.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(title) = &update.title {
            record.title.clone_from(title);
        }
        if let Some(date_range) = &update.date_range {
            record.date_range.clone_from(date_range);
        }
        if let Some(description) = &update.description {
            record.description.clone_from(description);
        }
        if let Some(start_date) = update.start_date {
            record.start_date = start_date;
        }
        if let Some(end_date) = update.end_date {
            record.end_date = end_date;
        }
        if let Some(is_active) = update.is_active {
            record.is_active = is_active;
        }
        if update.image_url.is_some() {
            record.image_url.clone_from(&update.image_url);
        }
        record.updated_at = Utc::now();
        Ok(Some(record.clone()))
    }

    async fn delete_announcement(&self, id: Uuid) -> Result<bool, StoreError> {
        Ok(self.inner.lock().await.announcements.remove(&id).is_some())
    }
}

#[async_trait]
impl EventStore for MemoryStore {
    async fn list_events(&self) -> Result<Vec<Event>, StoreError> {
        let inner = self.inner.lock().await;
        let mut events: Vec<Event> = inner.events.values().cloned().collect();
        events.sort_by_key(|e| e.date);
        Ok(events)
    }

    async fn list_upcoming_events(&self, from: DateTime<Utc>) -> Result<Vec<Event>, StoreError> {
        let inner = self.inner.lock().await;
        let mut events: Vec<Event> = inner
            .events
            .values()
            .filter(|e| e.is_active && e.date >= from)
            .cloned()
            .collect();
        events.sort_by_key(|e| e.date);
        Ok(events)
    }

    async fn find_event(&self, id: Uuid) -> Result<Option<Event>, StoreError> {
        Ok(self.inner.lock().await.events.get(&id).cloned())
    }

    async fn create_event(&self, event: &NewEvent) -> Result<Event, StoreError> {
        let now = Utc::now();
        let record = Event {
            id: Uuid::new_v4(),
            title: event.title.clone(),
            description: event.description.clone(),
            date: event.date,
            start_time: event.start_time.clone(),
            end_time: event.end_time.clone(),
            location: event.location.clone(),
            event_type: event.event_type,
            image_url: event.image_url.clone(),
            is_active: event.is_active,
            registration_required: event.registration_required,
            max_attendees: event.max_attendees,
            registered_devotees: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        self.inner
            .lock()
            .await
            .events
            .insert(record.id, record.clone());
        Ok(record)
    }

    async fn update_event(
        &self,
        id: Uuid,
        update: &EventUpdate,
    ) -> Result<Option<Event>, StoreError> {
        let mut inner = self.inner.lock().await;
        let Some(event) = inner.events.get_mut(&id) else {
            return Ok(None);
        };
        set_if_some(&mut event.title, update.title.as_ref());
        set_if_some(&mut event.description, update.description.as_ref());
        set_if_some(&mut event.date, update.date.as_ref());
        set_if_some(&mut event.start_time, update.start_time.as_ref());
        set_if_some(&mut event.end_time, update.end_time.as_ref());
        set_if_some(&mut event.location, update.location.as_ref());
        set_if_some(&mut event.event_type, update.event_type.as_ref());
        if update.image_url.is_some() {
            event.image_url.clone_from(&update.image_url);
        }
        set_if_some(&mut event.is_active, update.is_active.as_ref());
        set_if_some(
            &mut event.registration_required,
            update.registration_required.as_ref(),
        );
        if update.max_attendees.is_some() {
            event.max_attendees = update.max_attendees;
        }
        event.updated_at = Utc::now();
        Ok(Some(event.clone()))
    }

    async fn delete_event(&self, id: Uuid) -> Result<bool, StoreError> {
        Ok(self.inner.lock().await.events.remove(&id).is_some())
    }

    async fn register_for_event(
        &self,
        event_id: Uuid,
        devotee_id: Uuid,
    ) -> Result<EventRegistration, StoreError> {
        let mut inner = self.inner.lock().await;
        let Some(event) = inner.events.get_mut(&event_id) else {
            return Ok(EventRegistration::NotFound);
        };
        if !event.registration_required {
            return Ok(EventRegistration::NotRequired);
        }
        if event.registered_devotees.contains(&devotee_id) {
            return Ok(EventRegistration::AlreadyRegistered);
        }
        if event.is_full() {
            return Ok(EventRegistration::Full);
        }
        event.registered_devotees.push(devotee_id);
        event.updated_at = Utc::now();
        Ok(EventRegistration::Registered(event.clone()))
    }
}

#[async_trait]
impl PujaStore for MemoryStore {
    async fn list_active_pujas(&self) -> Result<Vec<Puja>, StoreError> {
        let inner = self.inner.lock().await;
        let mut pujas: Vec<Puja> = inner
            .pujas
            .values()
            .filter(|p| p.is_active)
            .cloned()
            .collect();
        pujas.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(pujas)
    }

    async fn find_puja(&self, id: Uuid) -> Result<Option<Puja>, StoreError> {
        Ok(self.inner.lock().await.pujas.get(&id).cloned())
    }

    async fn create_puja(&self, puja: &NewPuja) -> Result<Puja, StoreError> {
        let now = Utc::now();
        let record = Puja {
            id: Uuid::new_v4(),
            name: puja.name.clone(),
            description: puja.description.clone(),
            category: puja.category,
            duration: puja.duration.clone(),
            cost: puja.cost,
            deity: puja.deity.clone(),
            requirements: puja.requirements.clone(),
            is_active: puja.is_active,
            created_at: now,
            updated_at: now,
        };
        self.inner
            .lock()
            .await
            .pujas
            .insert(record.id, record.clone());
        Ok(record)
    }

    async fn update_puja(&self, id: Uuid, update: &PujaUpdate) -> Result<Option<Puja>, StoreError> {
        let mut inner = self.inner.lock().await;
        let Some(puja) = inner.pujas.get_mut(&id) else {
            return Ok(None);
        };
        set_if_some(&mut puja.name, update.name.as_ref());
        set_if_some(&mut puja.description, update.description.as_ref());
        set_if_some(&mut puja.category, update.category.as_ref());
        set_if_some(&mut puja.duration, update.duration.as_ref());
        set_if_some(&mut puja.cost, update.cost.as_ref());
        if update.deity.is_some() {
            puja.deity.clone_from(&update.deity);
        }
        set_if_some(&mut puja.requirements, update.requirements.as_ref());
        set_if_some(&mut puja.is_active, update.is_active.as_ref());
        puja.updated_at = Utc::now();
        Ok(Some(puja.clone()))
    }

    async fn delete_puja(&self, id: Uuid) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock().await;
        if inner.pujas.remove(&id).is_none() {
            return Ok(false);
        }
        inner.bookings.retain(|_, b| b.puja_id != id);
        Ok(true)
    }

    async fn create_booking(
        &self,
        devotee_id: Uuid,
        request: &BookingRequest,
    ) -> Result<Option<PujaBooking>, StoreError> {
        let mut inner = self.inner.lock().await;
        let cost = match inner.pujas.get(&request.puja_id) {
            Some(puja) if puja.is_active => puja.cost,
            _ => return Ok(None),
        };
        let now = Utc::now();
        let booking = PujaBooking {
            id: Uuid::new_v4(),
            puja_id: request.puja_id,
            devotee_id,
            date: request.date,
            time: request.time.clone(),
            location: request.location,
            status: BookingStatus::Pending,
            instructions: request.instructions.clone(),
            priest: None,
            payment_status: BookingPaymentStatus::Pending,
            payment_amount: cost,
            payment_method: request.payment_method,
            created_at: now,
            updated_at: now,
        };
        inner.bookings.insert(booking.id, booking.clone());
        Ok(Some(booking))
    }

    async fn list_bookings(
        &self,
        devotee_id: Option<Uuid>,
    ) -> Result<Vec<PujaBooking>, StoreError> {
        let inner = self.inner.lock().await;
        let mut bookings: Vec<PujaBooking> = inner
            .bookings
            .values()
            .filter(|b| devotee_id.map_or(true, |id| b.devotee_id == id))
            .cloned()
            .collect();
        bookings.sort_by_key(|b| (b.date, b.created_at));
        Ok(bookings)
    }

    async fn cancel_booking(
        &self,
        id: Uuid,
        devotee_id: Uuid,
    ) -> Result<BookingCancellation, StoreError> {
        let mut inner = self.inner.lock().await;
        let Some(booking) = inner
            .bookings
            .get_mut(&id)
            .filter(|b| b.devotee_id == devotee_id)
        else {
            return Ok(BookingCancellation::NotFound);
        };
        if booking.status == BookingStatus::Completed {
            return Ok(BookingCancellation::Completed);
        }
        booking.status = BookingStatus::Cancelled;
        booking.updated_at = Utc::now();
        Ok(BookingCancellation::Cancelled(booking.clone()))
    }

    async fn set_booking_status(
        &self,
        id: Uuid,
        status: BookingStatus,
    ) -> Result<Option<PujaBooking>, StoreError> {
        let mut inner = self.inner.lock().await;
        Ok(inner.bookings.get_mut(&id).map(|booking| {
            booking.status = status;
            booking.updated_at = Utc::now();
            booking.clone()
        }))
    }
}

#[async_trait]
impl PaymentStore for MemoryStore {
    async fn create_payment(
        &self,
        user_id: Uuid,
        payment: &NewPayment,
    ) -> Result<Payment, StoreError> {
        let mut inner = self.inner.lock().await;
        if !inner.users.contains_key(&user_id) {
            return Err(StoreError::UserNotFound);
        }
        let now = Utc::now();
        let record = Payment {
            id: Uuid::new_v4(),
            amount: payment.amount,
            payment_type: payment.payment_type,
            status: PaymentStatus::Pending,
            user_id,
            description: payment.description.clone(),
            created_at: now,
            updated_at: now,
        };
        inner.payments.insert(record.id, record.clone());
        Ok(record)
    }

    async fn list_payments(&self, user_id: Option<Uuid>) -> Result<Vec<Payment>, StoreError> {
        let inner = self.inner.lock().await;
        let mut payments: Vec<Payment> = inner
            .payments
            .values()
            .filter(|p| user_id.map_or(true, |id| p.user_id == id))
            .cloned()
            .collect();
        payments.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(payments)
    }

    async fn find_payment(&self, id: Uuid) -> Result<Option<Payment>, StoreError> {
        Ok(self.inner.lock().await.payments.get(&id).cloned())
    }

    async fn update_payment(
        &self,
        id: Uuid,
        update: &PaymentUpdate,
    ) -> Result<Option<Payment>, StoreError> {
        let mut inner = self.inner.lock().await;
        let Some(payment) = inner.payments.get_mut(&id) else {
            return Ok(None);
        };
        set_if_some(&mut payment.status, update.status.as_ref());
        set_if_some(&mut payment.payment_type, update.payment_type.as_ref());
        if update.description.is_some() {
            payment.description.clone_from(&update.description);
        }
        payment.updated_at = Utc::now();
        Ok(Some(payment.clone()))
    }

    async fn delete_payment(&self, id: Uuid) -> Result<bool, StoreError> {
        Ok(self.inner.lock().await.payments.remove(&id).is_some())
    }
}
