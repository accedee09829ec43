//! User, devotee, announcement, event, puja and payment records plus their
//! stores.
//!
//! Two store implementations exist: `PgStore` for PostgreSQL and
//! `MemoryStore`, used for local development without a database and by tests.

pub mod memory;
pub mod models;
pub mod postgres;
pub mod store;

pub use memory::MemoryStore;
pub use models::{
    Announcement, AnnouncementUpdate, BookingCancellation, BookingLocation,
    BookingPaymentStatus, BookingRequest, BookingStatus, Devotee, DevoteeUpdate, Donation,
    Event, EventRegistration, EventType, EventUpdate, MembershipType, NewAnnouncement,
    NewDevotee, NewDonation, NewEvent, NewPayment, NewPuja, OtpChallenge, Payment,
    PaymentMethod, PaymentStatus, PaymentType, PaymentUpdate, Puja, PujaBooking, PujaCategory,
    PujaUpdate, Role, SelfDevoteeUpdate, User,
};
pub use postgres::PgStore;
pub use store::{
    AnnouncementStore, DevoteeStore, EventStore, IdentityStore, PaymentStore, PujaStore,
    Registered, StoreError, TempleStore,
};
