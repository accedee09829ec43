//! Records owned by the identity store and the shapes used to create or patch them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use utoipa::ToSchema;
use uuid::Uuid;

/// Default profile name when a member registers without one.
pub const DEFAULT_DEVOTEE_NAME: &str = "Temple Devotee";
/// Default country for self-registered members.
pub const DEFAULT_COUNTRY: &str = "India";

#[derive(Debug, thiserror::Error)]
#[error("unknown {kind}: {value}")]
pub struct ParseEnumError {
    kind: &'static str,
    value: String,
}

/// Enum stored as text. `as_str`, `Display`, `FromStr` and serde all share
/// the one variant table.
macro_rules! text_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident($kind:literal) {
            $($(#[$variant_meta:meta])* $variant:ident => $text:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
        pub enum $name {
            $($(#[$variant_meta])* #[serde(rename = $text)] $variant),+
        }

        impl $name {
            #[must_use]
            pub const fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = ParseEnumError;

            fn from_str(value: &str) -> Result<Self, Self::Err> {
                match value {
                    $($text => Ok(Self::$variant),)+
                    other => Err(ParseEnumError {
                        kind: $kind,
                        value: other.to_string(),
                    }),
                }
            }
        }
    };
}

text_enum! {
    #[derive(Default)]
    pub enum Role("role") {
        #[default]
        User => "user",
        Admin => "admin",
    }
}

text_enum! {
    #[derive(Default)]
    pub enum MembershipType("membership type") {
        #[default]
        Regular => "regular",
        Lifetime => "lifetime",
        Vip => "vip",
        Sponsor => "sponsor",
        Trustee => "trustee",
    }
}

text_enum! {
    #[derive(Default)]
    pub enum PaymentMethod("payment method") {
        #[default]
        Cash => "cash",
        Check => "check",
        CreditCard => "credit_card",
        Online => "online",
        Other => "other",
    }
}

text_enum! {
    #[derive(Default)]
    pub enum EventType("event type") {
        #[default]
        Puja => "puja",
        Festival => "festival",
        Discourse => "discourse",
        Community => "community",
        Class => "class",
        Cultural => "cultural",
        Other => "other",
    }
}

text_enum! {
    pub enum PujaCategory("puja category") {
        Regular => "regular",
        Special => "special",
        LifeEvents => "lifeEvents",
        Festival => "festival",
    }
}

text_enum! {
    /// Where a booked puja is performed.
    pub enum BookingLocation("booking location") {
        Temple => "temple",
        Residence => "residence",
    }
}

text_enum! {
    #[derive(Default)]
    pub enum BookingStatus("booking status") {
        #[default]
        Pending => "pending",
        Confirmed => "confirmed",
        Completed => "completed",
        Cancelled => "cancelled",
    }
}

text_enum! {
    #[derive(Default)]
    pub enum BookingPaymentStatus("booking payment status") {
        #[default]
        Pending => "pending",
        Paid => "paid",
        Refunded => "refunded",
    }
}

text_enum! {
    pub enum PaymentType("payment type") {
        Online => "online",
        Offline => "offline",
    }
}

text_enum! {
    #[derive(Default)]
    pub enum PaymentStatus("payment status") {
        #[default]
        Pending => "pending",
        Completed => "completed",
        Failed => "failed",
    }
}

/// Pending one-time code. Code and expiry only ever exist together.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OtpChallenge {
    pub code: String,
    pub expires_at: DateTime<Utc>,
}

/// Login identity. Without a `devotee_id` the user is unregistered.
#[derive(Clone, Debug)]
pub struct User {
    pub id: Uuid,
    pub mobile_number: String,
    pub email: Option<String>,
    pub role: Role,
    pub devotee_id: Option<Uuid>,
    pub is_active: bool,
    pub otp: Option<OtpChallenge>,
    pub created_at: DateTime<Utc>,
}

impl User {
    #[must_use]
    pub const fn is_registered(&self) -> bool {
        self.devotee_id.is_some()
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Donation {
    pub date: DateTime<Utc>,
    pub amount: f64,
    pub purpose: Option<String>,
    pub payment_method: PaymentMethod,
    pub receipt_number: Option<String>,
    pub notes: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Devotee {
    pub id: Uuid,
    pub name: String,
    pub email: Option<String>,
    pub mobile_number: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip_code: Option<String>,
    pub country: Option<String>,
    pub membership_type: MembershipType,
    pub member_since: DateTime<Utc>,
    pub donation_history: Vec<Donation>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields accepted when creating a devotee.
#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct NewDevotee {
    pub name: String,
    pub email: Option<String>,
    pub mobile_number: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip_code: Option<String>,
    pub country: Option<String>,
    #[serde(default)]
    pub membership_type: MembershipType,
}

/// Full patch available to administrators. Absent fields are left untouched.
#[derive(Clone, Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DevoteeUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
    pub mobile_number: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip_code: Option<String>,
    pub country: Option<String>,
    pub membership_type: Option<MembershipType>,
    pub is_active: Option<bool>,
}

/// The only patch a member may apply to their own profile.
#[derive(Clone, Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SelfDevoteeUpdate {
    pub phone: Option<String>,
}

impl From<SelfDevoteeUpdate> for DevoteeUpdate {
    fn from(update: SelfDevoteeUpdate) -> Self {
        Self {
            phone: update.phone,
            ..Self::default()
        }
    }
}

#[derive(Clone, Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct NewDonation {
    pub date: Option<DateTime<Utc>>,
    pub amount: f64,
    pub purpose: Option<String>,
    #[serde(default)]
    pub payment_method: PaymentMethod,
    pub receipt_number: Option<String>,
    pub notes: Option<String>,
}

impl NewDonation {
    #[must_use]
    pub fn into_donation(self, now: DateTime<Utc>) -> Donation {
        Donation {
            date: self.date.unwrap_or(now),
            amount: self.amount,
            purpose: self.purpose,
            payment_method: self.payment_method,
            receipt_number: self.receipt_number,
            notes: self.notes,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Announcement {
    pub id: Uuid,
    pub title: String,
    pub date_range: String,
    pub description: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub is_active: bool,
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct NewAnnouncement {
    pub title: String,
    pub date_range: String,
    pub description: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    pub image_url: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AnnouncementUpdate {
    pub title: Option<String>,
    pub date_range: Option<String>,
    pub description: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub is_active: Option<bool>,
    pub image_url: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub date: DateTime<Utc>,
    pub start_time: String,
    pub end_time: String,
    pub location: String,
    pub event_type: EventType,
    pub image_url: Option<String>,
    pub is_active: bool,
    pub registration_required: bool,
    pub max_attendees: Option<i32>,
    /// Devotee ids in sign-up order.
    pub registered_devotees: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Event {
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.max_attendees.is_some_and(|max| {
            usize::try_from(max).map_or(true, |max| self.registered_devotees.len() >= max)
        })
    }
}

#[derive(Clone, Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct NewEvent {
    pub title: String,
    pub description: String,
    pub date: DateTime<Utc>,
    pub start_time: String,
    pub end_time: String,
    pub location: String,
    #[serde(default)]
    pub event_type: EventType,
    pub image_url: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub registration_required: bool,
    pub max_attendees: Option<i32>,
}

#[derive(Clone, Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct EventUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub date: Option<DateTime<Utc>>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub location: Option<String>,
    pub event_type: Option<EventType>,
    pub image_url: Option<String>,
    pub is_active: Option<bool>,
    pub registration_required: Option<bool>,
    pub max_attendees: Option<i32>,
}

/// Outcome of signing a devotee up for an event.
#[derive(Clone, Debug)]
pub enum EventRegistration {
    Registered(Event),
    NotFound,
    NotRequired,
    Full,
    AlreadyRegistered,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Puja {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub category: PujaCategory,
    pub duration: String,
    pub cost: f64,
    pub deity: Option<String>,
    pub requirements: Vec<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct NewPuja {
    pub name: String,
    pub description: String,
    pub category: PujaCategory,
    pub duration: String,
    pub cost: f64,
    pub deity: Option<String>,
    #[serde(default)]
    pub requirements: Vec<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

#[derive(Clone, Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PujaUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub category: Option<PujaCategory>,
    pub duration: Option<String>,
    pub cost: Option<f64>,
    pub deity: Option<String>,
    pub requirements: Option<Vec<String>>,
    pub is_active: Option<bool>,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PujaBooking {
    pub id: Uuid,
    pub puja_id: Uuid,
    pub devotee_id: Uuid,
    pub date: DateTime<Utc>,
    pub time: String,
    pub location: BookingLocation,
    pub status: BookingStatus,
    pub instructions: Option<String>,
    pub priest: Option<String>,
    pub payment_status: BookingPaymentStatus,
    /// Cost of the puja when the booking was made.
    pub payment_amount: f64,
    pub payment_method: PaymentMethod,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// What a member submits to book a puja. The devotee comes from the
/// session and the amount from the puja.
#[derive(Clone, Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct BookingRequest {
    pub puja_id: Uuid,
    pub date: DateTime<Utc>,
    pub time: String,
    pub location: BookingLocation,
    pub instructions: Option<String>,
    #[serde(default)]
    pub payment_method: PaymentMethod,
}

#[derive(Clone, Debug)]
pub enum BookingCancellation {
    Cancelled(PujaBooking),
    NotFound,
    Completed,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub id: Uuid,
    pub amount: f64,
    pub payment_type: PaymentType,
    pub status: PaymentStatus,
    pub user_id: Uuid,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct NewPayment {
    pub amount: f64,
    pub payment_type: PaymentType,
    pub description: Option<String>,
}

/// Admin patch of a ledger entry; the amount and owner never change.
#[derive(Clone, Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PaymentUpdate {
    pub status: Option<PaymentStatus>,
    pub payment_type: Option<PaymentType>,
    pub description: Option<String>,
}

const fn default_true() -> bool {
    true
}

/// Trim and lowercase an email; empty input counts as no email.
#[must_use]
pub fn normalize_email(email: &str) -> Option<String> {
    let email = email.trim().to_lowercase();
    if email.is_empty() {
        None
    } else {
        Some(email)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_round_trips_through_storage_text() {
        for role in [Role::User, Role::Admin] {
            assert_eq!(role.as_str().parse::<Role>().ok(), Some(role));
        }
        assert!("root".parse::<Role>().is_err());
    }

    #[test]
    fn payment_method_uses_snake_case() -> anyhow::Result<()> {
        let method: PaymentMethod = serde_json::from_str("\"credit_card\"")?;
        assert_eq!(method, PaymentMethod::CreditCard);
        assert_eq!(method.as_str(), "credit_card");
        Ok(())
    }

    #[test]
    fn self_update_rejects_other_fields() {
        let result = serde_json::from_str::<SelfDevoteeUpdate>(r#"{"phone":"1","name":"x"}"#);
        assert!(result.is_err());
        let ok = serde_json::from_str::<SelfDevoteeUpdate>(r#"{"phone":"555-0100"}"#);
        assert!(ok.is_ok());
    }

    #[test]
    fn new_devotee_defaults_to_regular_membership() -> anyhow::Result<()> {
        let devotee: NewDevotee = serde_json::from_str(r#"{"name":"Ravi"}"#)?;
        assert_eq!(devotee.membership_type, MembershipType::Regular);
        Ok(())
    }

    #[test]
    fn text_enums_match_serde_names() -> anyhow::Result<()> {
        let category: PujaCategory = serde_json::from_str("\"lifeEvents\"")?;
        assert_eq!(category, PujaCategory::LifeEvents);
        assert_eq!(category.to_string(), "lifeEvents");
        assert_eq!(
            serde_json::to_string(&BookingStatus::Cancelled)?,
            "\"cancelled\""
        );
        assert_eq!("offline".parse::<PaymentType>().ok(), Some(PaymentType::Offline));
        assert!("wire".parse::<PaymentType>().is_err());
        Ok(())
    }

    #[test]
    fn payment_update_rejects_amount() {
        let result = serde_json::from_str::<PaymentUpdate>(r#"{"amount":1}"#);
        assert!(result.is_err());
        let ok = serde_json::from_str::<PaymentUpdate>(r#"{"status":"completed"}"#);
        assert!(ok.is_ok());
    }

    #[test]
    fn event_capacity() {
        let now = Utc::now();
        let mut event = Event {
            id: Uuid::new_v4(),
            title: "Satsang".to_string(),
            description: "Evening bhajans".to_string(),
            date: now,
            start_time: "18:00".to_string(),
            end_time: "20:00".to_string(),
            location: "Main hall".to_string(),
            event_type: EventType::Discourse,
            image_url: None,
            is_active: true,
            registration_required: true,
            max_attendees: None,
            registered_devotees: vec![Uuid::new_v4()],
            created_at: now,
            updated_at: now,
        };
        assert!(!event.is_full());
        event.max_attendees = Some(2);
        assert!(!event.is_full());
        event.registered_devotees.push(Uuid::new_v4());
        assert!(event.is_full());
    }

    #[test]
    fn normalize_email_trims_and_lowercases() {
        assert_eq!(
            normalize_email("  Asha@Example.COM "),
            Some("asha@example.com".to_string())
        );
        assert_eq!(normalize_email("   "), None);
    }
}
