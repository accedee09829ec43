//! PostgreSQL store.
//!
//! Each statement runs inside a `db.query` span. Registration, admin creation,
//! devotee deletion, event sign-up and booking cancellation each run in a
//! single transaction.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{
    postgres::{PgPoolOptions, PgRow},
    Connection, PgExecutor, PgPool, Row,
};
use std::{collections::HashMap, time::Duration};
use tracing::{info_span, Instrument, Span};
use uuid::Uuid;

use super::models::{
    Announcement, AnnouncementUpdate, BookingCancellation, BookingLocation,
    BookingPaymentStatus, BookingRequest, BookingStatus, Devotee, DevoteeUpdate, Donation, Event,
    EventRegistration, EventType, EventUpdate, MembershipType, NewAnnouncement, NewDevotee,
    NewEvent, NewPayment, NewPuja, OtpChallenge, Payment, PaymentMethod, PaymentStatus,
    PaymentType, PaymentUpdate, Puja, PujaBooking, PujaCategory, PujaUpdate, Role, User,
};
use super::store::{
    AnnouncementStore, DevoteeStore, EventStore, IdentityStore, PaymentStore, PujaStore,
    Registered, StoreError,
};

const SCHEMA: &str = include_str!("../../sql/schema.sql");

/// Event columns, including sign-ups in registration order.
macro_rules! event_columns {
    () => {
        "id, title, description, event_date, start_time, end_time, location, event_type, \
         image_url, is_active, registration_required, max_attendees, created_at, updated_at, \
         ARRAY(SELECT r.devotee_id FROM event_registrations r \
               WHERE r.event_id = events.id ORDER BY r.id) AS registered_devotees"
    };
}

macro_rules! puja_columns {
    () => {
        "id, name, description, category, duration, cost, deity, requirements, is_active, \
         created_at, updated_at"
    };
}

macro_rules! booking_columns {
    () => {
        "id, puja_id, devotee_id, booking_date, booking_time, location, status, instructions, \
         priest, payment_status, payment_amount, payment_method, created_at, updated_at"
    };
}

macro_rules! payment_columns {
    () => {
        "id, amount, payment_type, status, user_id, description, created_at, updated_at"
    };
}

fn db_span(operation: &'static str, statement: &'static str) -> Span {
    info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = operation,
        db.statement = statement
    )
}

/// Map constraint violations to the store's conflict variants.
fn map_db_error(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.code().is_some_and(|code| code.as_ref() == "23505") {
            let constraint = db_err.constraint().unwrap_or_default();
            if constraint.contains("mobile_number") {
                return StoreError::MobileTaken;
            }
            if constraint.contains("email") {
                return StoreError::EmailTaken;
            }
        }
    }
    StoreError::Database(err)
}

fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| code.as_ref() == "23503"),
        _ => false,
    }
}

fn parse<T: std::str::FromStr>(value: &str) -> Result<T, StoreError>
where
    T::Err: std::fmt::Display,
{
    value
        .parse()
        .map_err(|err: T::Err| StoreError::InvalidRecord(err.to_string()))
}

fn user_from_row(row: &PgRow) -> Result<User, StoreError> {
    let role: String = row.try_get("role")?;
    let code: Option<String> = row.try_get("otp")?;
    let expires_at: Option<DateTime<Utc>> = row.try_get("otp_expires_at")?;
    let otp = match (code, expires_at) {
        (Some(code), Some(expires_at)) => Some(OtpChallenge { code, expires_at }),
        _ => None,
    };

    Ok(User {
        id: row.try_get("id")?,
        mobile_number: row.try_get("mobile_number")?,
        email: row.try_get("email")?,
        role: parse::<Role>(&role)?,
        devotee_id: row.try_get("devotee_id")?,
        is_active: row.try_get("is_active")?,
        otp,
        created_at: row.try_get("created_at")?,
    })
}

fn devotee_from_row(row: &PgRow, donation_history: Vec<Donation>) -> Result<Devotee, StoreError> {
    let membership_type: String = row.try_get("membership_type")?;
    Ok(Devotee {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        email: row.try_get("email")?,
        mobile_number: row.try_get("mobile_number")?,
        phone: row.try_get("phone")?,
        address: row.try_get("address")?,
        city: row.try_get("city")?,
        state: row.try_get("state")?,
        zip_code: row.try_get("zip_code")?,
        country: row.try_get("country")?,
        membership_type: parse::<MembershipType>(&membership_type)?,
        member_since: row.try_get("member_since")?,
        donation_history,
        is_active: row.try_get("is_active")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn donation_from_row(row: &PgRow) -> Result<Donation, StoreError> {
    let payment_method: String = row.try_get("payment_method")?;
    Ok(Donation {
        date: row.try_get("donated_at")?,
        amount: row.try_get("amount")?,
        purpose: row.try_get("purpose")?,
        payment_method: parse::<PaymentMethod>(&payment_method)?,
        receipt_number: row.try_get("receipt_number")?,
        notes: row.try_get("notes")?,
    })
}

fn announcement_from_row(row: &PgRow) -> Result<Announcement, StoreError> {
    Ok(Announcement {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        date_range: row.try_get("date_range")?,
        description: row.try_get("description")?,
        start_date: row.try_get("start_date")?,
        end_date: row.try_get("end_date")?,
        is_active: row.try_get("is_active")?,
        image_url: row.try_get("image_url")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn event_from_row(row: &PgRow) -> Result<Event, StoreError> {
    let event_type: String = row.try_get("event_type")?;
    Ok(Event {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        date: row.try_get("event_date")?,
        start_time: row.try_get("start_time")?,
        end_time: row.try_get("end_time")?,
        location: row.try_get("location")?,
        event_type: parse::<EventType>(&event_type)?,
        image_url: row.try_get("image_url")?,
        is_active: row.try_get("is_active")?,
        registration_required: row.try_get("registration_required")?,
        max_attendees: row.try_get("max_attendees")?,
        registered_devotees: row.try_get("registered_devotees")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn puja_from_row(row: &PgRow) -> Result<Puja, StoreError> {
    let category: String = row.try_get("category")?;
    Ok(Puja {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        category: parse::<PujaCategory>(&category)?,
        duration: row.try_get("duration")?,
        cost: row.try_get("cost")?,
        deity: row.try_get("deity")?,
        requirements: row.try_get("requirements")?,
        is_active: row.try_get("is_active")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn booking_from_row(row: &PgRow) -> Result<PujaBooking, StoreError> {
    let location: String = row.try_get("location")?;
    let status: String = row.try_get("status")?;
    let payment_status: String = row.try_get("payment_status")?;
    let payment_method: String = row.try_get("payment_method")?;
    Ok(PujaBooking {
        id: row.try_get("id")?,
        puja_id: row.try_get("puja_id")?,
        devotee_id: row.try_get("devotee_id")?,
        date: row.try_get("booking_date")?,
        time: row.try_get("booking_time")?,
        location: parse::<BookingLocation>(&location)?,
        status: parse::<BookingStatus>(&status)?,
        instructions: row.try_get("instructions")?,
        priest: row.try_get("priest")?,
        payment_status: parse::<BookingPaymentStatus>(&payment_status)?,
        payment_amount: row.try_get("payment_amount")?,
        payment_method: parse::<PaymentMethod>(&payment_method)?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn payment_from_row(row: &PgRow) -> Result<Payment, StoreError> {
    let payment_type: String = row.try_get("payment_type")?;
    let status: String = row.try_get("status")?;
    Ok(Payment {
        id: row.try_get("id")?,
        amount: row.try_get("amount")?,
        payment_type: parse::<PaymentType>(&payment_type)?,
        status: parse::<PaymentStatus>(&status)?,
        user_id: row.try_get("user_id")?,
        description: row.try_get("description")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

async fn insert_devotee<'e, E: PgExecutor<'e>>(
    executor: E,
    devotee: &NewDevotee,
) -> Result<Devotee, StoreError> {
    let query = r"
        INSERT INTO devotees
            (id, name, email, mobile_number, phone, address, city, state, zip_code, country, membership_type)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        RETURNING id, name, email, mobile_number, phone, address, city, state, zip_code, country,
                  membership_type, member_since, is_active, created_at, updated_at
    ";
    let row = sqlx::query(query)
        .bind(Uuid::new_v4())
        .bind(&devotee.name)
        .bind(devotee.email.as_deref())
        .bind(devotee.mobile_number.as_deref())
        .bind(devotee.phone.as_deref())
        .bind(devotee.address.as_deref())
        .bind(devotee.city.as_deref())
        .bind(devotee.state.as_deref())
        .bind(devotee.zip_code.as_deref())
        .bind(devotee.country.as_deref())
        .bind(devotee.membership_type.as_str())
        .fetch_one(executor)
        .instrument(db_span("INSERT", query))
        .await
        .map_err(map_db_error)?;

    devotee_from_row(&row, Vec::new())
}

async fn load_donations<'e, E: PgExecutor<'e>>(
    executor: E,
    devotee_id: Uuid,
) -> Result<Vec<Donation>, StoreError> {
    let query = r"
        SELECT donated_at, amount, purpose, payment_method, receipt_number, notes
        FROM devotee_donations
        WHERE devotee_id = $1
        ORDER BY id
    ";
    let rows = sqlx::query(query)
        .bind(devotee_id)
        .fetch_all(executor)
        .instrument(db_span("SELECT", query))
        .await?;

    rows.iter().map(donation_from_row).collect()
}

#[derive(Clone, Debug)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Connect a small pool to the given DSN.
    ///
    /// # Errors
    /// Returns an error if the database is unreachable.
    pub async fn connect(dsn: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .min_connections(1)
            .max_connections(5)
            .max_lifetime(Duration::from_secs(60 * 2))
            .test_before_acquire(true)
            .connect(dsn)
            .await
            .context("Failed to connect to database")?;

        Ok(Self { pool })
    }

    #[must_use]
    pub const fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Apply `sql/schema.sql`.
    ///
    /// # Errors
    /// Returns an error if any schema statement fails.
    pub async fn ensure_schema(&self) -> Result<()> {
        sqlx::raw_sql(SCHEMA)
            .execute(&self.pool)
            .instrument(db_span("DDL", "sql/schema.sql"))
            .await
            .context("Failed to apply database schema")?;
        Ok(())
    }
}

#[async_trait]
impl IdentityStore for PgStore {
    async fn find_user_by_mobile(&self, mobile_number: &str) -> Result<Option<User>, StoreError> {
        let query = r"
            SELECT id, mobile_number, email, role, devotee_id, is_active, otp, otp_expires_at, created_at
            FROM users
            WHERE mobile_number = $1
        ";
        let row = sqlx::query(query)
            .bind(mobile_number)
            .fetch_optional(&self.pool)
            .instrument(db_span("SELECT", query))
            .await?;

        row.as_ref().map(user_from_row).transpose()
    }

    async fn find_user(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let query = r"
            SELECT id, mobile_number, email, role, devotee_id, is_active, otp, otp_expires_at, created_at
            FROM users
            WHERE id = $1
        ";
        let row = sqlx::query(query)
            .bind(id)
            .fetch_optional(&self.pool)
            .instrument(db_span("SELECT", query))
            .await?;

        row.as_ref().map(user_from_row).transpose()
    }

    async fn save_challenge(
        &self,
        mobile_number: &str,
        challenge: &OtpChallenge,
    ) -> Result<User, StoreError> {
        // Last write wins for concurrent requests on the same number.
        let query = r"
            INSERT INTO users (id, mobile_number, otp, otp_expires_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (mobile_number) DO UPDATE
                SET otp = EXCLUDED.otp,
                    otp_expires_at = EXCLUDED.otp_expires_at,
                    updated_at = now()
            RETURNING id, mobile_number, email, role, devotee_id, is_active, otp, otp_expires_at, created_at
        ";
        let row = sqlx::query(query)
            .bind(Uuid::new_v4())
            .bind(mobile_number)
            .bind(&challenge.code)
            .bind(challenge.expires_at)
            .fetch_one(&self.pool)
            .instrument(db_span("UPSERT", query))
            .await?;

        user_from_row(&row)
    }

    async fn consume_challenge(&self, user_id: Uuid, code: &str) -> Result<bool, StoreError> {
        let query = r"
            UPDATE users
            SET otp = NULL, otp_expires_at = NULL, updated_at = now()
            WHERE id = $1 AND otp = $2
        ";
        let result = sqlx::query(query)
            .bind(user_id)
            .bind(code)
            .execute(&self.pool)
            .instrument(db_span("UPDATE", query))
            .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn email_in_use(&self, email: &str) -> Result<bool, StoreError> {
        let query = r"
            SELECT EXISTS (SELECT 1 FROM devotees WHERE email = $1)
                OR EXISTS (SELECT 1 FROM users WHERE email = $1) AS taken
        ";
        let row = sqlx::query(query)
            .bind(email)
            .fetch_one(&self.pool)
            .instrument(db_span("SELECT", query))
            .await?;

        Ok(row.try_get("taken")?)
    }

    async fn complete_registration(
        &self,
        user_id: Uuid,
        devotee: &NewDevotee,
        role: Role,
    ) -> Result<Registered, StoreError> {
        let mut tx = self.pool.begin().await?;

        let lock_query = "SELECT devotee_id FROM users WHERE id = $1 FOR UPDATE";
        let row = sqlx::query(lock_query)
            .bind(user_id)
            .fetch_optional(&mut *tx)
            .instrument(db_span("SELECT", lock_query))
            .await?;
        let Some(row) = row else {
            return Err(StoreError::UserNotFound);
        };
        let linked: Option<Uuid> = row.try_get("devotee_id")?;
        if linked.is_some() {
            return Err(StoreError::AlreadyRegistered);
        }

        let devotee = insert_devotee(&mut *tx, devotee).await?;

        let link_query = r"
            UPDATE users
            SET devotee_id = $2, email = $3, role = $4, updated_at = now()
            WHERE id = $1
            RETURNING id, mobile_number, email, role, devotee_id, is_active, otp, otp_expires_at, created_at
        ";
        let row = sqlx::query(link_query)
            .bind(user_id)
            .bind(devotee.id)
            .bind(devotee.email.as_deref())
            .bind(role.as_str())
            .fetch_one(&mut *tx)
            .instrument(db_span("UPDATE", link_query))
            .await
            .map_err(map_db_error)?;
        let user = user_from_row(&row)?;

        tx.commit().await?;

        Ok(Registered { user, devotee })
    }

    async fn create_linked_user(
        &self,
        mobile_number: &str,
        devotee: &NewDevotee,
        role: Role,
    ) -> Result<Registered, StoreError> {
        let mut tx = self.pool.begin().await?;

        let devotee = insert_devotee(&mut *tx, devotee).await?;

        let query = r"
            INSERT INTO users (id, mobile_number, email, role, devotee_id)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, mobile_number, email, role, devotee_id, is_active, otp, otp_expires_at, created_at
        ";
        let row = sqlx::query(query)
            .bind(Uuid::new_v4())
            .bind(mobile_number)
            .bind(devotee.email.as_deref())
            .bind(role.as_str())
            .bind(devotee.id)
            .fetch_one(&mut *tx)
            .instrument(db_span("INSERT", query))
            .await
            .map_err(map_db_error)?;
        let user = user_from_row(&row)?;

        tx.commit().await?;

        Ok(Registered { user, devotee })
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let acquire_span = info_span!(
            "db.acquire",
            db.system = "postgresql",
            db.operation = "ACQUIRE"
        );
        let mut conn = self.pool.acquire().instrument(acquire_span).await?;
        let ping_span = info_span!("db.ping", db.system = "postgresql", db.operation = "PING");
        conn.ping().instrument(ping_span).await?;
        Ok(())
    }
}

#[async_trait]
impl DevoteeStore for PgStore {
    async fn list_devotees(&self) -> Result<Vec<Devotee>, StoreError> {
        let query = r"
            SELECT id, name, email, mobile_number, phone, address, city, state, zip_code, country,
                   membership_type, member_since, is_active, created_at, updated_at
            FROM devotees
            ORDER BY created_at
        ";
        let rows = sqlx::query(query)
            .fetch_all(&self.pool)
            .instrument(db_span("SELECT", query))
            .await?;

        let donations_query = r"
            SELECT devotee_id, donated_at, amount, purpose, payment_method, receipt_number, notes
            FROM devotee_donations
            ORDER BY id
        ";
        let donation_rows = sqlx::query(donations_query)
            .fetch_all(&self.pool)
            .instrument(db_span("SELECT", donations_query))
            .await?;

        let mut ledgers: HashMap<Uuid, Vec<Donation>> = HashMap::new();
        for row in &donation_rows {
            let devotee_id: Uuid = row.try_get("devotee_id")?;
            ledgers
                .entry(devotee_id)
                .or_default()
                .push(donation_from_row(row)?);
        }

        rows.iter()
            .map(|row| {
                let id: Uuid = row.try_get("id")?;
                devotee_from_row(row, ledgers.remove(&id).unwrap_or_default())
            })
            .collect()
    }

    async fn find_devotee(&self, id: Uuid) -> Result<Option<Devotee>, StoreError> {
        let query = r"
            SELECT id, name, email, mobile_number, phone, address, city, state, zip_code, country,
                   membership_type, member_since, is_active, created_at, updated_at
            FROM devotees
            WHERE id = $1
        ";
        let row = sqlx::query(query)
            .bind(id)
            .fetch_optional(&self.pool)
            .instrument(db_span("SELECT", query))
            .await?;

        match row {
            Some(row) => {
                let donations = load_donations(&self.pool, id).await?;
                devotee_from_row(&row, donations).map(Some)
            }
            None => Ok(None),
        }
    }

    async fn create_devotee(&self, devotee: &NewDevotee) -> Result<Devotee, StoreError> {
        insert_devotee(&self.pool, devotee).await
    }

    async fn update_devotee(
        &self,
        id: Uuid,
        update: &DevoteeUpdate,
    ) -> Result<Option<Devotee>, StoreError> {
        let query = r"
            UPDATE devotees
            SET name = COALESCE($2, name),
                email = COALESCE($3, email),
                mobile_number = COALESCE($4, mobile_number),
                phone = COALESCE($5, phone),
                address = COALESCE($6, address),
                city = COALESCE($7, city),
                state = COALESCE($8, state),
                zip_code = COALESCE($9, zip_code),
                country = COALESCE($10, country),
                membership_type = COALESCE($11, membership_type),
                is_active = COALESCE($12, is_active),
                updated_at = now()
            WHERE id = $1
            RETURNING id, name, email, mobile_number, phone, address, city, state, zip_code, country,
                      membership_type, member_since, is_active, created_at, updated_at
        ";
        let row = sqlx::query(query)
            .bind(id)
            .bind(update.name.as_deref())
            .bind(update.email.as_deref())
            .bind(update.mobile_number.as_deref())
            .bind(update.phone.as_deref())
            .bind(update.address.as_deref())
            .bind(update.city.as_deref())
            .bind(update.state.as_deref())
            .bind(update.zip_code.as_deref())
            .bind(update.country.as_deref())
            .bind(update.membership_type.map(MembershipType::as_str))
            .bind(update.is_active)
            .fetch_optional(&self.pool)
            .instrument(db_span("UPDATE", query))
            .await
            .map_err(map_db_error)?;

        match row {
            Some(row) => {
                let donations = load_donations(&self.pool, id).await?;
                devotee_from_row(&row, donations).map(Some)
            }
            None => Ok(None),
        }
    }

    async fn delete_devotee(&self, id: Uuid) -> Result<bool, StoreError> {
        let mut tx = self.pool.begin().await?;

        let users_query = "DELETE FROM users WHERE devotee_id = $1";
        sqlx::query(users_query)
            .bind(id)
            .execute(&mut *tx)
            .instrument(db_span("DELETE", users_query))
            .await?;

        let devotee_query = "DELETE FROM devotees WHERE id = $1";
        let result = sqlx::query(devotee_query)
            .bind(id)
            .execute(&mut *tx)
            .instrument(db_span("DELETE", devotee_query))
            .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        tx.commit().await?;
        Ok(true)
    }

    async fn add_donation(
        &self,
        id: Uuid,
        donation: &Donation,
    ) -> Result<Option<Devotee>, StoreError> {
        let query = r"
            INSERT INTO devotee_donations
                (devotee_id, donated_at, amount, purpose, payment_method, receipt_number, notes)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
        ";
        let inserted = sqlx::query(query)
            .bind(id)
            .bind(donation.date)
            .bind(donation.amount)
            .bind(donation.purpose.as_deref())
            .bind(donation.payment_method.as_str())
            .bind(donation.receipt_number.as_deref())
            .bind(donation.notes.as_deref())
            .execute(&self.pool)
            .instrument(db_span("INSERT", query))
            .await;

        match inserted {
            Ok(_) => self.find_devotee(id).await,
            Err(err) if is_foreign_key_violation(&err) => Ok(None),
            Err(err) => Err(err.into()),
        }
    }
}

#[async_trait]
impl AnnouncementStore for PgStore {
    async fn list_active_announcements(&self) -> Result<Vec<Announcement>, StoreError> {
        let query = r"
            SELECT id, title, date_range, description, start_date, end_date, is_active, image_url,
                   created_at, updated_at
            FROM announcements
            WHERE is_active
            ORDER BY start_date
        ";
        let rows = sqlx::query(query)
            .fetch_all(&self.pool)
            .instrument(db_span("SELECT", query))
            .await?;

        rows.iter().map(announcement_from_row).collect()
    }

    async fn find_announcement(&self, id: Uuid) -> Result<Option<Announcement>, StoreError> {
        let query = r"
            SELECT id, title, date_range, description, start_date, end_date, is_active, image_url,
                   created_at, updated_at
            FROM announcements
            WHERE id = $1
        ";
        let row = sqlx::query(query)
            .bind(id)
            .fetch_optional(&self.pool)
            .instrument(db_span("SELECT", query))
            .await?;

        row.as_ref().map(announcement_from_row).transpose()
    }

    async fn create_announcement(
        &self,
        announcement: &NewAnnouncement,
    ) -> Result<Announcement, StoreError> {
        let query = r"
            INSERT INTO announcements
                (id, title, date_range, description, start_date, end_date, is_active, image_url)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id, title, date_range, description, start_date, end_date, is_active, image_url,
                      created_at, updated_at
        ";
        let row = sqlx::query(query)
            .bind(Uuid::new_v4())
            .bind(&announcement.title)
            .bind(&announcement.date_range)
            .bind(&announcement.description)
            .bind(announcement.start_date)
            .bind(announcement.end_date)
            .bind(announcement.is_active)
            .bind(announcement.image_url.as_deref())
            .fetch_one(&self.pool)
            .instrument(db_span("INSERT", query))
            .await?;

        announcement_from_row(&row)
    }

    async fn update_announcement(
        &self,
        id: Uuid,
        update: &AnnouncementUpdate,
    ) -> Result<Option<Announcement>, StoreError> {
        let query = r"
            UPDATE announcements
            SET title = COALESCE($2, title),
                date_range = COALESCE($3, date_range),
                description = COALESCE($4, description),
                start_date = COALESCE($5, start_date),
                end_date = COALESCE($6, end_date),
                is_active = COALESCE($7, is_active),
                image_url = COALESCE($8, image_url),
                updated_at = now()
            WHERE id = $1
            RETURNING id, title, date_range, description, start_date, end_date, is_active, image_url,
                      created_at, updated_at
        ";
        let row = sqlx::query(query)
            .bind(id)
            .bind(update.title.as_deref())
            .bind(update.date_range.as_deref())
            .bind(update.description.as_deref())
            .bind(update.start_date)
            .bind(update.end_date)
            .bind(update.is_active)
            .bind(update.image_url.as_deref())
            .fetch_optional(&self.pool)
            .instrument(db_span("UPDATE", query))
            .await?;

        row.as_ref().map(announcement_from_row).transpose()
    }

    async fn delete_announcement(&self, id: Uuid) -> Result<bool, StoreError> {
        let query = "DELETE FROM announcements WHERE id = $1";
        let result = sqlx::query(query)
            .bind(id)
            .execute(&self.pool)
            .instrument(db_span("DELETE", query))
            .await?;

        Ok(result.rows_affected() == 1)
    }
}

#[async_trait]
impl EventStore for PgStore {
    async fn list_events(&self) -> Result<Vec<Event>, StoreError> {
        let query = concat!("SELECT ", event_columns!(), " FROM events ORDER BY event_date");
        let rows = sqlx::query(query)
            .fetch_all(&self.pool)
            .instrument(db_span("SELECT", query))
            .await?;

        rows.iter().map(event_from_row).collect()
    }

    async fn list_upcoming_events(&self, from: DateTime<Utc>) -> Result<Vec<Event>, StoreError> {
        let query = concat!(
            "SELECT ",
            event_columns!(),
            " FROM events WHERE is_active AND event_date >= $1 ORDER BY event_date"
        );
        let rows = sqlx::query(query)
            .bind(from)
            .fetch_all(&self.pool)
            .instrument(db_span("SELECT", query))
            .await?;

        rows.iter().map(event_from_row).collect()
    }

    async fn find_event(&self, id: Uuid) -> Result<Option<Event>, StoreError> {
        let query = concat!("SELECT ", event_columns!(), " FROM events WHERE id = $1");
        let row = sqlx::query(query)
            .bind(id)
            .fetch_optional(&self.pool)
            .instrument(db_span("SELECT", query))
            .await?;

        row.as_ref().map(event_from_row).transpose()
    }

    async fn create_event(&self, event: &NewEvent) -> Result<Event, StoreError> {
        let query = concat!(
            "INSERT INTO events (id, title, description, event_date, start_time, end_time, ",
            "location, event_type, image_url, is_active, registration_required, max_attendees) ",
            "VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12) RETURNING ",
            event_columns!()
        );
        let row = sqlx::query(query)
            .bind(Uuid::new_v4())
            .bind(&event.title)
            .bind(&event.description)
            .bind(event.date)
            .bind(&event.start_time)
            .bind(&event.end_time)
            .bind(&event.location)
            .bind(event.event_type.as_str())
            .bind(event.image_url.as_deref())
            .bind(event.is_active)
            .bind(event.registration_required)
            .bind(event.max_attendees)
            .fetch_one(&self.pool)
            .instrument(db_span("INSERT", query))
            .await?;

        event_from_row(&row)
    }

    async fn update_event(
        &self,
        id: Uuid,
        update: &EventUpdate,
    ) -> Result<Option<Event>, StoreError> {
        let query = concat!(
            "UPDATE events SET title = COALESCE($2, title), ",
            "description = COALESCE($3, description), ",
            "event_date = COALESCE($4, event_date), ",
            "start_time = COALESCE($5, start_time), ",
            "end_time = COALESCE($6, end_time), ",
            "location = COALESCE($7, location), ",
            "event_type = COALESCE($8, event_type), ",
            "image_url = COALESCE($9, image_url), ",
            "is_active = COALESCE($10, is_active), ",
            "registration_required = COALESCE($11, registration_required), ",
            "max_attendees = COALESCE($12, max_attendees), ",
            "updated_at = now() WHERE id = $1 RETURNING ",
            event_columns!()
        );
        let row = sqlx::query(query)
            .bind(id)
            .bind(update.title.as_deref())
            .bind(update.description.as_deref())
            .bind(update.date)
            .bind(update.start_time.as_deref())
            .bind(update.end_time.as_deref())
            .bind(update.location.as_deref())
            .bind(update.event_type.map(EventType::as_str))
            .bind(update.image_url.as_deref())
            .bind(update.is_active)
            .bind(update.registration_required)
            .bind(update.max_attendees)
            .fetch_optional(&self.pool)
            .instrument(db_span("UPDATE", query))
            .await?;

        row.as_ref().map(event_from_row).transpose()
    }

    async fn delete_event(&self, id: Uuid) -> Result<bool, StoreError> {
        let query = "DELETE FROM events WHERE id = $1";
        let result = sqlx::query(query)
            .bind(id)
            .execute(&self.pool)
            .instrument(db_span("DELETE", query))
            .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn register_for_event(
        &self,
        event_id: Uuid,
        devotee_id: Uuid,
    ) -> Result<EventRegistration, StoreError> {
        let mut tx = self.pool.begin().await?;

        let lock_query =
            "SELECT registration_required, max_attendees FROM events WHERE id = $1 FOR UPDATE";
        let row = sqlx::query(lock_query)
            .bind(event_id)
            .fetch_optional(&mut *tx)
            .instrument(db_span("SELECT", lock_query))
            .await?;
        let Some(row) = row else {
            return Ok(EventRegistration::NotFound);
        };
        let registration_required: bool = row.try_get("registration_required")?;
        let max_attendees: Option<i32> = row.try_get("max_attendees")?;
        if !registration_required {
            return Ok(EventRegistration::NotRequired);
        }

        let count_query = r"
            SELECT COUNT(*) AS attendees, COALESCE(BOOL_OR(devotee_id = $2), FALSE) AS registered
            FROM event_registrations
            WHERE event_id = $1
        ";
        let row = sqlx::query(count_query)
            .bind(event_id)
            .bind(devotee_id)
            .fetch_one(&mut *tx)
            .instrument(db_span("SELECT", count_query))
            .await?;
        let attendees: i64 = row.try_get("attendees")?;
        let registered: bool = row.try_get("registered")?;
        if registered {
            return Ok(EventRegistration::AlreadyRegistered);
        }
        if max_attendees.is_some_and(|max| attendees >= i64::from(max)) {
            return Ok(EventRegistration::Full);
        }

        let insert_query = "INSERT INTO event_registrations (event_id, devotee_id) VALUES ($1, $2)";
        sqlx::query(insert_query)
            .bind(event_id)
            .bind(devotee_id)
            .execute(&mut *tx)
            .instrument(db_span("INSERT", insert_query))
            .await?;

        let touch_query = concat!(
            "UPDATE events SET updated_at = now() WHERE id = $1 RETURNING ",
            event_columns!()
        );
        let row = sqlx::query(touch_query)
            .bind(event_id)
            .fetch_one(&mut *tx)
            .instrument(db_span("UPDATE", touch_query))
            .await?;
        let event = event_from_row(&row)?;

        tx.commit().await?;

        Ok(EventRegistration::Registered(event))
    }
}

#[async_trait]
impl PujaStore for PgStore {
    async fn list_active_pujas(&self) -> Result<Vec<Puja>, StoreError> {
        let query = concat!("SELECT ", puja_columns!(), " FROM pujas WHERE is_active ORDER BY name");
        let rows = sqlx::query(query)
            .fetch_all(&self.pool)
            .instrument(db_span("SELECT", query))
            .await?;

        rows.iter().map(puja_from_row).collect()
    }

    async fn find_puja(&self, id: Uuid) -> Result<Option<Puja>, StoreError> {
        let query = concat!("SELECT ", puja_columns!(), " FROM pujas WHERE id = $1");
        let row = sqlx::query(query)
            .bind(id)
            .fetch_optional(&self.pool)
            .instrument(db_span("SELECT", query))
            .await?;

        row.as_ref().map(puja_from_row).transpose()
    }

    async fn create_puja(&self, puja: &NewPuja) -> Result<Puja, StoreError> {
        let query = concat!(
            "INSERT INTO pujas (id, name, description, category, duration, cost, deity, ",
            "requirements, is_active) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) RETURNING ",
            puja_columns!()
        );
        let row = sqlx::query(query)
            .bind(Uuid::new_v4())
            .bind(&puja.name)
            .bind(&puja.description)
            .bind(puja.category.as_str())
            .bind(&puja.duration)
            .bind(puja.cost)
            .bind(puja.deity.as_deref())
            .bind(&puja.requirements)
            .bind(puja.is_active)
            .fetch_one(&self.pool)
            .instrument(db_span("INSERT", query))
            .await?;

        puja_from_row(&row)
    }

    async fn update_puja(&self, id: Uuid, update: &PujaUpdate) -> Result<Option<Puja>, StoreError> {
        let query = concat!(
            "UPDATE pujas SET name = COALESCE($2, name), ",
            "description = COALESCE($3, description), ",
            "category = COALESCE($4, category), ",
            "duration = COALESCE($5, duration), ",
            "cost = COALESCE($6, cost), ",
            "deity = COALESCE($7, deity), ",
            "requirements = COALESCE($8, requirements), ",
            "is_active = COALESCE($9, is_active), ",
            "updated_at = now() WHERE id = $1 RETURNING ",
            puja_columns!()
        );
        let row = sqlx::query(query)
            .bind(id)
            .bind(update.name.as_deref())
            .bind(update.description.as_deref())
            .bind(update.category.map(PujaCategory::as_str))
            .bind(update.duration.as_deref())
            .bind(update.cost)
            .bind(update.deity.as_deref())
            .bind(update.requirements.as_deref())
            .bind(update.is_active)
            .fetch_optional(&self.pool)
            .instrument(db_span("UPDATE", query))
            .await?;

        row.as_ref().map(puja_from_row).transpose()
    }

    async fn delete_puja(&self, id: Uuid) -> Result<bool, StoreError> {
        let query = "DELETE FROM pujas WHERE id = $1";
        let result = sqlx::query(query)
            .bind(id)
            .execute(&self.pool)
            .instrument(db_span("DELETE", query))
            .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn create_booking(
        &self,
        devotee_id: Uuid,
        request: &BookingRequest,
    ) -> Result<Option<PujaBooking>, StoreError> {
        // The amount is read from the puja row inside the same statement.
        let query = concat!(
            "INSERT INTO puja_bookings (id, puja_id, devotee_id, booking_date, booking_time, ",
            "location, instructions, payment_amount, payment_method) ",
            "SELECT $1, p.id, $3, $4, $5, $6, $7, p.cost, $8 FROM pujas p ",
            "WHERE p.id = $2 AND p.is_active RETURNING ",
            booking_columns!()
        );
        let row = sqlx::query(query)
            .bind(Uuid::new_v4())
            .bind(request.puja_id)
            .bind(devotee_id)
            .bind(request.date)
            .bind(&request.time)
            .bind(request.location.as_str())
            .bind(request.instructions.as_deref())
            .bind(request.payment_method.as_str())
            .fetch_optional(&self.pool)
            .instrument(db_span("INSERT", query))
            .await?;

        row.as_ref().map(booking_from_row).transpose()
    }

    async fn list_bookings(
        &self,
        devotee_id: Option<Uuid>,
    ) -> Result<Vec<PujaBooking>, StoreError> {
        let query = concat!(
            "SELECT ",
            booking_columns!(),
            " FROM puja_bookings WHERE ($1::uuid IS NULL OR devotee_id = $1) ",
            "ORDER BY booking_date, created_at"
        );
        let rows = sqlx::query(query)
            .bind(devotee_id)
            .fetch_all(&self.pool)
            .instrument(db_span("SELECT", query))
            .await?;

        rows.iter().map(booking_from_row).collect()
    }

    async fn cancel_booking(
        &self,
        id: Uuid,
        devotee_id: Uuid,
    ) -> Result<BookingCancellation, StoreError> {
        let mut tx = self.pool.begin().await?;

        let lock_query =
            "SELECT status FROM puja_bookings WHERE id = $1 AND devotee_id = $2 FOR UPDATE";
        let row = sqlx::query(lock_query)
            .bind(id)
            .bind(devotee_id)
            .fetch_optional(&mut *tx)
            .instrument(db_span("SELECT", lock_query))
            .await?;
        let Some(row) = row else {
            return Ok(BookingCancellation::NotFound);
        };
        let status: String = row.try_get("status")?;
        if parse::<BookingStatus>(&status)? == BookingStatus::Completed {
            return Ok(BookingCancellation::Completed);
        }

        let cancel_query = concat!(
            "UPDATE puja_bookings SET status = 'cancelled', updated_at = now() ",
            "WHERE id = $1 RETURNING ",
            booking_columns!()
        );
        let row = sqlx::query(cancel_query)
            .bind(id)
            .fetch_one(&mut *tx)
            .instrument(db_span("UPDATE", cancel_query))
            .await?;
        let booking = booking_from_row(&row)?;

        tx.commit().await?;

        Ok(BookingCancellation::Cancelled(booking))
    }

    async fn set_booking_status(
        &self,
        id: Uuid,
        status: BookingStatus,
    ) -> Result<Option<PujaBooking>, StoreError> {
        let query = concat!(
            "UPDATE puja_bookings SET status = $2, updated_at = now() WHERE id = $1 RETURNING ",
            booking_columns!()
        );
        let row = sqlx::query(query)
            .bind(id)
            .bind(status.as_str())
            .fetch_optional(&self.pool)
            .instrument(db_span("UPDATE", query))
            .await?;

        row.as_ref().map(booking_from_row).transpose()
    }
}

#[async_trait]
impl PaymentStore for PgStore {
    async fn create_payment(
        &self,
        user_id: Uuid,
        payment: &NewPayment,
    ) -> Result<Payment, StoreError> {
        let query = concat!(
            "INSERT INTO payments (id, amount, payment_type, user_id, description) ",
            "VALUES ($1, $2, $3, $4, $5) RETURNING ",
            payment_columns!()
        );
        let row = sqlx::query(query)
            .bind(Uuid::new_v4())
            .bind(payment.amount)
            .bind(payment.payment_type.as_str())
            .bind(user_id)
            .bind(payment.description.as_deref())
            .fetch_one(&self.pool)
            .instrument(db_span("INSERT", query))
            .await;

        match row {
            Ok(row) => payment_from_row(&row),
            Err(err) if is_foreign_key_violation(&err) => Err(StoreError::UserNotFound),
            Err(err) => Err(err.into()),
        }
    }

    async fn list_payments(&self, user_id: Option<Uuid>) -> Result<Vec<Payment>, StoreError> {
        let query = concat!(
            "SELECT ",
            payment_columns!(),
            " FROM payments WHERE ($1::uuid IS NULL OR user_id = $1) ORDER BY created_at DESC"
        );
        let rows = sqlx::query(query)
            .bind(user_id)
            .fetch_all(&self.pool)
            .instrument(db_span("SELECT", query))
            .await?;

        rows.iter().map(payment_from_row).collect()
    }

    async fn find_payment(&self, id: Uuid) -> Result<Option<Payment>, StoreError> {
        let query = concat!("SELECT ", payment_columns!(), " FROM payments WHERE id = $1");
        let row = sqlx::query(query)
            .bind(id)
            .fetch_optional(&self.pool)
            .instrument(db_span("SELECT", query))
            .await?;

        row.as_ref().map(payment_from_row).transpose()
    }

    async fn update_payment(
        &self,
        id: Uuid,
        update: &PaymentUpdate,
    ) -> Result<Option<Payment>, StoreError> {
        let query = concat!(
            "UPDATE payments SET status = COALESCE($2, status), ",
            "payment_type = COALESCE($3, payment_type), ",
            "description = COALESCE($4, description), ",
            "updated_at = now() WHERE id = $1 RETURNING ",
            payment_columns!()
        );
        let row = sqlx::query(query)
            .bind(id)
            .bind(update.status.map(PaymentStatus::as_str))
            .bind(update.payment_type.map(PaymentType::as_str))
            .bind(update.description.as_deref())
            .fetch_optional(&self.pool)
            .instrument(db_span("UPDATE", query))
            .await?;

        row.as_ref().map(payment_from_row).transpose()
    }

    async fn delete_payment(&self, id: Uuid) -> Result<bool, StoreError> {
        let query = "DELETE FROM payments WHERE id = $1";
        let result = sqlx::query(query)
            .bind(id)
            .execute(&self.pool)
            .instrument(db_span("DELETE", query))
            .await?;

        Ok(result.rows_affected() == 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_defines_every_table() {
        for table in [
            "devotees",
            "devotee_donations",
            "users",
            "announcements",
            "events",
            "event_registrations",
            "pujas",
            "puja_bookings",
            "payments",
        ] {
            assert!(
                SCHEMA.contains(&format!("CREATE TABLE IF NOT EXISTS {table} (")),
                "missing table {table}"
            );
        }
    }

    #[test]
    fn schema_enforces_otp_pairing() {
        assert!(SCHEMA.contains("CHECK ((otp IS NULL) = (otp_expires_at IS NULL))"));
    }

    #[test]
    fn event_columns_include_sign_ups() {
        let query = concat!("SELECT ", event_columns!(), " FROM events");
        assert!(query.contains("AS registered_devotees"));
        assert!(query.contains("WHERE r.event_id = events.id"));
    }

    #[test]
    fn schema_keeps_sign_ups_unique() {
        assert!(SCHEMA.contains("CONSTRAINT event_registrations_once UNIQUE (event_id, devotee_id)"));
    }

    #[test]
    fn non_database_errors_stay_opaque() {
        let err = map_db_error(sqlx::Error::RowNotFound);
        assert!(matches!(err, StoreError::Database(sqlx::Error::RowNotFound)));
        assert!(!is_foreign_key_violation(&sqlx::Error::RowNotFound));
    }

    #[test]
    fn parse_reports_unknown_values() {
        let err = parse::<Role>("root");
        assert!(matches!(err, Err(StoreError::InvalidRecord(_))));
    }
}
