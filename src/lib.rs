//! # Temple (Temple management API)
//!
//! `temple` is the backend for a temple's member records, announcements and
//! mobile-number login.
//!
//! ## Authentication (mobile OTP)
//!
//! There are no passwords. A client requests a six digit one-time code for a
//! mobile number, the code is delivered over SMS, and the client submits it
//! back. A verified code either signs in a returning member or, on first
//! verification, requires the member's profile data before a `Devotee`
//! record is created and linked.
//!
//! - **Single use:** a code is cleared atomically on successful verification;
//!   replaying it fails as an invalid code.
//! - **Expiry:** codes are valid for ten minutes by default. An expired code
//!   is rejected but not cleared, so requesting a new one is always safe.
//! - **Sessions:** successful verification yields a signed bearer credential
//!   carrying the user id and role, valid for 24 hours. There is no refresh;
//!   the client runs a new OTP cycle.
//!
//! ## Records
//!
//! A `User` is the login identity (mobile number, role, pending code). A
//! `Devotee` is the member profile with membership data and an append-only
//! donation ledger. A user references at most one devotee.

pub mod api;
pub mod cli;
pub mod clock;
pub mod identity;
pub mod otp;
pub mod session;
pub mod sms;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
