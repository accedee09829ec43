use anyhow::{Context, Result};
use clap::{Arg, ArgMatches, Command};
use secrecy::SecretString;

pub const ARG_JWT_SECRET: &str = "jwt-secret";
pub const ARG_SESSION_TTL_SECONDS: &str = "session-ttl-seconds";
pub const ARG_OTP_TTL_SECONDS: &str = "otp-ttl-seconds";
pub const ARG_ADMIN_SECRET_KEY: &str = "admin-secret-key";
pub const ARG_CORS_ORIGIN: &str = "cors-origin";

/// Upper bound for both TTL flags: one year.
pub const MAX_TTL_SECONDS: i64 = 365 * 24 * 60 * 60;

#[derive(Debug)]
pub struct Options {
    pub jwt_secret: SecretString,
    pub session_ttl_seconds: i64,
    pub otp_ttl_seconds: i64,
    pub admin_secret_key: Option<SecretString>,
    pub cors_origin: Option<String>,
}

impl Options {
    /// # Errors
    /// Returns an error if the signing secret is missing.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        let jwt_secret = matches
            .get_one::<String>(ARG_JWT_SECRET)
            .cloned()
            .context("missing required argument: --jwt-secret")?;

        Ok(Self {
            jwt_secret: SecretString::from(jwt_secret),
            session_ttl_seconds: matches
                .get_one::<i64>(ARG_SESSION_TTL_SECONDS)
                .copied()
                .unwrap_or(crate::session::DEFAULT_SESSION_TTL_SECONDS),
            otp_ttl_seconds: matches
                .get_one::<i64>(ARG_OTP_TTL_SECONDS)
                .copied()
                .unwrap_or(crate::otp::DEFAULT_OTP_TTL_SECONDS),
            admin_secret_key: matches
                .get_one::<String>(ARG_ADMIN_SECRET_KEY)
                .filter(|secret| !secret.is_empty())
                .cloned()
                .map(SecretString::from),
            cors_origin: matches.get_one::<String>(ARG_CORS_ORIGIN).cloned(),
        })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_JWT_SECRET)
                .long(ARG_JWT_SECRET)
                .help("Secret used to sign session tokens (HS256)")
                .env("TEMPLE_JWT_SECRET")
                .hide_env_values(true)
                .required(true),
        )
        .arg(
            Arg::new(ARG_SESSION_TTL_SECONDS)
                .long(ARG_SESSION_TTL_SECONDS)
                .help("Session token TTL in seconds")
                .env("TEMPLE_SESSION_TTL_SECONDS")
                .default_value("86400")
                .value_parser(clap::value_parser!(i64).range(1..=MAX_TTL_SECONDS)),
        )
        .arg(
            Arg::new(ARG_OTP_TTL_SECONDS)
                .long(ARG_OTP_TTL_SECONDS)
                .help("One-time code TTL in seconds")
                .env("TEMPLE_OTP_TTL_SECONDS")
                .default_value("600")
                .value_parser(clap::value_parser!(i64).range(1..=MAX_TTL_SECONDS)),
        )
        .arg(
            Arg::new(ARG_ADMIN_SECRET_KEY)
                .long(ARG_ADMIN_SECRET_KEY)
                .help("Shared secret enabling admin self-registration (disabled when unset)")
                .env("TEMPLE_ADMIN_SECRET_KEY")
                .hide_env_values(true),
        )
        .arg(
            Arg::new(ARG_CORS_ORIGIN)
                .long(ARG_CORS_ORIGIN)
                .help("Allowed browser origin, example: https://admin.temple.app (any origin when unset)")
                .env("TEMPLE_CORS_ORIGIN"),
        )
}
