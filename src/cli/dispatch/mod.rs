//! Map parsed CLI matches to the action the binary executes.

use crate::cli::actions::{server::Args, Action};
use crate::cli::commands::{auth, sms};
use anyhow::Result;

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>("port").copied().unwrap_or(4000);
    let dsn = matches.get_one::<String>("dsn").cloned();

    let auth_opts = auth::Options::parse(matches)?;
    let sms_opts = sms::Options::parse(matches);

    Ok(Action::Server(Args {
        port,
        dsn,
        jwt_secret: auth_opts.jwt_secret,
        session_ttl_seconds: auth_opts.session_ttl_seconds,
        otp_ttl_seconds: auth_opts.otp_ttl_seconds,
        admin_secret_key: auth_opts.admin_secret_key,
        cors_origin: auth_opts.cors_origin,
        twilio_account_sid: sms_opts.account_sid,
        twilio_auth_token: sms_opts.auth_token,
        twilio_from_number: sms_opts.from_number,
    }))
}
