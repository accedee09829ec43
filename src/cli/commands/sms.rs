use clap::{Arg, ArgMatches, Command};
use secrecy::SecretString;

pub const ARG_TWILIO_ACCOUNT_SID: &str = "twilio-account-sid";
pub const ARG_TWILIO_AUTH_TOKEN: &str = "twilio-auth-token";
pub const ARG_TWILIO_FROM_NUMBER: &str = "twilio-from-number";

/// Twilio credentials; the SMS gateway is only enabled when all three are set.
#[derive(Debug, Default)]
pub struct Options {
    pub account_sid: Option<String>,
    pub auth_token: Option<SecretString>,
    pub from_number: Option<String>,
}

impl Options {
    #[must_use]
    pub fn parse(matches: &ArgMatches) -> Self {
        Self {
            account_sid: matches.get_one::<String>(ARG_TWILIO_ACCOUNT_SID).cloned(),
            auth_token: matches
                .get_one::<String>(ARG_TWILIO_AUTH_TOKEN)
                .cloned()
                .map(SecretString::from),
            from_number: matches.get_one::<String>(ARG_TWILIO_FROM_NUMBER).cloned(),
        }
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_TWILIO_ACCOUNT_SID)
                .long(ARG_TWILIO_ACCOUNT_SID)
                .help("Twilio account SID")
                .env("TEMPLE_TWILIO_ACCOUNT_SID")
                .requires_all([ARG_TWILIO_AUTH_TOKEN, ARG_TWILIO_FROM_NUMBER]),
        )
        .arg(
            Arg::new(ARG_TWILIO_AUTH_TOKEN)
                .long(ARG_TWILIO_AUTH_TOKEN)
                .help("Twilio auth token")
                .env("TEMPLE_TWILIO_AUTH_TOKEN")
                .hide_env_values(true)
                .requires_all([ARG_TWILIO_ACCOUNT_SID, ARG_TWILIO_FROM_NUMBER]),
        )
        .arg(
            Arg::new(ARG_TWILIO_FROM_NUMBER)
                .long(ARG_TWILIO_FROM_NUMBER)
                .help("Sender number in E.164 format, example: +15005550006")
                .env("TEMPLE_TWILIO_FROM_NUMBER")
                .requires_all([ARG_TWILIO_ACCOUNT_SID, ARG_TWILIO_AUTH_TOKEN]),
        )
}
