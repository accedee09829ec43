use crate::{
    api::{self, state::AppState},
    cli::telemetry,
    clock::{Clock, SystemClock},
    identity::{MemoryStore, PgStore, TempleStore},
    otp::OtpEngine,
    session::SessionIssuer,
    sms::{DeliveryGateway, LogDeliveryGateway, TwilioConfig, TwilioGateway},
};
use anyhow::{Context, Result};
use chrono::Duration;
use secrecy::SecretString;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: Option<String>,
    pub jwt_secret: SecretString,
    pub session_ttl_seconds: i64,
    pub otp_ttl_seconds: i64,
    pub admin_secret_key: Option<SecretString>,
    pub cors_origin: Option<String>,
    pub twilio_account_sid: Option<String>,
    pub twilio_auth_token: Option<SecretString>,
    pub twilio_from_number: Option<String>,
}

/// Execute the server action.
/// # Errors
/// Returns an error if the database is unreachable, the schema cannot be
/// applied, the SMS client cannot be built, or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let gateway = gateway(&args)?;

    let result = match args.dsn.as_deref() {
        Some(dsn) => {
            let store = PgStore::connect(dsn).await?;
            store.ensure_schema().await?;
            info!("Connected to PostgreSQL");
            serve(Arc::new(store), gateway, clock, args).await
        }
        None => {
            warn!("No --dsn given; records are kept in memory and lost on exit");
            serve(Arc::new(MemoryStore::new()), gateway, clock, args).await
        }
    };

    telemetry::shutdown_tracer();

    result
}

fn gateway(args: &Args) -> Result<Arc<dyn DeliveryGateway>> {
    match (
        &args.twilio_account_sid,
        &args.twilio_auth_token,
        &args.twilio_from_number,
    ) {
        (Some(sid), Some(token), Some(from)) => {
            info!("Delivering one-time codes through Twilio");
            let config = TwilioConfig::new(sid.clone(), token.clone(), from.clone());
            Ok(Arc::new(TwilioGateway::new(config)?))
        }
        _ => {
            warn!("Twilio is not configured; one-time codes are only logged");
            Ok(Arc::new(LogDeliveryGateway))
        }
    }
}

async fn serve<S>(
    store: Arc<S>,
    gateway: Arc<dyn DeliveryGateway>,
    clock: Arc<dyn Clock>,
    args: Args,
) -> Result<()>
where
    S: TempleStore + 'static,
{
    let session_ttl = Duration::try_seconds(args.session_ttl_seconds)
        .context("session TTL is out of range")?;
    let otp_ttl =
        Duration::try_seconds(args.otp_ttl_seconds).context("OTP TTL is out of range")?;

    let sessions = SessionIssuer::new(&args.jwt_secret, clock.clone()).with_ttl(session_ttl);

    let engine =
        OtpEngine::new(store.clone(), gateway, sessions, clock.clone()).with_ttl(otp_ttl);

    if args.admin_secret_key.is_none() {
        info!("Admin self-registration is disabled");
    }

    let state =
        Arc::new(AppState::new(store, engine, clock).with_admin_secret(args.admin_secret_key));

    api::new(args.port, state, args.cors_origin).await
}
