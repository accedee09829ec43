//! Delivery gateway for one-time codes.
//!
//! The gateway is chosen once at start-up and injected into the OTP engine:
//! Twilio when credentials are configured, otherwise a stub that only logs.

use async_trait::async_trait;
use tracing::info;

mod twilio;

pub use twilio::{TwilioConfig, TwilioGateway};

#[async_trait]
pub trait DeliveryGateway: Send + Sync {
    /// Send `code` to `mobile_number`. Returns whether the provider accepted it.
    async fn send(&self, mobile_number: &str, code: &str) -> bool;
}

/// Text of the verification SMS.
#[must_use]
pub fn message_body(code: &str) -> String {
    format!("Your Temple App verification code is: {code}")
}

/// Development gateway: logs the code and always reports success.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogDeliveryGateway;

#[async_trait]
impl DeliveryGateway for LogDeliveryGateway {
    async fn send(&self, mobile_number: &str, code: &str) -> bool {
        info!(mobile_number, code, "[DEV MODE] OTP delivery stub");
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_body_contains_code() {
        assert_eq!(
            message_body("482913"),
            "Your Temple App verification code is: 482913"
        );
    }

    #[tokio::test]
    async fn log_gateway_always_succeeds() {
        assert!(LogDeliveryGateway.send("+15550000001", "482913").await);
    }
}
