//! Twilio Messages API gateway.

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use std::time::Duration;
use tracing::{debug, error, Instrument};

use super::{message_body, DeliveryGateway};

const DEFAULT_BASE_URL: &str = "https://api.twilio.com";

#[derive(Clone, Debug)]
pub struct TwilioConfig {
    account_sid: String,
    auth_token: SecretString,
    from_number: String,
    base_url: String,
}

impl TwilioConfig {
    #[must_use]
    pub fn new(account_sid: String, auth_token: SecretString, from_number: String) -> Self {
        Self {
            account_sid,
            auth_token,
            from_number,
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url;
        self
    }

    #[must_use]
    pub fn account_sid(&self) -> &str {
        &self.account_sid
    }

    #[must_use]
    pub fn from_number(&self) -> &str {
        &self.from_number
    }

    fn messages_url(&self) -> String {
        format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.base_url.trim_end_matches('/'),
            self.account_sid
        )
    }
}

#[derive(Clone, Debug)]
pub struct TwilioGateway {
    client: Client,
    config: TwilioConfig,
}

impl TwilioGateway {
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: TwilioConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .user_agent(crate::APP_USER_AGENT)
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl DeliveryGateway for TwilioGateway {
    async fn send(&self, mobile_number: &str, code: &str) -> bool {
        let body = message_body(code);
        let form = [
            ("To", mobile_number),
            ("From", self.config.from_number()),
            ("Body", body.as_str()),
        ];
        let span = tracing::info_span!("sms.send", sms.provider = "twilio");

        let response = self
            .client
            .post(self.config.messages_url())
            .basic_auth(
                self.config.account_sid(),
                Some(self.config.auth_token.expose_secret()),
            )
            .form(&form)
            .send()
            .instrument(span)
            .await;

        match response {
            Ok(response) if response.status().is_success() => {
                debug!(mobile_number, "OTP SMS accepted by Twilio");
                true
            }
            Ok(response) => {
                error!(
                    mobile_number,
                    status = %response.status(),
                    "Twilio rejected OTP SMS"
                );
                false
            }
            Err(err) => {
                error!(mobile_number, "Error sending OTP SMS: {err}");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_url_uses_account() {
        let config = TwilioConfig::new(
            "AC123".to_string(),
            SecretString::from("token".to_string()),
            "+15005550006".to_string(),
        );
        assert_eq!(
            config.messages_url(),
            "https://api.twilio.com/2010-04-01/Accounts/AC123/Messages.json"
        );
    }

    #[test]
    fn base_url_trailing_slash_is_ignored() {
        let config = TwilioConfig::new(
            "AC123".to_string(),
            SecretString::from("token".to_string()),
            "+15005550006".to_string(),
        )
        .with_base_url("http://127.0.0.1:9999/".to_string());
        assert_eq!(
            config.messages_url(),
            "http://127.0.0.1:9999/2010-04-01/Accounts/AC123/Messages.json"
        );
    }

    #[tokio::test]
    async fn unreachable_provider_reports_failure() -> anyhow::Result<()> {
        // Port 9 (discard) on localhost is expected to refuse the connection.
        let config = TwilioConfig::new(
            "AC123".to_string(),
            SecretString::from("token".to_string()),
            "+15005550006".to_string(),
        )
        .with_base_url("http://127.0.0.1:9".to_string());
        let gateway = TwilioGateway::new(config)?;
        assert!(!gateway.send("+15550000001", "482913").await);
        Ok(())
    }
}
