// service/sms.rs
use crate::{config::Config, service::error::ServiceError, utils::phone};

#[derive(Debug, Clone)]
pub struct SmsClient {
    http: reqwest::Client,
    api_url: String,
    api_key: String,
    sender: String,
}

impl SmsClient {
    pub fn new(config: &Config) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_url: config.sms_api_url.clone(),
            api_key: config.sms_api_key.clone(),
            sender: config.sms_sender.clone(),
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.api_url.is_empty()
    }

    pub async fn send(&self, to: &str, message: &str) -> Result<(), ServiceError> {
        let recipient = phone::to_gateway(to)
            .ok_or_else(|| ServiceError::Sms(format!("invalid recipient {}", to)))?;

        if !self.is_configured() {
            tracing::warn!("SMS gateway not configured, dropping message to {}", recipient);
            tracing::debug!("undelivered SMS to {}: {}", recipient, message);
            return Ok(());
        }

        let payload = serde_json::json!({
            "to": recipient,
            "from": self.sender,
            "message": message,
        });

        let response = self
            .http
            .post(&self.api_url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&payload)
            .send()
            .await
            .map_err(|e| ServiceError::Sms(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ServiceError::Sms(format!("gateway returned {}: {}", status, body)));
        }

        tracing::info!("SMS sent to {}", recipient);
        Ok(())
    }

    pub async fn send_otp(&self, to: &str, otp: &str) -> Result<(), ServiceError> {
        self.send(to, &otp_message(otp)).await
    }
}

fn otp_message(otp: &str) -> String {
    format!(
        "Your Haulway verification code is {}. It expires in {} minutes. Do not share it.",
        otp,
        crate::utils::otp_generator::OTP_TTL_MINUTES
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unconfigured_gateway_is_a_noop() {
        let client = SmsClient::new(&Config::for_tests());
        assert!(!client.is_configured());
        assert!(client.send_otp("03001234567", "123456").await.is_ok());
    }

    #[tokio::test]
    async fn bad_recipient_is_rejected() {
        let client = SmsClient::new(&Config::for_tests());
        assert!(client.send("12345", "hi").await.is_err());
    }

    #[test]
    fn otp_message_mentions_code_and_ttl() {
        let text = otp_message("482913");
        assert!(text.contains("482913"));
        assert!(text.contains("10 minutes"));
    }
}
