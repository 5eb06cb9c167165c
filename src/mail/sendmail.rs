use lettre::{
    message::{header::ContentType, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::time::{sleep, Duration};

use crate::config::Config;

/// Retries after the first attempt; waits double from `RETRY_BASE_DELAY_SECS`.
pub const MAX_RETRIES: u32 = 3;
pub const RETRY_BASE_DELAY_SECS: u64 = 2;

#[derive(Debug, Error)]
pub enum MailError {
    #[error("invalid address: {0}")]
    Address(#[from] lettre::address::AddressError),

    #[error("could not build message: {0}")]
    Build(#[from] lettre::error::Error),

    #[error("smtp error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),

    #[error("queue error: {0}")]
    Queue(#[from] redis::RedisError),

    #[error("payload error: {0}")]
    Payload(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MailTemplate {
    Verification,
    Welcome,
    ResetPassword,
    DeleteAccount,
    ShipmentUpdate,
}

impl MailTemplate {
    fn source(&self) -> &'static str {
        match self {
            MailTemplate::Verification => include_str!("templates/verification-email.html"),
            MailTemplate::Welcome => include_str!("templates/welcome-email.html"),
            MailTemplate::ResetPassword => include_str!("templates/reset-password-email.html"),
            MailTemplate::DeleteAccount => include_str!("templates/delete-account-email.html"),
            MailTemplate::ShipmentUpdate => include_str!("templates/shipment-update-email.html"),
        }
    }
}

/// One email, as stored on the queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailJob {
    pub to: String,
    pub subject: String,
    pub template: MailTemplate,
    pub placeholders: Vec<(String, String)>,
    #[serde(default)]
    pub attempts: u32,
}

impl MailJob {
    pub fn render(&self) -> String {
        let mut html = self.template.source().to_string();
        for (key, value) in &self.placeholders {
            html = html.replace(&format!("{{{{{}}}}}", key), &escape_html(value));
        }
        html
    }
}

fn escape_html(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Delay before retry number `attempt` (1-based): 2s, 4s, 8s.
pub fn retry_delay(attempt: u32) -> Duration {
    Duration::from_secs(RETRY_BASE_DELAY_SECS * 2_u64.pow(attempt.saturating_sub(1)))
}

#[derive(Clone)]
pub struct Mailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: String,
}

impl Mailer {
    pub fn new(config: &Config) -> Result<Self, MailError> {
        let transport = if config.smtp_username.is_empty() {
            // local relay (mailhog and friends), no TLS or auth
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.smtp_host)
                .port(config.smtp_port)
                .build()
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp_host)?
                .port(config.smtp_port)
                .credentials(Credentials::new(
                    config.smtp_username.clone(),
                    config.smtp_password.clone(),
                ))
                .build()
        };

        Ok(Self {
            transport,
            from: config.smtp_from.clone(),
        })
    }

    pub async fn send(&self, job: &MailJob) -> Result<(), MailError> {
        let email = Message::builder()
            .from(self.from.parse()?)
            .to(job.to.parse()?)
            .subject(job.subject.as_str())
            .multipart(
                MultiPart::alternative().singlepart(
                    SinglePart::builder()
                        .header(ContentType::TEXT_HTML)
                        .body(job.render()),
                ),
            )?;

        self.transport.send(email).await?;
        tracing::info!("Email '{}' sent to {}", job.subject, job.to);
        Ok(())
    }

    /// In-process delivery used when no queue is available.
    pub async fn send_with_retries(&self, job: &MailJob) -> Result<(), MailError> {
        let mut attempt = 0;
        loop {
            match self.send(job).await {
                Ok(()) => return Ok(()),
                Err(e) if attempt < MAX_RETRIES => {
                    attempt += 1;
                    let delay = retry_delay(attempt);
                    tracing::warn!(
                        "Email to {} failed ({}), retry {} in {:?}",
                        job.to,
                        e,
                        attempt,
                        delay
                    );
                    sleep(delay).await;
                }
                Err(e) => {
                    tracing::error!("Email to {} failed after {} retries: {}", job.to, MAX_RETRIES, e);
                    return Err(e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholders_are_filled_and_escaped() {
        let job = MailJob {
            to: "a@b.pk".to_string(),
            subject: "Verify".to_string(),
            template: MailTemplate::Verification,
            placeholders: vec![
                ("name".to_string(), "<Ali & Sons>".to_string()),
                ("verification_link".to_string(), "https://haulway.pk/verify?token=t".to_string()),
            ],
            attempts: 0,
        };

        let html = job.render();
        assert!(html.contains("&lt;Ali &amp; Sons&gt;"));
        assert!(html.contains("https://haulway.pk/verify?token=t"));
        assert!(!html.contains("{{name}}"));
    }

    #[test]
    fn backoff_doubles_from_two_seconds() {
        assert_eq!(retry_delay(1), Duration::from_secs(2));
        assert_eq!(retry_delay(2), Duration::from_secs(4));
        assert_eq!(retry_delay(3), Duration::from_secs(8));
    }

    #[test]
    fn jobs_survive_the_queue_encoding() {
        let raw = r#"{"to":"x@y.pk","subject":"s","template":"welcome","placeholders":[["name","Ali"]]}"#;
        let job: MailJob = serde_json::from_str(raw).unwrap();
        assert_eq!(job.template, MailTemplate::Welcome);
        assert_eq!(job.attempts, 0);
    }
}
