use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use super::NotifyError;
use crate::config::ResendConfig;

const RESEND_ENDPOINT: &str = "https://api.resend.com/emails";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq)]
pub struct Email {
    pub to: String,
    pub subject: String,
    pub html: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: &Email) -> Result<(), NotifyError>;
}

#[derive(Serialize)]
struct ResendPayload<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: &'a str,
    html: &'a str,
}

pub struct ResendMailer {
    client: reqwest::Client,
    config: ResendConfig,
}

impl ResendMailer {
    pub fn new(config: ResendConfig) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl Mailer for ResendMailer {
    async fn send(&self, email: &Email) -> Result<(), NotifyError> {
        let payload = ResendPayload {
            from: &self.config.from,
            to: [&email.to],
            subject: &email.subject,
            html: &email.html,
        };

        let response = self
            .client
            .post(RESEND_ENDPOINT)
            .bearer_auth(&self.config.api_key)
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(NotifyError::HttpStatus(response.status().as_u16()));
        }

        tracing::debug!(to = %email.to, subject = %email.subject, "Email sent");
        Ok(())
    }
}

/// Development fallback when no mail provider is configured.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: &Email) -> Result<(), NotifyError> {
        tracing::info!(to = %email.to, subject = %email.subject, "Email (not sent, no provider)");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resend_payload_shape() {
        let payload = ResendPayload {
            from: "EduPremium <noreply@edupremium.com.tr>",
            to: ["ayse@example.com"],
            subject: "Dersiniz onaylandı",
            html: "<p>hi</p>",
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["to"][0], "ayse@example.com");
        assert_eq!(json["subject"], "Dersiniz onaylandı");
    }

    #[tokio::test]
    async fn log_mailer_always_succeeds() {
        let email = Email {
            to: "a@b.test".into(),
            subject: "s".into(),
            html: "h".into(),
        };
        assert!(LogMailer.send(&email).await.is_ok());
    }
}
