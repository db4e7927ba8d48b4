//! Outbound email and SMS.
//!
//! [`Notifier`] is the single entry point used by the payment pipeline and
//! the reminder jobs. Email always has a backend (Resend, or a logging
//! fallback in development); SMS is only sent when Netgsm is configured.

use std::sync::Arc;

use crate::config::Config;

pub mod mailer;
pub mod sms;
pub mod templates;

pub use mailer::{Email, LogMailer, Mailer, ResendMailer};
pub use sms::{NetgsmSms, SmsSender};

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("provider returned HTTP {0}")]
    HttpStatus(u16),

    #[error("provider rejected the message: {0}")]
    Rejected(String),
}

#[derive(Clone)]
pub struct Notifier {
    mailer: Arc<dyn Mailer>,
    sms: Option<Arc<dyn SmsSender>>,
}

impl Notifier {
    pub fn new(mailer: Arc<dyn Mailer>, sms: Option<Arc<dyn SmsSender>>) -> Self {
        Self { mailer, sms }
    }

    pub fn from_config(config: &Config) -> Result<Self, NotifyError> {
        let mailer: Arc<dyn Mailer> = match &config.resend {
            Some(resend) => Arc::new(ResendMailer::new(resend.clone())?),
            None => {
                tracing::warn!("RESEND_API_KEY not set, emails will only be logged");
                Arc::new(LogMailer)
            }
        };

        let sms: Option<Arc<dyn SmsSender>> = match &config.netgsm {
            Some(netgsm) => Some(Arc::new(NetgsmSms::new(netgsm.clone())?)),
            None => {
                tracing::info!("Netgsm not configured, SMS disabled");
                None
            }
        };

        Ok(Self::new(mailer, sms))
    }

    pub async fn email(&self, email: Email) -> Result<(), NotifyError> {
        self.mailer.send(&email).await
    }

    /// Send an email and log instead of failing. Used after a transaction
    /// has committed, where a mail outage must not undo the booking.
    pub async fn email_best_effort(&self, email: Email) {
        let to = email.to.clone();
        let subject = email.subject.clone();
        if let Err(e) = self.mailer.send(&email).await {
            tracing::error!(error = %e, to = %to, subject = %subject, "Email delivery failed");
        }
    }

    /// Returns `Ok(false)` when SMS is not configured or there is no number.
    pub async fn sms(&self, phone: Option<&str>, message: &str) -> Result<bool, NotifyError> {
        match (&self.sms, phone.map(str::trim).filter(|p| !p.is_empty())) {
            (Some(sender), Some(phone)) => {
                sender.send(phone, message).await?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
