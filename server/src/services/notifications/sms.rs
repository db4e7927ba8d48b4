use std::time::Duration;

use async_trait::async_trait;

use super::NotifyError;
use crate::config::NetgsmConfig;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[async_trait]
pub trait SmsSender: Send + Sync {
    async fn send(&self, phone: &str, message: &str) -> Result<(), NotifyError>;
}

pub struct NetgsmSms {
    client: reqwest::Client,
    config: NetgsmConfig,
}

impl NetgsmSms {
    pub fn new(config: NetgsmConfig) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self { client, config })
    }
}

/// Netgsm answers `00 <job id>` on success and a bare error code otherwise.
fn parse_netgsm_reply(body: &str) -> Result<(), NotifyError> {
    let code = body.split_whitespace().next().unwrap_or_default();
    match code {
        "00" => Ok(()),
        "" => Err(NotifyError::Rejected("empty response".into())),
        other => Err(NotifyError::Rejected(format!("netgsm code {other}"))),
    }
}

/// Netgsm expects 10-digit national numbers without `+90` or a leading zero.
pub fn normalize_phone(phone: &str) -> String {
    let digits: String = phone.chars().filter(char::is_ascii_digit).collect();
    let digits = digits
        .strip_prefix("90")
        .filter(|d| d.len() == 10)
        .unwrap_or(digits.as_str());
    digits.strip_prefix('0').unwrap_or(digits).to_string()
}

#[async_trait]
impl SmsSender for NetgsmSms {
    async fn send(&self, phone: &str, message: &str) -> Result<(), NotifyError> {
        let gsmno = normalize_phone(phone);
        let url = format!("{}/sms/send/get", self.config.api_url);

        let response = self
            .client
            .get(url)
            .query(&[
                ("usercode", self.config.usercode.as_str()),
                ("password", self.config.password.as_str()),
                ("gsmno", gsmno.as_str()),
                ("message", message),
                ("msgheader", self.config.header.as_str()),
                ("dil", "TR"),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(NotifyError::HttpStatus(response.status().as_u16()));
        }

        let body = response.text().await?;
        parse_netgsm_reply(&body)?;
        tracing::debug!(gsmno = %gsmno, "SMS sent");
        Ok(())
    }
}
