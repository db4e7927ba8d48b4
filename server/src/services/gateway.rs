//! Hosted payment page integration (Paratika).
//!
//! A purchase opens a gateway session with a server-to-server call, then the
//! browser is redirected to the gateway's 3-D Secure page. When the customer
//! finishes, the gateway posts a form back to our return URL; that callback
//! carries an HMAC so it cannot be forged by the browser.

use std::time::Duration;

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use rust_decimal::Decimal;
use serde::Deserialize;
use sha2::Sha256;

use crate::config::ParatikaConfig;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Gateway response code for an approved operation.
pub const APPROVED: &str = "00";

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("gateway returned HTTP {0}")]
    HttpStatus(u16),

    #[error("gateway rejected the request ({code}): {message}")]
    Rejected { code: String, message: String },

    #[error("gateway response is missing {0}")]
    MalformedResponse(&'static str),
}

#[derive(Debug, Clone)]
pub struct SessionRequest {
    pub merchant_payment_id: String,
    pub amount: Decimal,
    pub customer_id: String,
    pub customer_name: String,
    pub customer_email: String,
    pub customer_phone: Option<String>,
    pub description: String,
    pub return_url: String,
}

#[derive(Debug, Clone)]
pub struct GatewaySession {
    pub session_token: String,
    pub redirect_url: String,
}

/// Form fields the gateway posts back to the return URL.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallbackPayload {
    pub merchant_payment_id: String,
    pub response_code: String,
    #[serde(default)]
    pub response_msg: Option<String>,
    #[serde(default)]
    pub session_token: String,
    #[serde(default)]
    pub pg_tran_id: Option<String>,
    pub hash: String,
}

impl CallbackPayload {
    pub fn is_approved(&self) -> bool {
        self.response_code == APPROVED
    }

    pub fn failure_message(&self) -> String {
        self.response_msg
            .clone()
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| format!("gateway response code {}", self.response_code))
    }
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_session(&self, request: &SessionRequest)
        -> Result<GatewaySession, GatewayError>;

    fn verify_callback(&self, payload: &CallbackPayload) -> bool;
}

type HmacSha256 = Hmac<Sha256>;

fn callback_mac(
    secret: &str,
    merchant_payment_id: &str,
    response_code: &str,
    session_token: &str,
) -> HmacSha256 {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(merchant_payment_id.as_bytes());
    mac.update(b"|");
    mac.update(response_code.as_bytes());
    mac.update(b"|");
    mac.update(session_token.as_bytes());
    mac
}

/// Signature over `merchantPaymentId|responseCode|sessionToken`, lowercase hex.
pub fn callback_signature(
    secret: &str,
    merchant_payment_id: &str,
    response_code: &str,
    session_token: &str,
) -> String {
    let mac = callback_mac(secret, merchant_payment_id, response_code, session_token);
    hex::encode(mac.finalize().into_bytes())
}

pub fn verify_signature(secret: &str, payload: &CallbackPayload) -> bool {
    let Some(provided) = hex::decode(payload.hash.trim()) else {
        return false;
    };
    callback_mac(
        secret,
        &payload.merchant_payment_id,
        &payload.response_code,
        &payload.session_token,
    )
    .verify_slice(&provided)
    .is_ok()
}

mod hex {
    pub fn encode(bytes: impl AsRef<[u8]>) -> String {
        bytes.as_ref().iter().map(|b| format!("{b:02x}")).collect()
    }

    /// Case-insensitive; `None` on odd length or non-hex input.
    pub fn decode(input: &str) -> Option<Vec<u8>> {
        if input.len() % 2 != 0 || !input.is_ascii() {
            return None;
        }
        (0..input.len())
            .step_by(2)
            .map(|i| u8::from_str_radix(&input[i..i + 2], 16).ok())
            .collect()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionTokenResponse {
    response_code: Option<String>,
    response_msg: Option<String>,
    session_token: Option<String>,
}

pub struct ParatikaGateway {
    client: reqwest::Client,
    config: ParatikaConfig,
}

impl ParatikaGateway {
    pub fn new(config: ParatikaConfig) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self { client, config })
    }

    fn payment_page_url(&self, session_token: &str) -> String {
        format!("{}/post/sale3d/{}", self.config.api_url, session_token)
    }
}

#[async_trait]
impl PaymentGateway for ParatikaGateway {
    async fn create_session(
        &self,
        request: &SessionRequest,
    ) -> Result<GatewaySession, GatewayError> {
        let amount = request.amount.round_dp(2).to_string();
        let mut form = vec![
            ("ACTION", "SESSIONTOKEN"),
            ("SESSIONTYPE", "PAYMENTSESSION"),
            ("MERCHANT", self.config.merchant.as_str()),
            ("MERCHANTUSER", self.config.merchant_user.as_str()),
            ("MERCHANTPASSWORD", self.config.merchant_password.as_str()),
            ("MERCHANTPAYMENTID", request.merchant_payment_id.as_str()),
            ("AMOUNT", amount.as_str()),
            ("CURRENCY", "TRY"),
            ("RETURNURL", request.return_url.as_str()),
            ("CUSTOMER", request.customer_id.as_str()),
            ("CUSTOMERNAME", request.customer_name.as_str()),
            ("CUSTOMEREMAIL", request.customer_email.as_str()),
            ("ORDERITEMS_DESCRIPTION", request.description.as_str()),
        ];
        if let Some(phone) = request.customer_phone.as_deref() {
            form.push(("CUSTOMERPHONE", phone));
        }

        let response = self
            .client
            .post(&self.config.api_url)
            .form(&form)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(GatewayError::HttpStatus(response.status().as_u16()));
        }

        let body: SessionTokenResponse = response.json().await?;
        let code = body.response_code.unwrap_or_default();
        if code != APPROVED {
            return Err(GatewayError::Rejected {
                code,
                message: body.response_msg.unwrap_or_default(),
            });
        }

        let session_token = body
            .session_token
            .filter(|t| !t.is_empty())
            .ok_or(GatewayError::MalformedResponse("sessionToken"))?;

        tracing::info!(
            merchant_payment_id = %request.merchant_payment_id,
            amount = %amount,
            "Gateway session opened"
        );

        Ok(GatewaySession {
            redirect_url: self.payment_page_url(&session_token),
            session_token,
        })
    }

    fn verify_callback(&self, payload: &CallbackPayload) -> bool {
        verify_signature(&self.config.secret_key, payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(code: &str, hash: String) -> CallbackPayload {
        CallbackPayload {
            merchant_payment_id: "LSN-abc".into(),
            response_code: code.into(),
            response_msg: None,
            session_token: "tok".into(),
            pg_tran_id: None,
            hash,
        }
    }

    #[test]
    fn signature_is_hex_sha256_length() {
        let sig = callback_signature("secret", "LSN-abc", "00", "tok");
        assert_eq!(sig.len(), 64);
        assert!(sig.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn valid_signature_verifies_case_insensitively() {
        let sig = callback_signature("secret", "LSN-abc", "00", "tok");
        assert!(verify_signature("secret", &payload("00", sig.clone())));
        assert!(verify_signature("secret", &payload("00", sig.to_uppercase())));
    }

    #[test]
    fn tampered_fields_fail_verification() {
        let sig = callback_signature("secret", "LSN-abc", "99", "tok");
        // Attacker flips a declined response to approved.
        assert!(!verify_signature("secret", &payload("00", sig.clone())));
        assert!(!verify_signature("other", &payload("99", sig)));
        assert!(!verify_signature("secret", &payload("00", String::new())));
    }

    #[test]
    fn malformed_hash_is_rejected() {
        let sig = callback_signature("secret", "LSN-abc", "00", "tok");
        assert!(!verify_signature("secret", &payload("00", sig[..63].to_string())));
        assert!(!verify_signature("secret", &payload("00", format!("zz{}", &sig[2..]))));
        assert!(!verify_signature("secret", &payload("00", format!("{sig}00"))));
    }

    #[test]
    fn hex_decodes_what_it_encodes() {
        assert_eq!(hex::decode("00ff10"), Some(vec![0x00, 0xff, 0x10]));
        assert_eq!(hex::decode("A0"), Some(vec![0xa0]));
        assert_eq!(hex::decode("abc"), None);
        assert_eq!(hex::decode("ç1"), None);
    }

    #[test]
    fn failure_message_falls_back_to_code() {
        let mut p = payload("51", String::new());
        assert_eq!(p.failure_message(), "gateway response code 51");
        p.response_msg = Some("Insufficient funds".into());
        assert_eq!(p.failure_message(), "Insufficient funds");
        assert!(!p.is_approved());
    }

    #[test]
    fn payment_page_url_uses_session_token() {
        let gateway = ParatikaGateway::new(crate::config::test_config().paratika).unwrap();
        assert_eq!(
            gateway.payment_page_url("abc"),
            "https://vpos.paratika.com.tr/paratika/api/v2/post/sale3d/abc"
        );
    }
}
