//! Runtime configuration, read once from the environment at startup.

use std::env;
use std::fmt::Display;
use std::str::FromStr;

use rust_decimal::Decimal;
use thiserror::Error;

pub mod cors;
pub mod security;

pub use cors::create_cors_layer;
pub use security::create_security_headers_layer;

const DEFAULT_PORT: u16 = 3001;
const DEFAULT_FRONTEND_URL: &str = "http://localhost:3000";
const DEFAULT_PUBLIC_API_URL: &str = "http://localhost:3001";
const DEFAULT_CORS_ORIGINS: &str = "http://localhost:3000";
const DEFAULT_PARATIKA_URL: &str = "https://vpos.paratika.com.tr/paratika/api/v2";
const DEFAULT_NETGSM_URL: &str = "https://api.netgsm.com.tr";
const DEFAULT_DAILY_URL: &str = "https://api.daily.co/v1";
const DEFAULT_MAIL_FROM: &str = "EduPremium <noreply@edupremium.com.tr>";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{key} has an invalid value: {reason}")]
    Invalid { key: &'static str, reason: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub is_production: bool,
    pub cors_origins: Vec<String>,
    /// Where the gateway callback sends the browser afterwards.
    pub frontend_url: String,
    /// Externally reachable base URL of this API, used for gateway return URLs.
    pub public_api_url: String,
    pub jwt_secret: String,
    pub jwt_expiry_mins: i64,
    pub commission_percent: Decimal,
    pub featured_daily_price: Decimal,
    pub cancellation_window_hours: i64,
    pub cron_secret: Option<String>,
    pub paratika: ParatikaConfig,
    pub resend: Option<ResendConfig>,
    pub netgsm: Option<NetgsmConfig>,
    pub daily: Option<DailyConfig>,
    pub scheduler: SchedulerConfig,
}

#[derive(Debug, Clone)]
pub struct ParatikaConfig {
    pub api_url: String,
    pub merchant: String,
    pub merchant_user: String,
    pub merchant_password: String,
    pub secret_key: String,
}

#[derive(Debug, Clone)]
pub struct ResendConfig {
    pub api_key: String,
    pub from: String,
}

#[derive(Debug, Clone)]
pub struct NetgsmConfig {
    pub api_url: String,
    pub usercode: String,
    pub password: String,
    pub header: String,
}

#[derive(Debug, Clone)]
pub struct DailyConfig {
    pub api_url: String,
    pub api_key: String,
}

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub enabled: bool,
    pub interval_secs: u64,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// | Env Var                       | Required | Default                  |
    /// |-------------------------------|----------|--------------------------|
    /// | `DATABASE_URL`                | yes      |                          |
    /// | `JWT_SECRET`                  | yes      |                          |
    /// | `PARATIKA_MERCHANT*`          | yes      |                          |
    /// | `PARATIKA_SECRET_KEY`         | yes      |                          |
    /// | `HOST` / `PORT`               | no       | `0.0.0.0` / `3001`       |
    /// | `PLATFORM_COMMISSION_PERCENT` | no       | `20`                     |
    /// | `FEATURED_DAILY_PRICE`        | no       | `50.00`                  |
    /// | `CANCELLATION_WINDOW_HOURS`   | no       | `24`                     |
    /// | `RESEND_API_KEY`              | no       | emails are only logged   |
    /// | `NETGSM_USERCODE`             | no       | SMS disabled             |
    /// | `DAILY_API_KEY`               | no       | no meeting links         |
    pub fn from_env() -> Result<Self, ConfigError> {
        let commission_percent: Decimal = parse_or("PLATFORM_COMMISSION_PERCENT", "20")?;
        if commission_percent < Decimal::ZERO || commission_percent > Decimal::ONE_HUNDRED {
            return Err(ConfigError::Invalid {
                key: "PLATFORM_COMMISSION_PERCENT",
                reason: "must be between 0 and 100".into(),
            });
        }

        let jwt_secret = required("JWT_SECRET")?;
        if jwt_secret.len() < 16 {
            return Err(ConfigError::Invalid {
                key: "JWT_SECRET",
                reason: "must be at least 16 characters".into(),
            });
        }

        let resend = optional("RESEND_API_KEY").map(|api_key| ResendConfig {
            api_key,
            from: var_or("MAIL_FROM", DEFAULT_MAIL_FROM),
        });

        let netgsm = match optional("NETGSM_USERCODE") {
            Some(usercode) => Some(NetgsmConfig {
                api_url: var_or("NETGSM_API_URL", DEFAULT_NETGSM_URL),
                usercode,
                password: required("NETGSM_PASSWORD")?,
                header: required("NETGSM_HEADER")?,
            }),
            None => None,
        };

        let daily = optional("DAILY_API_KEY").map(|api_key| DailyConfig {
            api_url: var_or("DAILY_API_URL", DEFAULT_DAILY_URL),
            api_key,
        });

        Ok(Self {
            database_url: required("DATABASE_URL")?,
            host: var_or("HOST", "0.0.0.0"),
            port: parse_or("PORT", &DEFAULT_PORT.to_string())?,
            is_production: env::var("RUST_ENV")
                .map(|v| v.to_lowercase() == "production")
                .unwrap_or(false),
            cors_origins: split_list(&var_or("CORS_ALLOWED_ORIGINS", DEFAULT_CORS_ORIGINS)),
            frontend_url: trim_slash(var_or("FRONTEND_URL", DEFAULT_FRONTEND_URL)),
            public_api_url: trim_slash(var_or("PUBLIC_API_URL", DEFAULT_PUBLIC_API_URL)),
            jwt_secret,
            jwt_expiry_mins: parse_or("JWT_EXPIRY_MINS", "1440")?,
            commission_percent,
            featured_daily_price: parse_or("FEATURED_DAILY_PRICE", "50.00")?,
            cancellation_window_hours: parse_or("CANCELLATION_WINDOW_HOURS", "24")?,
            cron_secret: optional("CRON_SECRET"),
            paratika: ParatikaConfig {
                api_url: trim_slash(var_or("PARATIKA_API_URL", DEFAULT_PARATIKA_URL)),
                merchant: required("PARATIKA_MERCHANT")?,
                merchant_user: required("PARATIKA_MERCHANT_USER")?,
                merchant_password: required("PARATIKA_MERCHANT_PASSWORD")?,
                secret_key: required("PARATIKA_SECRET_KEY")?,
            },
            resend,
            netgsm,
            daily,
            scheduler: SchedulerConfig {
                enabled: parse_or("SCHEDULER_ENABLED", "false")?,
                interval_secs: parse_or("SCHEDULER_INTERVAL_SECS", "300")?,
            },
        })
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn optional(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn required(key: &'static str) -> Result<String, ConfigError> {
    optional(key).ok_or(ConfigError::Missing(key))
}

fn var_or(key: &str, default: &str) -> String {
    optional(key).unwrap_or_else(|| default.to_string())
}

fn parse_or<T>(key: &'static str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    var_or(key, default)
        .parse()
        .map_err(|e: T::Err| ConfigError::Invalid {
            key,
            reason: e.to_string(),
        })
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn trim_slash(url: String) -> String {
    url.trim_end_matches('/').to_string()
}

#[cfg(test)]
pub(crate) fn test_config() -> Config {
    Config {
        database_url: "postgres://localhost/edupremium_test".into(),
        host: "127.0.0.1".into(),
        port: 0,
        is_production: false,
        cors_origins: vec![DEFAULT_CORS_ORIGINS.into()],
        frontend_url: DEFAULT_FRONTEND_URL.into(),
        public_api_url: DEFAULT_PUBLIC_API_URL.into(),
        jwt_secret: "test-secret-with-enough-length".into(),
        jwt_expiry_mins: 60,
        commission_percent: Decimal::from(20),
        featured_daily_price: Decimal::new(5000, 2),
        cancellation_window_hours: 24,
        cron_secret: Some("cron-secret".into()),
        paratika: ParatikaConfig {
            api_url: DEFAULT_PARATIKA_URL.into(),
            merchant: "10000000".into(),
            merchant_user: "api@edupremium.test".into(),
            merchant_password: "password".into(),
            secret_key: "merchant-secret".into(),
        },
        resend: None,
        netgsm: None,
        daily: None,
        scheduler: SchedulerConfig {
            enabled: false,
            interval_secs: 300,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_list_drops_blank_entries() {
        assert_eq!(
            split_list(" http://a.test , ,http://b.test"),
            vec!["http://a.test".to_string(), "http://b.test".to_string()]
        );
    }

    #[test]
    fn trailing_slash_is_trimmed() {
        assert_eq!(trim_slash("http://x.test/".into()), "http://x.test");
    }

    #[test]
    fn server_addr_joins_host_and_port() {
        let mut config = test_config();
        config.port = 8080;
        assert_eq!(config.server_addr(), "127.0.0.1:8080");
    }
}
