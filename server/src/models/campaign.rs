use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::domain::pricing::PackageQuote;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Campaign {
    pub id: Uuid,
    pub name: String,
    pub lesson_count: i32,
    pub discount_percent: Decimal,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct CreateCampaign {
    pub name: String,
    pub lesson_count: i32,
    pub discount_percent: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct UpdateCampaign {
    pub name: Option<String>,
    pub discount_percent: Option<Decimal>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct CampaignOffer {
    #[serde(flatten)]
    pub campaign: Campaign,
    pub quote: PackageQuote,
}
