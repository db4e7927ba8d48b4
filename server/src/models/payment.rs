use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "payment_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Failed,
    /// Money was captured but the purchase could not be fulfilled.
    RefundRequired,
}

/// `failure_reason` the expiry job writes on abandoned checkouts.
pub const EXPIRED_REASON: &str = "expired";

impl PaymentStatus {
    pub fn is_settled_ok(&self) -> bool {
        matches!(self, PaymentStatus::Paid)
    }
}

/// What a gateway payment is buying. Encoded as the prefix of the
/// merchant payment id so callbacks can be routed without a lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentKind {
    Lesson,
    Package,
    Featured,
}

impl PaymentKind {
    pub fn prefix(&self) -> &'static str {
        match self {
            PaymentKind::Lesson => "LSN",
            PaymentKind::Package => "PKG",
            PaymentKind::Featured => "FTR",
        }
    }

    pub fn new_merchant_payment_id(&self) -> String {
        format!("{}-{}", self.prefix(), Uuid::new_v4().simple())
    }

    pub fn from_merchant_payment_id(id: &str) -> Option<Self> {
        let (prefix, rest) = id.split_once('-')?;
        if rest.is_empty() {
            return None;
        }
        match prefix {
            "LSN" => Some(PaymentKind::Lesson),
            "PKG" => Some(PaymentKind::Package),
            "FTR" => Some(PaymentKind::Featured),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PendingPayment {
    pub id: Uuid,
    pub student_id: Uuid,
    pub teacher_id: Uuid,
    /// `None` once the teacher deleted the slot.
    pub availability_id: Option<Uuid>,
    pub amount: Decimal,
    pub net_amount: Decimal,
    pub commission_rate: Decimal,
    pub merchant_payment_id: String,
    pub session_token: Option<String>,
    pub status: PaymentStatus,
    pub failure_reason: Option<String>,
    pub lesson_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PackagePayment {
    pub id: Uuid,
    pub student_id: Uuid,
    pub teacher_id: Uuid,
    pub campaign_id: Uuid,
    pub lesson_count: i32,
    pub lessons_remaining: i32,
    pub amount: Decimal,
    pub commission_rate: Decimal,
    pub merchant_payment_id: String,
    pub session_token: Option<String>,
    pub status: PaymentStatus,
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct FeaturedPayment {
    pub id: Uuid,
    pub teacher_id: Uuid,
    pub days: i32,
    pub amount: Decimal,
    pub merchant_payment_id: String,
    pub session_token: Option<String>,
    pub status: PaymentStatus,
    pub failure_reason: Option<String>,
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub struct NewPendingPayment {
    pub student_id: Uuid,
    pub teacher_id: Uuid,
    pub availability_id: Uuid,
    pub amount: Decimal,
    pub net_amount: Decimal,
    pub commission_rate: Decimal,
}

pub struct NewPackagePayment {
    pub student_id: Uuid,
    pub teacher_id: Uuid,
    pub campaign_id: Uuid,
    pub lesson_count: i32,
    pub amount: Decimal,
    pub commission_rate: Decimal,
}

/// One row of the admin payment ledger, across all three payment tables.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct PaymentSummary {
    pub id: Uuid,
    pub kind: String,
    pub merchant_payment_id: String,
    pub payer_id: Uuid,
    pub amount: Decimal,
    pub status: PaymentStatus,
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A paid gateway payment as read for revenue totals. Lesson rows carry
/// their stored net amount, package rows only the commission rate, and
/// featured rows neither.
#[derive(Debug, Clone, FromRow)]
pub struct PaidAmount {
    pub amount: Decimal,
    pub net_amount: Option<Decimal>,
    pub commission_rate: Option<Decimal>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RevenueTotals {
    pub gross: Decimal,
    pub commission: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct InitiateLessonPayment {
    pub availability_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct InitiatePackagePayment {
    pub teacher_id: Uuid,
    pub campaign_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct InitiateFeaturedPayment {
    pub days: i32,
}

#[derive(Debug, Deserialize)]
pub struct BookWithPackage {
    pub availability_id: Uuid,
}

/// Returned to the client after a gateway session is opened; the
/// browser is sent to `redirect_url` to complete 3-D Secure.
#[derive(Debug, Serialize)]
pub struct PaymentRedirect {
    pub payment_id: Uuid,
    pub merchant_payment_id: String,
    pub amount: Decimal,
    pub redirect_url: String,
}

#[derive(Debug, Deserialize)]
pub struct PaymentListFilter {
    pub kind: Option<PaymentKind>,
    pub status: Option<PaymentStatus>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merchant_payment_id_carries_its_kind() {
        for kind in [
            PaymentKind::Lesson,
            PaymentKind::Package,
            PaymentKind::Featured,
        ] {
            let id = kind.new_merchant_payment_id();
            assert!(id.starts_with(kind.prefix()));
            assert_eq!(PaymentKind::from_merchant_payment_id(&id), Some(kind));
        }
    }

    #[test]
    fn unknown_or_malformed_prefix_is_rejected() {
        assert_eq!(PaymentKind::from_merchant_payment_id("XYZ-123"), None);
        assert_eq!(PaymentKind::from_merchant_payment_id("LSN-"), None);
        assert_eq!(PaymentKind::from_merchant_payment_id("LSN"), None);
        assert_eq!(PaymentKind::from_merchant_payment_id(""), None);
    }
}
