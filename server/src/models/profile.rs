use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct StudentProfile {
    pub user_id: Uuid,
    pub full_name: String,
    pub phone: Option<String>,
    pub grade_level: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TeacherProfile {
    pub user_id: Uuid,
    pub full_name: String,
    pub phone: Option<String>,
    pub bio: Option<String>,
    pub branch: Option<String>,
    pub subjects: Vec<String>,
    /// Net hourly rate, i.e. what the teacher is paid before commission.
    pub hourly_rate: Decimal,
    #[serde(skip_serializing)]
    pub iban: Option<String>,
    pub is_approved: bool,
    pub featured_until: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TeacherProfile {
    pub fn is_featured_at(&self, now: DateTime<Utc>) -> bool {
        self.featured_until.is_some_and(|until| until > now)
    }
}

/// Contact details needed to address a notification.
#[derive(Debug, Clone, FromRow)]
pub struct Contact {
    pub user_id: Uuid,
    pub email: String,
    pub full_name: String,
    pub phone: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStudentProfile {
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub grade_level: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateTeacherProfile {
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub bio: Option<String>,
    pub branch: Option<String>,
    pub subjects: Option<Vec<String>>,
    pub hourly_rate: Option<Decimal>,
    pub iban: Option<String>,
}

/// Public view of a teacher with the price a student actually pays.
#[derive(Debug, Serialize)]
pub struct TeacherListing {
    pub user_id: Uuid,
    pub full_name: String,
    pub bio: Option<String>,
    pub branch: Option<String>,
    pub subjects: Vec<String>,
    pub hourly_price: Decimal,
    pub is_featured: bool,
}
