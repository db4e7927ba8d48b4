use sqlx::PgPool;
use uuid::Uuid;

use crate::models::campaign::{Campaign, CreateCampaign, UpdateCampaign};

const CAMPAIGN_COLUMNS: &str =
    "id, name, lesson_count, discount_percent, is_active, created_at, updated_at";

pub struct CampaignRepo;

impl CampaignRepo {
    pub async fn create(pool: &PgPool, input: &CreateCampaign) -> Result<Campaign, sqlx::Error> {
        let query = format!(
            "INSERT INTO campaigns (id, name, lesson_count, discount_percent) \
             VALUES ($1, $2, $3, $4) RETURNING {CAMPAIGN_COLUMNS}"
        );
        sqlx::query_as::<_, Campaign>(&query)
            .bind(Uuid::new_v4())
            .bind(input.name.trim())
            .bind(input.lesson_count)
            .bind(input.discount_percent)
            .fetch_one(pool)
            .await
    }

    pub async fn list(pool: &PgPool, active_only: bool) -> Result<Vec<Campaign>, sqlx::Error> {
        let query = format!(
            "SELECT {CAMPAIGN_COLUMNS} FROM campaigns \
             WHERE (NOT $1 OR is_active) ORDER BY lesson_count"
        );
        sqlx::query_as::<_, Campaign>(&query)
            .bind(active_only)
            .fetch_all(pool)
            .await
    }

    pub async fn find(pool: &PgPool, id: Uuid) -> Result<Option<Campaign>, sqlx::Error> {
        let query = format!("SELECT {CAMPAIGN_COLUMNS} FROM campaigns WHERE id = $1");
        sqlx::query_as::<_, Campaign>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn update(
        pool: &PgPool,
        id: Uuid,
        input: &UpdateCampaign,
    ) -> Result<Option<Campaign>, sqlx::Error> {
        let query = format!(
            "UPDATE campaigns SET \
                name = COALESCE($2, name), \
                discount_percent = COALESCE($3, discount_percent), \
                is_active = COALESCE($4, is_active), \
                updated_at = NOW() \
             WHERE id = $1 RETURNING {CAMPAIGN_COLUMNS}"
        );
        sqlx::query_as::<_, Campaign>(&query)
            .bind(id)
            .bind(input.name.as_deref().map(str::trim))
            .bind(input.discount_percent)
            .bind(input.is_active)
            .fetch_optional(pool)
            .await
    }

    /// Campaigns that were ever purchased are kept for the payment history.
    pub async fn delete_unused(pool: &PgPool, id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "DELETE FROM campaigns c WHERE c.id = $1 \
             AND NOT EXISTS (SELECT 1 FROM package_payments p WHERE p.campaign_id = c.id)",
        )
        .bind(id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }
}
