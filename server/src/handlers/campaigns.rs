use axum::extract::{Path, Query, State};
use axum::response::Response;
use axum::Json;
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::RequireAdmin;
use crate::domain::pricing::package_quote;
use crate::models::campaign::{CampaignOffer, CreateCampaign, UpdateCampaign};
use crate::repositories::{CampaignRepo, ProfileRepo};
use crate::state::AppState;
use crate::utils::error::{AppError, AppResult};
use crate::utils::response::{created, empty_success, success};

#[derive(Debug, Deserialize)]
pub struct OfferQuery {
    pub teacher_id: Uuid,
}

fn check_discount(discount: Decimal) -> AppResult<()> {
    if discount < Decimal::ZERO || discount > Decimal::ONE_HUNDRED {
        return Err(AppError::ValidationError(
            "discount_percent must be between 0 and 100".into(),
        ));
    }
    Ok(())
}

pub async fn create_campaign(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Json(input): Json<CreateCampaign>,
) -> AppResult<Response> {
    if input.name.trim().is_empty() {
        return Err(AppError::ValidationError("name is required".into()));
    }
    if input.lesson_count < 1 {
        return Err(AppError::ValidationError(
            "lesson_count must be at least 1".into(),
        ));
    }
    check_discount(input.discount_percent)?;

    let campaign = CampaignRepo::create(&state.pool, &input).await?;
    tracing::info!(campaign_id = %campaign.id, "Campaign created");
    Ok(created(campaign, "Campaign created"))
}

pub async fn list_campaigns(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
) -> AppResult<Response> {
    let campaigns = CampaignRepo::list(&state.pool, false).await?;
    Ok(success(campaigns, "Campaigns retrieved"))
}

pub async fn update_campaign(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Path(campaign_id): Path<Uuid>,
    Json(input): Json<UpdateCampaign>,
) -> AppResult<Response> {
    if let Some(discount) = input.discount_percent {
        check_discount(discount)?;
    }
    let campaign = CampaignRepo::update(&state.pool, campaign_id, &input)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Campaign '{campaign_id}' was not found")))?;
    Ok(success(campaign, "Campaign updated"))
}

pub async fn delete_campaign(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Path(campaign_id): Path<Uuid>,
) -> AppResult<Response> {
    if CampaignRepo::delete_unused(&state.pool, campaign_id).await? == 1 {
        return Ok(empty_success("Campaign deleted"));
    }
    match CampaignRepo::find(&state.pool, campaign_id).await? {
        Some(_) => Err(AppError::Conflict(
            "Campaign has purchases; deactivate it instead".into(),
        )),
        None => Err(AppError::NotFound(format!(
            "Campaign '{campaign_id}' was not found"
        ))),
    }
}

/// Active campaigns priced for one teacher.
pub async fn list_offers(
    State(state): State<AppState>,
    Query(query): Query<OfferQuery>,
) -> AppResult<Response> {
    let teacher = ProfileRepo::find_teacher(&state.pool, query.teacher_id)
        .await?
        .filter(|t| t.is_approved)
        .ok_or_else(|| {
            AppError::NotFound(format!("Teacher '{}' was not found", query.teacher_id))
        })?;

    let offers = CampaignRepo::list(&state.pool, true)
        .await?
        .into_iter()
        .map(|campaign| {
            let quote = package_quote(
                teacher.hourly_rate,
                state.config.commission_percent,
                campaign.lesson_count,
                campaign.discount_percent,
            )?;
            Ok(CampaignOffer { campaign, quote })
        })
        .collect::<AppResult<Vec<_>>>()?;
    Ok(success(offers, "Offers retrieved"))
}
