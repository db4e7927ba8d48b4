//! Price arithmetic for lessons, packages and featured placement.
//!
//! Teachers set a net hourly rate. Students pay the gross price: net plus the
//! platform commission. All results are rounded to kuruş (2 decimals).

use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;

use crate::models::payment::{PaidAmount, RevenueTotals};
use crate::utils::error::AppError;

pub const MAX_FEATURED_DAYS: i32 = 365;

fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

fn check_percent(name: &str, pct: Decimal) -> Result<(), AppError> {
    if pct < Decimal::ZERO || pct > Decimal::ONE_HUNDRED {
        return Err(AppError::ValidationError(format!(
            "{name} must be between 0 and 100"
        )));
    }
    Ok(())
}

fn multiplier(commission_percent: Decimal) -> Decimal {
    Decimal::ONE + commission_percent / Decimal::ONE_HUNDRED
}

pub fn gross_price(net: Decimal, commission_percent: Decimal) -> Result<Decimal, AppError> {
    if net < Decimal::ZERO {
        return Err(AppError::ValidationError("price must not be negative".into()));
    }
    check_percent("commission", commission_percent)?;
    Ok(round_money(net * multiplier(commission_percent)))
}

pub fn commission_amount(net: Decimal, commission_percent: Decimal) -> Result<Decimal, AppError> {
    Ok(gross_price(net, commission_percent)? - round_money(net))
}

/// Net share of a gross amount, used to pro-rate package payouts.
pub fn net_from_gross(gross: Decimal, commission_percent: Decimal) -> Result<Decimal, AppError> {
    check_percent("commission", commission_percent)?;
    Ok(round_money(gross / multiplier(commission_percent)))
}

/// Net price of a lesson slot of `minutes` length at `hourly_rate`.
pub fn slot_net_price(hourly_rate: Decimal, minutes: i64) -> Result<Decimal, AppError> {
    if minutes <= 0 {
        return Err(AppError::ValidationError(
            "slot must have a positive duration".into(),
        ));
    }
    Ok(round_money(
        hourly_rate * Decimal::from(minutes) / Decimal::from(60),
    ))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PackageQuote {
    pub lesson_count: i32,
    pub unit_price: Decimal,
    pub list_total: Decimal,
    pub discount_amount: Decimal,
    pub total: Decimal,
    pub per_lesson: Decimal,
}

pub fn package_quote(
    net_hourly: Decimal,
    commission_percent: Decimal,
    lesson_count: i32,
    discount_percent: Decimal,
) -> Result<PackageQuote, AppError> {
    if lesson_count < 1 {
        return Err(AppError::ValidationError(
            "a package needs at least one lesson".into(),
        ));
    }
    check_percent("discount", discount_percent)?;

    let unit_price = gross_price(net_hourly, commission_percent)?;
    let list_total = unit_price * Decimal::from(lesson_count);
    let discount_amount = round_money(list_total * discount_percent / Decimal::ONE_HUNDRED);
    let total = list_total - discount_amount;

    Ok(PackageQuote {
        lesson_count,
        unit_price,
        list_total,
        discount_amount,
        total,
        per_lesson: per_lesson_share(total, lesson_count)?,
    })
}

/// Price attributed to each lesson booked from a package.
pub fn per_lesson_share(total: Decimal, lesson_count: i32) -> Result<Decimal, AppError> {
    if lesson_count < 1 {
        return Err(AppError::ValidationError(
            "a package needs at least one lesson".into(),
        ));
    }
    Ok(round_money(total / Decimal::from(lesson_count)))
}

pub fn featured_price(daily_price: Decimal, days: i32) -> Result<Decimal, AppError> {
    if !(1..=MAX_FEATURED_DAYS).contains(&days) {
        return Err(AppError::ValidationError(format!(
            "featured placement must last between 1 and {MAX_FEATURED_DAYS} days"
        )));
    }
    Ok(round_money(daily_price * Decimal::from(days)))
}

/// Gross volume and the platform's share of it. Featured placements are
/// entirely platform revenue.
pub fn revenue_totals(paid: &[PaidAmount]) -> Result<RevenueTotals, AppError> {
    let mut totals = RevenueTotals::default();
    for payment in paid {
        let commission = match (payment.net_amount, payment.commission_rate) {
            (Some(net), Some(pct)) => commission_amount(net, pct)?,
            (None, Some(pct)) => payment.amount - net_from_gross(payment.amount, pct)?,
            _ => payment.amount,
        };
        totals.gross += payment.amount;
        totals.commission += commission;
    }
    Ok(totals)
}
