use axum::response::Response;
use serde::Serialize;

use crate::utils::response::success;

pub mod admin;
pub mod auth;
pub mod availability;
pub mod campaigns;
pub mod cron;
pub mod lessons;
pub mod payments;
pub mod profiles;

#[derive(Serialize)]
struct HealthPayload {
    status: &'static str,
    service: &'static str,
}

pub async fn health_check() -> Response {
    let payload = HealthPayload {
        status: "ok",
        service: "edupremium-api",
    };

    success(payload, "Health check successful")
}
