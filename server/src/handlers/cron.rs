use axum::extract::{Path, State};
use axum::response::Response;

use crate::auth::CronAuth;
use crate::jobs::Job;
use crate::state::AppState;
use crate::utils::error::{AppError, AppResult};
use crate::utils::response::success;

pub async fn run_job(
    State(state): State<AppState>,
    _: CronAuth,
    Path(name): Path<String>,
) -> AppResult<Response> {
    let job: Job = name.parse().map_err(AppError::NotFound)?;

    tracing::info!(job = job.name(), "Cron job triggered");
    let report = job.run(&state).await?;
    tracing::info!(
        job = job.name(),
        processed = report.processed,
        failed = report.failed,
        "Cron job finished"
    );
    Ok(success(report, format!("{} finished", job.name())))
}
