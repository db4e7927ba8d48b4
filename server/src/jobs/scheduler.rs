use std::time::Duration;

use tokio_util::sync::CancellationToken;

use super::Job;
use crate::state::AppState;

/// Run every job on a fixed interval until `cancel` fires.
pub async fn run(state: AppState, interval_secs: u64, cancel: CancellationToken) {
    tracing::info!(interval_secs, "Job scheduler started");

    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs.max(1)));
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Job scheduler stopping");
                break;
            }
            _ = interval.tick() => {
                for job in Job::ALL {
                    match job.run(&state).await {
                        Ok(report) => tracing::debug!(
                            job = job.name(),
                            processed = report.processed,
                            failed = report.failed,
                            "Scheduled job finished"
                        ),
                        Err(e) => tracing::error!(job = job.name(), error = %e, "Scheduled job failed"),
                    }
                }
            }
        }
    }
}
