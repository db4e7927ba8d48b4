//! Periodic jobs.
//!
//! Each job can be triggered over HTTP by an external scheduler
//! (`POST /cron/{job}`) or by the in-process [`scheduler`] loop, possibly
//! both at once. Maintenance jobs are single conditional updates and
//! reminders claim each lesson before sending.

use std::str::FromStr;

use serde::Serialize;

use crate::state::AppState;
use crate::utils::error::AppResult;

pub mod maintenance;
pub mod reminders;
pub mod scheduler;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Job {
    Reminders,
    CompleteLessons,
    ExpirePayments,
}

impl Job {
    pub const ALL: [Job; 3] = [Job::Reminders, Job::CompleteLessons, Job::ExpirePayments];

    pub fn name(&self) -> &'static str {
        match self {
            Job::Reminders => "reminders",
            Job::CompleteLessons => "complete-lessons",
            Job::ExpirePayments => "expire-payments",
        }
    }

    pub async fn run(&self, state: &AppState) -> AppResult<JobReport> {
        match self {
            Job::Reminders => reminders::send_reminders(state).await,
            Job::CompleteLessons => maintenance::complete_past_lessons(&state.pool).await,
            Job::ExpirePayments => maintenance::expire_pending_payments(&state.pool).await,
        }
    }
}

impl FromStr for Job {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Job::ALL
            .into_iter()
            .find(|job| job.name() == s)
            .ok_or_else(|| format!("unknown job '{s}'"))
    }
}

/// What a job run did. `failed` counts items left for the next run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct JobReport {
    pub processed: u64,
    pub failed: u64,
}

impl JobReport {
    pub fn merge(&mut self, other: JobReport) {
        self.processed += other.processed;
        self.failed += other.failed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_names_round_trip() {
        for job in Job::ALL {
            assert_eq!(job.name().parse::<Job>(), Ok(job));
        }
        assert!("vacuum".parse::<Job>().is_err());
    }

    #[test]
    fn reports_merge() {
        let mut report = JobReport { processed: 2, failed: 1 };
        report.merge(JobReport { processed: 3, failed: 0 });
        assert_eq!(report, JobReport { processed: 5, failed: 1 });
    }
}
