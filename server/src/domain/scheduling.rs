//! Time arithmetic around slots, reminders, meetings and featured periods.

use chrono::{DateTime, Duration, Utc};

use crate::utils::error::AppError;

pub const MIN_SLOT_MINUTES: i64 = 30;
pub const MAX_SLOT_MINUTES: i64 = 240;

/// Meeting rooms open this many minutes before a lesson starts.
pub const MEETING_OPENS_BEFORE_MINUTES: i64 = 30;
/// ...and close this many minutes after it ends.
pub const MEETING_CLOSES_AFTER_MINUTES: i64 = 60;

pub fn validate_slot(
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Result<(), AppError> {
    if end <= start {
        return Err(AppError::ValidationError(
            "end_time must be after start_time".into(),
        ));
    }
    if start <= now {
        return Err(AppError::ValidationError(
            "slots must start in the future".into(),
        ));
    }
    let minutes = (end - start).num_minutes();
    if !(MIN_SLOT_MINUTES..=MAX_SLOT_MINUTES).contains(&minutes) {
        return Err(AppError::ValidationError(format!(
            "slots must last between {MIN_SLOT_MINUTES} and {MAX_SLOT_MINUTES} minutes"
        )));
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReminderKind {
    DayBefore,
    HourBefore,
}

impl ReminderKind {
    pub fn lead_time(&self) -> Duration {
        match self {
            ReminderKind::DayBefore => Duration::hours(24),
            ReminderKind::HourBefore => Duration::hours(1),
        }
    }

    /// Lessons starting in `(now, now + lead_time]` are due.
    pub fn window(&self, now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
        (now, now + self.lead_time())
    }

    pub fn label(&self) -> &'static str {
        match self {
            ReminderKind::DayBefore => "24h",
            ReminderKind::HourBefore => "1h",
        }
    }
}

/// `(not_before, expires)` for a meeting room.
pub fn meeting_window(start: DateTime<Utc>, end: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    (
        start - Duration::minutes(MEETING_OPENS_BEFORE_MINUTES),
        end + Duration::minutes(MEETING_CLOSES_AFTER_MINUTES),
    )
}

/// A new featured purchase extends an active placement instead of overlapping it.
pub fn featured_period(
    now: DateTime<Utc>,
    current_until: Option<DateTime<Utc>>,
    days: i32,
) -> (DateTime<Utc>, DateTime<Utc>) {
    let starts_at = match current_until {
        Some(until) if until > now => until,
        _ => now,
    };
    (starts_at, starts_at + Duration::days(i64::from(days)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_validation() {
        let now = Utc::now();
        let start = now + Duration::days(1);
        assert!(validate_slot(start, start + Duration::minutes(60), now).is_ok());
        assert!(validate_slot(start, start, now).is_err());
        assert!(validate_slot(start, start + Duration::minutes(15), now).is_err());
        assert!(validate_slot(start, start + Duration::minutes(300), now).is_err());
        assert!(validate_slot(now - Duration::hours(1), now, now).is_err());
    }

    #[test]
    fn reminder_windows() {
        let now = Utc::now();
        assert_eq!(ReminderKind::DayBefore.window(now).1, now + Duration::hours(24));
        assert_eq!(ReminderKind::HourBefore.window(now).1, now + Duration::hours(1));
    }

    #[test]
    fn meeting_window_pads_both_ends() {
        let start = Utc::now();
        let end = start + Duration::hours(1);
        let (nbf, exp) = meeting_window(start, end);
        assert_eq!(start - nbf, Duration::minutes(30));
        assert_eq!(exp - end, Duration::minutes(60));
    }

    #[test]
    fn featured_period_extends_active_placement() {
        let now = Utc::now();
        let active = now + Duration::days(3);
        assert_eq!(
            featured_period(now, Some(active), 7),
            (active, active + Duration::days(7))
        );
        let expired = now - Duration::days(1);
        assert_eq!(
            featured_period(now, Some(expired), 7),
            (now, now + Duration::days(7))
        );
        assert_eq!(featured_period(now, None, 1), (now, now + Duration::days(1)));
    }
}
