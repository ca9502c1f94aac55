//! Schedule expressions for recurring jobs

use chrono::{DateTime, Duration, Utc};

use series_common::data::{truncate_to_hour, ONE_HOUR};

use crate::config::SchedulerSettings;

/// Run state of a recurring schedule
#[derive(Debug, Clone)]
pub struct Schedule {
    /// Schedule name
    pub name: String,
    /// Schedule expression
    pub expression: ScheduleExpression,
    /// Last run time
    pub last_run: Option<DateTime<Utc>>,
    /// Next run time
    pub next_run: Option<DateTime<Utc>>,
}

impl Schedule {
    /// Create a schedule whose first run follows `now`
    pub fn new(name: impl Into<String>, expression: ScheduleExpression, now: DateTime<Utc>) -> Self {
        let next_run = expression.next_occurrence(now);
        Self {
            name: name.into(),
            expression,
            last_run: None,
            next_run,
        }
    }

    /// Mark as run at `now` and calculate the next occurrence
    pub fn mark_run(&mut self, now: DateTime<Utc>) {
        self.last_run = Some(now);
        self.next_run = self.expression.next_occurrence(now);
    }

    /// Time left until the next run, zero when overdue
    pub fn wait_from(&self, now: DateTime<Utc>) -> Option<std::time::Duration> {
        self.next_run
            .map(|next| (next - now).to_std().unwrap_or(std::time::Duration::ZERO))
    }
}

/// Schedule expression
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScheduleExpression {
    /// Fixed interval after the previous run
    Interval(Duration),
    /// Start of every UTC hour
    TopOfHour,
}

impl ScheduleExpression {
    /// Expression configured for the refresh cycle
    pub fn from_settings(settings: &SchedulerSettings) -> Self {
        if settings.align_to_hour {
            ScheduleExpression::TopOfHour
        } else {
            ScheduleExpression::Interval(Duration::minutes(settings.refresh_interval_minutes))
        }
    }

    /// Calculate next occurrence strictly after `from`.
    ///
    /// A non-positive interval never fires.
    pub fn next_occurrence(&self, from: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            ScheduleExpression::Interval(interval) => {
                if *interval <= Duration::zero() {
                    None
                } else {
                    from.checked_add_signed(*interval)
                }
            }
            ScheduleExpression::TopOfHour => truncate_to_hour(from).checked_add_signed(ONE_HOUR),
        }
    }
}
