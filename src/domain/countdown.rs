use crate::domain::models::{CountdownStatus, DurationParts};
use chrono::{DateTime, Duration, Utc};

/// Next due instant. Without a prior completion the task is due immediately.
/// A due instant past the representable range saturates at the latest instant.
pub fn due_at(
    last_completed_at: Option<DateTime<Utc>>,
    frequency: Duration,
    now: DateTime<Utc>,
) -> DateTime<Utc> {
    match last_completed_at {
        Some(completed_at) => completed_at
            .checked_add_signed(frequency)
            .unwrap_or(DateTime::<Utc>::MAX_UTC),
        None => now,
    }
}

pub fn countdown_status(now: DateTime<Utc>, due_at: DateTime<Utc>) -> CountdownStatus {
    let is_overdue = due_at < now;
    let distance = if is_overdue { now - due_at } else { due_at - now };
    CountdownStatus {
        is_overdue,
        distance: decompose(distance),
    }
}

/// Splits a duration into whole days, hours, minutes and seconds.
/// Sub-second remainders are truncated; negative input decomposes to zero.
pub fn decompose(duration: Duration) -> DurationParts {
    let total_seconds = u64::try_from(duration.num_seconds()).unwrap_or(0);
    DurationParts {
        days: total_seconds / 86_400,
        hours: ((total_seconds % 86_400) / 3_600) as u32,
        minutes: ((total_seconds % 3_600) / 60) as u32,
        seconds: (total_seconds % 60) as u32,
    }
}
