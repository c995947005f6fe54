use chrono::{Datelike, Duration, NaiveDateTime, Timelike};

use crate::models::Booking;

// Bookings may start from 08:00 up to (not including) 20:00, Monday-Friday.
pub const OPEN_HOUR: u32 = 8;
pub const CLOSE_HOUR: u32 = 20;

#[derive(Debug, PartialEq)]
pub enum SchedulingError {
    NotInFuture,
    TooSoon { minutes: i64 },
    OutsideBusinessHours,
    Weekend,
}

impl std::fmt::Display for SchedulingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SchedulingError::NotInFuture => {
                write!(f, "start time must be in the future")
            }
            SchedulingError::TooSoon { minutes } => {
                write!(f, "bookings must be made at least {minutes} minutes in advance")
            }
            SchedulingError::OutsideBusinessHours => {
                write!(
                    f,
                    "bookings are only available between {OPEN_HOUR}:00 and {CLOSE_HOUR}:00"
                )
            }
            SchedulingError::Weekend => {
                write!(f, "weekend bookings are not available")
            }
        }
    }
}

impl From<SchedulingError> for crate::errors::AppError {
    fn from(e: SchedulingError) -> Self {
        crate::errors::AppError::Validation(e.to_string())
    }
}

/// Does the candidate window overlap any active booking in `existing`?
/// Half-open semantics: a booking ending exactly when another starts does
/// not conflict. `exclude_id` drops the booking being rescheduled from
/// consideration.
pub fn conflicts(
    candidate_start: NaiveDateTime,
    candidate_end: NaiveDateTime,
    existing: &[Booking],
    exclude_id: Option<&str>,
) -> bool {
    existing.iter().any(|b| {
        b.status.is_active()
            && exclude_id != Some(b.id.as_str())
            && b.start_time < candidate_end
            && b.end_time > candidate_start
    })
}

/// Timing rules for a booking start: strictly future, optionally at least
/// `min_lead` ahead of now, inside business hours, on a weekday.
pub fn validate_start_window(
    start: NaiveDateTime,
    now: NaiveDateTime,
    min_lead: Option<Duration>,
) -> Result<(), SchedulingError> {
    if start <= now {
        return Err(SchedulingError::NotInFuture);
    }
    if let Some(lead) = min_lead {
        if start < now + lead {
            return Err(SchedulingError::TooSoon {
                minutes: lead.num_minutes(),
            });
        }
    }
    if start.weekday().number_from_monday() >= 6 {
        return Err(SchedulingError::Weekend);
    }
    if start.hour() < OPEN_HOUR || start.hour() >= CLOSE_HOUR {
        return Err(SchedulingError::OutsideBusinessHours);
    }
    Ok(())
}
