use chrono::{Duration, NaiveDateTime};
use rusqlite::Connection;

use crate::config::AppConfig;
use crate::db::queries;
use crate::db::queries::BookingFilter;
use crate::errors::AppError;
use crate::models::{Booking, BookingStatus, User};
use crate::services::policy::{self, BookingAction};
use crate::services::scheduling;

/// Creates a booking in PENDING for `actor`. The slot length is derived
/// from the service's duration; callers never supply end_time.
pub fn create_booking(
    conn: &Connection,
    config: &AppConfig,
    actor: &User,
    service_id: &str,
    start_time: NaiveDateTime,
    now: NaiveDateTime,
) -> Result<Booking, AppError> {
    scheduling::validate_start_window(
        start_time,
        now,
        Some(Duration::minutes(config.min_lead_time_minutes)),
    )?;

    // Conflict check and insert share one transaction; the schema trigger
    // still backstops concurrent writers.
    let tx = conn.unchecked_transaction()?;

    let service = queries::get_service(&tx, service_id)?
        .filter(|s| s.is_active)
        .ok_or_else(|| AppError::not_found("service"))?;

    let end_time = start_time + Duration::minutes(service.duration_minutes);

    let active = queries::get_active_bookings_for_service(&tx, service_id)?;
    if scheduling::conflicts(start_time, end_time, &active, None) {
        return Err(AppError::Conflict("time slot is already booked".to_string()));
    }

    let booking = Booking {
        id: uuid::Uuid::new_v4().to_string(),
        user_id: actor.id.clone(),
        service_id: service_id.to_string(),
        start_time,
        end_time,
        status: BookingStatus::Pending,
        created_at: now,
        updated_at: now,
    };

    queries::create_booking(&tx, &booking)?;
    tx.commit()?;

    tracing::info!(booking_id = %booking.id, user_id = %actor.id, service_id, "booking created");
    Ok(booking)
}

pub struct BookingListQuery {
    pub status: Option<BookingStatus>,
    pub from_date: Option<NaiveDateTime>,
    pub to_date: Option<NaiveDateTime>,
    pub skip: i64,
    pub limit: i64,
}

/// Page of bookings plus the total matching the filters. Non-admins are
/// always scoped to their own bookings, whatever the request says.
pub fn list_bookings(
    conn: &Connection,
    actor: &User,
    query: &BookingListQuery,
) -> Result<(Vec<Booking>, i64), AppError> {
    let filter = BookingFilter {
        user_id: (!actor.is_admin()).then_some(actor.id.as_str()),
        status: query.status,
        from_date: query.from_date,
        to_date: query.to_date,
        skip: query.skip.max(0),
        limit: query.limit.clamp(1, 1000),
    };
    queries::list_bookings(conn, &filter)
}

/// Unauthorized lookups answer exactly like missing ids.
pub fn get_booking(
    conn: &Connection,
    actor: &User,
    booking_id: &str,
    now: NaiveDateTime,
) -> Result<Booking, AppError> {
    let booking =
        queries::get_booking(conn, booking_id)?.ok_or_else(|| AppError::not_found("booking"))?;

    policy::authorize(actor, &booking, &BookingAction::View, now)
        .map_err(|_| AppError::not_found("booking"))?;

    Ok(booking)
}

#[derive(Default)]
pub struct BookingPatch {
    pub status: Option<BookingStatus>,
    pub start_time: Option<NaiveDateTime>,
}

pub fn update_booking(
    conn: &Connection,
    actor: &User,
    booking_id: &str,
    patch: &BookingPatch,
    now: NaiveDateTime,
) -> Result<Booking, AppError> {
    if patch.status.is_none() && patch.start_time.is_none() {
        return Err(AppError::validation("no fields to update"));
    }

    let tx = conn.unchecked_transaction()?;

    let mut booking =
        queries::get_booking(&tx, booking_id)?.ok_or_else(|| AppError::not_found("booking"))?;

    let rescheduling = patch.start_time.is_some();

    // The status lands first so a combined cancel-or-demote plus
    // reschedule is judged against the requested state.
    if let Some(target) = patch.status {
        policy::authorize(
            actor,
            &booking,
            &BookingAction::SetStatus {
                target,
                rescheduling,
            },
            now,
        )?;
        booking.status = target;
    }

    if let Some(new_start) = patch.start_time {
        policy::authorize(actor, &booking, &BookingAction::Reschedule, now)?;

        scheduling::validate_start_window(new_start, now, None)?;

        let service = queries::get_service(&tx, &booking.service_id)?
            .ok_or_else(|| AppError::not_found("service"))?;
        let new_end = new_start + Duration::minutes(service.duration_minutes);

        let active = queries::get_active_bookings_for_service(&tx, &booking.service_id)?;
        if scheduling::conflicts(new_start, new_end, &active, Some(&booking.id)) {
            return Err(AppError::Conflict(
                "new time slot is already booked".to_string(),
            ));
        }

        booking.start_time = new_start;
        booking.end_time = new_end;
    }

    booking.updated_at = now;
    if !queries::update_booking(&tx, &booking)? {
        return Err(AppError::not_found("booking"));
    }
    tx.commit()?;

    tracing::info!(booking_id = %booking.id, user_id = %actor.id, "booking updated");
    Ok(booking)
}

/// Administrator-only completion, with no time restriction. Distinct from
/// the generic update path so the COMPLETED target never rides on a PATCH.
pub fn complete_booking(
    conn: &Connection,
    actor: &User,
    booking_id: &str,
    now: NaiveDateTime,
) -> Result<Booking, AppError> {
    let tx = conn.unchecked_transaction()?;

    let mut booking =
        queries::get_booking(&tx, booking_id)?.ok_or_else(|| AppError::not_found("booking"))?;

    policy::authorize(actor, &booking, &BookingAction::Complete, now)?;

    booking.status = BookingStatus::Completed;
    booking.updated_at = now;
    if !queries::update_booking(&tx, &booking)? {
        return Err(AppError::not_found("booking"));
    }
    tx.commit()?;

    tracing::info!(booking_id = %booking.id, admin_id = %actor.id, "booking completed");
    Ok(booking)
}

pub fn delete_booking(
    conn: &Connection,
    actor: &User,
    booking_id: &str,
    now: NaiveDateTime,
) -> Result<(), AppError> {
    let tx = conn.unchecked_transaction()?;

    let booking =
        queries::get_booking(&tx, booking_id)?.ok_or_else(|| AppError::not_found("booking"))?;

    policy::authorize(actor, &booking, &BookingAction::Delete, now)?;

    queries::delete_booking(&tx, booking_id)?;
    tx.commit()?;

    tracing::info!(booking_id, user_id = %actor.id, "booking deleted");
    Ok(())
}
