use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::auth;
use crate::errors::AppError;
use crate::handlers::fmt_ts;
use crate::models::{Booking, BookingStatus};
use crate::services::booking::{self, BookingListQuery, BookingPatch};
use crate::services::clock;
use crate::state::AppState;

#[derive(Serialize)]
pub struct BookingResponse {
    id: String,
    user_id: String,
    service_id: String,
    start_time: String,
    end_time: String,
    status: String,
    created_at: String,
    updated_at: String,
}

impl From<Booking> for BookingResponse {
    fn from(b: Booking) -> Self {
        BookingResponse {
            id: b.id,
            user_id: b.user_id,
            service_id: b.service_id,
            start_time: fmt_ts(&b.start_time),
            end_time: fmt_ts(&b.end_time),
            status: b.status.as_str().to_string(),
            created_at: fmt_ts(&b.created_at),
            updated_at: fmt_ts(&b.updated_at),
        }
    }
}

fn parse_instant(raw: &str) -> Result<NaiveDateTime, AppError> {
    clock::normalize(raw).ok_or_else(|| AppError::validation(format!("invalid timestamp: {raw}")))
}

fn parse_status(raw: &str) -> Result<BookingStatus, AppError> {
    BookingStatus::parse(raw).ok_or_else(|| AppError::validation(format!("unknown status: {raw}")))
}

// POST /api/bookings
#[derive(Deserialize)]
pub struct CreateBookingRequest {
    pub service_id: String,
    pub start_time: String,
}

pub async fn create_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<CreateBookingRequest>,
) -> Result<(StatusCode, Json<BookingResponse>), AppError> {
    let start_time = parse_instant(&body.start_time)?;
    let now = state.clock.now();

    let db = state.db.lock().unwrap();
    let actor = auth::authenticate(&db, &headers)?;
    let created =
        booking::create_booking(&db, &state.config, &actor, &body.service_id, start_time, now)?;

    Ok((StatusCode::CREATED, Json(created.into())))
}

// GET /api/bookings
#[derive(Deserialize)]
pub struct ListBookingsQuery {
    pub status: Option<String>,
    pub from_date: Option<String>,
    pub to_date: Option<String>,
    pub skip: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Serialize)]
pub struct ListBookingsResponse {
    data: Vec<BookingResponse>,
    total: i64,
    skip: i64,
    limit: i64,
}

pub async fn list_bookings(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<ListBookingsQuery>,
) -> Result<Json<ListBookingsResponse>, AppError> {
    let status = query.status.as_deref().map(parse_status).transpose()?;
    let from_date = query.from_date.as_deref().map(parse_instant).transpose()?;
    let to_date = query.to_date.as_deref().map(parse_instant).transpose()?;
    let skip = query.skip.unwrap_or(0).max(0);
    let limit = query.limit.unwrap_or(100).clamp(1, 1000);

    let list_query = BookingListQuery {
        status,
        from_date,
        to_date,
        skip,
        limit,
    };

    let db = state.db.lock().unwrap();
    let actor = auth::authenticate(&db, &headers)?;
    let (bookings, total) = booking::list_bookings(&db, &actor, &list_query)?;

    Ok(Json(ListBookingsResponse {
        data: bookings.into_iter().map(Into::into).collect(),
        total,
        skip,
        limit,
    }))
}

// GET /api/bookings/:id
pub async fn get_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<BookingResponse>, AppError> {
    let now = state.clock.now();
    let db = state.db.lock().unwrap();
    let actor = auth::authenticate(&db, &headers)?;
    let found = booking::get_booking(&db, &actor, &id, now)?;
    Ok(Json(found.into()))
}

// PATCH /api/bookings/:id
#[derive(Deserialize)]
pub struct UpdateBookingRequest {
    pub status: Option<String>,
    pub start_time: Option<String>,
}

pub async fn update_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<UpdateBookingRequest>,
) -> Result<Json<BookingResponse>, AppError> {
    let patch = BookingPatch {
        status: body.status.as_deref().map(parse_status).transpose()?,
        start_time: body.start_time.as_deref().map(parse_instant).transpose()?,
    };
    let now = state.clock.now();

    let db = state.db.lock().unwrap();
    let actor = auth::authenticate(&db, &headers)?;
    let updated = booking::update_booking(&db, &actor, &id, &patch, now)?;
    Ok(Json(updated.into()))
}

// POST /api/bookings/:id/complete
pub async fn complete_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<BookingResponse>, AppError> {
    let now = state.clock.now();
    let db = state.db.lock().unwrap();
    let actor = auth::authenticate(&db, &headers)?;
    let completed = booking::complete_booking(&db, &actor, &id, now)?;
    Ok(Json(completed.into()))
}

// DELETE /api/bookings/:id
pub async fn delete_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let now = state.clock.now();
    let db = state.db.lock().unwrap();
    let actor = auth::authenticate(&db, &headers)?;
    booking::delete_booking(&db, &actor, &id, now)?;
    Ok(StatusCode::NO_CONTENT)
}
