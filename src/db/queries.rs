use chrono::NaiveDateTime;
use rusqlite::types::Type;
use rusqlite::{params, Connection};

use crate::errors::AppError;
use crate::models::{Booking, BookingStatus, Review, Role, Service, User};

const TS_FMT: &str = "%Y-%m-%d %H:%M:%S";

pub fn ts(dt: &NaiveDateTime) -> String {
    dt.format(TS_FMT).to_string()
}

fn parse_ts(idx: usize, s: &str) -> rusqlite::Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, TS_FMT)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn parse_status(idx: usize, s: &str) -> rusqlite::Result<BookingStatus> {
    BookingStatus::parse(s).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            Type::Text,
            format!("unknown booking status: {s}").into(),
        )
    })
}

/// Translate constraint aborts from the schema's triggers and UNIQUE
/// indexes into the caller-facing error kinds.
fn map_write_err(e: rusqlite::Error) -> AppError {
    if let rusqlite::Error::SqliteFailure(_, Some(msg)) = &e {
        if msg.contains("overlapping booking") {
            return AppError::Conflict("time slot is already booked".to_string());
        }
        if msg.contains("reviews.booking_id") {
            return AppError::Validation("only one review allowed per booking".to_string());
        }
    }
    AppError::Database(e)
}

// ── Users ──

pub fn create_user(conn: &Connection, user: &User, api_token: &str) -> Result<(), AppError> {
    conn.execute(
        "INSERT INTO users (id, name, email, role, api_token) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![user.id, user.name, user.email, user.role.as_str(), api_token],
    )?;
    Ok(())
}

fn parse_user_row(row: &rusqlite::Row) -> rusqlite::Result<User> {
    let role_str: String = row.get(3)?;
    Ok(User {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        role: Role::parse(&role_str),
    })
}

pub fn get_user_by_token(conn: &Connection, token: &str) -> Result<Option<User>, AppError> {
    let result = conn.query_row(
        "SELECT id, name, email, role FROM users WHERE api_token = ?1",
        params![token],
        parse_user_row,
    );

    match result {
        Ok(user) => Ok(Some(user)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

// ── Services ──

pub fn create_service(conn: &Connection, service: &Service) -> Result<(), AppError> {
    conn.execute(
        "INSERT INTO services (id, title, description, price, duration_minutes, is_active, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            service.id,
            service.title,
            service.description,
            service.price,
            service.duration_minutes,
            service.is_active as i32,
            ts(&service.created_at),
        ],
    )?;
    Ok(())
}

fn parse_service_row(row: &rusqlite::Row) -> rusqlite::Result<Service> {
    let created_at_str: String = row.get(6)?;
    Ok(Service {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        price: row.get(3)?,
        duration_minutes: row.get(4)?,
        is_active: row.get::<_, i32>(5)? != 0,
        created_at: parse_ts(6, &created_at_str)?,
    })
}

pub fn get_service(conn: &Connection, id: &str) -> Result<Option<Service>, AppError> {
    let result = conn.query_row(
        "SELECT id, title, description, price, duration_minutes, is_active, created_at
         FROM services WHERE id = ?1",
        params![id],
        parse_service_row,
    );

    match result {
        Ok(service) => Ok(Some(service)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn list_active_services(conn: &Connection) -> Result<Vec<Service>, AppError> {
    let mut stmt = conn.prepare(
        "SELECT id, title, description, price, duration_minutes, is_active, created_at
         FROM services WHERE is_active = 1 ORDER BY title ASC",
    )?;

    let rows = stmt.query_map([], parse_service_row)?;

    let mut services = vec![];
    for row in rows {
        services.push(row?);
    }
    Ok(services)
}

// ── Bookings ──

fn parse_booking_row(row: &rusqlite::Row) -> rusqlite::Result<Booking> {
    let start_str: String = row.get(3)?;
    let end_str: String = row.get(4)?;
    let status_str: String = row.get(5)?;
    let created_str: String = row.get(6)?;
    let updated_str: String = row.get(7)?;

    Ok(Booking {
        id: row.get(0)?,
        user_id: row.get(1)?,
        service_id: row.get(2)?,
        start_time: parse_ts(3, &start_str)?,
        end_time: parse_ts(4, &end_str)?,
        status: parse_status(5, &status_str)?,
        created_at: parse_ts(6, &created_str)?,
        updated_at: parse_ts(7, &updated_str)?,
    })
}

const BOOKING_COLS: &str =
    "id, user_id, service_id, start_time, end_time, status, created_at, updated_at";

pub fn create_booking(conn: &Connection, booking: &Booking) -> Result<(), AppError> {
    conn.execute(
        "INSERT INTO bookings (id, user_id, service_id, start_time, end_time, status, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            booking.id,
            booking.user_id,
            booking.service_id,
            ts(&booking.start_time),
            ts(&booking.end_time),
            booking.status.as_str(),
            ts(&booking.created_at),
            ts(&booking.updated_at),
        ],
    )
    .map_err(map_write_err)?;
    Ok(())
}

pub fn get_booking(conn: &Connection, id: &str) -> Result<Option<Booking>, AppError> {
    let result = conn.query_row(
        &format!("SELECT {BOOKING_COLS} FROM bookings WHERE id = ?1"),
        params![id],
        parse_booking_row,
    );

    match result {
        Ok(booking) => Ok(Some(booking)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Active (pending/confirmed) bookings occupying slots of one service.
pub fn get_active_bookings_for_service(
    conn: &Connection,
    service_id: &str,
) -> Result<Vec<Booking>, AppError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {BOOKING_COLS} FROM bookings
         WHERE service_id = ?1 AND status IN ('pending', 'confirmed')
         ORDER BY start_time ASC"
    ))?;

    let rows = stmt.query_map(params![service_id], parse_booking_row)?;

    let mut bookings = vec![];
    for row in rows {
        bookings.push(row?);
    }
    Ok(bookings)
}

pub struct BookingFilter<'a> {
    pub user_id: Option<&'a str>,
    pub status: Option<BookingStatus>,
    pub from_date: Option<NaiveDateTime>,
    pub to_date: Option<NaiveDateTime>,
    pub skip: i64,
    pub limit: i64,
}

/// Filtered page of bookings plus the total count matching the filters
/// (independent of the pagination window). Newest start_time first.
pub fn list_bookings(
    conn: &Connection,
    filter: &BookingFilter,
) -> Result<(Vec<Booking>, i64), AppError> {
    let mut clauses: Vec<&str> = vec![];
    let mut args: Vec<Box<dyn rusqlite::types::ToSql>> = vec![];

    if let Some(user_id) = filter.user_id {
        args.push(Box::new(user_id.to_string()));
        clauses.push("user_id = ?");
    }
    if let Some(status) = filter.status {
        args.push(Box::new(status.as_str().to_string()));
        clauses.push("status = ?");
    }
    if let Some(from) = filter.from_date {
        args.push(Box::new(ts(&from)));
        clauses.push("start_time >= ?");
    }
    if let Some(to) = filter.to_date {
        args.push(Box::new(ts(&to)));
        clauses.push("start_time <= ?");
    }

    let where_sql = if clauses.is_empty() {
        String::new()
    } else {
        let numbered: Vec<String> = clauses
            .iter()
            .enumerate()
            .map(|(i, c)| c.replacen('?', &format!("?{}", i + 1), 1))
            .collect();
        format!(" WHERE {}", numbered.join(" AND "))
    };

    let arg_refs: Vec<&dyn rusqlite::types::ToSql> = args.iter().map(|a| a.as_ref()).collect();

    let total: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM bookings{where_sql}"),
        arg_refs.as_slice(),
        |row| row.get(0),
    )?;

    let n = args.len();
    let page_sql = format!(
        "SELECT {BOOKING_COLS} FROM bookings{where_sql}
         ORDER BY start_time DESC LIMIT ?{} OFFSET ?{}",
        n + 1,
        n + 2
    );

    let mut page_args = args;
    page_args.push(Box::new(filter.limit));
    page_args.push(Box::new(filter.skip));
    let page_refs: Vec<&dyn rusqlite::types::ToSql> =
        page_args.iter().map(|a| a.as_ref()).collect();

    let mut stmt = conn.prepare(&page_sql)?;
    let rows = stmt.query_map(page_refs.as_slice(), parse_booking_row)?;

    let mut bookings = vec![];
    for row in rows {
        bookings.push(row?);
    }
    Ok((bookings, total))
}

pub fn update_booking(conn: &Connection, booking: &Booking) -> Result<bool, AppError> {
    let count = conn
        .execute(
            "UPDATE bookings SET start_time = ?1, end_time = ?2, status = ?3, updated_at = ?4
             WHERE id = ?5",
            params![
                ts(&booking.start_time),
                ts(&booking.end_time),
                booking.status.as_str(),
                ts(&booking.updated_at),
                booking.id,
            ],
        )
        .map_err(map_write_err)?;
    Ok(count > 0)
}

pub fn delete_booking(conn: &Connection, id: &str) -> Result<bool, AppError> {
    let count = conn.execute("DELETE FROM bookings WHERE id = ?1", params![id])?;
    Ok(count > 0)
}

// ── Reviews ──

fn parse_review_row(row: &rusqlite::Row) -> rusqlite::Result<Review> {
    let created_str: String = row.get(6)?;
    let updated_str: String = row.get(7)?;
    Ok(Review {
        id: row.get(0)?,
        booking_id: row.get(1)?,
        user_id: row.get(2)?,
        service_id: row.get(3)?,
        rating: row.get(4)?,
        comment: row.get(5)?,
        created_at: parse_ts(6, &created_str)?,
        updated_at: parse_ts(7, &updated_str)?,
    })
}

const REVIEW_COLS: &str =
    "id, booking_id, user_id, service_id, rating, comment, created_at, updated_at";

pub fn create_review(conn: &Connection, review: &Review) -> Result<(), AppError> {
    conn.execute(
        "INSERT INTO reviews (id, booking_id, user_id, service_id, rating, comment, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            review.id,
            review.booking_id,
            review.user_id,
            review.service_id,
            review.rating,
            review.comment,
            ts(&review.created_at),
            ts(&review.updated_at),
        ],
    )
    .map_err(map_write_err)?;
    Ok(())
}

pub fn get_review(conn: &Connection, id: &str) -> Result<Option<Review>, AppError> {
    let result = conn.query_row(
        &format!("SELECT {REVIEW_COLS} FROM reviews WHERE id = ?1"),
        params![id],
        parse_review_row,
    );

    match result {
        Ok(review) => Ok(Some(review)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn get_review_for_booking(
    conn: &Connection,
    booking_id: &str,
) -> Result<Option<Review>, AppError> {
    let result = conn.query_row(
        &format!("SELECT {REVIEW_COLS} FROM reviews WHERE booking_id = ?1"),
        params![booking_id],
        parse_review_row,
    );

    match result {
        Ok(review) => Ok(Some(review)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn list_reviews_for_service(
    conn: &Connection,
    service_id: &str,
    skip: i64,
    limit: i64,
) -> Result<Vec<Review>, AppError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {REVIEW_COLS} FROM reviews WHERE service_id = ?1
         ORDER BY created_at DESC LIMIT ?2 OFFSET ?3"
    ))?;

    let rows = stmt.query_map(params![service_id, limit, skip], parse_review_row)?;

    let mut reviews = vec![];
    for row in rows {
        reviews.push(row?);
    }
    Ok(reviews)
}

pub struct RatingStats {
    pub total_reviews: i64,
    pub average_rating: f64,
    pub min_rating: i64,
    pub max_rating: i64,
}

pub fn get_service_rating_stats(
    conn: &Connection,
    service_id: &str,
) -> Result<RatingStats, AppError> {
    let stats = conn.query_row(
        "SELECT COUNT(id), COALESCE(AVG(rating), 0), COALESCE(MIN(rating), 0), COALESCE(MAX(rating), 0)
         FROM reviews WHERE service_id = ?1",
        params![service_id],
        |row| {
            Ok(RatingStats {
                total_reviews: row.get(0)?,
                average_rating: row.get(1)?,
                min_rating: row.get(2)?,
                max_rating: row.get(3)?,
            })
        },
    )?;
    Ok(stats)
}

pub fn update_review(conn: &Connection, review: &Review) -> Result<bool, AppError> {
    let count = conn.execute(
        "UPDATE reviews SET rating = ?1, comment = ?2, updated_at = ?3 WHERE id = ?4",
        params![
            review.rating,
            review.comment,
            ts(&review.updated_at),
            review.id,
        ],
    )?;
    Ok(count > 0)
}

pub fn delete_review(conn: &Connection, id: &str) -> Result<bool, AppError> {
    let count = conn.execute("DELETE FROM reviews WHERE id = ?1", params![id])?;
    Ok(count > 0)
}
