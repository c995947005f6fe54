use chrono::NaiveDateTime;
use rusqlite::Connection;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{BookingStatus, Review, User};

fn validate_rating(rating: i64) -> Result<(), AppError> {
    if !(1..=5).contains(&rating) {
        return Err(AppError::validation("rating must be between 1 and 5"));
    }
    Ok(())
}

/// A review may be attached to a booking exactly once: the booking must be
/// COMPLETED and owned by the reviewer. The duplicate lookup here is only
/// the friendly fast path; the UNIQUE constraint on reviews.booking_id is
/// what holds under concurrent submissions.
pub fn create_review(
    conn: &Connection,
    actor: &User,
    booking_id: &str,
    rating: i64,
    comment: &str,
    now: NaiveDateTime,
) -> Result<Review, AppError> {
    validate_rating(rating)?;
    if comment.trim().is_empty() {
        return Err(AppError::validation("comment must not be empty"));
    }

    let tx = conn.unchecked_transaction()?;

    // Absent and not-owned answer identically.
    let booking = queries::get_booking(&tx, booking_id)?
        .filter(|b| b.user_id == actor.id)
        .ok_or_else(|| AppError::validation("booking not found or access denied"))?;

    if booking.status != BookingStatus::Completed {
        tracing::warn!(booking_id, status = booking.status.as_str(), "review rejected");
        return Err(AppError::validation("can only review completed bookings"));
    }

    if queries::get_review_for_booking(&tx, booking_id)?.is_some() {
        return Err(AppError::validation("only one review allowed per booking"));
    }

    let review = Review {
        id: uuid::Uuid::new_v4().to_string(),
        booking_id: booking_id.to_string(),
        user_id: actor.id.clone(),
        service_id: booking.service_id.clone(),
        rating,
        comment: comment.to_string(),
        created_at: now,
        updated_at: now,
    };

    queries::create_review(&tx, &review)?;
    tx.commit()?;

    tracing::info!(review_id = %review.id, booking_id, "review created");
    Ok(review)
}

pub fn list_service_reviews(
    conn: &Connection,
    service_id: &str,
    skip: i64,
    limit: i64,
) -> Result<Vec<Review>, AppError> {
    queries::get_service(conn, service_id)?.ok_or_else(|| AppError::not_found("service"))?;
    queries::list_reviews_for_service(conn, service_id, skip.max(0), limit.clamp(1, 1000))
}

pub fn service_rating(
    conn: &Connection,
    service_id: &str,
) -> Result<queries::RatingStats, AppError> {
    queries::get_service(conn, service_id)?.ok_or_else(|| AppError::not_found("service"))?;
    queries::get_service_rating_stats(conn, service_id)
}

#[derive(Default)]
pub struct ReviewPatch {
    pub rating: Option<i64>,
    pub comment: Option<String>,
}

pub fn update_review(
    conn: &Connection,
    actor: &User,
    review_id: &str,
    patch: &ReviewPatch,
    now: NaiveDateTime,
) -> Result<Review, AppError> {
    let tx = conn.unchecked_transaction()?;

    let mut review =
        queries::get_review(&tx, review_id)?.ok_or_else(|| AppError::not_found("review"))?;

    if !actor.is_admin() && review.user_id != actor.id {
        return Err(AppError::Authorization);
    }

    if let Some(rating) = patch.rating {
        validate_rating(rating)?;
        review.rating = rating;
    }
    if let Some(comment) = &patch.comment {
        if comment.trim().is_empty() {
            return Err(AppError::validation("comment must not be empty"));
        }
        review.comment = comment.clone();
    }

    review.updated_at = now;
    if !queries::update_review(&tx, &review)? {
        return Err(AppError::not_found("review"));
    }
    tx.commit()?;

    Ok(review)
}

pub fn delete_review(conn: &Connection, actor: &User, review_id: &str) -> Result<(), AppError> {
    let tx = conn.unchecked_transaction()?;

    let review =
        queries::get_review(&tx, review_id)?.ok_or_else(|| AppError::not_found("review"))?;

    if !actor.is_admin() && review.user_id != actor.id {
        return Err(AppError::Authorization);
    }

    queries::delete_review(&tx, review_id)?;
    tx.commit()?;

    tracing::info!(review_id, user_id = %actor.id, "review deleted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::db;
    use crate::models::{Role, Service};
    use crate::services::booking;

    fn dt(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
    }

    const NOW: &str = "2025-06-16 09:00:00";

    struct Fixture {
        conn: Connection,
        owner: User,
        admin: User,
        booking_id: String,
    }

    /// One completed booking for s1 owned by u1, admin a1 standing by.
    fn completed_booking_fixture() -> Fixture {
        let conn = db::init_db(":memory:").unwrap();
        let config = AppConfig {
            port: 0,
            database_url: ":memory:".to_string(),
            min_lead_time_minutes: 60,
        };

        let owner = User {
            id: "u1".to_string(),
            name: "Owner".to_string(),
            email: "u1@example.com".to_string(),
            role: Role::User,
        };
        let admin = User {
            id: "a1".to_string(),
            name: "Admin".to_string(),
            email: "a1@example.com".to_string(),
            role: Role::Admin,
        };
        queries::create_user(&conn, &owner, "token-u1").unwrap();
        queries::create_user(&conn, &admin, "token-a1").unwrap();

        let service = Service {
            id: "s1".to_string(),
            title: "Service".to_string(),
            description: "desc".to_string(),
            price: 10.0,
            duration_minutes: 30,
            is_active: true,
            created_at: dt("2025-06-01 00:00:00"),
        };
        queries::create_service(&conn, &service).unwrap();

        let created = booking::create_booking(
            &conn,
            &config,
            &owner,
            "s1",
            dt("2025-06-17 10:00:00"),
            dt(NOW),
        )
        .unwrap();
        booking::complete_booking(&conn, &admin, &created.id, dt("2025-06-17 11:00:00")).unwrap();

        Fixture {
            conn,
            owner,
            admin,
            booking_id: created.id,
        }
    }

    #[test]
    fn test_owner_reviews_completed_booking_once() {
        let f = completed_booking_fixture();
        let now = dt("2025-06-17 12:00:00");

        let review = create_review(&f.conn, &f.owner, &f.booking_id, 5, "great", now).unwrap();
        assert_eq!(review.service_id, "s1");
        assert_eq!(review.rating, 5);

        let dup = create_review(&f.conn, &f.owner, &f.booking_id, 4, "again", now);
        assert!(matches!(dup, Err(AppError::Validation(_))));
    }

    #[test]
    fn test_unique_constraint_backstops_duplicates() {
        let f = completed_booking_fixture();
        let now = dt("2025-06-17 12:00:00");

        create_review(&f.conn, &f.owner, &f.booking_id, 5, "great", now).unwrap();

        // Skip the fast-path lookup and insert directly; the UNIQUE index
        // must refuse the second row.
        let second = Review {
            id: "dup".to_string(),
            booking_id: f.booking_id.clone(),
            user_id: "u1".to_string(),
            service_id: "s1".to_string(),
            rating: 1,
            comment: "sneaky".to_string(),
            created_at: now,
            updated_at: now,
        };
        let result = queries::create_review(&f.conn, &second);
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[test]
    fn test_only_completed_bookings_reviewable() {
        let f = completed_booking_fixture();
        let now = dt("2025-06-17 12:00:00");
        let config = AppConfig {
            port: 0,
            database_url: ":memory:".to_string(),
            min_lead_time_minutes: 60,
        };

        let pending = booking::create_booking(
            &f.conn,
            &config,
            &f.owner,
            "s1",
            dt("2025-06-18 10:00:00"),
            dt(NOW),
        )
        .unwrap();

        let result = create_review(&f.conn, &f.owner, &pending.id, 5, "early", now);
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[test]
    fn test_non_owner_and_missing_booking_answer_alike() {
        let f = completed_booking_fixture();
        let now = dt("2025-06-17 12:00:00");

        let foreign = create_review(&f.conn, &f.admin, &f.booking_id, 5, "not mine", now);
        let missing = create_review(&f.conn, &f.owner, "no-such-booking", 5, "ghost", now);

        let foreign_msg = foreign.unwrap_err().to_string();
        let missing_msg = missing.unwrap_err().to_string();
        assert_eq!(foreign_msg, missing_msg);
    }

    #[test]
    fn test_rating_bounds_and_empty_comment() {
        let f = completed_booking_fixture();
        let now = dt("2025-06-17 12:00:00");

        for bad in [0, 6, -1] {
            let result = create_review(&f.conn, &f.owner, &f.booking_id, bad, "x", now);
            assert!(matches!(result, Err(AppError::Validation(_))), "rating {bad}");
        }

        let result = create_review(&f.conn, &f.owner, &f.booking_id, 3, "   ", now);
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[test]
    fn test_listing_and_stats() {
        let f = completed_booking_fixture();
        let now = dt("2025-06-17 12:00:00");
        create_review(&f.conn, &f.owner, &f.booking_id, 4, "solid", now).unwrap();

        let reviews = list_service_reviews(&f.conn, "s1", 0, 100).unwrap();
        assert_eq!(reviews.len(), 1);

        let stats = service_rating(&f.conn, "s1").unwrap();
        assert_eq!(stats.total_reviews, 1);
        assert_eq!(stats.average_rating, 4.0);
        assert_eq!(stats.min_rating, 4);
        assert_eq!(stats.max_rating, 4);

        let result = list_service_reviews(&f.conn, "no-such-service", 0, 100);
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[test]
    fn test_update_and_delete_owner_or_admin() {
        let f = completed_booking_fixture();
        let now = dt("2025-06-17 12:00:00");
        let review = create_review(&f.conn, &f.owner, &f.booking_id, 4, "solid", now).unwrap();

        let stranger = User {
            id: "u9".to_string(),
            name: "Stranger".to_string(),
            email: "u9@example.com".to_string(),
            role: Role::User,
        };

        let patch = ReviewPatch {
            rating: Some(2),
            comment: None,
        };
        let result = update_review(&f.conn, &stranger, &review.id, &patch, now);
        assert!(matches!(result, Err(AppError::Authorization)));

        let updated = update_review(&f.conn, &f.owner, &review.id, &patch, now).unwrap();
        assert_eq!(updated.rating, 2);
        assert_eq!(updated.comment, "solid");

        let result = delete_review(&f.conn, &stranger, &review.id);
        assert!(matches!(result, Err(AppError::Authorization)));

        delete_review(&f.conn, &f.admin, &review.id).unwrap();
        assert!(queries::get_review(&f.conn, &review.id).unwrap().is_none());
    }
}
