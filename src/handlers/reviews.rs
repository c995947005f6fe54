use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::auth;
use crate::errors::AppError;
use crate::handlers::fmt_ts;
use crate::models::Review;
use crate::services::review::{self, ReviewPatch};
use crate::state::AppState;

#[derive(Serialize)]
pub struct ReviewResponse {
    id: String,
    booking_id: String,
    user_id: String,
    service_id: String,
    rating: i64,
    comment: String,
    created_at: String,
    updated_at: String,
}

impl From<Review> for ReviewResponse {
    fn from(r: Review) -> Self {
        ReviewResponse {
            id: r.id,
            booking_id: r.booking_id,
            user_id: r.user_id,
            service_id: r.service_id,
            rating: r.rating,
            comment: r.comment,
            created_at: fmt_ts(&r.created_at),
            updated_at: fmt_ts(&r.updated_at),
        }
    }
}

// POST /api/reviews
#[derive(Deserialize)]
pub struct CreateReviewRequest {
    pub booking_id: String,
    pub rating: i64,
    pub comment: String,
}

pub async fn create_review(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<CreateReviewRequest>,
) -> Result<(StatusCode, Json<ReviewResponse>), AppError> {
    let now = state.clock.now();
    let db = state.db.lock().unwrap();
    let actor = auth::authenticate(&db, &headers)?;
    let created = review::create_review(
        &db,
        &actor,
        &body.booking_id,
        body.rating,
        &body.comment,
        now,
    )?;
    Ok((StatusCode::CREATED, Json(created.into())))
}

// GET /api/services/:id/reviews
#[derive(Deserialize)]
pub struct ReviewPageQuery {
    pub skip: Option<i64>,
    pub limit: Option<i64>,
}

pub async fn get_service_reviews(
    State(state): State<Arc<AppState>>,
    Path(service_id): Path<String>,
    Query(query): Query<ReviewPageQuery>,
) -> Result<Json<Vec<ReviewResponse>>, AppError> {
    let db = state.db.lock().unwrap();
    let reviews = review::list_service_reviews(
        &db,
        &service_id,
        query.skip.unwrap_or(0),
        query.limit.unwrap_or(100),
    )?;
    Ok(Json(reviews.into_iter().map(Into::into).collect()))
}

// GET /api/services/:id/rating
#[derive(Serialize)]
pub struct RatingResponse {
    total_reviews: i64,
    average_rating: f64,
    min_rating: i64,
    max_rating: i64,
}

pub async fn get_service_rating(
    State(state): State<Arc<AppState>>,
    Path(service_id): Path<String>,
) -> Result<Json<RatingResponse>, AppError> {
    let db = state.db.lock().unwrap();
    let stats = review::service_rating(&db, &service_id)?;
    Ok(Json(RatingResponse {
        total_reviews: stats.total_reviews,
        average_rating: stats.average_rating,
        min_rating: stats.min_rating,
        max_rating: stats.max_rating,
    }))
}

// PATCH /api/reviews/:id
#[derive(Deserialize)]
pub struct UpdateReviewRequest {
    pub rating: Option<i64>,
    pub comment: Option<String>,
}

pub async fn update_review(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<UpdateReviewRequest>,
) -> Result<Json<ReviewResponse>, AppError> {
    let patch = ReviewPatch {
        rating: body.rating,
        comment: body.comment,
    };
    let now = state.clock.now();
    let db = state.db.lock().unwrap();
    let actor = auth::authenticate(&db, &headers)?;
    let updated = review::update_review(&db, &actor, &id, &patch, now)?;
    Ok(Json(updated.into()))
}

// DELETE /api/reviews/:id
pub async fn delete_review(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let db = state.db.lock().unwrap();
    let actor = auth::authenticate(&db, &headers)?;
    review::delete_review(&db, &actor, &id)?;
    Ok(StatusCode::NO_CONTENT)
}
