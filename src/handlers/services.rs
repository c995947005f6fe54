use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::auth;
use crate::db::queries;
use crate::errors::AppError;
use crate::handlers::fmt_ts;
use crate::models::Service;
use crate::state::AppState;

#[derive(Serialize)]
pub struct ServiceResponse {
    id: String,
    title: String,
    description: String,
    price: f64,
    duration_minutes: i64,
    is_active: bool,
    created_at: String,
}

impl From<Service> for ServiceResponse {
    fn from(s: Service) -> Self {
        ServiceResponse {
            id: s.id,
            title: s.title,
            description: s.description,
            price: s.price,
            duration_minutes: s.duration_minutes,
            is_active: s.is_active,
            created_at: fmt_ts(&s.created_at),
        }
    }
}

// GET /api/services
pub async fn list_services(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<ServiceResponse>>, AppError> {
    let db = state.db.lock().unwrap();
    let services = queries::list_active_services(&db)?;
    Ok(Json(services.into_iter().map(Into::into).collect()))
}

// GET /api/services/:id
pub async fn get_service(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ServiceResponse>, AppError> {
    let db = state.db.lock().unwrap();
    let service =
        queries::get_service(&db, &id)?.ok_or_else(|| AppError::not_found("service"))?;
    Ok(Json(service.into()))
}

// POST /api/services (admin)
#[derive(Deserialize)]
pub struct CreateServiceRequest {
    pub title: String,
    pub description: String,
    pub price: f64,
    pub duration_minutes: i64,
    pub is_active: Option<bool>,
}

pub async fn create_service(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<CreateServiceRequest>,
) -> Result<(StatusCode, Json<ServiceResponse>), AppError> {
    let now = state.clock.now();
    let db = state.db.lock().unwrap();
    let actor = auth::authenticate(&db, &headers)?;
    if !actor.is_admin() {
        return Err(AppError::Authorization);
    }

    if body.duration_minutes <= 0 {
        return Err(AppError::validation("duration_minutes must be positive"));
    }
    if body.price < 0.0 {
        return Err(AppError::validation("price must not be negative"));
    }

    let service = Service {
        id: uuid::Uuid::new_v4().to_string(),
        title: body.title,
        description: body.description,
        price: body.price,
        duration_minutes: body.duration_minutes,
        is_active: body.is_active.unwrap_or(true),
        created_at: now,
    };
    queries::create_service(&db, &service)?;

    tracing::info!(service_id = %service.id, admin_id = %actor.id, "service created");
    Ok((StatusCode::CREATED, Json(service.into())))
}
