use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// A bookable offering. The booking core only reads `duration_minutes`
/// and `is_active`; the rest is catalog data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Service {
    pub id: String,
    pub title: String,
    pub description: String,
    pub price: f64,
    pub duration_minutes: i64,
    pub is_active: bool,
    pub created_at: NaiveDateTime,
}
