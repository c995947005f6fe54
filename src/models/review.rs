use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// One review per booking, ever. The reviews table backs this with a
/// UNIQUE constraint on booking_id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Review {
    pub id: String,
    pub booking_id: String,
    pub user_id: String,
    pub service_id: String,
    pub rating: i64,
    pub comment: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}
