use axum::http::HeaderMap;
use rusqlite::Connection;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::User;

/// Resolve the acting user from a bearer token. Token issuance lives
/// outside this service; here a token is just a row in the users table.
pub fn authenticate(conn: &Connection, headers: &HeaderMap) -> Result<User, AppError> {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    let token = auth.strip_prefix("Bearer ").unwrap_or("");
    if token.is_empty() {
        return Err(AppError::Authorization);
    }

    queries::get_user_by_token(conn, token)?.ok_or(AppError::Authorization)
}
