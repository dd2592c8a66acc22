use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;

/// User record in the database.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct User {
    pub id: i64,                      // generated user ID
    pub username: String,             // unique login name
    pub email: String,                // contact email
    #[serde(skip_serializing)]
    pub password_hash: String,        // SHA-256 hex digest, not exposed in JSON
    pub total_stars: i32,             // sum of stars over completed levels
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,   // creation timestamp
}
