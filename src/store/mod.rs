use axum::async_trait;
use thiserror::Error;

use crate::auth::repo_types::User;
use crate::records::merge::ProgressSubmission;
use crate::records::repo_types::{GlobalLeaderboardEntry, LevelLeaderboardEntry, LevelRecord};

#[cfg(test)]
pub mod memory;
pub mod postgres;

#[cfg(test)]
pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Rows returned by either leaderboard query.
pub const LEADERBOARD_LIMIT: i64 = 100;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0}")]
    UniqueViolation(String),

    #[error("{0}")]
    ForeignKeyViolation(String),

    #[error(transparent)]
    Sqlx(sqlx::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &e {
            if db.is_unique_violation() {
                return Self::UniqueViolation(db.message().to_string());
            }
            if db.is_foreign_key_violation() {
                return Self::ForeignKeyViolation(db.message().to_string());
            }
        }
        Self::Sqlx(e)
    }
}

/// Everything the handlers need from the relational store.
///
/// `submit_progress` must apply the record merge and, for completed
/// submissions, the `total_stars` recomputation as one atomic unit.
#[async_trait]
pub trait GameStore: Send + Sync {
    async fn create_user(
        &self,
        username: &str,
        email: &str,
        password_hash: &str,
    ) -> StoreResult<User>;

    async fn find_user_by_credentials(
        &self,
        username: &str,
        password_hash: &str,
    ) -> StoreResult<Option<User>>;

    async fn find_user(&self, user_id: i64) -> StoreResult<Option<User>>;

    async fn submit_progress(&self, submission: &ProgressSubmission) -> StoreResult<LevelRecord>;

    /// Records of one user, ordered by `level_id`.
    async fn user_records(&self, user_id: i64) -> StoreResult<Vec<LevelRecord>>;

    /// Completed records for a level, first completion first.
    async fn level_leaderboard(
        &self,
        level_id: i32,
        limit: i64,
    ) -> StoreResult<Vec<LevelLeaderboardEntry>>;

    /// Users by `total_stars`, then by number of completed levels.
    async fn global_leaderboard(&self, limit: i64) -> StoreResult<Vec<GlobalLeaderboardEntry>>;
}
