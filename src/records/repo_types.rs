use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;

/// Progress of one user on one level. `(user_id, level_id)` is unique.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct LevelRecord {
    pub id: i64,
    pub user_id: i64,
    pub level_id: i32,
    pub attempts: i32,
    pub best_progress: i32,
    pub completed: bool,
    pub stars_earned: i32,
    #[serde(with = "time::serde::rfc3339::option")]
    pub completed_at: Option<OffsetDateTime>,
}

/// A completion on a single level's leaderboard.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct LevelLeaderboardEntry {
    pub username: String,
    pub attempts: i32,
    pub best_progress: i32,
    pub completed: bool,
    pub stars_earned: i32,
    #[serde(with = "time::serde::rfc3339::option")]
    pub completed_at: Option<OffsetDateTime>,
}

/// A user's standing on the overall leaderboard.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct GlobalLeaderboardEntry {
    pub username: String,
    pub total_stars: i32,
    pub levels_completed: i64,
}
