use anyhow::Context;
use axum::async_trait;
use sqlx::{postgres::PgPoolOptions, PgPool, Postgres, Transaction};
use time::OffsetDateTime;
use tracing::{debug, info};

use super::{GameStore, StoreError, StoreResult};
use crate::auth::repo_types::User;
use crate::records::merge::{merge_progress, MergedProgress, ProgressSubmission};
use crate::records::repo_types::{GlobalLeaderboardEntry, LevelLeaderboardEntry, LevelRecord};

const USER_COLUMNS: &str = "id, username, email, password_hash, total_stars, created_at";
const RECORD_COLUMNS: &str =
    "id, user_id, level_id, attempts, best_progress, completed, stars_earned, completed_at";

/// PostgreSQL-backed store. Concurrent submissions for the same pair are
/// serialized by row locks inside one transaction per request.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(database_url: &str, max_connections: u32) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .context("connect to database")?;
        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .context("run migrations")?;
        info!("migrations applied");
        Ok(())
    }
}

/// Reads the row for the pair and holds its lock until the transaction ends.
async fn lock_record(
    tx: &mut Transaction<'_, Postgres>,
    user_id: i64,
    level_id: i32,
) -> StoreResult<Option<LevelRecord>> {
    let record = sqlx::query_as::<_, LevelRecord>(&format!(
        "SELECT {RECORD_COLUMNS} FROM level_records \
         WHERE user_id = $1 AND level_id = $2 FOR UPDATE"
    ))
    .bind(user_id)
    .bind(level_id)
    .fetch_optional(&mut **tx)
    .await?;
    Ok(record)
}

/// Inserts a fresh row; `None` means another request inserted it first.
async fn insert_record(
    tx: &mut Transaction<'_, Postgres>,
    submission: &ProgressSubmission,
    merged: &MergedProgress,
) -> StoreResult<Option<LevelRecord>> {
    let record = sqlx::query_as::<_, LevelRecord>(&format!(
        r#"
        INSERT INTO level_records
            (user_id, level_id, attempts, best_progress, completed, stars_earned, completed_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        ON CONFLICT (user_id, level_id) DO NOTHING
        RETURNING {RECORD_COLUMNS}
        "#
    ))
    .bind(submission.user_id)
    .bind(submission.level_id)
    .bind(merged.attempts)
    .bind(merged.best_progress)
    .bind(merged.completed)
    .bind(merged.stars_earned)
    .bind(merged.completed_at)
    .fetch_optional(&mut **tx)
    .await?;
    Ok(record)
}

async fn update_record(
    tx: &mut Transaction<'_, Postgres>,
    id: i64,
    merged: &MergedProgress,
) -> StoreResult<LevelRecord> {
    let record = sqlx::query_as::<_, LevelRecord>(&format!(
        r#"
        UPDATE level_records
           SET attempts = $2,
               best_progress = $3,
               completed = $4,
               stars_earned = $5,
               completed_at = $6
         WHERE id = $1
        RETURNING {RECORD_COLUMNS}
        "#
    ))
    .bind(id)
    .bind(merged.attempts)
    .bind(merged.best_progress)
    .bind(merged.completed)
    .bind(merged.stars_earned)
    .bind(merged.completed_at)
    .fetch_one(&mut **tx)
    .await?;
    Ok(record)
}

async fn merge_into_existing(
    tx: &mut Transaction<'_, Postgres>,
    existing: &LevelRecord,
    submission: &ProgressSubmission,
    now: OffsetDateTime,
) -> StoreResult<LevelRecord> {
    let merged = merge_progress(Some(existing), submission, now);
    update_record(tx, existing.id, &merged).await
}

#[async_trait]
impl GameStore for PgStore {
    async fn create_user(
        &self,
        username: &str,
        email: &str,
        password_hash: &str,
    ) -> StoreResult<User> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (username, email, password_hash)
            VALUES ($1, $2, $3)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(username)
        .bind(email)
        .bind(password_hash)
        .fetch_one(&self.pool)
        .await?;
        Ok(user)
    }

    async fn find_user_by_credentials(
        &self,
        username: &str,
        password_hash: &str,
    ) -> StoreResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = $1 AND password_hash = $2"
        ))
        .bind(username)
        .bind(password_hash)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn find_user(&self, user_id: i64) -> StoreResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    /// One transaction: lock or insert the pair's row, merge, and refresh
    /// `total_stars` on completion. When the insert loses a race
    /// (`ON CONFLICT DO NOTHING` returns no row), the follow-up
    /// `SELECT ... FOR UPDATE` relies on READ COMMITTED seeing the row the
    /// winning request committed.
    async fn submit_progress(&self, submission: &ProgressSubmission) -> StoreResult<LevelRecord> {
        let now = OffsetDateTime::now_utc();
        let mut tx = self.pool.begin().await?;

        let record = match lock_record(&mut tx, submission.user_id, submission.level_id).await? {
            Some(existing) => merge_into_existing(&mut tx, &existing, submission, now).await?,
            None => {
                let merged = merge_progress(None, submission, now);
                match insert_record(&mut tx, submission, &merged).await? {
                    Some(inserted) => inserted,
                    None => {
                        debug!(
                            user_id = submission.user_id,
                            level_id = submission.level_id,
                            "lost insert race, merging into concurrent row"
                        );
                        let existing =
                            lock_record(&mut tx, submission.user_id, submission.level_id)
                                .await?
                                .ok_or(StoreError::Sqlx(sqlx::Error::RowNotFound))?;
                        merge_into_existing(&mut tx, &existing, submission, now).await?
                    }
                }
            }
        };

        if submission.completed {
            sqlx::query(
                r#"
                UPDATE users
                   SET total_stars = LEAST((
                       SELECT COALESCE(SUM(stars_earned), 0)
                         FROM level_records
                        WHERE user_id = $1 AND completed = TRUE
                   ), 2147483647)
                 WHERE id = $1
                "#,
            )
            .bind(submission.user_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(record)
    }

    async fn user_records(&self, user_id: i64) -> StoreResult<Vec<LevelRecord>> {
        let rows = sqlx::query_as::<_, LevelRecord>(&format!(
            "SELECT {RECORD_COLUMNS} FROM level_records WHERE user_id = $1 ORDER BY level_id"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn level_leaderboard(
        &self,
        level_id: i32,
        limit: i64,
    ) -> StoreResult<Vec<LevelLeaderboardEntry>> {
        let rows = sqlx::query_as::<_, LevelLeaderboardEntry>(
            r#"
            SELECT u.username, lr.attempts, lr.best_progress, lr.completed,
                   lr.stars_earned, lr.completed_at
              FROM level_records lr
              JOIN users u ON lr.user_id = u.id
             WHERE lr.level_id = $1 AND lr.completed = TRUE
             ORDER BY lr.completed_at ASC, lr.id ASC
             LIMIT $2
            "#,
        )
        .bind(level_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn global_leaderboard(&self, limit: i64) -> StoreResult<Vec<GlobalLeaderboardEntry>> {
        let rows = sqlx::query_as::<_, GlobalLeaderboardEntry>(
            r#"
            SELECT u.username, u.total_stars, COUNT(lr.id) AS levels_completed
              FROM users u
              LEFT JOIN level_records lr ON u.id = lr.user_id AND lr.completed = TRUE
             GROUP BY u.id, u.username, u.total_stars
             ORDER BY u.total_stars DESC, levels_completed DESC, u.id ASC
             LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}
