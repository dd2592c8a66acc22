use axum::async_trait;
use time::OffsetDateTime;
use tokio::sync::Mutex;

use super::{GameStore, StoreError, StoreResult};
use crate::auth::repo_types::User;
use crate::records::merge::{merge_progress, ProgressSubmission};
use crate::records::repo_types::{GlobalLeaderboardEntry, LevelLeaderboardEntry, LevelRecord};

/// In-process store with the same semantics as `PgStore`. Each operation
/// runs under one lock, which stands in for the database transaction.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Tables>,
}

#[derive(Default)]
struct Tables {
    users: Vec<User>,
    records: Vec<LevelRecord>,
    next_user_id: i64,
    next_record_id: i64,
}

impl Tables {
    fn completed_levels(&self, user_id: i64) -> i64 {
        self.records
            .iter()
            .filter(|r| r.user_id == user_id && r.completed)
            .count() as i64
    }

    fn recompute_total_stars(&mut self, user_id: i64) {
        let total: i64 = self
            .records
            .iter()
            .filter(|r| r.user_id == user_id && r.completed)
            .map(|r| i64::from(r.stars_earned))
            .sum();
        if let Some(user) = self.users.iter_mut().find(|u| u.id == user_id) {
            user.total_stars = i32::try_from(total).unwrap_or(i32::MAX);
        }
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl GameStore for MemoryStore {
    async fn create_user(
        &self,
        username: &str,
        email: &str,
        password_hash: &str,
    ) -> StoreResult<User> {
        let mut tables = self.inner.lock().await;
        if tables.users.iter().any(|u| u.username == username) {
            return Err(StoreError::UniqueViolation(format!(
                "duplicate key value violates unique constraint on username {username:?}"
            )));
        }
        tables.next_user_id += 1;
        let user = User {
            id: tables.next_user_id,
            username: username.to_string(),
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            total_stars: 0,
            created_at: OffsetDateTime::now_utc(),
        };
        tables.users.push(user.clone());
        Ok(user)
    }

    async fn find_user_by_credentials(
        &self,
        username: &str,
        password_hash: &str,
    ) -> StoreResult<Option<User>> {
        let tables = self.inner.lock().await;
        Ok(tables
            .users
            .iter()
            .find(|u| u.username == username && u.password_hash == password_hash)
            .cloned())
    }

    async fn find_user(&self, user_id: i64) -> StoreResult<Option<User>> {
        let tables = self.inner.lock().await;
        Ok(tables.users.iter().find(|u| u.id == user_id).cloned())
    }

    async fn submit_progress(&self, submission: &ProgressSubmission) -> StoreResult<LevelRecord> {
        let now = OffsetDateTime::now_utc();
        let mut tables = self.inner.lock().await;

        if !tables.users.iter().any(|u| u.id == submission.user_id) {
            return Err(StoreError::ForeignKeyViolation(format!(
                "user {} does not exist",
                submission.user_id
            )));
        }

        let position = tables
            .records
            .iter()
            .position(|r| r.user_id == submission.user_id && r.level_id == submission.level_id);

        let record = match position {
            Some(i) => {
                let existing = &tables.records[i];
                let merged = merge_progress(Some(existing), submission, now);
                let record = merged.into_record(existing.id, submission);
                tables.records[i] = record.clone();
                record
            }
            None => {
                tables.next_record_id += 1;
                let id = tables.next_record_id;
                let record = merge_progress(None, submission, now).into_record(id, submission);
                tables.records.push(record.clone());
                record
            }
        };

        if submission.completed {
            tables.recompute_total_stars(submission.user_id);
        }
        Ok(record)
    }

    async fn user_records(&self, user_id: i64) -> StoreResult<Vec<LevelRecord>> {
        let tables = self.inner.lock().await;
        let mut rows: Vec<LevelRecord> = tables
            .records
            .iter()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect();
        rows.sort_by_key(|r| r.level_id);
        Ok(rows)
    }

    async fn level_leaderboard(
        &self,
        level_id: i32,
        limit: i64,
    ) -> StoreResult<Vec<LevelLeaderboardEntry>> {
        let tables = self.inner.lock().await;
        let mut completed: Vec<&LevelRecord> = tables
            .records
            .iter()
            .filter(|r| r.level_id == level_id && r.completed)
            .collect();
        completed.sort_by_key(|r| (r.completed_at, r.id));

        let rows = completed
            .into_iter()
            .filter_map(|r| {
                let user = tables.users.iter().find(|u| u.id == r.user_id)?;
                Some(LevelLeaderboardEntry {
                    username: user.username.clone(),
                    attempts: r.attempts,
                    best_progress: r.best_progress,
                    completed: r.completed,
                    stars_earned: r.stars_earned,
                    completed_at: r.completed_at,
                })
            })
            .take(limit.max(0) as usize)
            .collect();
        Ok(rows)
    }

    async fn global_leaderboard(&self, limit: i64) -> StoreResult<Vec<GlobalLeaderboardEntry>> {
        let tables = self.inner.lock().await;
        let mut rows: Vec<(i64, GlobalLeaderboardEntry)> = tables
            .users
            .iter()
            .map(|u| {
                (
                    u.id,
                    GlobalLeaderboardEntry {
                        username: u.username.clone(),
                        total_stars: u.total_stars,
                        levels_completed: tables.completed_levels(u.id),
                    },
                )
            })
            .collect();
        rows.sort_by(|(a_id, a), (b_id, b)| {
            b.total_stars
                .cmp(&a.total_stars)
                .then(b.levels_completed.cmp(&a.levels_completed))
                .then(a_id.cmp(b_id))
        });
        Ok(rows
            .into_iter()
            .map(|(_, entry)| entry)
            .take(limit.max(0) as usize)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::LEADERBOARD_LIMIT;

    fn submit(user_id: i64, level_id: i32, progress: i32, completed: bool, stars: i32) -> ProgressSubmission {
        ProgressSubmission {
            user_id,
            level_id,
            progress,
            completed,
            stars_earned: stars,
        }
    }

    async fn user(store: &MemoryStore, name: &str) -> User {
        store
            .create_user(name, &format!("{name}@example.com"), "hash")
            .await
            .expect("create user")
    }

    #[tokio::test]
    async fn duplicate_username_is_unique_violation() {
        let store = MemoryStore::new();
        user(&store, "ada").await;
        let err = store
            .create_user("ada", "other@example.com", "hash")
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::UniqueViolation(_)));
    }

    #[tokio::test]
    async fn progress_for_unknown_user_is_rejected() {
        let store = MemoryStore::new();
        let err = store.submit_progress(&submit(99, 1, 10, false, 0)).await.unwrap_err();
        assert!(matches!(err, StoreError::ForeignKeyViolation(_)));
    }

    #[tokio::test]
    async fn total_stars_tracks_completed_records() {
        let store = MemoryStore::new();
        let ada = user(&store, "ada").await;

        store.submit_progress(&submit(ada.id, 1, 100, true, 3)).await.unwrap();
        store.submit_progress(&submit(ada.id, 2, 100, true, 2)).await.unwrap();
        store.submit_progress(&submit(ada.id, 3, 40, false, 0)).await.unwrap();
        let total = store.find_user(ada.id).await.unwrap().unwrap().total_stars;
        assert_eq!(total, 5);

        // re-completing level 1 with fewer stars overwrites them
        store.submit_progress(&submit(ada.id, 1, 100, true, 1)).await.unwrap();
        let total = store.find_user(ada.id).await.unwrap().unwrap().total_stars;
        assert_eq!(total, 3);

        let records = store.user_records(ada.id).await.unwrap();
        let expected: i32 = records.iter().filter(|r| r.completed).map(|r| r.stars_earned).sum();
        assert_eq!(total, expected);
    }

    #[tokio::test]
    async fn user_records_are_ordered_by_level() {
        let store = MemoryStore::new();
        let ada = user(&store, "ada").await;
        for level in [5, 0, 3] {
            store.submit_progress(&submit(ada.id, level, 10, false, 0)).await.unwrap();
        }
        let levels: Vec<i32> = store
            .user_records(ada.id)
            .await
            .unwrap()
            .iter()
            .map(|r| r.level_id)
            .collect();
        assert_eq!(levels, vec![0, 3, 5]);
    }

    #[tokio::test]
    async fn level_leaderboard_lists_completions_in_order() {
        let store = MemoryStore::new();
        let ada = user(&store, "ada").await;
        let bob = user(&store, "bob").await;
        let cy = user(&store, "cy").await;

        store.submit_progress(&submit(bob.id, 1, 100, true, 2)).await.unwrap();
        store.submit_progress(&submit(cy.id, 1, 50, false, 0)).await.unwrap();
        store.submit_progress(&submit(ada.id, 1, 100, true, 3)).await.unwrap();
        store.submit_progress(&submit(ada.id, 2, 100, true, 3)).await.unwrap();

        let board = store.level_leaderboard(1, LEADERBOARD_LIMIT).await.unwrap();
        let names: Vec<&str> = board.iter().map(|e| e.username.as_str()).collect();
        assert_eq!(names, vec!["bob", "ada"]);
        assert!(board.iter().all(|e| e.completed));
    }

    #[tokio::test]
    async fn level_leaderboard_is_capped() {
        let store = MemoryStore::new();
        for i in 0..(LEADERBOARD_LIMIT + 5) {
            let u = user(&store, &format!("player{i}")).await;
            store.submit_progress(&submit(u.id, 7, 100, true, 1)).await.unwrap();
        }
        let board = store.level_leaderboard(7, LEADERBOARD_LIMIT).await.unwrap();
        assert_eq!(board.len() as i64, LEADERBOARD_LIMIT);
        assert_eq!(board[0].username, "player0");
    }

    #[tokio::test]
    async fn global_leaderboard_is_capped() {
        let store = MemoryStore::new();
        for i in 0..(LEADERBOARD_LIMIT + 5) {
            user(&store, &format!("player{i}")).await;
        }
        let top = user(&store, "late").await;
        store.submit_progress(&submit(top.id, 1, 100, true, 1)).await.unwrap();

        let board = store.global_leaderboard(LEADERBOARD_LIMIT).await.unwrap();
        assert_eq!(board.len() as i64, LEADERBOARD_LIMIT);
        assert_eq!(board[0].username, "late");
        assert_eq!(board[1].username, "player0");
    }

    #[tokio::test]
    async fn total_stars_saturates_instead_of_overflowing() {
        let store = MemoryStore::new();
        let ada = user(&store, "ada").await;
        store.submit_progress(&submit(ada.id, 1, 100, true, i32::MAX)).await.unwrap();
        store.submit_progress(&submit(ada.id, 2, 100, true, i32::MAX)).await.unwrap();
        let total = store.find_user(ada.id).await.unwrap().unwrap().total_stars;
        assert_eq!(total, i32::MAX);
    }

    #[tokio::test]
    async fn global_leaderboard_breaks_ties_on_completed_levels() {
        let store = MemoryStore::new();
        let ada = user(&store, "ada").await;
        let bob = user(&store, "bob").await;
        user(&store, "cy").await;

        store.submit_progress(&submit(ada.id, 1, 100, true, 3)).await.unwrap();
        store.submit_progress(&submit(bob.id, 1, 100, true, 2)).await.unwrap();
        store.submit_progress(&submit(bob.id, 2, 100, true, 1)).await.unwrap();

        let board = store.global_leaderboard(LEADERBOARD_LIMIT).await.unwrap();
        let rows: Vec<(&str, i32, i64)> = board
            .iter()
            .map(|e| (e.username.as_str(), e.total_stars, e.levels_completed))
            .collect();
        assert_eq!(rows, vec![("bob", 3, 2), ("ada", 3, 1), ("cy", 0, 0)]);
    }
}
