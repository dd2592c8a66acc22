use time::OffsetDateTime;

use crate::records::repo_types::LevelRecord;

/// A validated progress report for one (user, level) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressSubmission {
    pub user_id: i64,
    pub level_id: i32,
    pub progress: i32,
    pub completed: bool,
    pub stars_earned: i32,
}

/// Mutable columns of a level record after a submission has been applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergedProgress {
    pub attempts: i32,
    pub best_progress: i32,
    pub completed: bool,
    pub stars_earned: i32,
    pub completed_at: Option<OffsetDateTime>,
}

#[cfg(test)]
impl MergedProgress {
    pub fn into_record(self, id: i64, submission: &ProgressSubmission) -> LevelRecord {
        LevelRecord {
            id,
            user_id: submission.user_id,
            level_id: submission.level_id,
            attempts: self.attempts,
            best_progress: self.best_progress,
            completed: self.completed,
            stars_earned: self.stars_earned,
            completed_at: self.completed_at,
        }
    }
}

/// Folds a submission into the stored row, if any.
///
/// - attempts counts submissions
/// - best_progress keeps the maximum seen
/// - completed never goes back to false
/// - stars_earned takes the submitted value on every completed submission
/// - completed_at records the first completion only
pub fn merge_progress(
    existing: Option<&LevelRecord>,
    submission: &ProgressSubmission,
    now: OffsetDateTime,
) -> MergedProgress {
    let Some(prev) = existing else {
        return MergedProgress {
            attempts: 1,
            best_progress: submission.progress,
            completed: submission.completed,
            stars_earned: submission.stars_earned,
            completed_at: submission.completed.then_some(now),
        };
    };

    let completed_at = match prev.completed_at {
        Some(at) => Some(at),
        None if submission.completed => Some(now),
        None => None,
    };

    MergedProgress {
        attempts: prev.attempts.saturating_add(1),
        best_progress: prev.best_progress.max(submission.progress),
        completed: prev.completed || submission.completed,
        stars_earned: if submission.completed {
            submission.stars_earned
        } else {
            prev.stars_earned
        },
        completed_at,
    }
}
