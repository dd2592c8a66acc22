use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::extractors::parse_id;
use crate::records::merge::ProgressSubmission;
use crate::records::repo_types::{GlobalLeaderboardEntry, LevelLeaderboardEntry, LevelRecord};

/// Upper bound on `stars_earned` for a single level.
pub const MAX_STARS_PER_LEVEL: i32 = 100;

/// POST body reporting progress on a level.
#[derive(Debug, Deserialize)]
pub struct SubmitProgressRequest {
    pub user_id: Option<i64>,
    pub level_id: Option<i32>,
    pub progress: Option<i32>,
    pub completed: Option<bool>,
    pub stars_earned: Option<i32>,
}

impl SubmitProgressRequest {
    /// `user_id` must be non-zero; `level_id` only has to be present.
    pub fn validate(self) -> Result<ProgressSubmission, ApiError> {
        let (Some(user_id), Some(level_id)) = (self.user_id.filter(|id| *id != 0), self.level_id)
        else {
            return Err(ApiError::validation("Missing required fields"));
        };

        let progress = self.progress.unwrap_or(0);
        let stars_earned = self.stars_earned.unwrap_or(0);
        if progress < 0 {
            return Err(ApiError::validation("progress must not be negative"));
        }
        if stars_earned < 0 {
            return Err(ApiError::validation("stars_earned must not be negative"));
        }
        if stars_earned > MAX_STARS_PER_LEVEL {
            return Err(ApiError::validation(format!(
                "stars_earned must not exceed {MAX_STARS_PER_LEVEL}"
            )));
        }

        Ok(ProgressSubmission {
            user_id,
            level_id,
            progress,
            completed: self.completed.unwrap_or(false),
            stars_earned,
        })
    }
}

/// Raw GET query, before the action is resolved.
#[derive(Debug, Default, Deserialize)]
pub struct RecordsQueryParams {
    pub action: Option<String>,
    #[serde(rename = "userId")]
    pub user_id: Option<String>,
    #[serde(rename = "levelId")]
    pub level_id: Option<String>,
}

#[derive(Debug, PartialEq, Eq)]
pub enum RecordsQuery {
    UserRecords { user_id: i64 },
    Leaderboard { level_id: Option<i32> },
}

impl TryFrom<RecordsQueryParams> for RecordsQuery {
    type Error = ApiError;

    fn try_from(params: RecordsQueryParams) -> Result<Self, Self::Error> {
        match params.action.as_deref().unwrap_or("user_records") {
            "user_records" => {
                let user_id = parse_id(params.user_id.as_deref(), "userId")?
                    .ok_or_else(|| ApiError::validation("Missing userId"))?;
                Ok(Self::UserRecords { user_id })
            }
            "leaderboard" => Ok(Self::Leaderboard {
                level_id: parse_id(params.level_id.as_deref(), "levelId")?,
            }),
            other => Err(ApiError::validation(format!("Unknown action: {other}"))),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RecordResponse {
    pub record: LevelRecord,
}

#[derive(Debug, Serialize)]
pub struct RecordsResponse {
    pub records: Vec<LevelRecord>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum Leaderboard {
    Level(Vec<LevelLeaderboardEntry>),
    Global(Vec<GlobalLeaderboardEntry>),
}

#[derive(Debug, Serialize)]
pub struct LeaderboardResponse {
    pub leaderboard: Leaderboard,
}
