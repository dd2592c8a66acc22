use axum::{extract::State, response::IntoResponse, routing::get, Json, Router};
use tracing::{info, instrument, warn};

use crate::{
    error::{method_not_allowed, ApiResult},
    extractors::{JsonBody, QueryParams},
    records::dto::{
        Leaderboard, LeaderboardResponse, RecordResponse, RecordsQuery, RecordsQueryParams,
        RecordsResponse, SubmitProgressRequest,
    },
    state::AppState,
    store::LEADERBOARD_LIMIT,
};

pub fn records_routes() -> Router<AppState> {
    Router::new().route(
        "/records",
        get(query_records)
            .post(submit_progress)
            .fallback(method_not_allowed),
    )
}

#[instrument(skip(state))]
pub async fn submit_progress(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<SubmitProgressRequest>,
) -> ApiResult<Json<RecordResponse>> {
    let submission = match payload.validate() {
        Ok(s) => s,
        Err(e) => {
            warn!(error = %e, "rejected progress submission");
            return Err(e);
        }
    };

    let record = state.store.submit_progress(&submission).await?;

    info!(
        user_id = record.user_id,
        level_id = record.level_id,
        attempts = record.attempts,
        completed = record.completed,
        "progress recorded"
    );
    Ok(Json(RecordResponse { record }))
}

#[instrument(skip(state))]
pub async fn query_records(
    State(state): State<AppState>,
    QueryParams(params): QueryParams<RecordsQueryParams>,
) -> ApiResult<axum::response::Response> {
    let response = match RecordsQuery::try_from(params)? {
        RecordsQuery::UserRecords { user_id } => {
            let records = state.store.user_records(user_id).await?;
            Json(RecordsResponse { records }).into_response()
        }
        RecordsQuery::Leaderboard { level_id: Some(level_id) } => {
            let rows = state
                .store
                .level_leaderboard(level_id, LEADERBOARD_LIMIT)
                .await?;
            Json(LeaderboardResponse {
                leaderboard: Leaderboard::Level(rows),
            })
            .into_response()
        }
        RecordsQuery::Leaderboard { level_id: None } => {
            let rows = state.store.global_leaderboard(LEADERBOARD_LIMIT).await?;
            Json(LeaderboardResponse {
                leaderboard: Leaderboard::Global(rows),
            })
            .into_response()
        }
    };
    Ok(response)
}
