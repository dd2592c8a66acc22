mod dto;
pub mod handlers;
pub mod merge;
pub mod repo_types;

use crate::state::AppState;
use axum::Router;

pub fn router() -> Router<AppState> {
    Router::new().merge(handlers::records_routes())
}
