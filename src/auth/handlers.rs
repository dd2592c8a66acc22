use axum::{extract::State, routing::get, Json, Router};
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        dto::{AuthRequest, LoginRequest, ProfileQuery, RegisterRequest, UserResponse},
        password::hash_password,
    },
    error::{method_not_allowed, ApiError, ApiResult},
    extractors::{parse_id, JsonBody, QueryParams},
    state::AppState,
    store::StoreError,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new().route(
        "/auth",
        get(get_profile)
            .post(authenticate)
            .fallback(method_not_allowed),
    )
}

#[instrument(skip(state, request))]
pub async fn authenticate(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<AuthRequest>,
) -> ApiResult<Json<UserResponse>> {
    let response = match request {
        AuthRequest::Register(payload) => register(&state, payload).await?,
        AuthRequest::Login(payload) => login(&state, payload).await?,
    };
    Ok(Json(response))
}

async fn register(state: &AppState, payload: RegisterRequest) -> ApiResult<UserResponse> {
    let new_user = match payload.validate() {
        Ok(v) => v,
        Err(e) => {
            warn!("register with missing fields");
            return Err(e);
        }
    };

    let hash = hash_password(&new_user.password);
    let user = match state
        .store
        .create_user(&new_user.username, &new_user.email, &hash)
        .await
    {
        Ok(u) => u,
        Err(StoreError::UniqueViolation(_)) => {
            warn!(username = %new_user.username, "username already registered");
            return Err(ApiError::Conflict("Username already registered".into()));
        }
        Err(e) => return Err(e.into()),
    };

    info!(user_id = user.id, username = %user.username, "user registered");
    Ok(UserResponse {
        user,
        message: Some("Registration successful"),
    })
}

async fn login(state: &AppState, payload: LoginRequest) -> ApiResult<UserResponse> {
    let credentials = payload.validate()?;

    let hash = hash_password(&credentials.password);
    let Some(user) = state
        .store
        .find_user_by_credentials(&credentials.username, &hash)
        .await?
    else {
        warn!(username = %credentials.username, "login invalid credentials");
        return Err(ApiError::Auth);
    };

    info!(user_id = user.id, username = %user.username, "user logged in");
    Ok(UserResponse {
        user,
        message: Some("Login successful"),
    })
}

#[instrument(skip(state))]
pub async fn get_profile(
    State(state): State<AppState>,
    QueryParams(query): QueryParams<ProfileQuery>,
) -> ApiResult<Json<UserResponse>> {
    let user_id: i64 = parse_id(query.user_id.as_deref(), "userId")?
        .ok_or_else(|| ApiError::validation("Missing userId"))?;

    let user = state
        .store
        .find_user(user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".into()))?;

    Ok(Json(UserResponse {
        user,
        message: None,
    }))
}
