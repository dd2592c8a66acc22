use serde::{Deserialize, Serialize};

use crate::auth::repo_types::User;
use crate::error::ApiError;

/// POST body, dispatched on its `action` field.
#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum AuthRequest {
    Register(RegisterRequest),
    Login(LoginRequest),
}

/// Request body for user registration.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

/// Request body for login.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: Option<String>,
    pub password: Option<String>,
}

/// Registration fields that passed validation.
#[derive(Debug)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password: String,
}

/// Login fields that passed validation.
#[derive(Debug)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

fn present(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

fn present_trimmed(value: Option<String>) -> Option<String> {
    present(value.map(|v| v.trim().to_string()))
}

impl RegisterRequest {
    pub fn validate(self) -> Result<NewUser, ApiError> {
        match (
            present_trimmed(self.username),
            present_trimmed(self.email),
            present(self.password),
        ) {
            (Some(username), Some(email), Some(password)) => Ok(NewUser {
                username,
                email,
                password,
            }),
            _ => Err(ApiError::validation("Missing required fields")),
        }
    }
}

impl LoginRequest {
    pub fn validate(self) -> Result<Credentials, ApiError> {
        match (present_trimmed(self.username), present(self.password)) {
            (Some(username), Some(password)) => Ok(Credentials { username, password }),
            _ => Err(ApiError::validation("Missing username or password")),
        }
    }
}

/// GET query for profile lookup.
#[derive(Debug, Deserialize)]
pub struct ProfileQuery {
    #[serde(rename = "userId")]
    pub user_id: Option<String>,
}

/// Response carrying a public user, with an optional status message.
#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub user: User,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'static str>,
}
