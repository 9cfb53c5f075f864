use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};

use crate::auth::jwt;
use crate::error::ServiceError;
use crate::state::AppState;

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub name: String,
    pub roll_no: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
}

impl TokenResponse {
    fn bearer(access_token: String) -> Self {
        Self {
            access_token,
            token_type: "bearer".to_string(),
        }
    }
}

/// POST /api/auth/register
/// Create an account and return a bearer token for it.
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<Json<TokenResponse>, (StatusCode, String)> {
    let identities = state.identities.clone();
    let user = tokio::task::spawn_blocking(move || {
        identities.create_user(&req.name, &req.roll_no, &req.email, &req.password)
    })
    .await
    .map_err(ServiceError::from)??;

    let access_token = jwt::issue_access_token(&state.jwt_secret, &user.id, state.token_ttl_days)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("JWT: {}", e)))?;

    tracing::info!(user_id = %user.id, roll_no = %user.roll_no, "User registered");

    Ok(Json(TokenResponse::bearer(access_token)))
}

/// POST /api/auth/login
/// Exchange email + password for a bearer token.
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<TokenResponse>, (StatusCode, String)> {
    let identities = state.identities.clone();
    let user = tokio::task::spawn_blocking(move || identities.verify_password(&req.email, &req.password))
        .await
        .map_err(ServiceError::from)??;

    let access_token = jwt::issue_access_token(&state.jwt_secret, &user.id, state.token_ttl_days)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("JWT: {}", e)))?;

    tracing::info!(user_id = %user.id, "User logged in");

    Ok(Json(TokenResponse::bearer(access_token)))
}

/// Reject requests whose token subject no longer has an account.
pub async fn require_actor(state: &AppState, user_id: &str) -> Result<(), ServiceError> {
    let identities = state.identities.clone();
    let user_id = user_id.to_string();
    let exists = tokio::task::spawn_blocking(move || identities.actor_exists(&user_id)).await??;
    if exists {
        Ok(())
    } else {
        Err(ServiceError::Unauthorized("User not found".to_string()))
    }
}
