//! Account directory handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::AppState;
use labtrack_common::{
    auth::{self, AuthContext},
    db::{models::User, NewUser, Repository, UserUpdate},
    errors::{AppError, Result},
    validation::ValidatedJson,
};

/// Registration request
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(email, length(max = 254))]
    pub email: String,

    #[validate(length(min = 1, max = 150))]
    pub username: String,

    #[serde(default)]
    #[validate(length(max = 150))]
    pub first_name: String,

    #[serde(default)]
    #[validate(length(max = 150))]
    pub last_name: String,

    #[serde(default)]
    #[validate(length(max = 20))]
    pub phone: Option<String>,

    /// Center ID to affiliate with
    #[serde(default)]
    pub center: Option<Uuid>,

    #[serde(default)]
    pub is_center_admin: bool,

    #[validate(length(min = 1))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1))]
    pub email: String,

    #[validate(length(min = 1))]
    pub password: String,
}

/// Profile fields a user may change
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateUserRequest {
    #[validate(length(min = 1, max = 150))]
    pub username: Option<String>,

    #[validate(length(max = 150))]
    pub first_name: Option<String>,

    #[validate(length(max = 150))]
    pub last_name: Option<String>,

    #[validate(length(max = 20))]
    pub phone: Option<String>,
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub user: User,
    pub token: String,
    pub expires_at: DateTime<FixedOffset>,
    pub message: String,
}

#[derive(Serialize)]
pub struct MessageResponse {
    pub message: String,
}

/// List all users
pub async fn list_users(State(state): State<AppState>) -> Result<Json<Vec<User>>> {
    let repo = Repository::new(state.db.clone());
    Ok(Json(repo.list_users().await?))
}

/// Register a new account
pub async fn register(
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<RegisterRequest>,
) -> Result<(StatusCode, Json<User>)> {
    auth::check_password_policy(&request.password, &state.config.auth)?;

    let password_hash = auth::hash_password(
        &request.password,
        state.config.auth.password_pepper.as_deref(),
    )?;

    let repo = Repository::new(state.db.clone());
    let user = repo
        .create_user(NewUser {
            email: request.email,
            username: request.username,
            first_name: request.first_name,
            last_name: request.last_name,
            phone: request.phone,
            center_id: request.center,
            is_center_admin: request.is_center_admin,
            password_hash,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(user)))
}

/// Get a user by ID
pub async fn get_user(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<User>> {
    let repo = Repository::new(state.db.clone());

    let user = repo.find_user(user_id).await?.ok_or_else(|| AppError::NotFound {
        resource_type: "User".to_string(),
        id: user_id.to_string(),
    })?;

    Ok(Json(user))
}

/// Update the caller's own profile
pub async fn update_user(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(user_id): Path<Uuid>,
    ValidatedJson(request): ValidatedJson<UpdateUserRequest>,
) -> Result<Json<User>> {
    auth.require_self(user_id)?;

    let repo = Repository::new(state.db.clone());
    let user = repo
        .update_user(
            user_id,
            UserUpdate {
                username: request.username,
                first_name: request.first_name,
                last_name: request.last_name,
                phone: request.phone,
            },
        )
        .await?;

    Ok(Json(user))
}

/// Exchange credentials for a bearer token
pub async fn login(
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<LoginRequest>,
) -> Result<Json<LoginResponse>> {
    let repo = Repository::new(state.db.clone());
    let outcome = auth::authenticate(&repo, &request.email, &request.password, &state.config.auth).await?;

    Ok(Json(LoginResponse {
        user: outcome.user,
        token: outcome.token,
        expires_at: outcome.expires_at,
        message: "Login successful".to_string(),
    }))
}

/// End the current session
pub async fn logout(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<MessageResponse>> {
    let repo = Repository::new(state.db.clone());
    auth::logout(&repo, &auth).await?;

    Ok(Json(MessageResponse {
        message: "Logout successful".to_string(),
    }))
}

/// The caller's own account
pub async fn profile(auth: AuthContext) -> Json<User> {
    Json(auth.user)
}

/// Accounts affiliated with the caller's center
pub async fn center_users(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<Vec<User>>> {
    let center_id = auth.require_center()?;

    let repo = Repository::new(state.db.clone());
    Ok(Json(repo.list_users_by_center(center_id).await?))
}
