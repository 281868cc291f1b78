// src/handlers/admin.rs

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use sqlx::SqlitePool;
use validator::Validate;

use crate::{
    db,
    error::{AppError, is_unique_violation},
    models::user::AdminCreateUserRequest,
    utils::hash::hash_password,
};

/// Lists all users in the system.
/// Admin only.
pub async fn list_users(State(pool): State<SqlitePool>) -> Result<impl IntoResponse, AppError> {
    let mut conn = pool.acquire().await?;
    let users = db::user::list_users(&mut conn).await.map_err(|e| {
        tracing::error!("Failed to list users: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok(Json(users))
}

/// Creates a user with an explicit role, e.g. an instructor.
/// Admin only.
pub async fn create_user(
    State(pool): State<SqlitePool>,
    Json(payload): Json<AdminCreateUserRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let hashed_password = hash_password(&payload.password)?;

    let mut conn = pool.acquire().await?;
    let user = db::user::insert_user(&mut conn, &payload.username, &hashed_password, payload.role)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::Conflict(format!("Username '{}' already exists", payload.username))
            } else {
                tracing::error!("Failed to create user: {:?}", e);
                AppError::InternalServerError(e.to_string())
            }
        })?;

    tracing::info!("Admin created {} account {}", user.role.as_str(), user.username);
    Ok((StatusCode::CREATED, Json(serde_json::json!({"id": user.id}))))
}
