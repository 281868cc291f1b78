// src/db/user.rs

use chrono::Utc;
use sqlx::SqliteConnection;

use crate::models::user::{Role, User};

pub async fn insert_user(
    conn: &mut SqliteConnection,
    username: &str,
    password_hash: &str,
    role: Role,
) -> Result<User, sqlx::Error> {
    sqlx::query_as::<_, User>(
        r#"
        INSERT INTO users (username, password, role, created_at)
        VALUES ($1, $2, $3, $4)
        RETURNING id, username, password, role, created_at
        "#,
    )
    .bind(username)
    .bind(password_hash)
    .bind(role)
    .bind(Utc::now())
    .fetch_one(&mut *conn)
    .await
}

pub async fn fetch_by_username(
    conn: &mut SqliteConnection,
    username: &str,
) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(
        "SELECT id, username, password, role, created_at FROM users WHERE username = $1",
    )
    .bind(username)
    .fetch_optional(&mut *conn)
    .await
}

pub async fn list_users(conn: &mut SqliteConnection) -> Result<Vec<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(
        "SELECT id, username, password, role, created_at FROM users ORDER BY id DESC",
    )
    .fetch_all(&mut *conn)
    .await
}
