// src/handlers/quiz.rs

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use sqlx::SqlitePool;

use crate::{
    error::AppError,
    models::{
        quiz::{PublishRequest, QuizListParams, QuizPayload},
        submission::SubmitRequest,
    },
    services::{quiz, submission},
    utils::jwt::Claims,
};

/// Lists quizzes visible to the caller. `?is_published=true|false` filters.
pub async fn list_quizzes(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Query(params): Query<QuizListParams>,
) -> Result<impl IntoResponse, AppError> {
    let identity = claims.identity()?;
    let quizzes = quiz::list_quizzes(&pool, Some(&identity), params.is_published, Utc::now()).await?;
    Ok(Json(quizzes))
}

/// Retrieves a quiz with its questions. Option correctness only for graders.
pub async fn get_quiz(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let identity = claims.identity()?;
    let quiz = quiz::get_quiz(&pool, Some(&identity), id, Utc::now()).await?;
    Ok(Json(quiz))
}

/// Creates a quiz with nested questions and options.
/// Instructors and admins only.
pub async fn create_quiz(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<QuizPayload>,
) -> Result<impl IntoResponse, AppError> {
    let identity = claims.identity()?;
    let quiz = quiz::create_quiz(&pool, Some(&identity), &payload, Utc::now()).await?;
    Ok((StatusCode::CREATED, Json(quiz)))
}

/// Updates a quiz. A `questions` array replaces all existing questions.
pub async fn update_quiz(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
    Json(payload): Json<QuizPayload>,
) -> Result<impl IntoResponse, AppError> {
    let identity = claims.identity()?;
    let quiz = quiz::update_quiz(&pool, Some(&identity), id, &payload, Utc::now()).await?;
    Ok(Json(quiz))
}

pub async fn delete_quiz(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let identity = claims.identity()?;
    quiz::delete_quiz(&pool, Some(&identity), id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Publishes or unpublishes a quiz. The flag defaults to `true`, and the body
/// may be omitted entirely.
pub async fn publish_quiz(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
    req: Option<Json<PublishRequest>>,
) -> Result<impl IntoResponse, AppError> {
    let identity = claims.identity()?;
    let published = req.map_or(true, |Json(req)| req.is_published);
    let quiz = quiz::publish_quiz(&pool, Some(&identity), id, published, Utc::now()).await?;
    Ok(Json(quiz))
}

/// Submits the caller's answers, replacing any previous attempt.
///
/// * Validates the quiz window.
/// * Auto-grades choice questions.
/// * Returns the stored submission with totals.
pub async fn submit_quiz(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
    Json(req): Json<SubmitRequest>,
) -> Result<impl IntoResponse, AppError> {
    let identity = claims.identity()?;
    let detail = submission::submit(&pool, Some(&identity), id, &req.answers, Utc::now()).await?;
    Ok((StatusCode::CREATED, Json(detail)))
}
