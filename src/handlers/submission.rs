// src/handlers/submission.rs

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};
use chrono::Utc;
use sqlx::SqlitePool;

use crate::{
    error::AppError,
    models::submission::{GradeRequest, SubmissionListParams},
    services::{grading, submission},
    utils::jwt::Claims,
};

/// Lists submissions visible to the caller. `?quiz=<id>` filters by quiz.
pub async fn list_submissions(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Query(params): Query<SubmissionListParams>,
) -> Result<impl IntoResponse, AppError> {
    let identity = claims.identity()?;
    let submissions = submission::list_submissions(&pool, Some(&identity), params.quiz).await?;
    Ok(Json(submissions))
}

pub async fn get_submission(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let identity = claims.identity()?;
    let detail = submission::get_submission(&pool, Some(&identity), id).await?;
    Ok(Json(detail))
}

/// Applies manual scores and marks the submission graded.
/// Admins, or the instructor who owns the quiz.
pub async fn grade_submission(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
    Json(req): Json<GradeRequest>,
) -> Result<impl IntoResponse, AppError> {
    let identity = claims.identity()?;
    let detail = grading::grade_submission(&pool, Some(&identity), id, &req.grades, Utc::now()).await?;
    Ok(Json(detail))
}
