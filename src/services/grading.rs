// src/services/grading.rs

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::{
    db,
    error::AppError,
    models::submission::{GradeEntry, SubmissionDetail, SubmissionStatus},
    services::{
        access::{Capability, Identity, Target, authorize, is_allowed},
        scoring::clamp_points,
        submission::{load_detail, recompute_totals, submission_target},
    },
};

/// Applies manual scores to a submission and marks it graded.
///
/// * Only admins and the instructor owning the quiz may grade.
/// * Each score is clamped to `[0, question.points]`.
/// * Entries naming answers of other submissions are ignored.
/// * Totals are recomputed over all answers, so auto-graded ones keep their points.
pub async fn grade_submission(
    pool: &SqlitePool,
    identity: Option<&Identity>,
    submission_id: i64,
    grades: &[GradeEntry],
    now: DateTime<Utc>,
) -> Result<SubmissionDetail, AppError> {
    let (target, submitter_id) = {
        let mut conn = pool.acquire().await?;
        let submission = db::submission::fetch_submission(&mut conn, submission_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Submission {} not found", submission_id)))?;
        let target = submission_target(&mut conn, &submission).await?;
        authorize(identity, Capability::Grade, &target)?;

        if !submission.status.can_transition_to(SubmissionStatus::Graded) {
            return Err(AppError::BadRequest(format!(
                "Submission {} cannot be graded from status {:?}.",
                submission_id, submission.status
            )));
        }
        (target, submission.user_id)
    };

    let mut tx = pool.begin().await?;
    if db::submission::lock_submission(&mut tx, submission_id).await? == 0 {
        return Err(AppError::NotFound(format!("Submission {} not found", submission_id)));
    }

    let max_points: HashMap<i64, f64> =
        db::submission::fetch_answers_with_questions(&mut tx, submission_id)
            .await?
            .into_iter()
            .map(|a| (a.id, a.points))
            .collect();

    let mut applied = 0;
    for entry in grades {
        let Some(max) = max_points.get(&entry.answer_id) else {
            tracing::debug!(
                "Ignoring grade for answer {} outside submission {}",
                entry.answer_id,
                submission_id
            );
            continue;
        };

        let answer = Target::Answer {
            answer_id: entry.answer_id,
            submission_id,
            quiz: target.owning_quiz(),
            submitter_id,
        };
        if !is_allowed(identity, Capability::Grade, &answer) {
            continue;
        }

        let points = clamp_points(entry.points_awarded, *max);
        db::submission::update_answer_points(&mut tx, entry.answer_id, points).await?;
        applied += 1;
    }

    let totals = recompute_totals(&mut tx, submission_id).await?;
    db::submission::mark_graded(&mut tx, submission_id, &totals, now).await?;

    tx.commit().await?;

    tracing::info!(
        "Submission {} graded ({} of {} scores applied): {}/{} ({:.1}%)",
        submission_id,
        applied,
        grades.len(),
        totals.earned,
        totals.possible,
        totals.percentage
    );

    let mut conn = pool.acquire().await?;
    load_detail(&mut conn, submission_id).await
}
