// src/db/submission.rs

use chrono::{DateTime, Utc};
use sqlx::{FromRow, QueryBuilder, Sqlite, SqliteConnection};

use crate::{
    models::{
        quiz::QuestionType,
        submission::{Submission, SubmissionStatus},
    },
    services::scoring::Totals,
};

const SUBMISSION_COLUMNS: &str = "s.id, s.quiz_id, s.user_id, s.submitted_at, s.graded_at, s.status, \
     s.total_points_earned, s.total_points_possible, s.percentage";

pub async fn fetch_submission(
    conn: &mut SqliteConnection,
    id: i64,
) -> Result<Option<Submission>, sqlx::Error> {
    let sql = format!("SELECT {} FROM submissions s WHERE s.id = $1", SUBMISSION_COLUMNS);
    sqlx::query_as::<_, Submission>(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
}

pub async fn fetch_for_user(
    conn: &mut SqliteConnection,
    quiz_id: i64,
    user_id: i64,
) -> Result<Option<Submission>, sqlx::Error> {
    let sql = format!(
        "SELECT {} FROM submissions s WHERE s.quiz_id = $1 AND s.user_id = $2",
        SUBMISSION_COLUMNS
    );
    sqlx::query_as::<_, Submission>(&sql)
        .bind(quiz_id)
        .bind(user_id)
        .fetch_optional(&mut *conn)
        .await
}

/// Creates a draft submission unless one already exists for (quiz, user).
pub async fn insert_if_absent(
    conn: &mut SqliteConnection,
    quiz_id: i64,
    user_id: i64,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        INSERT INTO submissions (quiz_id, user_id, status)
        VALUES ($1, $2, 'draft')
        ON CONFLICT (quiz_id, user_id) DO NOTHING
        "#,
    )
    .bind(quiz_id)
    .bind(user_id)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Which submissions a listing may return.
#[derive(Debug, Clone, Copy)]
pub enum SubmissionScope {
    All,
    /// Own submissions plus those on quizzes this user owns.
    OwnOrOnQuizzesOf(i64),
    Own(i64),
}

pub async fn list_submissions(
    conn: &mut SqliteConnection,
    scope: SubmissionScope,
    quiz_id: Option<i64>,
) -> Result<Vec<Submission>, sqlx::Error> {
    let mut query_builder = QueryBuilder::<Sqlite>::new(format!(
        "SELECT {} FROM submissions s JOIN quizzes q ON q.id = s.quiz_id WHERE 1 = 1",
        SUBMISSION_COLUMNS
    ));

    match scope {
        SubmissionScope::All => {}
        SubmissionScope::OwnOrOnQuizzesOf(user_id) => {
            query_builder
                .push(" AND (s.user_id = ")
                .push_bind(user_id)
                .push(" OR q.created_by = ")
                .push_bind(user_id)
                .push(")");
        }
        SubmissionScope::Own(user_id) => {
            query_builder.push(" AND s.user_id = ").push_bind(user_id);
        }
    }

    if let Some(quiz_id) = quiz_id {
        query_builder.push(" AND s.quiz_id = ").push_bind(quiz_id);
    }

    query_builder.push(" ORDER BY s.submitted_at DESC, s.id DESC");

    query_builder
        .build_query_as::<Submission>()
        .fetch_all(&mut *conn)
        .await
}

pub async fn delete_answers(conn: &mut SqliteConnection, submission_id: i64) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM answers WHERE submission_id = $1")
        .bind(submission_id)
        .execute(&mut *conn)
        .await?;

    Ok(result.rows_affected())
}

pub async fn insert_answer(
    conn: &mut SqliteConnection,
    submission_id: i64,
    question_id: i64,
    text_answer: &str,
    points_earned: f64,
) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>(
        r#"
        INSERT INTO answers (submission_id, question_id, text_answer, points_earned)
        VALUES ($1, $2, $3, $4)
        RETURNING id
        "#,
    )
    .bind(submission_id)
    .bind(question_id)
    .bind(text_answer)
    .bind(points_earned)
    .fetch_one(&mut *conn)
    .await
}

pub async fn insert_answer_options(
    conn: &mut SqliteConnection,
    answer_id: i64,
    option_ids: &[i64],
) -> Result<(), sqlx::Error> {
    if option_ids.is_empty() {
        return Ok(());
    }

    let mut query_builder =
        QueryBuilder::<Sqlite>::new("INSERT INTO answer_options (answer_id, option_id) ");
    query_builder.push_values(option_ids, |mut row, option_id| {
        row.push_bind(answer_id).push_bind(*option_id);
    });

    query_builder.build().execute(&mut *conn).await?;
    Ok(())
}

/// An answer joined with the question it answers.
#[derive(Debug, Clone, FromRow)]
pub struct AnswerWithQuestion {
    pub id: i64,
    pub question_id: i64,
    pub text_answer: String,
    pub points_earned: f64,
    pub question_text: String,
    pub question_type: QuestionType,
    pub points: f64,
}

pub async fn fetch_answers_with_questions(
    conn: &mut SqliteConnection,
    submission_id: i64,
) -> Result<Vec<AnswerWithQuestion>, sqlx::Error> {
    sqlx::query_as::<_, AnswerWithQuestion>(
        r#"
        SELECT a.id, a.question_id, a.text_answer, a.points_earned,
               q.question_text, q.question_type, q.points
        FROM answers a
        JOIN questions q ON q.id = a.question_id
        WHERE a.submission_id = $1
        ORDER BY q.position, a.id
        "#,
    )
    .bind(submission_id)
    .fetch_all(&mut *conn)
    .await
}

/// A selected option, tagged with the answer that selected it.
#[derive(Debug, Clone, FromRow)]
pub struct SelectedOption {
    pub answer_id: i64,
    pub option_id: i64,
    pub option_text: String,
}

pub async fn fetch_selected_options(
    conn: &mut SqliteConnection,
    submission_id: i64,
) -> Result<Vec<SelectedOption>, sqlx::Error> {
    sqlx::query_as::<_, SelectedOption>(
        r#"
        SELECT ao.answer_id, o.id AS option_id, o.option_text
        FROM answer_options ao
        JOIN answers a ON a.id = ao.answer_id
        JOIN options o ON o.id = ao.option_id
        WHERE a.submission_id = $1
        ORDER BY o.id
        "#,
    )
    .bind(submission_id)
    .fetch_all(&mut *conn)
    .await
}

pub async fn update_answer_points(
    conn: &mut SqliteConnection,
    answer_id: i64,
    points_earned: f64,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE answers SET points_earned = $1 WHERE id = $2")
        .bind(points_earned)
        .bind(answer_id)
        .execute(&mut *conn)
        .await?;

    Ok(())
}

/// Takes the database write lock for the current transaction with a no-op
/// write on the submission row. Must be the first statement of the
/// transaction: SQLite cannot upgrade a read snapshot to a writer once another
/// connection has committed, and fails at once instead of waiting.
pub async fn lock_submission(conn: &mut SqliteConnection, id: i64) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("UPDATE submissions SET status = status WHERE id = $1")
        .bind(id)
        .execute(&mut *conn)
        .await?;

    Ok(result.rows_affected())
}

/// Stores totals and moves the submission to `submitted`.
pub async fn mark_submitted(
    conn: &mut SqliteConnection,
    id: i64,
    totals: &Totals,
    now: DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE submissions
        SET total_points_earned = $1, total_points_possible = $2, percentage = $3,
            submitted_at = $4, status = $5
        WHERE id = $6
        "#,
    )
    .bind(totals.earned)
    .bind(totals.possible)
    .bind(totals.percentage)
    .bind(now)
    .bind(SubmissionStatus::Submitted)
    .bind(id)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Stores totals and moves the submission to `graded`.
pub async fn mark_graded(
    conn: &mut SqliteConnection,
    id: i64,
    totals: &Totals,
    now: DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE submissions
        SET total_points_earned = $1, total_points_possible = $2, percentage = $3,
            graded_at = $4, status = $5
        WHERE id = $6
        "#,
    )
    .bind(totals.earned)
    .bind(totals.possible)
    .bind(totals.percentage)
    .bind(now)
    .bind(SubmissionStatus::Graded)
    .bind(id)
    .execute(&mut *conn)
    .await?;

    Ok(())
}
