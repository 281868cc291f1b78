// src/db/quiz.rs

use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};

use crate::models::quiz::{Question, QuestionInput, Quiz, QuizOption, QuizPayload};

const QUIZ_COLUMNS: &str = "id, created_by, title, description, start_time, end_time, duration, \
     is_published, created_at, updated_at";

pub async fn fetch_quiz(conn: &mut SqliteConnection, id: i64) -> Result<Option<Quiz>, sqlx::Error> {
    let sql = format!("SELECT {} FROM quizzes WHERE id = $1", QUIZ_COLUMNS);
    sqlx::query_as::<_, Quiz>(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
}

/// Which quizzes a listing may return.
#[derive(Debug, Clone, Copy)]
pub enum QuizScope {
    All,
    /// Published quizzes plus the ones owned by this user.
    PublishedOrOwnedBy(i64),
    PublishedOnly,
}

pub async fn list_quizzes(
    conn: &mut SqliteConnection,
    scope: QuizScope,
    is_published: Option<bool>,
) -> Result<Vec<Quiz>, sqlx::Error> {
    let mut query_builder = QueryBuilder::<Sqlite>::new(format!(
        "SELECT {} FROM quizzes WHERE 1 = 1",
        QUIZ_COLUMNS
    ));

    match scope {
        QuizScope::All => {}
        QuizScope::PublishedOrOwnedBy(user_id) => {
            query_builder
                .push(" AND (is_published = 1 OR created_by = ")
                .push_bind(user_id)
                .push(")");
        }
        QuizScope::PublishedOnly => {
            query_builder.push(" AND is_published = 1");
        }
    }

    if let Some(published) = is_published {
        query_builder.push(" AND is_published = ").push_bind(published);
    }

    query_builder.push(" ORDER BY created_at DESC, id DESC");

    query_builder
        .build_query_as::<Quiz>()
        .fetch_all(&mut *conn)
        .await
}

pub async fn fetch_questions(
    conn: &mut SqliteConnection,
    quiz_id: i64,
) -> Result<Vec<Question>, sqlx::Error> {
    sqlx::query_as::<_, Question>(
        r#"
        SELECT id, quiz_id, question_text, question_type, points, position
        FROM questions
        WHERE quiz_id = $1
        ORDER BY position, id
        "#,
    )
    .bind(quiz_id)
    .fetch_all(&mut *conn)
    .await
}

/// Every option of every question of the quiz.
pub async fn fetch_options(
    conn: &mut SqliteConnection,
    quiz_id: i64,
) -> Result<Vec<QuizOption>, sqlx::Error> {
    sqlx::query_as::<_, QuizOption>(
        r#"
        SELECT o.id, o.question_id, o.option_text, o.is_correct
        FROM options o
        JOIN questions q ON q.id = o.question_id
        WHERE q.quiz_id = $1
        ORDER BY o.id
        "#,
    )
    .bind(quiz_id)
    .fetch_all(&mut *conn)
    .await
}

pub async fn insert_quiz(
    conn: &mut SqliteConnection,
    owner_id: i64,
    payload: &QuizPayload,
    description: &str,
    now: DateTime<Utc>,
) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>(
        r#"
        INSERT INTO quizzes
            (created_by, title, description, start_time, end_time, duration, is_published, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $8)
        RETURNING id
        "#,
    )
    .bind(owner_id)
    .bind(&payload.title)
    .bind(description)
    .bind(payload.start_time)
    .bind(payload.end_time)
    .bind(payload.duration)
    .bind(payload.is_published)
    .bind(now)
    .fetch_one(&mut *conn)
    .await
}

pub async fn update_quiz(
    conn: &mut SqliteConnection,
    id: i64,
    payload: &QuizPayload,
    description: &str,
    now: DateTime<Utc>,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE quizzes
        SET title = $1, description = $2, start_time = $3, end_time = $4,
            duration = $5, is_published = $6, updated_at = $7
        WHERE id = $8
        "#,
    )
    .bind(&payload.title)
    .bind(description)
    .bind(payload.start_time)
    .bind(payload.end_time)
    .bind(payload.duration)
    .bind(payload.is_published)
    .bind(now)
    .bind(id)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected())
}

pub async fn set_published(
    conn: &mut SqliteConnection,
    id: i64,
    published: bool,
    now: DateTime<Utc>,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("UPDATE quizzes SET is_published = $1, updated_at = $2 WHERE id = $3")
        .bind(published)
        .bind(now)
        .bind(id)
        .execute(&mut *conn)
        .await?;

    Ok(result.rows_affected())
}

/// Deletes the quiz; questions, options, submissions and answers cascade.
pub async fn delete_quiz(conn: &mut SqliteConnection, id: i64) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM quizzes WHERE id = $1")
        .bind(id)
        .execute(&mut *conn)
        .await?;

    Ok(result.rows_affected())
}

/// Inserts questions in payload order, each followed by its options.
/// Text is expected to be sanitized already.
pub async fn insert_questions(
    conn: &mut SqliteConnection,
    quiz_id: i64,
    questions: &[QuestionInput],
) -> Result<(), sqlx::Error> {
    for (position, question) in questions.iter().enumerate() {
        let question_id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO questions (quiz_id, question_text, question_type, points, position)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            "#,
        )
        .bind(quiz_id)
        .bind(&question.question_text)
        .bind(question.question_type)
        .bind(question.points)
        .bind(position as i64)
        .fetch_one(&mut *conn)
        .await?;

        for option in &question.options {
            sqlx::query(
                "INSERT INTO options (question_id, option_text, is_correct) VALUES ($1, $2, $3)",
            )
            .bind(question_id)
            .bind(&option.option_text)
            .bind(option.is_correct)
            .execute(&mut *conn)
            .await?;
        }
    }

    Ok(())
}

pub async fn delete_questions(conn: &mut SqliteConnection, quiz_id: i64) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM questions WHERE quiz_id = $1")
        .bind(quiz_id)
        .execute(&mut *conn)
        .await?;

    Ok(())
}

pub async fn count_submissions(conn: &mut SqliteConnection, quiz_id: i64) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM submissions WHERE quiz_id = $1")
        .bind(quiz_id)
        .fetch_one(&mut *conn)
        .await
}
