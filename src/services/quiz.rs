// src/services/quiz.rs

//! Authoring and reading quizzes with their nested questions and options.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};

use crate::{
    db::{self, quiz::QuizScope},
    error::AppError,
    models::{
        quiz::{OptionInput, OptionView, QuestionInput, QuestionView, Quiz, QuizPayload, QuizView},
        user::Role,
    },
    services::access::{
        Capability, Identity, OwningQuiz, Target, authorize, can_create_quiz, can_see_correctness,
    },
    utils::html::clean_html,
};

pub(crate) fn quiz_target(quiz: &Quiz) -> Target {
    Target::Quiz {
        quiz: OwningQuiz {
            quiz_id: quiz.id,
            owner_id: quiz.created_by,
        },
        published: quiz.is_published,
    }
}

async fn fetch_quiz_or_404(conn: &mut SqliteConnection, quiz_id: i64) -> Result<Quiz, AppError> {
    db::quiz::fetch_quiz(conn, quiz_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Quiz {} not found", quiz_id)))
}

fn sanitize_questions(questions: &[QuestionInput]) -> Vec<QuestionInput> {
    questions
        .iter()
        .map(|q| QuestionInput {
            question_text: clean_html(&q.question_text),
            question_type: q.question_type,
            points: q.points,
            options: q
                .options
                .iter()
                .map(|o| OptionInput {
                    option_text: clean_html(&o.option_text),
                    is_correct: o.is_correct,
                })
                .collect(),
        })
        .collect()
}

/// Builds the nested read view. Correctness flags are included only for
/// callers who may grade the quiz.
async fn quiz_view(
    conn: &mut SqliteConnection,
    identity: Option<&Identity>,
    quiz: Quiz,
    now: DateTime<Utc>,
) -> Result<QuizView, AppError> {
    let reveal = can_see_correctness(
        identity,
        OwningQuiz {
            quiz_id: quiz.id,
            owner_id: quiz.created_by,
        },
    );

    let questions = db::quiz::fetch_questions(conn, quiz.id).await?;
    let mut options_by_question: HashMap<i64, Vec<OptionView>> = HashMap::new();
    for option in db::quiz::fetch_options(conn, quiz.id).await? {
        options_by_question
            .entry(option.question_id)
            .or_default()
            .push(OptionView::from_option(option, reveal));
    }

    let questions = questions
        .into_iter()
        .map(|q| QuestionView {
            options: options_by_question.remove(&q.id).unwrap_or_default(),
            id: q.id,
            question_text: q.question_text,
            question_type: q.question_type,
            points: q.points,
        })
        .collect();

    Ok(QuizView {
        is_active_now: quiz.is_active_at(now),
        quiz,
        questions,
    })
}

/// Creates a quiz with its nested questions and options, owned by the caller.
pub async fn create_quiz(
    pool: &SqlitePool,
    identity: Option<&Identity>,
    payload: &QuizPayload,
    now: DateTime<Utc>,
) -> Result<QuizView, AppError> {
    can_create_quiz(identity)?;
    let identity = identity.ok_or_else(|| AppError::AuthError("Authentication required".to_string()))?;
    payload.check()?;

    let description = clean_html(&payload.description);
    let questions = sanitize_questions(payload.questions.as_deref().unwrap_or_default());

    let mut tx = pool.begin().await?;
    let quiz_id = db::quiz::insert_quiz(&mut tx, identity.user_id, payload, &description, now).await?;
    db::quiz::insert_questions(&mut tx, quiz_id, &questions).await?;
    tx.commit().await?;

    tracing::info!(
        "User {} created quiz {} with {} questions",
        identity.user_id,
        quiz_id,
        questions.len()
    );

    let mut conn = pool.acquire().await?;
    let quiz = fetch_quiz_or_404(&mut conn, quiz_id).await?;
    quiz_view(&mut conn, Some(identity), quiz, now).await
}

/// Replaces the quiz's fields; when `questions` is given, replaces all
/// questions too. Question replacement is refused once anyone has submitted,
/// since it would cascade away their answers.
pub async fn update_quiz(
    pool: &SqlitePool,
    identity: Option<&Identity>,
    quiz_id: i64,
    payload: &QuizPayload,
    now: DateTime<Utc>,
) -> Result<QuizView, AppError> {
    {
        let mut conn = pool.acquire().await?;
        let quiz = fetch_quiz_or_404(&mut conn, quiz_id).await?;
        authorize(identity, Capability::Author, &quiz_target(&quiz))?;
    }
    payload.check()?;

    let description = clean_html(&payload.description);

    let mut tx = pool.begin().await?;
    db::quiz::update_quiz(&mut tx, quiz_id, payload, &description, now).await?;

    if let Some(questions) = &payload.questions {
        if db::quiz::count_submissions(&mut tx, quiz_id).await? > 0 {
            return Err(AppError::Conflict(
                "Questions cannot be replaced once the quiz has submissions.".to_string(),
            ));
        }
        db::quiz::delete_questions(&mut tx, quiz_id).await?;
        db::quiz::insert_questions(&mut tx, quiz_id, &sanitize_questions(questions)).await?;
    }

    tx.commit().await?;
    tracing::info!("Quiz {} updated", quiz_id);

    let mut conn = pool.acquire().await?;
    let quiz = fetch_quiz_or_404(&mut conn, quiz_id).await?;
    quiz_view(&mut conn, identity, quiz, now).await
}

/// Deletes a quiz together with its questions and submissions.
pub async fn delete_quiz(
    pool: &SqlitePool,
    identity: Option<&Identity>,
    quiz_id: i64,
) -> Result<(), AppError> {
    let mut conn = pool.acquire().await?;
    let quiz = fetch_quiz_or_404(&mut conn, quiz_id).await?;
    authorize(identity, Capability::Author, &quiz_target(&quiz))?;

    if db::quiz::delete_quiz(&mut conn, quiz_id).await? == 0 {
        return Err(AppError::NotFound(format!("Quiz {} not found", quiz_id)));
    }

    tracing::info!("Quiz {} deleted", quiz_id);
    Ok(())
}

/// Sets the published flag.
pub async fn publish_quiz(
    pool: &SqlitePool,
    identity: Option<&Identity>,
    quiz_id: i64,
    published: bool,
    now: DateTime<Utc>,
) -> Result<QuizView, AppError> {
    let mut conn = pool.acquire().await?;
    let quiz = fetch_quiz_or_404(&mut conn, quiz_id).await?;
    authorize(identity, Capability::Author, &quiz_target(&quiz))?;

    db::quiz::set_published(&mut conn, quiz_id, published, now).await?;
    tracing::info!("Quiz {} published = {}", quiz_id, published);

    let quiz = fetch_quiz_or_404(&mut conn, quiz_id).await?;
    quiz_view(&mut conn, identity, quiz, now).await
}

/// Retrieves one quiz. Unpublished quizzes are only visible to their authors.
pub async fn get_quiz(
    pool: &SqlitePool,
    identity: Option<&Identity>,
    quiz_id: i64,
    now: DateTime<Utc>,
) -> Result<QuizView, AppError> {
    let mut conn = pool.acquire().await?;
    let quiz = fetch_quiz_or_404(&mut conn, quiz_id).await?;
    authorize(identity, Capability::View, &quiz_target(&quiz))?;

    quiz_view(&mut conn, identity, quiz, now).await
}

/// Lists the quizzes visible to the caller, optionally filtered by the
/// published flag.
pub async fn list_quizzes(
    pool: &SqlitePool,
    identity: Option<&Identity>,
    is_published: Option<bool>,
    now: DateTime<Utc>,
) -> Result<Vec<QuizView>, AppError> {
    let identity = identity.ok_or_else(|| AppError::AuthError("Authentication required".to_string()))?;

    let scope = match identity.role {
        Role::Admin => QuizScope::All,
        Role::Instructor => QuizScope::PublishedOrOwnedBy(identity.user_id),
        Role::Student => QuizScope::PublishedOnly,
    };

    let mut conn = pool.acquire().await?;
    let quizzes = db::quiz::list_quizzes(&mut conn, scope, is_published).await?;

    let mut views = Vec::with_capacity(quizzes.len());
    for quiz in quizzes {
        views.push(quiz_view(&mut conn, Some(identity), quiz, now).await?);
    }

    Ok(views)
}
