// src/services/submission.rs

//! Submitting answers to a quiz and reading submissions back.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};

use crate::{
    db::{
        self,
        submission::SubmissionScope,
    },
    error::{AppError, is_foreign_key_violation, is_unique_violation},
    models::{
        quiz::{OptionView, Question, Quiz, QuizOption},
        submission::{
            AnswerInput, AnswerView, AnsweredQuestion, Submission, SubmissionDetail,
            SubmissionStatus,
        },
        user::Role,
    },
    services::{
        access::{Capability, Identity, OwningQuiz, Target, authorize},
        scoring::{AnswerKey, Totals, auto_grade_choice, compute_totals},
    },
    utils::html::clean_html,
};

/// Rejects submissions to unpublished quizzes and outside the quiz window.
pub fn check_window(quiz: &Quiz, now: DateTime<Utc>) -> Result<(), AppError> {
    if !quiz.is_published {
        return Err(AppError::BadRequest("Quiz is not published.".to_string()));
    }
    if quiz.start_time.is_some_and(|start| now < start) {
        return Err(AppError::BadRequest("Quiz has not started yet.".to_string()));
    }
    if quiz.end_time.is_some_and(|end| now > end) {
        return Err(AppError::BadRequest("Quiz has ended.".to_string()));
    }
    Ok(())
}

/// Grading data for one question of the quiz being answered.
struct QuestionKey {
    key: AnswerKey,
    option_ids: HashSet<i64>,
}

fn build_keys(questions: Vec<Question>, options: Vec<QuizOption>) -> HashMap<i64, QuestionKey> {
    let mut keys: HashMap<i64, QuestionKey> = questions
        .into_iter()
        .map(|q| {
            (
                q.id,
                QuestionKey {
                    key: AnswerKey {
                        question_type: q.question_type,
                        points: q.points,
                        correct_option_ids: HashSet::new(),
                    },
                    option_ids: HashSet::new(),
                },
            )
        })
        .collect();

    for option in options {
        if let Some(entry) = keys.get_mut(&option.question_id) {
            entry.option_ids.insert(option.id);
            if option.is_correct {
                entry.key.correct_option_ids.insert(option.id);
            }
        }
    }

    keys
}

/// An answer that passed validation, with its automatic score.
#[derive(Debug, Clone, PartialEq)]
struct PreparedAnswer {
    question_id: i64,
    selected_options: Vec<i64>,
    text_answer: String,
    points_earned: f64,
}

/// Validates inputs against the quiz's questions and scores objective ones.
/// Runs before any answer is written; a rejection aborts the whole submit.
fn prepare_answers(
    keys: &HashMap<i64, QuestionKey>,
    inputs: &[AnswerInput],
) -> Result<Vec<PreparedAnswer>, AppError> {
    let mut seen = HashSet::new();
    let mut prepared = Vec::with_capacity(inputs.len());

    for input in inputs {
        let question = keys.get(&input.question).ok_or_else(|| {
            AppError::BadRequest(format!(
                "Question {} does not belong to this quiz.",
                input.question
            ))
        })?;

        if !seen.insert(input.question) {
            return Err(AppError::BadRequest(format!(
                "Question {} is answered more than once.",
                input.question
            )));
        }

        let selected: HashSet<i64> = input.selected_options.iter().copied().collect();
        if let Some(foreign) = selected.iter().find(|id| !question.option_ids.contains(id)) {
            return Err(AppError::BadRequest(format!(
                "Option {} does not belong to question {}.",
                foreign, input.question
            )));
        }

        let points_earned = if question.key.question_type.is_choice() {
            auto_grade_choice(&question.key, &selected)
        } else {
            0.0
        };

        let mut selected_options: Vec<i64> = selected.into_iter().collect();
        selected_options.sort_unstable();

        prepared.push(PreparedAnswer {
            question_id: input.question,
            selected_options,
            text_answer: clean_html(&input.text_answer),
            points_earned,
        });
    }

    Ok(prepared)
}

/// Recomputes totals from the answers currently stored for the submission.
pub(crate) async fn recompute_totals(
    conn: &mut SqliteConnection,
    submission_id: i64,
) -> Result<Totals, AppError> {
    let answers = db::submission::fetch_answers_with_questions(conn, submission_id).await?;

    let question_points: HashMap<i64, f64> =
        answers.iter().map(|a| (a.question_id, a.points)).collect();
    let earned: Vec<(i64, f64)> = answers
        .iter()
        .map(|a| (a.question_id, a.points_earned))
        .collect();

    Ok(compute_totals(&earned, &question_points))
}

/// Returns the submission for (quiz, user), creating a draft if there is none.
///
/// The insert is conflict-tolerant; should the driver still report a unique
/// violation (another request won the race), the existing row is fetched.
async fn fetch_or_create(
    conn: &mut SqliteConnection,
    quiz_id: i64,
    user_id: i64,
) -> Result<Submission, AppError> {
    match db::submission::insert_if_absent(conn, quiz_id, user_id).await {
        Ok(created) => {
            if created {
                tracing::debug!("Created submission for quiz {} user {}", quiz_id, user_id);
            }
        }
        Err(e) if is_foreign_key_violation(&e) => {
            return Err(AppError::NotFound(format!("Quiz {} not found", quiz_id)));
        }
        Err(e) if is_unique_violation(&e) => {
            tracing::debug!(
                "Submission for quiz {} user {} created concurrently, fetching",
                quiz_id,
                user_id
            );
        }
        Err(e) => return Err(e.into()),
    }

    db::submission::fetch_for_user(conn, quiz_id, user_id)
        .await?
        .ok_or_else(|| {
            AppError::InternalServerError(format!(
                "Submission for quiz {} user {} vanished after insert",
                quiz_id, user_id
            ))
        })
}

/// Submits (or re-submits) answers for `quiz_id` on behalf of `identity`.
///
/// * Rejects unpublished quizzes and submissions outside the window.
/// * Rejects resubmission once the submission has been graded.
/// * Every answer must target a question of this quiz, once, with options of that question.
/// * Prior answers are discarded and replaced in one transaction.
/// * Objective answers are scored immediately; subjective ones start at 0.
pub async fn submit(
    pool: &SqlitePool,
    identity: Option<&Identity>,
    quiz_id: i64,
    inputs: &[AnswerInput],
    now: DateTime<Utc>,
) -> Result<SubmissionDetail, AppError> {
    let identity = identity.ok_or_else(|| AppError::AuthError("Authentication required".to_string()))?;

    {
        let mut conn = pool.acquire().await?;

        let quiz = db::quiz::fetch_quiz(&mut conn, quiz_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Quiz {} not found", quiz_id)))?;

        authorize(
            Some(identity),
            Capability::Submit,
            &Target::Quiz {
                quiz: OwningQuiz {
                    quiz_id: quiz.id,
                    owner_id: quiz.created_by,
                },
                published: quiz.is_published,
            },
        )?;
        check_window(&quiz, now)?;
    }

    // The first statement writes, so the transaction holds the write lock
    // before anything is read.
    let mut tx = pool.begin().await?;

    let submission = fetch_or_create(&mut tx, quiz_id, identity.user_id).await?;
    if !submission.status.can_transition_to(SubmissionStatus::Submitted) {
        return Err(AppError::BadRequest(
            "Submission has already been graded.".to_string(),
        ));
    }

    // Questions are read under the lock so a concurrent edit of the quiz
    // cannot invalidate them before the answers are inserted.
    let questions = db::quiz::fetch_questions(&mut tx, quiz_id).await?;
    let options = db::quiz::fetch_options(&mut tx, quiz_id).await?;
    let prepared = prepare_answers(&build_keys(questions, options), inputs)?;

    let replaced = db::submission::delete_answers(&mut tx, submission.id).await?;

    for answer in &prepared {
        let answer_id = db::submission::insert_answer(
            &mut tx,
            submission.id,
            answer.question_id,
            &answer.text_answer,
            answer.points_earned,
        )
        .await?;
        db::submission::insert_answer_options(&mut tx, answer_id, &answer.selected_options).await?;
    }

    let totals = recompute_totals(&mut tx, submission.id).await?;
    db::submission::mark_submitted(&mut tx, submission.id, &totals, now).await?;

    tx.commit().await?;

    tracing::info!(
        "User {} submitted quiz {} (submission {}, {} answers, {} replaced): {}/{}",
        identity.user_id,
        quiz_id,
        submission.id,
        prepared.len(),
        replaced,
        totals.earned,
        totals.possible
    );

    let mut conn = pool.acquire().await?;
    load_detail(&mut conn, submission.id).await
}

/// Loads a submission with its answers, questions and selected options.
pub(crate) async fn load_detail(
    conn: &mut SqliteConnection,
    submission_id: i64,
) -> Result<SubmissionDetail, AppError> {
    let submission = db::submission::fetch_submission(conn, submission_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Submission {} not found", submission_id)))?;

    let answers = db::submission::fetch_answers_with_questions(conn, submission_id).await?;
    let mut selected: HashMap<i64, Vec<OptionView>> = HashMap::new();
    for option in db::submission::fetch_selected_options(conn, submission_id).await? {
        selected.entry(option.answer_id).or_default().push(OptionView {
            id: option.option_id,
            option_text: option.option_text,
            is_correct: None,
        });
    }

    let answers = answers
        .into_iter()
        .map(|a| AnswerView {
            id: a.id,
            selected_options: selected.remove(&a.id).unwrap_or_default(),
            question: AnsweredQuestion {
                id: a.question_id,
                question_text: a.question_text,
                question_type: a.question_type,
                points: a.points,
            },
            text_answer: a.text_answer,
            points_earned: a.points_earned,
        })
        .collect();

    Ok(SubmissionDetail { submission, answers })
}

/// Builds the authorization target for a stored submission.
pub(crate) async fn submission_target(
    conn: &mut SqliteConnection,
    submission: &Submission,
) -> Result<Target, AppError> {
    let quiz = db::quiz::fetch_quiz(conn, submission.quiz_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Quiz {} not found", submission.quiz_id)))?;

    Ok(Target::Submission {
        submission_id: submission.id,
        quiz: OwningQuiz {
            quiz_id: quiz.id,
            owner_id: quiz.created_by,
        },
        submitter_id: submission.user_id,
    })
}

/// Retrieves one submission. Submissions the caller may not view are reported
/// as not found.
pub async fn get_submission(
    pool: &SqlitePool,
    identity: Option<&Identity>,
    submission_id: i64,
) -> Result<SubmissionDetail, AppError> {
    let mut conn = pool.acquire().await?;

    let submission = db::submission::fetch_submission(&mut conn, submission_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Submission {} not found", submission_id)))?;
    let target = submission_target(&mut conn, &submission).await?;
    authorize(identity, Capability::View, &target)?;

    load_detail(&mut conn, submission_id).await
}

/// Lists the submissions visible to the caller, optionally for one quiz.
///
/// Admins see all, instructors their own and those on quizzes they own,
/// everyone else only their own.
pub async fn list_submissions(
    pool: &SqlitePool,
    identity: Option<&Identity>,
    quiz_id: Option<i64>,
) -> Result<Vec<SubmissionDetail>, AppError> {
    let identity = identity.ok_or_else(|| AppError::AuthError("Authentication required".to_string()))?;

    let scope = match identity.role {
        Role::Admin => SubmissionScope::All,
        Role::Instructor => SubmissionScope::OwnOrOnQuizzesOf(identity.user_id),
        Role::Student => SubmissionScope::Own(identity.user_id),
    };

    let mut conn = pool.acquire().await?;
    let submissions = db::submission::list_submissions(&mut conn, scope, quiz_id).await?;

    let mut details = Vec::with_capacity(submissions.len());
    for submission in submissions {
        details.push(load_detail(&mut conn, submission.id).await?);
    }

    Ok(details)
}
