// src/models/submission.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::models::quiz::{OptionView, QuestionType};

/// Lifecycle of a submission. Declaration order is the only allowed direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, sqlx::Type, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum SubmissionStatus {
    Draft,
    Submitted,
    Graded,
}

impl SubmissionStatus {
    /// Status never moves backwards; staying put is allowed (re-grading).
    pub fn can_transition_to(self, next: SubmissionStatus) -> bool {
        next >= self
    }
}

/// Represents the 'submissions' table in the database.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Submission {
    pub id: i64,
    pub quiz_id: i64,
    pub user_id: i64,
    pub submitted_at: Option<DateTime<Utc>>,
    pub graded_at: Option<DateTime<Utc>>,
    pub status: SubmissionStatus,
    pub total_points_earned: f64,
    pub total_points_possible: f64,
    pub percentage: f64,
}

/// Question as shown inside a submission (never reveals correctness).
#[derive(Debug, Clone, Serialize)]
pub struct AnsweredQuestion {
    pub id: i64,
    pub question_text: String,
    pub question_type: QuestionType,
    pub points: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnswerView {
    pub id: i64,
    pub question: AnsweredQuestion,
    pub selected_options: Vec<OptionView>,
    pub text_answer: String,
    pub points_earned: f64,
}

/// Submission together with its answers.
#[derive(Debug, Clone, Serialize)]
pub struct SubmissionDetail {
    #[serde(flatten)]
    pub submission: Submission,
    pub answers: Vec<AnswerView>,
}

/// One answer in a submit payload.
#[derive(Debug, Clone, Deserialize)]
pub struct AnswerInput {
    /// Question id.
    pub question: i64,
    #[serde(default)]
    pub selected_options: Vec<i64>,
    #[serde(default)]
    pub text_answer: String,
}

/// DTO for submitting a quiz attempt.
#[derive(Debug, Deserialize)]
pub struct SubmitRequest {
    pub answers: Vec<AnswerInput>,
}

/// Manual score for one answer.
#[derive(Debug, Clone, Deserialize)]
pub struct GradeEntry {
    pub answer_id: i64,
    #[serde(default)]
    pub points_awarded: f64,
}

/// DTO for grading a submission.
#[derive(Debug, Deserialize)]
pub struct GradeRequest {
    #[serde(default)]
    pub grades: Vec<GradeEntry>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SubmissionListParams {
    pub quiz: Option<i64>,
}
