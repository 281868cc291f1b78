// src/models/quiz.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use crate::error::AppError;

/// Question kinds. `mcq` covers both single and multiple choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum QuestionType {
    Mcq,
    TrueFalse,
    Subjective,
}

impl QuestionType {
    /// Objective questions are scored automatically at submission time.
    pub fn is_choice(&self) -> bool {
        matches!(self, QuestionType::Mcq | QuestionType::TrueFalse)
    }
}

/// Represents the 'quizzes' table in the database.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Quiz {
    pub id: i64,
    /// Owning user; instructors may only author and grade their own quizzes.
    pub created_by: i64,
    pub title: String,
    pub description: String,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    /// Time limit in seconds, 0 for none.
    pub duration: i64,
    pub is_published: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Quiz {
    /// Published and `now` inside the window. A missing bound leaves that side open.
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        if self.start_time.is_some_and(|start| now < start) {
            return false;
        }
        if self.end_time.is_some_and(|end| now > end) {
            return false;
        }
        self.is_published
    }
}

/// Represents the 'questions' table in the database.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Question {
    pub id: i64,
    pub quiz_id: i64,
    pub question_text: String,
    pub question_type: QuestionType,
    pub points: f64,
    pub position: i64,
}

/// Represents the 'options' table in the database.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct QuizOption {
    pub id: i64,
    pub question_id: i64,
    pub option_text: String,
    pub is_correct: bool,
}

/// Option as returned to a caller. `is_correct` is only present for graders.
#[derive(Debug, Clone, Serialize)]
pub struct OptionView {
    pub id: i64,
    pub option_text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_correct: Option<bool>,
}

impl OptionView {
    pub fn from_option(option: QuizOption, reveal: bool) -> Self {
        Self {
            id: option.id,
            option_text: option.option_text,
            is_correct: reveal.then_some(option.is_correct),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct QuestionView {
    pub id: i64,
    pub question_text: String,
    pub question_type: QuestionType,
    pub points: f64,
    pub options: Vec<OptionView>,
}

/// Quiz with its nested questions, filtered for the caller's role.
#[derive(Debug, Clone, Serialize)]
pub struct QuizView {
    #[serde(flatten)]
    pub quiz: Quiz,
    pub is_active_now: bool,
    pub questions: Vec<QuestionView>,
}

/// DTO for an option inside a quiz payload.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct OptionInput {
    #[validate(length(min = 1, max = 1000))]
    pub option_text: String,
    #[serde(default)]
    pub is_correct: bool,
}

/// DTO for a question inside a quiz payload.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct QuestionInput {
    #[validate(length(min = 1, max = 5000))]
    pub question_text: String,
    #[serde(default = "default_question_type")]
    pub question_type: QuestionType,
    #[serde(default = "default_points")]
    #[validate(range(min = 0.0, message = "Points must not be negative."))]
    pub points: f64,
    #[serde(default)]
    pub options: Vec<OptionInput>,
}

fn default_question_type() -> QuestionType {
    QuestionType::Mcq
}

fn default_points() -> f64 {
    1.0
}

impl QuestionInput {
    /// Choice questions need options and at least one of them marked correct.
    fn check_options(&self) -> Result<(), AppError> {
        if !self.question_type.is_choice() {
            return Ok(());
        }
        if self.options.is_empty() {
            return Err(AppError::BadRequest(
                "MCQ/True-False question must include options.".to_string(),
            ));
        }
        if !self.options.iter().any(|o| o.is_correct) {
            return Err(AppError::BadRequest(
                "At least one option must be marked correct.".to_string(),
            ));
        }
        Ok(())
    }
}

/// DTO for creating or updating a quiz.
///
/// On update, an absent `questions` keeps the stored questions; a present one
/// replaces all of them.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct QuizPayload {
    #[validate(length(min = 1, max = 255))]
    pub title: String,
    #[serde(default)]
    #[validate(length(max = 10000))]
    pub description: String,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default)]
    #[validate(range(min = 0, message = "Duration must not be negative."))]
    pub duration: i64,
    #[serde(default)]
    pub is_published: bool,
    pub questions: Option<Vec<QuestionInput>>,
}

impl QuizPayload {
    /// Runs field validation on the quiz and every nested question and option,
    /// then the cross-field rules.
    pub fn check(&self) -> Result<(), AppError> {
        self.validate()?;

        if let (Some(start), Some(end)) = (self.start_time, self.end_time) {
            if end <= start {
                return Err(AppError::BadRequest(
                    "end_time must be after start_time.".to_string(),
                ));
            }
        }

        for question in self.questions.iter().flatten() {
            question.validate()?;
            for option in &question.options {
                option.validate()?;
            }
            question.check_options()?;
        }

        Ok(())
    }
}

#[derive(Debug, Deserialize)]
pub struct PublishRequest {
    #[serde(default = "default_publish")]
    pub is_published: bool,
}

fn default_publish() -> bool {
    true
}

#[derive(Debug, Default, Deserialize)]
pub struct QuizListParams {
    pub is_published: Option<bool>,
}
