// src/services/access.rs

//! Capability checks for authoring, submitting, grading and viewing.

use crate::{error::AppError, models::user::Role};

/// Authenticated caller, threaded explicitly through every workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identity {
    pub user_id: i64,
    pub role: Role,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    /// Edit, delete or publish a quiz.
    Author,
    /// Create or replace one's own submission.
    Submit,
    /// Score answers of a submission.
    Grade,
    /// Read the object.
    View,
}

/// The quiz an object ultimately belongs to, with its owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OwningQuiz {
    pub quiz_id: i64,
    pub owner_id: i64,
}

/// Object an authorization check is made against.
#[derive(Debug, Clone, Copy)]
pub enum Target {
    Quiz {
        quiz: OwningQuiz,
        published: bool,
    },
    Submission {
        submission_id: i64,
        quiz: OwningQuiz,
        submitter_id: i64,
    },
    Answer {
        answer_id: i64,
        submission_id: i64,
        quiz: OwningQuiz,
        submitter_id: i64,
    },
}

impl Target {
    pub fn owning_quiz(&self) -> OwningQuiz {
        match self {
            Target::Quiz { quiz, .. }
            | Target::Submission { quiz, .. }
            | Target::Answer { quiz, .. } => *quiz,
        }
    }

    /// Id of the object itself.
    pub fn id(&self) -> i64 {
        match self {
            Target::Quiz { quiz, .. } => quiz.quiz_id,
            Target::Submission { submission_id, .. } => *submission_id,
            Target::Answer { answer_id, .. } => *answer_id,
        }
    }

    fn submitter(&self) -> Option<i64> {
        match self {
            Target::Quiz { .. } => None,
            Target::Submission { submitter_id, .. } | Target::Answer { submitter_id, .. } => {
                Some(*submitter_id)
            }
        }
    }
}

/// Admins always; instructors only for quizzes they own.
fn has_authority(identity: &Identity, target: &Target) -> bool {
    match identity.role {
        Role::Admin => true,
        Role::Instructor => target.owning_quiz().owner_id == identity.user_id,
        Role::Student => false,
    }
}

/// Whether `identity` may exercise `capability` on `target`.
pub fn is_allowed(identity: Option<&Identity>, capability: Capability, target: &Target) -> bool {
    let Some(identity) = identity else {
        return false;
    };

    match capability {
        Capability::Author | Capability::Grade => has_authority(identity, target),
        Capability::Submit => true,
        Capability::View => {
            if has_authority(identity, target) {
                return true;
            }
            match (target, target.submitter()) {
                (Target::Quiz { published, .. }, _) => *published,
                (_, Some(submitter_id)) => submitter_id == identity.user_id,
                _ => false,
            }
        }
    }
}

/// Fails with `AuthError` when unauthenticated, `NotFound` when the caller may
/// not even see the target, and `Forbidden` otherwise.
pub fn authorize(
    identity: Option<&Identity>,
    capability: Capability,
    target: &Target,
) -> Result<(), AppError> {
    if identity.is_none() {
        return Err(AppError::AuthError("Authentication required".to_string()));
    }
    if is_allowed(identity, capability, target) {
        return Ok(());
    }
    if capability != Capability::View && is_allowed(identity, Capability::View, target) {
        return Err(AppError::Forbidden(
            "You do not have permission to perform this action.".to_string(),
        ));
    }
    Err(not_found(target))
}

fn not_found(target: &Target) -> AppError {
    let what = match target {
        Target::Quiz { .. } => "Quiz",
        Target::Submission { .. } => "Submission",
        Target::Answer { .. } => "Answer",
    };
    AppError::NotFound(format!("{} {} not found", what, target.id()))
}

/// Only instructors and admins may create quizzes.
pub fn can_create_quiz(identity: Option<&Identity>) -> Result<(), AppError> {
    match identity {
        None => Err(AppError::AuthError("Authentication required".to_string())),
        Some(identity) if matches!(identity.role, Role::Admin | Role::Instructor) => Ok(()),
        Some(_) => Err(AppError::Forbidden(
            "Only instructors or admins can create quizzes.".to_string(),
        )),
    }
}

/// Option correctness is visible to whoever may grade the quiz.
pub fn can_see_correctness(identity: Option<&Identity>, quiz: OwningQuiz) -> bool {
    is_allowed(
        identity,
        Capability::Grade,
        &Target::Quiz {
            quiz,
            published: true,
        },
    )
}
