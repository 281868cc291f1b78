// src/services/scoring.rs

//! Pure scoring rules shared by the submission and grading workflows.

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::models::quiz::QuestionType;

/// What the engine needs to know about a question to grade it.
#[derive(Debug, Clone)]
pub struct AnswerKey {
    pub question_type: QuestionType,
    pub points: f64,
    pub correct_option_ids: HashSet<i64>,
}

/// Aggregate score of a submission.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Totals {
    pub possible: f64,
    pub earned: f64,
    pub percentage: f64,
}

/// Points earned by a choice answer.
///
/// All or nothing: full points iff the selection is non-empty and equals the
/// set of correct options. Subjective questions always yield 0 here; they are
/// scored by hand.
pub fn auto_grade_choice(key: &AnswerKey, selected_option_ids: &HashSet<i64>) -> f64 {
    if !key.question_type.is_choice() {
        return 0.0;
    }

    if !selected_option_ids.is_empty() && *selected_option_ids == key.correct_option_ids {
        key.points
    } else {
        0.0
    }
}

/// Sums question points and earned points over `answers`, given as
/// `(question_id, points_earned)` pairs. Questions missing from the lookup
/// contribute nothing to `possible`.
pub fn compute_totals(answers: &[(i64, f64)], question_points: &HashMap<i64, f64>) -> Totals {
    let possible: f64 = answers
        .iter()
        .map(|(question_id, _)| question_points.get(question_id).copied().unwrap_or(0.0))
        .sum();
    let earned: f64 = answers.iter().map(|(_, earned)| *earned).sum();

    Totals {
        possible,
        earned,
        percentage: percentage(earned, possible),
    }
}

/// `earned / possible * 100`, or 0 when nothing was possible.
pub fn percentage(earned: f64, possible: f64) -> f64 {
    if possible == 0.0 {
        0.0
    } else {
        earned / possible * 100.0
    }
}

/// Constrains a manual score to `[0, max]`. NaN counts as 0.
pub fn clamp_points(proposed: f64, max: f64) -> f64 {
    if proposed.is_nan() {
        return 0.0;
    }
    proposed.max(0.0).min(max.max(0.0))
}
