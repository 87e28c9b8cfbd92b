// src/models/attempt.rs

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, types::Json};

use crate::{
    error::AppError,
    models::{
        question::{PublicQuestion, Question},
        quiz::Quiz,
    },
};

/// Lifecycle of an attempt. `InProgress` is the only non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AttemptStatus {
    InProgress,
    Submitted,
    Expired,
}

impl AttemptStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttemptStatus::InProgress => "IN_PROGRESS",
            AttemptStatus::Submitted => "SUBMITTED",
            AttemptStatus::Expired => "EXPIRED",
        }
    }

    /// `InProgress -> Submitted`.
    pub fn submit(self, attempt_id: i64) -> Result<Self, AppError> {
        match self {
            AttemptStatus::InProgress => Ok(AttemptStatus::Submitted),
            AttemptStatus::Submitted => Err(AppError::AlreadySubmitted(attempt_id)),
            AttemptStatus::Expired => Err(AppError::AttemptExpired(attempt_id)),
        }
    }

    /// `InProgress -> Expired`.
    pub fn expire(self, attempt_id: i64) -> Result<Self, AppError> {
        match self {
            AttemptStatus::InProgress => Ok(AttemptStatus::Expired),
            AttemptStatus::Submitted => Err(AppError::AlreadySubmitted(attempt_id)),
            AttemptStatus::Expired => Err(AppError::AttemptExpired(attempt_id)),
        }
    }
}

impl TryFrom<String> for AttemptStatus {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "IN_PROGRESS" => Ok(AttemptStatus::InProgress),
            "SUBMITTED" => Ok(AttemptStatus::Submitted),
            "EXPIRED" => Ok(AttemptStatus::Expired),
            other => Err(AppError::InternalServerError(format!(
                "Unknown attempt status '{}'",
                other
            ))),
        }
    }
}

/// Represents the 'quiz_attempts' table in the database.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct QuizAttempt {
    pub id: i64,
    pub quiz_id: i64,
    pub student_id: i64,
    #[sqlx(try_from = "String")]
    pub status: AttemptStatus,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    /// Frozen when the attempt is created.
    pub total_questions: i32,
    pub correct_answers: i32,
    /// Percentage in `0.0..=100.0`, set on submission.
    pub score: Option<f64>,
    pub is_passed: Option<bool>,
    pub created_at: DateTime<Utc>,
    /// Items in frozen order. Not loaded by the list queries.
    #[sqlx(skip)]
    pub items: Vec<QuizAttemptItem>,
}

/// Represents the 'quiz_attempt_items' table in the database.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct QuizAttemptItem {
    pub id: i64,
    pub attempt_id: i64,
    pub question_id: i64,
    /// Zero-based position in the frozen question order.
    pub position: i32,
    pub selected_option: Option<String>,
    pub is_correct: Option<bool>,
    pub time_spent_seconds: Option<i32>,
    /// Option keys in the order they are shown for this attempt.
    pub option_order: Json<Vec<String>>,
}

impl QuizAttempt {
    /// The frozen question order.
    pub fn question_order(&self) -> Vec<i64> {
        self.items.iter().map(|item| item.question_id).collect()
    }
}

/// An attempt about to be persisted.
#[derive(Debug, Clone)]
pub struct NewAttempt {
    pub quiz_id: i64,
    pub student_id: i64,
    pub start_time: DateTime<Utc>,
    pub items: Vec<NewAttemptItem>,
}

#[derive(Debug, Clone)]
pub struct NewAttemptItem {
    pub question_id: i64,
    pub option_order: Vec<String>,
}

/// DTO for submitting an attempt.
#[derive(Debug, Deserialize)]
pub struct SubmitAttemptRequest {
    /// User's answers map.
    /// Key: Question ID (i64)
    /// Value: Selected option key (String)
    #[serde(default)]
    pub answers: HashMap<i64, String>,
}

/// Who an attempt is being rendered for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Audience {
    Student,
    Instructor,
}

/// DTO for returning an attempt to a client.
#[derive(Debug, Serialize)]
pub struct AttemptResponse {
    pub id: i64,
    pub quiz_id: i64,
    pub student_id: i64,
    pub status: AttemptStatus,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub total_questions: i32,
    pub correct_answers: Option<i32>,
    pub score: Option<f64>,
    pub is_passed: Option<bool>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<AttemptItemResponse>,
}

#[derive(Debug, Serialize)]
pub struct AttemptItemResponse {
    pub position: i32,
    /// `None` when the question no longer exists in the bank.
    pub question: Option<PublicQuestion>,
    pub question_id: i64,
    pub selected_option: Option<String>,
    pub is_correct: Option<bool>,
    pub correct_option: Option<String>,
}

impl AttemptResponse {
    /// Renders an attempt, hiding results and answer keys from students
    /// according to the quiz's visibility flags.
    pub fn render(
        attempt: &QuizAttempt,
        quiz: &Quiz,
        questions: &HashMap<i64, Question>,
        audience: Audience,
    ) -> Self {
        let finished = attempt.status != AttemptStatus::InProgress;
        let (show_results, show_keys) = match audience {
            Audience::Instructor => (true, finished),
            Audience::Student => {
                let results = finished && quiz.settings.show_results_immediately;
                (results, results && quiz.settings.show_correct_answers)
            }
        };

        let items = attempt
            .items
            .iter()
            .map(|item| {
                let question = questions.get(&item.question_id);
                AttemptItemResponse {
                    position: item.position,
                    question: question.map(|q| PublicQuestion::from_question(q, &item.option_order)),
                    question_id: item.question_id,
                    selected_option: item.selected_option.clone(),
                    is_correct: if show_results { item.is_correct } else { None },
                    correct_option: if show_keys {
                        question.map(|q| q.correct_option.clone())
                    } else {
                        None
                    },
                }
            })
            .collect();

        Self {
            id: attempt.id,
            quiz_id: attempt.quiz_id,
            student_id: attempt.student_id,
            status: attempt.status,
            start_time: attempt.start_time,
            end_time: attempt.end_time,
            total_questions: attempt.total_questions,
            correct_answers: show_results.then_some(attempt.correct_answers),
            score: if show_results { attempt.score } else { None },
            is_passed: if show_results { attempt.is_passed } else { None },
            items,
        }
    }
}
