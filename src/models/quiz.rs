// src/models/quiz.rs

use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::{AppError, AppResult};

pub const DEFAULT_PASSING_SCORE: i32 = 60;
pub const DEFAULT_MAX_ATTEMPTS: i32 = 1;

/// A lesson's quiz. One per lesson.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quiz {
    pub id: i64,
    pub lesson_id: i64,
    #[serde(flatten)]
    pub settings: QuizSettings,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Everything an instructor can configure on a quiz.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizSettings {
    pub title: String,
    /// `None` means unlimited.
    pub time_limit_minutes: Option<i32>,
    pub max_attempts: i32,
    /// Integer percentage an attempt's score must reach to pass.
    pub passing_score: i32,
    pub shuffle_questions: bool,
    pub shuffle_options: bool,
    pub show_results_immediately: bool,
    pub show_correct_answers: bool,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub selection: QuestionSelection,
}

/// How an attempt's questions are chosen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum QuestionSelection {
    /// Curator-supplied list, used in list order.
    Manual { question_ids: Vec<i64> },
    /// Drawn from the active pool when the attempt starts.
    Random(RandomSelection),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RandomSelection {
    /// Target number of questions. `None` takes the whole filtered pool.
    pub count: Option<u32>,
    pub difficulty: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl QuestionSelection {
    /// A non-empty manual list wins; anything else falls back to the pool.
    pub fn from_parts(question_ids: Vec<i64>, random: RandomSelection) -> Self {
        if question_ids.is_empty() {
            QuestionSelection::Random(random)
        } else {
            QuestionSelection::Manual { question_ids }
        }
    }
}

impl Quiz {
    /// Rejects a start outside the availability window.
    pub fn ensure_open(&self, now: DateTime<Utc>) -> AppResult<()> {
        if let Some(start) = self.settings.start_date {
            if now < start {
                return Err(AppError::QuizNotYetOpen(start));
            }
        }
        if let Some(end) = self.settings.end_date {
            if now > end {
                return Err(AppError::QuizClosed(end));
            }
        }
        Ok(())
    }

    /// Whether an attempt started at `started_at` is past the time limit.
    pub fn time_limit_exceeded(&self, started_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        match self.settings.time_limit_minutes {
            Some(minutes) => now - started_at > Duration::minutes(i64::from(minutes)),
            None => false,
        }
    }

    pub fn is_passing(&self, score: f64) -> bool {
        score >= f64::from(self.settings.passing_score)
    }
}

/// DTO for creating or replacing a lesson's quiz.
#[derive(Debug, Deserialize, Validate)]
pub struct UpsertQuizRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(range(min = 1, max = 1440))]
    pub time_limit_minutes: Option<i32>,
    #[serde(default = "default_max_attempts")]
    #[validate(range(min = 1, max = 100))]
    pub max_attempts: i32,
    #[serde(default = "default_passing_score")]
    #[validate(range(min = 0, max = 100))]
    pub passing_score: i32,
    #[serde(default)]
    pub shuffle_questions: bool,
    #[serde(default)]
    pub shuffle_options: bool,
    #[serde(default = "default_true")]
    pub show_results_immediately: bool,
    #[serde(default)]
    pub show_correct_answers: bool,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    /// Manual selection. Leave empty to draw from the question pool.
    #[serde(default)]
    #[validate(custom(function = validate_question_ids))]
    pub question_ids: Vec<i64>,
    #[validate(range(min = 1, max = 500))]
    pub random_count: Option<i32>,
    #[validate(length(min = 1, max = 50))]
    pub random_difficulty: Option<String>,
    #[serde(default)]
    #[validate(custom(function = validate_tags))]
    pub random_tags: Vec<String>,
}

fn default_max_attempts() -> i32 {
    DEFAULT_MAX_ATTEMPTS
}

fn default_passing_score() -> i32 {
    DEFAULT_PASSING_SCORE
}

fn default_true() -> bool {
    true
}

fn validate_question_ids(ids: &[i64]) -> Result<(), validator::ValidationError> {
    let mut seen = HashSet::new();
    for id in ids {
        if !seen.insert(id) {
            return Err(validator::ValidationError::new("duplicate_question_id"));
        }
    }
    Ok(())
}

fn validate_tags(tags: &[String]) -> Result<(), validator::ValidationError> {
    for tag in tags {
        if tag.trim().is_empty() || tag.len() > 50 {
            return Err(validator::ValidationError::new("invalid_tag"));
        }
    }
    Ok(())
}

impl UpsertQuizRequest {
    /// Field validation plus the cross-field rules, then conversion.
    pub fn into_settings(self) -> AppResult<QuizSettings> {
        self.validate()?;

        if let (Some(start), Some(end)) = (self.start_date, self.end_date) {
            if end <= start {
                return Err(AppError::BadRequest(
                    "end_date must be after start_date".to_string(),
                ));
            }
        }

        let random = RandomSelection {
            count: self.random_count.map(|c| c as u32),
            difficulty: self.random_difficulty,
            tags: self.random_tags,
        };

        Ok(QuizSettings {
            title: self.title,
            time_limit_minutes: self.time_limit_minutes,
            max_attempts: self.max_attempts,
            passing_score: self.passing_score,
            shuffle_questions: self.shuffle_questions,
            shuffle_options: self.shuffle_options,
            show_results_immediately: self.show_results_immediately,
            show_correct_answers: self.show_correct_answers,
            start_date: self.start_date,
            end_date: self.end_date,
            selection: QuestionSelection::from_parts(self.question_ids, random),
        })
    }
}
