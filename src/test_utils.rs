// src/test_utils.rs

use std::sync::Mutex;

use chrono::{DateTime, Duration, TimeZone, Utc};
use sqlx::types::Json;

use crate::{
    models::{
        question::{Question, QuestionOption},
        quiz::UpsertQuizRequest,
    },
    utils::clock::Clock,
};

/// Clock that only moves when told to.
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self {
            now: Mutex::new(Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap()),
        }
    }
}

impl ManualClock {
    pub fn advance(&self, by: Duration) {
        *self.now.lock().unwrap() += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

/// Four-option question whose correct key is `correct`.
pub fn question(id: i64, correct: &str) -> Question {
    Question {
        id,
        content: format!("Question {}", id),
        options: Json(
            ["A", "B", "C", "D"]
                .iter()
                .map(|key| QuestionOption {
                    key: key.to_string(),
                    text: format!("Option {}", key),
                })
                .collect(),
        ),
        correct_option: correct.to_string(),
        difficulty: None,
        tags: Json(vec![]),
        is_active: true,
        created_at: None,
    }
}

/// Request with every optional field at its default.
pub fn quiz_request() -> UpsertQuizRequest {
    serde_json::from_value(serde_json::json!({ "title": "Lesson quiz" })).unwrap()
}
