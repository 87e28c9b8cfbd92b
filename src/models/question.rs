// src/models/question.rs

use serde::{Deserialize, Serialize};
use sqlx::{prelude::FromRow, types::Json};

/// Represents the 'questions' table in the database.
/// Owned by the question bank; the quiz engine only ever reads it.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Question {
    pub id: i64,

    /// The text content of the question.
    pub content: String,

    /// Answer options, each identified by a short key ("A", "B", ...).
    /// Stored as a JSON array in the database.
    pub options: Json<Vec<QuestionOption>>,

    /// Key of the correct option. Compared case-sensitively when grading.
    pub correct_option: String,

    pub difficulty: Option<String>,

    pub tags: Json<Vec<String>>,

    /// Inactive questions are never drawn into new attempts.
    pub is_active: bool,

    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionOption {
    pub key: String,
    pub text: String,
}

impl Question {
    pub fn option_keys(&self) -> Vec<String> {
        self.options.iter().map(|o| o.key.clone()).collect()
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t.eq_ignore_ascii_case(tag))
    }
}

/// DTO for sending a question to a student (excludes the correct option).
/// Options are listed in the attempt's frozen display order.
#[derive(Debug, Serialize)]
pub struct PublicQuestion {
    pub id: i64,
    pub content: String,
    pub options: Vec<QuestionOption>,
}

impl PublicQuestion {
    pub fn from_question(question: &Question, option_order: &[String]) -> Self {
        let mut options: Vec<QuestionOption> = option_order
            .iter()
            .filter_map(|key| question.options.iter().find(|o| &o.key == key).cloned())
            .collect();

        // Options added to the bank after the attempt started are appended.
        for option in question.options.iter() {
            if !option_order.contains(&option.key) {
                options.push(option.clone());
            }
        }

        Self {
            id: question.id,
            content: question.content.clone(),
            options,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question() -> Question {
        Question {
            id: 1,
            content: "Which?".to_string(),
            options: Json(vec![
                QuestionOption { key: "A".into(), text: "first".into() },
                QuestionOption { key: "B".into(), text: "second".into() },
                QuestionOption { key: "C".into(), text: "third".into() },
            ]),
            correct_option: "B".to_string(),
            difficulty: Some("easy".to_string()),
            tags: Json(vec!["Rust".to_string()]),
            is_active: true,
            created_at: None,
        }
    }

    #[test]
    fn public_question_follows_frozen_option_order() {
        let order = vec!["C".to_string(), "A".to_string(), "B".to_string()];
        let public = PublicQuestion::from_question(&question(), &order);

        let keys: Vec<&str> = public.options.iter().map(|o| o.key.as_str()).collect();
        assert_eq!(keys, vec!["C", "A", "B"]);
    }

    #[test]
    fn tags_match_case_insensitively() {
        assert!(question().has_tag("rust"));
        assert!(!question().has_tag("go"));
    }
}
