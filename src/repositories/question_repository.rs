use async_trait::async_trait;
use sqlx::PgPool;

use crate::{error::AppResult, models::question::Question};

/// Read-only view of the question bank.
#[async_trait]
pub trait QuestionStore: Send + Sync {
    /// Questions whose id is in `ids`, in no particular order. Unknown ids
    /// are simply absent from the result.
    async fn get_questions_by_ids(&self, ids: &[i64]) -> AppResult<Vec<Question>>;
    /// Every active question, ordered by id.
    async fn get_active_questions(&self) -> AppResult<Vec<Question>>;
}

const QUESTION_COLUMNS: &str =
    "id, content, options, correct_option, difficulty, tags, is_active, created_at";

pub struct PgQuestionStore {
    pool: PgPool,
}

impl PgQuestionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl QuestionStore for PgQuestionStore {
    async fn get_questions_by_ids(&self, ids: &[i64]) -> AppResult<Vec<Question>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let questions = sqlx::query_as::<_, Question>(&format!(
            "SELECT {} FROM questions WHERE id = ANY($1)",
            QUESTION_COLUMNS
        ))
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(questions)
    }

    async fn get_active_questions(&self) -> AppResult<Vec<Question>> {
        let questions = sqlx::query_as::<_, Question>(&format!(
            "SELECT {} FROM questions WHERE is_active ORDER BY id",
            QUESTION_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(questions)
    }
}
