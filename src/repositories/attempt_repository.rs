use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder, Transaction, types::Json};

use crate::{
    error::{AppError, AppResult},
    models::attempt::{AttemptStatus, NewAttempt, QuizAttempt, QuizAttemptItem},
};

#[async_trait]
pub trait AttemptRepository: Send + Sync {
    /// Number of SUBMITTED attempts the student has for the quiz.
    async fn count_submitted(&self, quiz_id: i64, student_id: i64) -> AppResult<i64>;

    /// Persists an IN_PROGRESS attempt and its items in one unit of work.
    /// The submitted-attempt ceiling is re-checked inside that same unit so
    /// concurrent starts cannot both slip past it.
    async fn create(&self, attempt: NewAttempt, max_attempts: i32) -> AppResult<QuizAttempt>;

    /// Loads an attempt together with its items in frozen order.
    async fn find_by_id(&self, id: i64) -> AppResult<Option<QuizAttempt>>;

    /// Writes the outcome of a finished attempt (SUBMITTED or EXPIRED).
    /// Only applies while the stored attempt is still IN_PROGRESS; a SUBMITTED
    /// outcome also re-checks the ceiling.
    async fn finalize(&self, attempt: &QuizAttempt, max_attempts: i32) -> AppResult<()>;

    /// A student's attempts on a quiz, oldest first. Items are not loaded.
    async fn list_for_student(&self, quiz_id: i64, student_id: i64) -> AppResult<Vec<QuizAttempt>>;

    /// Every attempt on a quiz, most recent first. Items are not loaded.
    async fn list_for_quiz(&self, quiz_id: i64) -> AppResult<Vec<QuizAttempt>>;
}

const ATTEMPT_COLUMNS: &str = "id, quiz_id, student_id, status, start_time, end_time, \
    total_questions, correct_answers, score, is_passed, created_at";

const ITEM_COLUMNS: &str = "id, attempt_id, question_id, position, selected_option, \
    is_correct, time_spent_seconds, option_order";

pub struct PgAttemptRepository {
    pool: PgPool,
}

impl PgAttemptRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn begin_serializable(&self) -> AppResult<Transaction<'static, Postgres>> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL SERIALIZABLE")
            .execute(&mut *tx)
            .await?;
        Ok(tx)
    }

    async fn submitted_in_tx(
        tx: &mut Transaction<'static, Postgres>,
        quiz_id: i64,
        student_id: i64,
    ) -> AppResult<i64> {
        let used: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM quiz_attempts
            WHERE quiz_id = $1 AND student_id = $2 AND status = 'SUBMITTED'
            "#,
        )
        .bind(quiz_id)
        .bind(student_id)
        .fetch_one(&mut **tx)
        .await?;

        Ok(used)
    }
}

#[async_trait]
impl AttemptRepository for PgAttemptRepository {
    async fn count_submitted(&self, quiz_id: i64, student_id: i64) -> AppResult<i64> {
        let used: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM quiz_attempts
            WHERE quiz_id = $1 AND student_id = $2 AND status = 'SUBMITTED'
            "#,
        )
        .bind(quiz_id)
        .bind(student_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(used)
    }

    async fn create(&self, attempt: NewAttempt, max_attempts: i32) -> AppResult<QuizAttempt> {
        if attempt.items.is_empty() {
            return Err(AppError::InvalidConfiguration(
                "an attempt needs at least one question".to_string(),
            ));
        }

        let mut tx = self.begin_serializable().await?;

        let used = Self::submitted_in_tx(&mut tx, attempt.quiz_id, attempt.student_id).await?;
        if used >= i64::from(max_attempts) {
            return Err(AppError::AttemptLimitExceeded { used, max: max_attempts });
        }

        let mut created = sqlx::query_as::<_, QuizAttempt>(&format!(
            r#"
            INSERT INTO quiz_attempts
                (quiz_id, student_id, status, start_time, total_questions, correct_answers)
            VALUES ($1, $2, $3, $4, $5, 0)
            RETURNING {}
            "#,
            ATTEMPT_COLUMNS
        ))
        .bind(attempt.quiz_id)
        .bind(attempt.student_id)
        .bind(AttemptStatus::InProgress.as_str())
        .bind(attempt.start_time)
        .bind(attempt.items.len() as i32)
        .fetch_one(&mut *tx)
        .await?;

        let mut query_builder = QueryBuilder::<Postgres>::new(
            "INSERT INTO quiz_attempt_items (attempt_id, question_id, position, option_order) ",
        );
        query_builder.push_values(attempt.items.into_iter().enumerate(), |mut row, (position, item)| {
            row.push_bind(created.id)
                .push_bind(item.question_id)
                .push_bind(position as i32)
                .push_bind(Json(item.option_order));
        });
        query_builder.push(" RETURNING ");
        query_builder.push(ITEM_COLUMNS);

        let mut items: Vec<QuizAttemptItem> = query_builder
            .build_query_as()
            .fetch_all(&mut *tx)
            .await?;
        items.sort_by_key(|item| item.position);

        tx.commit().await?;

        created.items = items;
        Ok(created)
    }

    async fn find_by_id(&self, id: i64) -> AppResult<Option<QuizAttempt>> {
        let attempt = sqlx::query_as::<_, QuizAttempt>(&format!(
            "SELECT {} FROM quiz_attempts WHERE id = $1",
            ATTEMPT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(mut attempt) = attempt else {
            return Ok(None);
        };

        attempt.items = sqlx::query_as::<_, QuizAttemptItem>(&format!(
            "SELECT {} FROM quiz_attempt_items WHERE attempt_id = $1 ORDER BY position",
            ITEM_COLUMNS
        ))
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        Ok(Some(attempt))
    }

    async fn finalize(&self, attempt: &QuizAttempt, max_attempts: i32) -> AppResult<()> {
        let mut tx = self.begin_serializable().await?;

        let result = sqlx::query(
            r#"
            UPDATE quiz_attempts
            SET status = $2, end_time = $3, correct_answers = $4, score = $5, is_passed = $6
            WHERE id = $1 AND status = 'IN_PROGRESS'
            "#,
        )
        .bind(attempt.id)
        .bind(attempt.status.as_str())
        .bind(attempt.end_time)
        .bind(attempt.correct_answers)
        .bind(attempt.score)
        .bind(attempt.is_passed)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            let current: Option<String> =
                sqlx::query_scalar("SELECT status FROM quiz_attempts WHERE id = $1")
                    .bind(attempt.id)
                    .fetch_optional(&mut *tx)
                    .await?;

            return Err(match current {
                None => AppError::NotFound(format!("Attempt {} not found", attempt.id)),
                Some(status) => match AttemptStatus::try_from(status)? {
                    AttemptStatus::Expired => AppError::AttemptExpired(attempt.id),
                    _ => AppError::AlreadySubmitted(attempt.id),
                },
            });
        }

        // This row now counts as SUBMITTED; dropping the transaction rolls it back.
        if attempt.status == AttemptStatus::Submitted {
            let used = Self::submitted_in_tx(&mut tx, attempt.quiz_id, attempt.student_id).await?;
            if used > i64::from(max_attempts) {
                return Err(AppError::AttemptLimitExceeded {
                    used: used - 1,
                    max: max_attempts,
                });
            }
        }

        for item in &attempt.items {
            sqlx::query(
                r#"
                UPDATE quiz_attempt_items
                SET selected_option = $2, is_correct = $3, time_spent_seconds = $4
                WHERE id = $1
                "#,
            )
            .bind(item.id)
            .bind(&item.selected_option)
            .bind(item.is_correct)
            .bind(item.time_spent_seconds)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn list_for_student(&self, quiz_id: i64, student_id: i64) -> AppResult<Vec<QuizAttempt>> {
        let attempts = sqlx::query_as::<_, QuizAttempt>(&format!(
            r#"
            SELECT {} FROM quiz_attempts
            WHERE quiz_id = $1 AND student_id = $2
            ORDER BY start_time ASC, id ASC
            "#,
            ATTEMPT_COLUMNS
        ))
        .bind(quiz_id)
        .bind(student_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(attempts)
    }

    async fn list_for_quiz(&self, quiz_id: i64) -> AppResult<Vec<QuizAttempt>> {
        let attempts = sqlx::query_as::<_, QuizAttempt>(&format!(
            r#"
            SELECT {} FROM quiz_attempts
            WHERE quiz_id = $1
            ORDER BY created_at DESC, id DESC
            "#,
            ATTEMPT_COLUMNS
        ))
        .bind(quiz_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(attempts)
    }
}
