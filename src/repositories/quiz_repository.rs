use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Postgres, types::Json};

use crate::{
    error::AppResult,
    models::quiz::{QuestionSelection, Quiz, QuizSettings, RandomSelection},
};

#[async_trait]
pub trait QuizRepository: Send + Sync {
    async fn find_by_id(&self, id: i64) -> AppResult<Option<Quiz>>;
    async fn find_by_lesson(&self, lesson_id: i64) -> AppResult<Option<Quiz>>;
    /// Creates the lesson's quiz or replaces its settings.
    async fn upsert_for_lesson(
        &self,
        lesson_id: i64,
        settings: QuizSettings,
        now: DateTime<Utc>,
    ) -> AppResult<Quiz>;
}

const QUIZ_COLUMNS: &str = "id, lesson_id, title, time_limit_minutes, max_attempts, \
    passing_score, shuffle_questions, shuffle_options, show_results_immediately, \
    show_correct_answers, start_date, end_date, random_count, random_difficulty, \
    random_tags, created_at, updated_at";

/// Row of the 'quizzes' table. The manual question list lives in
/// 'quiz_questions' and is joined in separately.
#[derive(Debug, FromRow)]
struct QuizRow {
    id: i64,
    lesson_id: i64,
    title: String,
    time_limit_minutes: Option<i32>,
    max_attempts: i32,
    passing_score: i32,
    shuffle_questions: bool,
    shuffle_options: bool,
    show_results_immediately: bool,
    show_correct_answers: bool,
    start_date: Option<DateTime<Utc>>,
    end_date: Option<DateTime<Utc>>,
    random_count: Option<i32>,
    random_difficulty: Option<String>,
    random_tags: Json<Vec<String>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl QuizRow {
    fn into_quiz(self, question_ids: Vec<i64>) -> Quiz {
        let random = RandomSelection {
            count: self.random_count.map(|c| c.max(0) as u32),
            difficulty: self.random_difficulty,
            tags: self.random_tags.0,
        };

        Quiz {
            id: self.id,
            lesson_id: self.lesson_id,
            settings: QuizSettings {
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
                selection: QuestionSelection::from_parts(question_ids, random),
            },
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

pub struct PgQuizRepository {
    pool: PgPool,
}

impl PgQuizRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn hydrate<'e, E>(executor: E, row: QuizRow) -> AppResult<Quiz>
    where
        E: sqlx::Executor<'e, Database = Postgres>,
    {
        let question_ids: Vec<i64> = sqlx::query_scalar(
            "SELECT question_id FROM quiz_questions WHERE quiz_id = $1 ORDER BY position",
        )
        .bind(row.id)
        .fetch_all(executor)
        .await?;

        Ok(row.into_quiz(question_ids))
    }

    async fn find_one(&self, column: &str, value: i64) -> AppResult<Option<Quiz>> {
        let row = sqlx::query_as::<_, QuizRow>(&format!(
            "SELECT {} FROM quizzes WHERE {} = $1",
            QUIZ_COLUMNS, column
        ))
        .bind(value)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(Self::hydrate(&self.pool, row).await?)),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl QuizRepository for PgQuizRepository {
    async fn find_by_id(&self, id: i64) -> AppResult<Option<Quiz>> {
        self.find_one("id", id).await
    }

    async fn find_by_lesson(&self, lesson_id: i64) -> AppResult<Option<Quiz>> {
        self.find_one("lesson_id", lesson_id).await
    }

    async fn upsert_for_lesson(
        &self,
        lesson_id: i64,
        settings: QuizSettings,
        now: DateTime<Utc>,
    ) -> AppResult<Quiz> {
        let (question_ids, random) = match settings.selection {
            QuestionSelection::Manual { question_ids } => (question_ids, RandomSelection::default()),
            QuestionSelection::Random(random) => (Vec::new(), random),
        };

        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, QuizRow>(&format!(
            r#"
            INSERT INTO quizzes (
                lesson_id, title, time_limit_minutes, max_attempts, passing_score,
                shuffle_questions, shuffle_options, show_results_immediately,
                show_correct_answers, start_date, end_date, random_count,
                random_difficulty, random_tags, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $15)
            ON CONFLICT (lesson_id) DO UPDATE SET
                title = EXCLUDED.title,
                time_limit_minutes = EXCLUDED.time_limit_minutes,
                max_attempts = EXCLUDED.max_attempts,
                passing_score = EXCLUDED.passing_score,
                shuffle_questions = EXCLUDED.shuffle_questions,
                shuffle_options = EXCLUDED.shuffle_options,
                show_results_immediately = EXCLUDED.show_results_immediately,
                show_correct_answers = EXCLUDED.show_correct_answers,
                start_date = EXCLUDED.start_date,
                end_date = EXCLUDED.end_date,
                random_count = EXCLUDED.random_count,
                random_difficulty = EXCLUDED.random_difficulty,
                random_tags = EXCLUDED.random_tags,
                updated_at = EXCLUDED.updated_at
            RETURNING {}
            "#,
            QUIZ_COLUMNS
        ))
        .bind(lesson_id)
        .bind(&settings.title)
        .bind(settings.time_limit_minutes)
        .bind(settings.max_attempts)
        .bind(settings.passing_score)
        .bind(settings.shuffle_questions)
        .bind(settings.shuffle_options)
        .bind(settings.show_results_immediately)
        .bind(settings.show_correct_answers)
        .bind(settings.start_date)
        .bind(settings.end_date)
        .bind(random.count.map(|c| c as i32))
        .bind(&random.difficulty)
        .bind(Json(&random.tags))
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM quiz_questions WHERE quiz_id = $1")
            .bind(row.id)
            .execute(&mut *tx)
            .await?;

        if !question_ids.is_empty() {
            sqlx::query(
                r#"
                INSERT INTO quiz_questions (quiz_id, question_id, position)
                SELECT $1, q.id, (q.ord - 1)::INT
                FROM UNNEST($2::BIGINT[]) WITH ORDINALITY AS q(id, ord)
                "#,
            )
            .bind(row.id)
            .bind(&question_ids)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        tracing::info!(quiz_id = row.id, lesson_id, "Quiz configuration saved");

        Ok(row.into_quiz(question_ids))
    }
}
