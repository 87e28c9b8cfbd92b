//! In-process storage backend.
//!
//! Used when no `DATABASE_URL` is configured and by the test suites. Every
//! operation runs under one lock, so the check-then-insert paths are atomic.

use std::{collections::BTreeMap, sync::Arc};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use tokio::sync::RwLock;

use crate::{
    error::{AppError, AppResult},
    models::{
        attempt::{AttemptStatus, NewAttempt, QuizAttempt, QuizAttemptItem},
        question::Question,
        quiz::{Quiz, QuizSettings},
    },
    repositories::{AttemptRepository, QuestionStore, QuizRepository},
};

#[derive(Default)]
struct Inner {
    questions: BTreeMap<i64, Question>,
    quizzes: BTreeMap<i64, Quiz>,
    attempts: BTreeMap<i64, QuizAttempt>,
    next_quiz_id: i64,
    next_attempt_id: i64,
    next_item_id: i64,
}

impl Inner {
    fn submitted(&self, quiz_id: i64, student_id: i64) -> i64 {
        self.attempts
            .values()
            .filter(|a| {
                a.quiz_id == quiz_id
                    && a.student_id == student_id
                    && a.status == AttemptStatus::Submitted
            })
            .count() as i64
    }
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a question in the bank.
    pub async fn put_question(&self, question: Question) {
        let mut inner = self.inner.write().await;
        inner.questions.insert(question.id, question);
    }

    /// Deletes a question from the bank. Quizzes and attempts that reference
    /// it keep the reference.
    pub async fn remove_question(&self, id: i64) -> Option<Question> {
        let mut inner = self.inner.write().await;
        inner.questions.remove(&id)
    }
}

fn without_items(attempt: &QuizAttempt) -> QuizAttempt {
    QuizAttempt {
        items: Vec::new(),
        ..attempt.clone()
    }
}

#[async_trait]
impl QuestionStore for MemoryStore {
    async fn get_questions_by_ids(&self, ids: &[i64]) -> AppResult<Vec<Question>> {
        let inner = self.inner.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| inner.questions.get(id).cloned())
            .collect())
    }

    async fn get_active_questions(&self) -> AppResult<Vec<Question>> {
        let inner = self.inner.read().await;
        Ok(inner
            .questions
            .values()
            .filter(|q| q.is_active)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl QuizRepository for MemoryStore {
    async fn find_by_id(&self, id: i64) -> AppResult<Option<Quiz>> {
        let inner = self.inner.read().await;
        Ok(inner.quizzes.get(&id).cloned())
    }

    async fn find_by_lesson(&self, lesson_id: i64) -> AppResult<Option<Quiz>> {
        let inner = self.inner.read().await;
        Ok(inner
            .quizzes
            .values()
            .find(|q| q.lesson_id == lesson_id)
            .cloned())
    }

    async fn upsert_for_lesson(
        &self,
        lesson_id: i64,
        settings: QuizSettings,
        now: DateTime<Utc>,
    ) -> AppResult<Quiz> {
        let mut inner = self.inner.write().await;

        let existing = inner
            .quizzes
            .values_mut()
            .find(|q| q.lesson_id == lesson_id);

        if let Some(quiz) = existing {
            quiz.settings = settings;
            quiz.updated_at = now;
            return Ok(quiz.clone());
        }

        inner.next_quiz_id += 1;
        let quiz = Quiz {
            id: inner.next_quiz_id,
            lesson_id,
            settings,
            created_at: now,
            updated_at: now,
        };
        inner.quizzes.insert(quiz.id, quiz.clone());
        Ok(quiz)
    }
}

#[async_trait]
impl AttemptRepository for MemoryStore {
    async fn count_submitted(&self, quiz_id: i64, student_id: i64) -> AppResult<i64> {
        let inner = self.inner.read().await;
        Ok(inner.submitted(quiz_id, student_id))
    }

    async fn create(&self, attempt: NewAttempt, max_attempts: i32) -> AppResult<QuizAttempt> {
        if attempt.items.is_empty() {
            return Err(AppError::InvalidConfiguration(
                "an attempt needs at least one question".to_string(),
            ));
        }

        let mut inner = self.inner.write().await;

        let used = inner.submitted(attempt.quiz_id, attempt.student_id);
        if used >= i64::from(max_attempts) {
            return Err(AppError::AttemptLimitExceeded { used, max: max_attempts });
        }

        inner.next_attempt_id += 1;
        let attempt_id = inner.next_attempt_id;

        let mut items = Vec::with_capacity(attempt.items.len());
        for (position, item) in attempt.items.into_iter().enumerate() {
            inner.next_item_id += 1;
            items.push(QuizAttemptItem {
                id: inner.next_item_id,
                attempt_id,
                question_id: item.question_id,
                position: position as i32,
                selected_option: None,
                is_correct: None,
                time_spent_seconds: None,
                option_order: Json(item.option_order),
            });
        }

        let created = QuizAttempt {
            id: attempt_id,
            quiz_id: attempt.quiz_id,
            student_id: attempt.student_id,
            status: AttemptStatus::InProgress,
            start_time: attempt.start_time,
            end_time: None,
            total_questions: items.len() as i32,
            correct_answers: 0,
            score: None,
            is_passed: None,
            created_at: attempt.start_time,
            items,
        };
        inner.attempts.insert(attempt_id, created.clone());
        Ok(created)
    }

    async fn find_by_id(&self, id: i64) -> AppResult<Option<QuizAttempt>> {
        let inner = self.inner.read().await;
        Ok(inner.attempts.get(&id).cloned())
    }

    async fn finalize(&self, attempt: &QuizAttempt, max_attempts: i32) -> AppResult<()> {
        let mut inner = self.inner.write().await;

        let stored_status = inner
            .attempts
            .get(&attempt.id)
            .map(|stored| stored.status)
            .ok_or_else(|| AppError::NotFound(format!("Attempt {} not found", attempt.id)))?;

        match stored_status {
            AttemptStatus::InProgress => {}
            AttemptStatus::Submitted => return Err(AppError::AlreadySubmitted(attempt.id)),
            AttemptStatus::Expired => return Err(AppError::AttemptExpired(attempt.id)),
        }

        // The stored row is still IN_PROGRESS, so the count covers other attempts only.
        if attempt.status == AttemptStatus::Submitted {
            let used = inner.submitted(attempt.quiz_id, attempt.student_id);
            if used >= i64::from(max_attempts) {
                return Err(AppError::AttemptLimitExceeded { used, max: max_attempts });
            }
        }

        inner.attempts.insert(attempt.id, attempt.clone());
        Ok(())
    }

    async fn list_for_student(&self, quiz_id: i64, student_id: i64) -> AppResult<Vec<QuizAttempt>> {
        let inner = self.inner.read().await;
        let mut attempts: Vec<QuizAttempt> = inner
            .attempts
            .values()
            .filter(|a| a.quiz_id == quiz_id && a.student_id == student_id)
            .map(without_items)
            .collect();
        attempts.sort_by(|a, b| a.start_time.cmp(&b.start_time).then(a.id.cmp(&b.id)));
        Ok(attempts)
    }

    async fn list_for_quiz(&self, quiz_id: i64) -> AppResult<Vec<QuizAttempt>> {
        let inner = self.inner.read().await;
        let mut attempts: Vec<QuizAttempt> = inner
            .attempts
            .values()
            .filter(|a| a.quiz_id == quiz_id)
            .map(without_items)
            .collect();
        attempts.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(attempts)
    }
}
