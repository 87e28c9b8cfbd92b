use std::{collections::HashMap, sync::Arc};

use chrono::{DateTime, Utc};

use crate::{
    error::{AppError, AppResult},
    models::{
        attempt::{AttemptStatus, Audience, AttemptResponse, NewAttempt, QuizAttempt},
        question::Question,
        quiz::{QuestionSelection, Quiz, UpsertQuizRequest},
    },
    repositories::{AttemptRepository, QuestionStore, QuizRepository},
    services::{scoring, selection},
    utils::clock::Clock,
};

/// Attempt lifecycle: start, submit, and the read paths over attempts.
pub struct QuizService {
    quizzes: Arc<dyn QuizRepository>,
    questions: Arc<dyn QuestionStore>,
    attempts: Arc<dyn AttemptRepository>,
    clock: Arc<dyn Clock>,
}

impl QuizService {
    pub fn new(
        quizzes: Arc<dyn QuizRepository>,
        questions: Arc<dyn QuestionStore>,
        attempts: Arc<dyn AttemptRepository>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            quizzes,
            questions,
            attempts,
            clock,
        }
    }

    pub async fn get_quiz(&self, quiz_id: i64) -> AppResult<Quiz> {
        self.quizzes
            .find_by_id(quiz_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Quiz {} not found", quiz_id)))
    }

    pub async fn get_quiz_for_lesson(&self, lesson_id: i64) -> AppResult<Quiz> {
        self.quizzes
            .find_by_lesson(lesson_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Lesson {} has no quiz", lesson_id)))
    }

    /// Creates or replaces a lesson's quiz. Attempts already started keep the
    /// questions they were created with.
    pub async fn upsert_quiz(&self, lesson_id: i64, request: UpsertQuizRequest) -> AppResult<Quiz> {
        let settings = request.into_settings()?;

        if let QuestionSelection::Manual { question_ids } = &settings.selection {
            let found = self.questions.get_questions_by_ids(question_ids).await?;
            selection::resolve_manual(question_ids, found)
                .map_err(|e| AppError::BadRequest(e.to_string()))?;
        }

        self.quizzes
            .upsert_for_lesson(lesson_id, settings, self.clock.now())
            .await
    }

    /// Starts a new attempt for `student_id` on the quiz attached to `lesson_id`.
    pub async fn start_attempt(&self, student_id: i64, lesson_id: i64) -> AppResult<QuizAttempt> {
        let quiz = self.get_quiz_for_lesson(lesson_id).await?;
        let max_attempts = quiz.settings.max_attempts;

        let used = self.attempts.count_submitted(quiz.id, student_id).await?;
        if used >= i64::from(max_attempts) {
            tracing::info!(quiz_id = quiz.id, student_id, used, "Attempt limit reached");
            return Err(AppError::AttemptLimitExceeded { used, max: max_attempts });
        }

        let now = self.clock.now();
        quiz.ensure_open(now)?;

        let resolved = self.resolve_questions(&quiz).await?;
        if resolved.is_empty() {
            return Err(AppError::InvalidConfiguration(format!(
                "quiz {} has no questions to draw from",
                quiz.id
            )));
        }

        let items = {
            let mut rng = rand::thread_rng();
            let ordered = selection::order_questions(resolved, quiz.settings.shuffle_questions, &mut rng);
            selection::build_items(&ordered, quiz.settings.shuffle_options, &mut rng)
        };

        let attempt = self
            .attempts
            .create(
                NewAttempt {
                    quiz_id: quiz.id,
                    student_id,
                    start_time: now,
                    items,
                },
                max_attempts,
            )
            .await?;

        tracing::info!(
            attempt_id = attempt.id,
            quiz_id = quiz.id,
            student_id,
            total_questions = attempt.total_questions,
            "Attempt started"
        );

        Ok(attempt)
    }

    async fn resolve_questions(&self, quiz: &Quiz) -> AppResult<Vec<Question>> {
        match &quiz.settings.selection {
            QuestionSelection::Manual { question_ids } => {
                let fetched = self.questions.get_questions_by_ids(question_ids).await?;
                selection::resolve_manual(question_ids, fetched)
            }
            QuestionSelection::Random(spec) => {
                let pool = self.questions.get_active_questions().await?;
                let mut rng = rand::thread_rng();
                Ok(selection::resolve_random(pool, spec, &mut rng))
            }
        }
    }

    /// Grades and finalizes an attempt.
    ///
    /// An attempt submitted after the quiz's time limit is marked EXPIRED
    /// instead of being scored.
    pub async fn submit_attempt(
        &self,
        attempt_id: i64,
        answers: &HashMap<i64, String>,
    ) -> AppResult<QuizAttempt> {
        let mut attempt = self.get_attempt(attempt_id).await?;

        // Rejects terminal states before doing any work.
        let submitted = attempt.status.submit(attempt.id)?;

        let quiz = self.get_quiz(attempt.quiz_id).await?;
        let now = self.clock.now();

        if quiz.time_limit_exceeded(attempt.start_time, now) {
            attempt.status = attempt.status.expire(attempt.id)?;
            attempt.end_time = Some(now);
            self.attempts
                .finalize(&attempt, quiz.settings.max_attempts)
                .await?;

            tracing::info!(attempt_id, quiz_id = quiz.id, "Attempt expired before submission");
            return Err(AppError::AttemptExpired(attempt_id));
        }

        let question_ids = attempt.question_order();
        let answer_keys: HashMap<i64, String> = self
            .questions
            .get_questions_by_ids(&question_ids)
            .await?
            .into_iter()
            .map(|q| (q.id, q.correct_option))
            .collect();

        let ungraded = attempt.clone();
        scoring::grade_attempt(&mut attempt, &quiz, &answer_keys, answers);
        attempt.status = submitted;
        attempt.end_time = Some(now);

        if let Err(err) = self
            .attempts
            .finalize(&attempt, quiz.settings.max_attempts)
            .await
        {
            if matches!(err, AppError::AttemptLimitExceeded { .. }) {
                self.close_over_limit(ungraded, now, quiz.settings.max_attempts)
                    .await;
            }
            return Err(err);
        }

        tracing::info!(
            attempt_id,
            quiz_id = quiz.id,
            correct_answers = attempt.correct_answers,
            score = attempt.score,
            passed = attempt.is_passed,
            "Attempt submitted"
        );

        Ok(attempt)
    }

    /// An attempt refused at submit because the ceiling was reached can never
    /// be submitted, so it is closed as EXPIRED without a score.
    async fn close_over_limit(&self, mut attempt: QuizAttempt, now: DateTime<Utc>, max_attempts: i32) {
        attempt.status = AttemptStatus::Expired;
        attempt.end_time = Some(now);

        match self.attempts.finalize(&attempt, max_attempts).await {
            Ok(()) => tracing::info!(
                attempt_id = attempt.id,
                quiz_id = attempt.quiz_id,
                student_id = attempt.student_id,
                "Attempt over the limit closed as expired"
            ),
            Err(e) => tracing::warn!(
                attempt_id = attempt.id,
                "Failed to close attempt over the limit: {}",
                e
            ),
        }
    }

    pub async fn get_attempt(&self, attempt_id: i64) -> AppResult<QuizAttempt> {
        self.attempts
            .find_by_id(attempt_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Attempt {} not found", attempt_id)))
    }

    /// A student's own attempts, oldest first.
    pub async fn get_student_attempts(&self, quiz_id: i64, student_id: i64) -> AppResult<Vec<QuizAttempt>> {
        self.get_quiz(quiz_id).await?;
        self.attempts.list_for_student(quiz_id, student_id).await
    }

    /// Every attempt on the quiz, most recent first.
    pub async fn get_quiz_attempts(&self, quiz_id: i64) -> AppResult<Vec<QuizAttempt>> {
        self.get_quiz(quiz_id).await?;
        self.attempts.list_for_quiz(quiz_id).await
    }

    /// Renders one attempt with its questions for `audience`.
    pub async fn render_attempt(
        &self,
        attempt: &QuizAttempt,
        audience: Audience,
    ) -> AppResult<AttemptResponse> {
        let quiz = self.get_quiz(attempt.quiz_id).await?;
        let questions: HashMap<i64, Question> = self
            .questions
            .get_questions_by_ids(&attempt.question_order())
            .await?
            .into_iter()
            .map(|q| (q.id, q))
            .collect();

        Ok(AttemptResponse::render(attempt, &quiz, &questions, audience))
    }

    /// Renders attempt summaries of a single quiz for `audience`.
    pub async fn render_attempts(
        &self,
        quiz_id: i64,
        attempts: &[QuizAttempt],
        audience: Audience,
    ) -> AppResult<Vec<AttemptResponse>> {
        let quiz = self.get_quiz(quiz_id).await?;
        let no_questions = HashMap::new();

        Ok(attempts
            .iter()
            .map(|attempt| AttemptResponse::render(attempt, &quiz, &no_questions, audience))
            .collect())
    }
}
