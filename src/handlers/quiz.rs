// src/handlers/quiz.rs

use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};

use crate::{
    error::AppError,
    models::{attempt::Audience, quiz::UpsertQuizRequest},
    services::QuizService,
    utils::jwt::Claims,
};

/// Returns the quiz configured for a lesson.
pub async fn get_quiz(
    State(service): State<Arc<QuizService>>,
    Path(lesson_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let quiz = service.get_quiz_for_lesson(lesson_id).await?;
    Ok(Json(quiz))
}

/// Creates or replaces the quiz of a lesson (Instructor only).
///
/// Attempts already in progress keep the questions they started with.
pub async fn upsert_quiz(
    State(service): State<Arc<QuizService>>,
    Extension(claims): Extension<Claims>,
    Path(lesson_id): Path<i64>,
    Json(req): Json<UpsertQuizRequest>,
) -> Result<impl IntoResponse, AppError> {
    let quiz = service.upsert_quiz(lesson_id, req).await?;

    tracing::info!(
        quiz_id = quiz.id,
        lesson_id,
        instructor = %claims.sub,
        "Quiz saved"
    );

    Ok(Json(quiz))
}

/// Lists every attempt on a quiz, newest first (Instructor only).
pub async fn quiz_attempts(
    State(service): State<Arc<QuizService>>,
    Path(quiz_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let attempts = service.get_quiz_attempts(quiz_id).await?;
    let views = service
        .render_attempts(quiz_id, &attempts, Audience::Instructor)
        .await?;

    Ok(Json(views))
}
