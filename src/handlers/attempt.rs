// src/handlers/attempt.rs

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use std::sync::Arc;

use crate::{
    error::AppError,
    models::attempt::{Audience, QuizAttempt, SubmitAttemptRequest},
    services::QuizService,
    utils::jwt::Claims,
};

/// Loads an attempt and makes sure the caller may act on it as its owner.
async fn owned_attempt(
    service: &QuizService,
    attempt_id: i64,
    claims: &Claims,
) -> Result<QuizAttempt, AppError> {
    let attempt = service.get_attempt(attempt_id).await?;
    if attempt.student_id != claims.user_id()? {
        return Err(AppError::Forbidden(
            "Attempt belongs to another student".to_string(),
        ));
    }
    Ok(attempt)
}

/// Starts a new attempt on the quiz attached to a lesson.
///
/// Returns 201 with the attempt's questions in their frozen order.
pub async fn start_attempt(
    State(service): State<Arc<QuizService>>,
    Extension(claims): Extension<Claims>,
    Path(lesson_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let student_id = claims.user_id()?;

    let attempt = service.start_attempt(student_id, lesson_id).await?;
    let view = service.render_attempt(&attempt, Audience::Student).await?;

    Ok((StatusCode::CREATED, Json(view)))
}

/// Submits answers for an attempt owned by the caller.
///
/// * 409 if the attempt was already submitted.
/// * 410 if the time limit has passed; the attempt is marked EXPIRED.
pub async fn submit_attempt(
    State(service): State<Arc<QuizService>>,
    Extension(claims): Extension<Claims>,
    Path(attempt_id): Path<i64>,
    Json(req): Json<SubmitAttemptRequest>,
) -> Result<impl IntoResponse, AppError> {
    owned_attempt(&service, attempt_id, &claims).await?;

    let graded = service.submit_attempt(attempt_id, &req.answers).await?;
    let view = service.render_attempt(&graded, Audience::Student).await?;

    Ok(Json(view))
}

/// Fetches one attempt. Owners get the student view, instructors the full one.
pub async fn get_attempt(
    State(service): State<Arc<QuizService>>,
    Extension(claims): Extension<Claims>,
    Path(attempt_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let attempt = service.get_attempt(attempt_id).await?;

    let audience = if claims.is_instructor() {
        Audience::Instructor
    } else if attempt.student_id == claims.user_id()? {
        Audience::Student
    } else {
        return Err(AppError::Forbidden(
            "Attempt belongs to another student".to_string(),
        ));
    };

    let view = service.render_attempt(&attempt, audience).await?;
    Ok(Json(view))
}

/// The caller's attempts on a quiz, oldest first.
pub async fn my_attempts(
    State(service): State<Arc<QuizService>>,
    Extension(claims): Extension<Claims>,
    Path(quiz_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let student_id = claims.user_id()?;

    let attempts = service.get_student_attempts(quiz_id, student_id).await?;
    let views = service
        .render_attempts(quiz_id, &attempts, Audience::Student)
        .await?;

    Ok(Json(views))
}
