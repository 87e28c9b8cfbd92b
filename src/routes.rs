// src/routes.rs

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware,
    routing::{get, post, put},
};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{attempt, quiz},
    state::AppState,
    utils::jwt::{auth_middleware, instructor_middleware},
};

/// Assembles the main application router.
///
/// * Every route requires a valid token.
/// * Quiz authoring and the per-quiz attempt listing also require the
///   instructor role.
/// * Applies global middleware (Trace, CORS).
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin([
            HeaderValue::from_static("http://localhost:3000"),
            HeaderValue::from_static("http://127.0.0.1:3000"),
        ])
        .allow_methods([Method::GET, Method::POST, Method::PUT])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    let student_routes = Router::new()
        .route("/lessons/{lesson_id}/quiz", get(quiz::get_quiz))
        .route(
            "/lessons/{lesson_id}/quiz/attempts",
            post(attempt::start_attempt),
        )
        .route("/attempts/{attempt_id}", get(attempt::get_attempt))
        .route("/attempts/{attempt_id}/submit", post(attempt::submit_attempt))
        .route("/quizzes/{quiz_id}/attempts/me", get(attempt::my_attempts))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    // Auth first, then the role check.
    let instructor_routes = Router::new()
        .route("/lessons/{lesson_id}/quiz", put(quiz::upsert_quiz))
        .route("/quizzes/{quiz_id}/attempts", get(quiz::quiz_attempts))
        .route_layer(middleware::from_fn(instructor_middleware))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    Router::new()
        .nest("/api", student_routes.merge(instructor_routes))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}
